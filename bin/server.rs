// Festival Scoreboard - Web Server
// JSON API + live standings stream + admin endpoints

use anyhow::{Context, Result};
use axum::{
    extract::{Multipart, Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::signal::ctrl_c;
use tokio::sync::watch;
use tokio_stream::{wrappers::WatchStream, Stream, StreamExt};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use festival_scoreboard::{
    compute_standings, subscribe, AdminGate, AdminSession, AuthError, Carousel, CarouselTicker,
    Config, Error, Event, EventCard, EventDraft, EventStore, Identity, ImageHost, SessionRegistry,
    SqliteAuthenticator, SqliteStore, Standings, StandingsPanel, Subscription, FESTIVAL_TITLE,
};

/// Latest materialized collection, as delivered by the subscription
#[derive(Debug)]
struct Snapshot {
    events: Vec<Event>,
    updated_at: DateTime<Utc>,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<dyn EventStore>,
    gate: Arc<AdminGate>,
    sessions: Arc<SessionRegistry>,
    image_host: Option<ImageHost>,
    /// `None` until the initial load arrives
    snapshot: watch::Receiver<Option<Arc<Snapshot>>>,
    carousel: Arc<Mutex<Carousel>>,
}

/// Kept alive for as long as the server runs
struct LiveFeed {
    _subscription: Subscription,
    _ticker: CarouselTicker,
}

impl AppState {
    fn new(
        store: Arc<dyn EventStore>,
        gate: AdminGate,
        image_host: Option<ImageHost>,
    ) -> (Self, watch::Sender<Option<Arc<Snapshot>>>) {
        let (tx, rx) = watch::channel(None);
        let state = AppState {
            store,
            gate: Arc::new(gate),
            sessions: Arc::new(SessionRegistry::new()),
            image_host,
            snapshot: rx,
            carousel: Arc::new(Mutex::new(Carousel::default())),
        };
        (state, tx)
    }

    /// Subscribe to the store and keep the snapshot and carousel current.
    fn start_live_feed(
        &self,
        snapshots: watch::Sender<Option<Arc<Snapshot>>>,
        carousel_interval: Duration,
    ) -> LiveFeed {
        let carousel = Arc::clone(&self.carousel);
        let subscription = subscribe(Arc::clone(&self.store), move |events| {
            if let Ok(mut carousel) = carousel.lock() {
                carousel.set_events(&events);
            }
            snapshots.send_replace(Some(Arc::new(Snapshot {
                events,
                updated_at: Utc::now(),
            })));
        });

        let carousel = Arc::clone(&self.carousel);
        let ticker = CarouselTicker::spawn(carousel_interval, move || {
            if let Ok(mut carousel) = carousel.lock() {
                carousel.advance();
            }
        });

        LiveFeed {
            _subscription: subscription,
            _ticker: ticker,
        }
    }

    fn current_snapshot(&self) -> Result<Arc<Snapshot>, ApiError> {
        self.snapshot.borrow().clone().ok_or(ApiError::Loading)
    }
}

// ============================================================================
// Responses & Errors
// ============================================================================

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            title: None,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(title: Option<&str>, message: String) -> Self {
        Self {
            success: false,
            data: (),
            title: title.map(str::to_string),
            error: Some(message),
        }
    }
}

#[derive(Debug, Error)]
enum ApiError {
    #[error(transparent)]
    Store(#[from] Error),

    #[error("missing bearer token")]
    MissingToken,

    #[error("results are still loading")]
    Loading,

    #[error("uploads are disabled")]
    UploadsDisabled,

    #[error("bad upload: {0}")]
    BadUpload(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Store(Error::Auth(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, title) = match &self {
            ApiError::Store(Error::NotFound(_)) => (StatusCode::NOT_FOUND, None),
            ApiError::Store(Error::InvalidEvent(_)) => (StatusCode::BAD_REQUEST, None),
            ApiError::Store(Error::Auth(auth)) => {
                let status = match auth {
                    AuthError::NotAuthorized => StatusCode::FORBIDDEN,
                    AuthError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    _ => StatusCode::UNAUTHORIZED,
                };
                (status, Some(auth.title()))
            }
            ApiError::Store(Error::Upload(_)) => (StatusCode::BAD_GATEWAY, None),
            ApiError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
            ApiError::MissingToken => (StatusCode::UNAUTHORIZED, Some("Login Failed")),
            ApiError::Loading | ApiError::UploadsDisabled => {
                (StatusCode::SERVICE_UNAVAILABLE, None)
            }
            ApiError::BadUpload(_) => (StatusCode::BAD_REQUEST, None),
        };

        if status.is_server_error() {
            warn!(%status, error = %self, "request failed");
        }

        (status, Json(ApiResponse::err(title, self.to_string()))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> ApiResult<AdminSession> {
    let token = bearer_token(headers).ok_or(ApiError::MissingToken)?;
    Ok(state.sessions.validate(token)?)
}

// ============================================================================
// Public Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/events - All events, in display order
async fn list_events(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<Vec<Event>>>> {
    Ok(Json(ApiResponse::ok(state.store.list_events()?)))
}

/// GET /api/events/:id
async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Event>>> {
    let event = state
        .store
        .get_event(&id)?
        .ok_or_else(|| Error::NotFound(id.clone()))?;
    Ok(Json(ApiResponse::ok(event)))
}

/// GET /api/standings - Ranked house totals from the live snapshot
async fn get_standings(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<Standings>>> {
    let snapshot = state.current_snapshot()?;
    Ok(Json(ApiResponse::ok(compute_standings(&snapshot.events))))
}

/// GET /api/panel - Standings shaped for display
async fn get_panel(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<StandingsPanel>>> {
    let snapshot = state.current_snapshot()?;
    let standings = compute_standings(&snapshot.events);
    Ok(Json(ApiResponse::ok(StandingsPanel::build(
        &standings,
        snapshot.updated_at,
    ))))
}

#[derive(Serialize)]
struct CarouselResponse {
    title: &'static str,
    index: usize,
    total: usize,
    card: Option<EventCard>,
}

/// GET /api/carousel - The card currently on screen
async fn get_carousel(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<CarouselResponse>>> {
    state.current_snapshot()?;
    let carousel = state.carousel.lock().map_err(Error::from)?;

    Ok(Json(ApiResponse::ok(CarouselResponse {
        title: FESTIVAL_TITLE,
        index: carousel.index(),
        total: carousel.len(),
        card: carousel.current().cloned(),
    })))
}

#[derive(Serialize)]
struct LiveUpdate<'a> {
    panel: StandingsPanel,
    events: &'a [Event],
}

/// GET /api/stream - Server-sent events, one `standings` message per snapshot
async fn stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<SseEvent, Infallible>>> {
    let updates = WatchStream::new(state.snapshot.clone()).filter_map(|snapshot| {
        let snapshot = snapshot?;
        let standings = compute_standings(&snapshot.events);
        let update = LiveUpdate {
            panel: StandingsPanel::build(&standings, snapshot.updated_at),
            events: &snapshot.events,
        };
        SseEvent::default()
            .event("standings")
            .json_data(&update)
            .ok()
            .map(Ok)
    });

    Sse::new(updates).keep_alive(KeepAlive::default())
}

// ============================================================================
// Admin Handlers
// ============================================================================

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// POST /api/login - Exchange admin credentials for a bearer token
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<ApiResponse<AdminSession>>> {
    let identity = state.gate.login(&request.email, &request.password)?;
    let session = state.sessions.issue(&identity)?;
    Ok(Json(ApiResponse::ok(session)))
}

/// POST /api/logout
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<ApiResponse<&'static str>>> {
    let token = bearer_token(&headers).ok_or(ApiError::MissingToken)?;
    let session = state.sessions.revoke(token).ok_or(AuthError::InvalidSession)?;

    state.gate.logout(&Identity {
        email: session.email,
    });
    Ok(Json(ApiResponse::ok("logged out")))
}

/// POST /api/events
async fn create_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(draft): Json<EventDraft>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Event>>)> {
    let session = require_admin(&state, &headers)?;
    let event = state.store.create_event(draft)?;
    info!(admin = %session.email, id = %event.id, "event created");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(event))))
}

/// PUT /api/events/:id
async fn update_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(draft): Json<EventDraft>,
) -> ApiResult<Json<ApiResponse<Event>>> {
    let session = require_admin(&state, &headers)?;
    let event = state.store.update_event(&id, draft)?;
    info!(admin = %session.email, %id, "event updated");
    Ok(Json(ApiResponse::ok(event)))
}

/// DELETE /api/events/:id
async fn delete_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<String>>> {
    let session = require_admin(&state, &headers)?;
    state.store.delete_event(&id)?;
    info!(admin = %session.email, %id, "event deleted");
    Ok(Json(ApiResponse::ok(id)))
}

#[derive(Serialize)]
struct UploadResponse {
    url: String,
}

/// POST /api/upload - multipart `file` field, answers with the durable URL
async fn upload_photo(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Json<ApiResponse<UploadResponse>>> {
    require_admin(&state, &headers)?;
    let host = state.image_host.as_ref().ok_or(ApiError::UploadsDisabled)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadUpload(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("photo").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadUpload(e.to_string()))?;

        let url = host.upload(&file_name, bytes.to_vec()).await.map_err(Error::from)?;
        return Ok(Json(ApiResponse::ok(UploadResponse { url })));
    }

    Err(ApiError::BadUpload("no file field".to_string()))
}

// ============================================================================
// Main Server
// ============================================================================

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/standings", get(get_standings))
        .route("/panel", get(get_panel))
        .route("/carousel", get(get_carousel))
        .route("/stream", get(stream))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/upload", post(upload_photo))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🌐 {} - Web Server", FESTIVAL_TITLE);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = Config::from_env();

    let store = Arc::new(
        SqliteStore::open(&config.db_path)
            .with_context(|| format!("failed to open {}", config.db_path.display()))?,
    );
    let _poller = store.spawn_change_poller(config.poll_interval);
    println!("✓ Database opened: {}", config.db_path.display());

    let authenticator = SqliteAuthenticator::open(&config.db_path)
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;
    let gate = AdminGate::new(Arc::new(authenticator), config.admin_emails.clone());

    let image_host = config.cloudinary.as_ref().map(|c| c.image_host());
    if image_host.is_none() {
        println!("⚠️  Photo uploads disabled (no Cloudinary config)");
    }

    let (state, snapshots) = AppState::new(store, gate, image_host);
    let _live = state.start_live_feed(snapshots, config.carousel_interval);

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    println!("\n🚀 Server running on http://{}", config.bind_addr);
    println!("   API:  http://{}/api/standings", config.bind_addr);
    println!("   Live: http://{}/api/stream", config.bind_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    println!("Server shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = ctrl_c().await {
            warn!(%err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                warn!(%err, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
