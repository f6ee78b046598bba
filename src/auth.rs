// 🔐 Admin authentication
//
// Two steps, kept apart:
// 1. An `Authenticator` verifies an email/password pair and yields an identity.
// 2. The `AdminGate` checks that identity against the admin allow-list and
//    signs it straight back out when it is not on the list.
//
// Sessions handed to HTTP clients are opaque bearer tokens held in memory
// that lapse after `SESSION_TTL`.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// ERRORS & IDENTITY
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials. Please try again.")]
    InvalidCredentials,

    #[error("You are not authorized to access the admin dashboard.")]
    NotAuthorized,

    #[error("Session expired or unknown. Please log in again.")]
    InvalidSession,

    #[error("authentication backend error: {0}")]
    Backend(String),
}

impl AuthError {
    /// Heading shown above the message
    pub fn title(&self) -> &'static str {
        match self {
            AuthError::NotAuthorized => "Access Denied",
            _ => "Login Failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub email: String,
}

pub trait Authenticator: Send + Sync {
    fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    /// End any provider-side session for this identity.
    fn sign_out(&self, identity: &Identity);
}

// ============================================================================
// SQLITE CREDENTIAL STORE
// ============================================================================

pub struct SqliteAuthenticator {
    conn: Mutex<Connection>,
}

pub fn setup_admin_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS admin_users (
            email TEXT PRIMARY KEY,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Argon2id hash in PHC string form; the salt travels inside the string.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Backend(e.to_string()))
}

/// False for a wrong password and for a stored value that is not a PHC string.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(%e, "stored password hash is unreadable");
            false
        }
    }
}

impl SqliteAuthenticator {
    pub fn open(path: &Path) -> crate::Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> crate::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> crate::Result<Self> {
        setup_admin_table(&conn)?;
        Ok(SqliteAuthenticator {
            conn: Mutex::new(conn),
        })
    }

    /// Create or reset a credential.
    pub fn register(&self, email: &str, password: &str) -> crate::Result<()> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials.into());
        }

        let hash = hash_password(password)?;

        let conn = self.conn.lock()?;
        conn.execute(
            "INSERT INTO admin_users (email, password_hash, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(email) DO UPDATE SET password_hash = ?2",
            params![email, hash, Utc::now().to_rfc3339()],
        )?;

        info!(email, "credential registered");
        Ok(())
    }
}

impl Authenticator for SqliteAuthenticator {
    fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let conn = self
            .conn
            .lock()
            .map_err(|_| AuthError::Backend("credential store lock poisoned".to_string()))?;

        let stored: Option<String> = conn
            .query_row(
                "SELECT password_hash FROM admin_users WHERE email = ?1",
                [email],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AuthError::Backend(e.to_string()))?;

        match stored {
            Some(hash) if verify_password(password, &hash) => Ok(Identity {
                email: email.to_string(),
            }),
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    fn sign_out(&self, identity: &Identity) {
        // Credentials carry no server-side session here.
        debug!(email = %identity.email, "signed out");
    }
}

// ============================================================================
// ADMIN GATE
// ============================================================================

pub struct AdminGate {
    authenticator: Arc<dyn Authenticator>,
    allow_list: Vec<String>,
}

impl AdminGate {
    pub fn new(authenticator: Arc<dyn Authenticator>, allow_list: Vec<String>) -> Self {
        AdminGate {
            authenticator,
            allow_list,
        }
    }

    pub fn is_allowed(&self, email: &str) -> bool {
        self.allow_list.iter().any(|allowed| allowed == email)
    }

    /// Authenticate, then authorize. An authenticated identity outside the
    /// allow-list is signed out before the error is returned.
    pub fn login(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = self.authenticator.sign_in(email, password)?;

        if !self.is_allowed(&identity.email) {
            self.authenticator.sign_out(&identity);
            warn!(email = %identity.email, "authenticated user is not an admin");
            return Err(AuthError::NotAuthorized);
        }

        info!(email = %identity.email, "admin logged in");
        Ok(identity)
    }

    pub fn logout(&self, identity: &Identity) {
        self.authenticator.sign_out(identity);
    }
}

// ============================================================================
// SESSIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminSession {
    pub token: String,
    pub email: String,
    pub started_at: DateTime<Utc>,
}

/// How long an issued token stays valid
pub const SESSION_TTL_HOURS: i64 = 12;

impl AdminSession {
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.started_at >= ttl
    }
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, AdminSession>>,
    ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_ttl(Duration::hours(SESSION_TTL_HOURS))
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        SessionRegistry {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn issue(&self, identity: &Identity) -> Result<AdminSession, AuthError> {
        let session = AdminSession {
            token: uuid::Uuid::new_v4().to_string(),
            email: identity.email.clone(),
            started_at: Utc::now(),
        };

        self.sessions
            .write()
            .map_err(|_| AuthError::Backend("session lock poisoned".to_string()))?
            .insert(session.token.clone(), session.clone());

        Ok(session)
    }

    /// An expired session is dropped and reported like an unknown token.
    pub fn validate(&self, token: &str) -> Result<AdminSession, AuthError> {
        let session = self
            .sessions
            .read()
            .map_err(|_| AuthError::Backend("session lock poisoned".to_string()))?
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidSession)?;

        if session.is_expired(self.ttl, Utc::now()) {
            self.revoke(token);
            info!(email = %session.email, "admin session expired");
            return Err(AuthError::InvalidSession);
        }

        Ok(session)
    }

    /// Returns the removed session, if any.
    pub fn revoke(&self, token: &str) -> Option<AdminSession> {
        self.sessions.write().ok()?.remove(token)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Accepts any password equal to "secret" and counts sign-outs.
    struct FakeAuthenticator {
        sign_outs: AtomicUsize,
    }

    impl Authenticator for FakeAuthenticator {
        fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
            if password == "secret" {
                Ok(Identity {
                    email: email.to_string(),
                })
            } else {
                Err(AuthError::InvalidCredentials)
            }
        }

        fn sign_out(&self, _identity: &Identity) {
            self.sign_outs.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn gate() -> (Arc<FakeAuthenticator>, AdminGate) {
        let auth = Arc::new(FakeAuthenticator {
            sign_outs: AtomicUsize::new(0),
        });
        let gate = AdminGate::new(auth.clone(), vec!["admin@spa.com".to_string()]);
        (auth, gate)
    }

    #[test]
    fn test_admin_passes_gate() {
        let (auth, gate) = gate();
        let identity = gate.login("admin@spa.com", "secret").unwrap();
        assert_eq!(identity.email, "admin@spa.com");
        assert_eq!(auth.sign_outs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_non_admin_is_signed_out() {
        let (auth, gate) = gate();
        let err = gate.login("student@spa.com", "secret").unwrap_err();

        assert_eq!(err, AuthError::NotAuthorized);
        assert_eq!(err.title(), "Access Denied");
        assert_eq!(auth.sign_outs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wrong_password_is_rejected() {
        let (auth, gate) = gate();
        let err = gate.login("admin@spa.com", "guess").unwrap_err();

        assert_eq!(err, AuthError::InvalidCredentials);
        assert_eq!(err.title(), "Login Failed");
        assert_eq!(err.to_string(), "Invalid credentials. Please try again.");
        assert_eq!(auth.sign_outs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_sqlite_authenticator_verifies_hash() {
        let auth = SqliteAuthenticator::open_in_memory().unwrap();
        auth.register("admin@spa.com", "hunter2").unwrap();

        assert!(auth.sign_in("admin@spa.com", "hunter2").is_ok());
        assert!(auth.sign_in(" admin@spa.com ", "hunter2").is_ok());
        assert_eq!(
            auth.sign_in("admin@spa.com", "hunter3"),
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(
            auth.sign_in("nobody@spa.com", "hunter2"),
            Err(AuthError::InvalidCredentials)
        );

        // Re-registering resets the password
        auth.register("admin@spa.com", "changed").unwrap();
        assert!(auth.sign_in("admin@spa.com", "hunter2").is_err());
        assert!(auth.sign_in("admin@spa.com", "changed").is_ok());
    }

    #[test]
    fn test_hash_is_salted_phc_string() {
        let first = hash_password("pw").unwrap();
        let second = hash_password("pw").unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
        assert!(verify_password("pw", &first));
        assert!(verify_password("pw", &second));
        assert!(!verify_password("pw2", &first));
        assert!(!verify_password("pw", "not-a-hash"));
    }

    #[test]
    fn test_stored_hash_is_not_plaintext() {
        let auth = SqliteAuthenticator::open_in_memory().unwrap();
        auth.register("admin@spa.com", "hunter2").unwrap();

        let conn = auth.conn.lock().unwrap();
        let stored: String = conn
            .query_row(
                "SELECT password_hash FROM admin_users WHERE email = ?1",
                ["admin@spa.com"],
                |row| row.get(0),
            )
            .unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(!stored.contains("hunter2"));
    }

    #[test]
    fn test_session_lifecycle() {
        let sessions = SessionRegistry::new();
        let identity = Identity {
            email: "admin@spa.com".to_string(),
        };

        let session = sessions.issue(&identity).unwrap();
        assert_eq!(sessions.validate(&session.token).unwrap().email, "admin@spa.com");

        assert!(sessions.revoke(&session.token).is_some());
        assert!(sessions.revoke(&session.token).is_none());
        assert_eq!(sessions.validate(&session.token), Err(AuthError::InvalidSession));
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_expired_session_is_rejected_and_dropped() {
        let sessions = SessionRegistry::with_ttl(Duration::hours(1));
        let identity = Identity {
            email: "admin@spa.com".to_string(),
        };

        let fresh = sessions.issue(&identity).unwrap();
        let stale = sessions.issue(&identity).unwrap();
        sessions
            .sessions
            .write()
            .unwrap()
            .entry(stale.token.clone())
            .and_modify(|s| s.started_at = Utc::now() - Duration::hours(2));

        assert_eq!(sessions.validate(&stale.token), Err(AuthError::InvalidSession));
        assert!(sessions.validate(&fresh.token).is_ok());
        assert_eq!(sessions.len(), 1);
    }
}
