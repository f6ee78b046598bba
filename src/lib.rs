// Festival Scoreboard - Core Library
// Exposes all modules for use in the CLI dashboard, API server, and tests

pub mod error;
pub mod config;
pub mod house;          // The four fixed houses
pub mod event;          // Event documents + lenient decoding
pub mod standings;      // Aggregator: totals + dense ranks
pub mod store;          // Document store (memory, SQLite)
pub mod subscription;   // Live snapshot feed
pub mod views;          // Standings panel + carousel view-models
pub mod auth;           // Admin gate
pub mod upload;         // Winner photo host
pub mod import;         // CSV results import

#[cfg(feature = "tui")]
pub mod ui;

// Re-export commonly used types
pub use error::{Error, Result};
pub use config::{CloudinaryConfig, Config};
pub use house::House;
pub use event::{Event, EventDraft, Winner, MAX_WINNERS, PLACEHOLDER_PHOTO};
pub use standings::{
    assign_ranks, compute_standings, compute_standings_with, house_totals,
    HouseStanding, RankingRule, Standings,
};
pub use store::{setup_database, EventStore, MemoryStore, SqliteStore};
pub use subscription::{subscribe, Subscription};
pub use views::{
    AutoAdvance, Carousel, CarouselTicker, EventCard, PanelRow, PhotoSource,
    RankIcon, StandingsPanel, WinnerCard,
};
pub use auth::{
    AdminGate, AdminSession, AuthError, Authenticator, Identity,
    SessionRegistry, SqliteAuthenticator,
};
pub use upload::{ImageHost, UploadError};
pub use import::{import_drafts, load_results_csv, read_results_csv};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Dashboard heading
pub const FESTIVAL_TITLE: &str = "Cynosure 2025-'26";
