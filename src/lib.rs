// Reel Recap - Core Library
// Year-in-review analytics for cinema purchase histories.
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod error;
pub mod purchase;
pub mod parser;
pub mod analytics;
pub mod aggregator; // Purchases → MovieAnalytics
pub mod ranking;    // Session vs. all sessions
pub mod db;
pub mod recap;      // Submit / view pipeline

// Re-export commonly used types
pub use config::{RecapConfig, DEFAULT_BIND_ADDR, DEFAULT_DATABASE_PATH, DEFAULT_TARGET_YEAR};
pub use error::IngestError;
pub use purchase::{FilmInfo, LineItem, PurchaseRecord};
pub use parser::{load_export, load_exports, merge_pages, parse_export, parse_export_value};
pub use analytics::{
    CinemaCount, DayCount, DirectorCount, FilmSummary, MarketCount, MonthCount,
    MovieAnalytics, MovieCount, RatingCount, SeasonPassStats, TimeCount, TimeSlot, YearCount,
};
pub use aggregator::{aggregate, AnalysisBatch, AnalyticsEngine, ValidPurchase};
pub use ranking::{rank, ComparativeStats};
pub use db::{
    FilmAggregate, GlobalSnapshot, ScreeningRow, SessionDerivedFields, StoredSession,
    setup_database, store_session, get_session, get_screenings,
    count_sessions, count_screenings, count_films, list_session_movie_counts,
    upsert_film_aggregate, top_films, record_global_snapshot, latest_global_snapshot,
};
pub use recap::{submit, view, SessionView, Submission};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
