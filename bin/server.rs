// Reel Recap - Web Server
// REST API with Axum: submit exports, fetch recaps with live ranking

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clap::Parser;
use reel_recap::{
    parse_export, setup_database, submit, top_films, view, AnalyticsEngine, FilmAggregate,
    IngestError, RecapConfig, DEFAULT_BIND_ADDR, DEFAULT_DATABASE_PATH, DEFAULT_TARGET_YEAR,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "recap-server", version, about = "Reel Recap HTTP API")]
struct Args {
    /// SQLite database file
    #[arg(long, env = "RECAP_DB", default_value = DEFAULT_DATABASE_PATH)]
    db: PathBuf,

    /// Calendar year to analyse (UTC showtimes)
    #[arg(long, env = "RECAP_YEAR", default_value_t = DEFAULT_TARGET_YEAR)]
    year: i32,

    /// Listen address
    #[arg(long, env = "RECAP_BIND", default_value = DEFAULT_BIND_ADDR)]
    bind: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    engine: AnalyticsEngine,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(ApiResponse::err(message))).into_response()
}

#[derive(Deserialize)]
struct TopFilmsQuery {
    limit: Option<usize>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/analyze - Analyze an export and store the recap
async fn analyze(State(state): State<AppState>, body: String) -> Response {
    let purchases = match parse_export(&body) {
        Ok(purchases) => purchases,
        Err(e) => {
            warn!(error = %e, "rejected export");
            return error_response(StatusCode::BAD_REQUEST, e.user_message());
        }
    };

    let Ok(mut conn) = state.db.lock() else {
        error!("database lock poisoned");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to analyze data");
    };

    match submit(&mut conn, &state.engine, purchases) {
        Ok(submission) => (StatusCode::OK, Json(ApiResponse::ok(submission))).into_response(),
        Err(e) => match e.downcast_ref::<IngestError>() {
            Some(ingest) => {
                warn!(error = %ingest, "rejected export");
                error_response(StatusCode::BAD_REQUEST, ingest.user_message())
            }
            None => {
                error!(error = %e, "analysis failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to analyze data")
            }
        },
    }
}

/// GET /api/results/:id - Stored recap plus current ranking
async fn get_results(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(conn) = state.db.lock() else {
        error!("database lock poisoned");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load results");
    };

    match view(&conn, &id) {
        Ok(Some(recap)) => (StatusCode::OK, Json(ApiResponse::ok(recap))).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Results not found"),
        Err(e) => {
            error!(error = %e, session_id = %id, "failed to load results");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load results")
        }
    }
}

/// GET /api/films/top?limit=N - Most-watched films across all recaps
async fn get_top_films(
    State(state): State<AppState>,
    Query(query): Query<TopFilmsQuery>,
) -> Response {
    let Ok(conn) = state.db.lock() else {
        error!("database lock poisoned");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load films");
    };

    match top_films(&conn, query.limit.unwrap_or(10)) {
        Ok(films) => {
            let body: ApiResponse<Vec<FilmAggregate>> = ApiResponse::ok(films);
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            error!(error = %e, "failed to load top films");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load films")
        }
    }
}

// ============================================================================
// Main Server
// ============================================================================

fn app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/analyze", post(analyze))
        .route("/results/:id", get(get_results))
        .route("/films/top", get(get_top_films))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = RecapConfig::default()
        .with_database_path(args.db)
        .with_target_year(args.year)
        .with_bind_addr(args.bind);

    let conn = Connection::open(&config.database_path)?;
    setup_database(&conn)?;
    info!(path = %config.database_path.display(), "database opened");

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        engine: AnalyticsEngine::new(config.target_year),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, year = config.target_year, "🚀 server listening");

    axum::serve(listener, app(state)).await?;

    Ok(())
}
