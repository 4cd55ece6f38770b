// 💾 Storage - SQLite persistence for sessions, screenings and film totals

use crate::aggregator::ValidPurchase;
use crate::analytics::MovieAnalytics;
use crate::purchase::FilmInfo;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// ROW TYPES
// ============================================================================

/// Denormalized columns stored next to the analytics JSON so that
/// cross-session queries never need to parse it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDerivedFields {
    pub movie_count: u32,
    pub total_minutes: u32,
    pub unique_movies: u32,
    pub top_market: Option<String>,
    pub top_cinema: Option<String>,
}

impl SessionDerivedFields {
    pub fn from_analytics(analytics: &MovieAnalytics) -> Self {
        SessionDerivedFields {
            movie_count: analytics.total_movies,
            total_minutes: analytics.total_minutes,
            unique_movies: analytics.unique_movies,
            top_market: analytics.top_market().map(str::to_string),
            top_cinema: analytics.top_cinema().map(str::to_string),
        }
    }
}

/// One screening attached to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreeningRow {
    pub market_name: String,
    pub cinema_name: String,
    pub session_time_utc: DateTime<Utc>,
    pub film_slug: String,
    pub film_title: String,
    /// Idempotency hash of the originating purchase
    pub purchase_hash: String,
}

impl From<&ValidPurchase> for ScreeningRow {
    fn from(p: &ValidPurchase) -> Self {
        ScreeningRow {
            market_name: p.record.market_name.clone(),
            cinema_name: p.record.cinema_name.clone(),
            session_time_utc: p.showtime,
            film_slug: p.record.film.slug.clone(),
            film_title: p.record.film.title.clone(),
            purchase_hash: p.record.compute_idempotency_hash(),
        }
    }
}

/// A stored session with its immutable summary
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub derived: SessionDerivedFields,
    pub analytics: MovieAnalytics,
}

/// Global per-film counter across every session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmAggregate {
    pub film_slug: String,
    pub title: String,
    pub year: Option<String>,
    pub runtime_minutes: Option<u32>,
    pub rating: Option<String>,
    pub director: Option<String>,
    pub cast: Option<String>,
    pub poster_image: Option<String>,
    pub total_views: u32,
    pub last_seen: DateTime<Utc>,
}

/// Site-wide totals recorded after each submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSnapshot {
    pub total_sessions: i64,
    pub total_movies_watched: i64,
    pub unique_movies_watched: i64,
    pub avg_movies_per_session: f64,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            movie_count INTEGER NOT NULL,
            total_minutes INTEGER NOT NULL,
            unique_movies INTEGER NOT NULL,
            top_market TEXT,
            top_cinema TEXT,
            analytics TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS screenings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            market_name TEXT NOT NULL,
            cinema_name TEXT NOT NULL,
            session_time_utc TEXT NOT NULL,
            film_slug TEXT NOT NULL,
            film_title TEXT NOT NULL,
            purchase_hash TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS movies (
            film_slug TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            year TEXT,
            runtime_minutes INTEGER,
            rating TEXT,
            director TEXT,
            cast TEXT,
            poster_image TEXT,
            total_views INTEGER NOT NULL DEFAULT 0,
            last_seen TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS analytics_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            total_sessions INTEGER NOT NULL,
            total_movies_watched INTEGER NOT NULL,
            unique_movies_watched INTEGER NOT NULL,
            avg_movies_per_session REAL NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_movie_count ON sessions(movie_count)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_screenings_session
         ON screenings(session_id, session_time_utc)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// SESSIONS
// ============================================================================

/// Store a computed summary and its screenings, returning the new session id
pub fn store_session(
    conn: &Connection,
    analytics: &MovieAnalytics,
    derived: &SessionDerivedFields,
    screenings: &[ScreeningRow],
) -> Result<String> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let analytics_json = serde_json::to_string(analytics)?;

    conn.execute(
        "INSERT INTO sessions (
            id, movie_count, total_minutes, unique_movies, top_market, top_cinema,
            analytics, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            session_id,
            derived.movie_count,
            derived.total_minutes,
            derived.unique_movies,
            derived.top_market,
            derived.top_cinema,
            analytics_json,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("Failed to insert session")?;

    let mut stmt = conn.prepare(
        "INSERT INTO screenings (
            session_id, market_name, cinema_name, session_time_utc,
            film_slug, film_title, purchase_hash
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;

    for screening in screenings {
        stmt.execute(params![
            session_id,
            screening.market_name,
            screening.cinema_name,
            screening.session_time_utc.to_rfc3339(),
            screening.film_slug,
            screening.film_title,
            screening.purchase_hash,
        ])?;
    }

    info!(
        session_id = %session_id,
        movie_count = derived.movie_count,
        screenings = screenings.len(),
        "stored session"
    );

    Ok(session_id)
}

/// Load a session by id
pub fn get_session(conn: &Connection, session_id: &str) -> Result<Option<StoredSession>> {
    let row = conn
        .query_row(
            "SELECT id, created_at, movie_count, total_minutes, unique_movies,
                    top_market, top_cinema, analytics
             FROM sessions
             WHERE id = ?1",
            [session_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    SessionDerivedFields {
                        movie_count: row.get(2)?,
                        total_minutes: row.get(3)?,
                        unique_movies: row.get(4)?,
                        top_market: row.get(5)?,
                        top_cinema: row.get(6)?,
                    },
                    row.get::<_, String>(7)?,
                ))
            },
        )
        .optional()?;

    let Some((id, created_at, derived, analytics_json)) = row else {
        return Ok(None);
    };

    let analytics: MovieAnalytics = serde_json::from_str(&analytics_json)
        .with_context(|| format!("Corrupt analytics JSON for session {}", id))?;

    Ok(Some(StoredSession {
        created_at: parse_timestamp(&created_at)?,
        id,
        derived,
        analytics,
    }))
}

pub fn count_sessions(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;

    Ok(count)
}

/// Movie count of every stored session, in no particular order
pub fn list_session_movie_counts(conn: &Connection) -> Result<Vec<u32>> {
    let mut stmt = conn.prepare("SELECT movie_count FROM sessions")?;

    let counts = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<u32>, _>>()?;

    Ok(counts)
}

/// Screenings of one session, oldest first
pub fn get_screenings(conn: &Connection, session_id: &str) -> Result<Vec<ScreeningRow>> {
    let mut stmt = conn.prepare(
        "SELECT market_name, cinema_name, session_time_utc, film_slug, film_title, purchase_hash
         FROM screenings
         WHERE session_id = ?1
         ORDER BY session_time_utc ASC, id ASC",
    )?;

    let rows = stmt
        .query_map([session_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(market_name, cinema_name, time, film_slug, film_title, purchase_hash)| {
            Ok(ScreeningRow {
                market_name,
                cinema_name,
                session_time_utc: parse_timestamp(&time)?,
                film_slug,
                film_title,
                purchase_hash,
            })
        })
        .collect()
}

pub fn count_screenings(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM screenings", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// FILM AGGREGATES
// ============================================================================

/// Add `delta` views to a film's global counter, creating it on first sight
///
/// Metadata is written only on insert; later batches just bump the counter
/// and `last_seen`.
pub fn upsert_film_aggregate(
    conn: &Connection,
    slug: &str,
    delta: u32,
    film: &FilmInfo,
) -> Result<()> {
    conn.execute(
        "INSERT INTO movies (
            film_slug, title, year, runtime_minutes, rating, director, cast,
            poster_image, total_views, last_seen
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(film_slug) DO UPDATE SET
            total_views = total_views + excluded.total_views,
            last_seen = excluded.last_seen",
        params![
            slug,
            film.title,
            film.year(),
            film.runtime_minutes.filter(|m| *m > 0),
            film.rating(),
            film.director(),
            film.cast(),
            film.poster_image(),
            delta,
            Utc::now().to_rfc3339(),
        ],
    )
    .with_context(|| format!("Failed to upsert film {}", slug))?;

    debug!(slug, delta, "upserted film aggregate");
    Ok(())
}

pub fn count_films(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM movies", [], |row| row.get(0))?;

    Ok(count)
}

/// Most-viewed films across all sessions
pub fn top_films(conn: &Connection, limit: usize) -> Result<Vec<FilmAggregate>> {
    let mut stmt = conn.prepare(
        "SELECT film_slug, title, year, runtime_minutes, rating, director, cast,
                poster_image, total_views, last_seen
         FROM movies
         ORDER BY total_views DESC, title ASC
         LIMIT ?1",
    )?;

    let rows = stmt
        .query_map([limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<u32>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, u32>(8)?,
                row.get::<_, String>(9)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(
            |(
                film_slug,
                title,
                year,
                runtime_minutes,
                rating,
                director,
                cast,
                poster_image,
                total_views,
                last_seen,
            )| {
                Ok(FilmAggregate {
                    film_slug,
                    title,
                    year,
                    runtime_minutes,
                    rating,
                    director,
                    cast,
                    poster_image,
                    total_views,
                    last_seen: parse_timestamp(&last_seen)?,
                })
            },
        )
        .collect()
}

// ============================================================================
// GLOBAL SNAPSHOTS
// ============================================================================

/// Compute current site-wide totals and append them to the snapshot log
pub fn record_global_snapshot(conn: &Connection) -> Result<GlobalSnapshot> {
    let total_sessions = count_sessions(conn)?;
    let total_movies_watched = count_screenings(conn)?;
    let unique_movies_watched = count_films(conn)?;

    let snapshot = GlobalSnapshot {
        total_sessions,
        total_movies_watched,
        unique_movies_watched,
        avg_movies_per_session: if total_sessions > 0 {
            total_movies_watched as f64 / total_sessions as f64
        } else {
            0.0
        },
        created_at: Utc::now(),
    };

    conn.execute(
        "INSERT INTO analytics_snapshots (
            total_sessions, total_movies_watched, unique_movies_watched,
            avg_movies_per_session, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            snapshot.total_sessions,
            snapshot.total_movies_watched,
            snapshot.unique_movies_watched,
            snapshot.avg_movies_per_session,
            snapshot.created_at.to_rfc3339(),
        ],
    )?;

    Ok(snapshot)
}

pub fn latest_global_snapshot(conn: &Connection) -> Result<Option<GlobalSnapshot>> {
    let row = conn
        .query_row(
            "SELECT total_sessions, total_movies_watched, unique_movies_watched,
                    avg_movies_per_session, created_at
             FROM analytics_snapshots
             ORDER BY id DESC
             LIMIT 1",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;

    row.map(|(sessions, movies, unique, avg, created_at)| {
        Ok(GlobalSnapshot {
            total_sessions: sessions,
            total_movies_watched: movies,
            unique_movies_watched: unique,
            avg_movies_per_session: avg,
            created_at: parse_timestamp(&created_at)?,
        })
    })
    .transpose()
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid stored timestamp: {}", value))?;
    Ok(dt.with_timezone(&Utc))
}
