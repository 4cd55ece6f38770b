// 🎟️ Recap Pipeline - submit a purchase history, view a stored recap
// Glue between the aggregation engine, storage and ranking

use crate::aggregator::{aggregate, AnalyticsEngine};
use crate::analytics::MovieAnalytics;
use crate::db::{self, ScreeningRow, SessionDerivedFields};
use crate::purchase::{FilmInfo, PurchaseRecord};
use crate::ranking::{rank, ComparativeStats};
use anyhow::Result;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

/// Result of a successful submission
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub session_id: String,
    pub analytics: MovieAnalytics,
}

/// A stored recap plus its ranking against every session stored so far
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub analytics: MovieAnalytics,
    pub comparative_stats: ComparativeStats,
}

/// Analyse a purchase list and persist the result
///
/// Validation failures surface as [`crate::IngestError`] inside the
/// returned error and nothing is written. Everything else happens in a
/// single transaction: session row, screenings, per-film counters and a
/// fresh global snapshot.
pub fn submit(
    conn: &mut Connection,
    engine: &AnalyticsEngine,
    purchases: Vec<PurchaseRecord>,
) -> Result<Submission> {
    let batch = engine.prepare(purchases)?;
    let analytics = aggregate(&batch);
    let derived = SessionDerivedFields::from_analytics(&analytics);
    let screenings: Vec<ScreeningRow> = batch.purchases().iter().map(ScreeningRow::from).collect();

    // Views per film in this batch, metadata from the first occurrence
    let mut film_views: IndexMap<&str, (u32, &FilmInfo)> = IndexMap::new();
    for record in batch.records() {
        film_views
            .entry(record.film.slug.as_str())
            .or_insert((0, &record.film))
            .0 += 1;
    }

    let tx = conn.transaction()?;

    let session_id = db::store_session(&tx, &analytics, &derived, &screenings)?;
    for (slug, (delta, film)) in &film_views {
        db::upsert_film_aggregate(&tx, slug, *delta, film)?;
    }
    let snapshot = db::record_global_snapshot(&tx)?;

    tx.commit()?;

    info!(
        session_id = %session_id,
        movies = analytics.total_movies,
        films = film_views.len(),
        total_sessions = snapshot.total_sessions,
        "recap submitted"
    );

    Ok(Submission {
        session_id,
        analytics,
    })
}

/// Load a stored recap and rank it against all stored sessions
pub fn view(conn: &Connection, session_id: &str) -> Result<Option<SessionView>> {
    let Some(stored) = db::get_session(conn, session_id)? else {
        return Ok(None);
    };

    let counts = db::list_session_movie_counts(conn)?;
    let comparative_stats = rank(stored.derived.movie_count, &counts);

    Ok(Some(SessionView {
        session_id: stored.id,
        created_at: stored.created_at,
        analytics: stored.analytics,
        comparative_stats,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use crate::purchase::fixtures::purchase;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        conn
    }

    fn history(slugs: &[&str]) -> Vec<PurchaseRecord> {
        slugs
            .iter()
            .enumerate()
            .map(|(i, slug)| {
                let mut p = purchase(slug, &slug.to_uppercase(), "2025-03-14T19:30:00Z");
                p.vista_transaction_id = Some(i as i64);
                p
            })
            .collect()
    }

    #[test]
    fn test_submit_persists_everything() {
        let mut conn = setup();
        let engine = AnalyticsEngine::default();

        let submission = submit(&mut conn, &engine, history(&["a", "b", "a"])).unwrap();

        assert_eq!(submission.analytics.total_movies, 3);
        assert_eq!(db::count_sessions(&conn).unwrap(), 1);
        assert_eq!(db::count_screenings(&conn).unwrap(), 3);

        let films = db::top_films(&conn, 10).unwrap();
        assert_eq!(films.len(), 2);
        assert_eq!(films[0].film_slug, "a");
        assert_eq!(films[0].total_views, 2);

        let snapshot = db::latest_global_snapshot(&conn).unwrap().unwrap();
        assert_eq!(snapshot.total_sessions, 1);
        assert_eq!(snapshot.total_movies_watched, 3);
        assert_eq!(snapshot.unique_movies_watched, 2);
    }

    #[test]
    fn test_submit_accumulates_film_views_across_sessions() {
        let mut conn = setup();
        let engine = AnalyticsEngine::default();

        submit(&mut conn, &engine, history(&["a", "b"])).unwrap();
        submit(&mut conn, &engine, history(&["a"])).unwrap();

        let films = db::top_films(&conn, 1).unwrap();
        assert_eq!(films[0].film_slug, "a");
        assert_eq!(films[0].total_views, 2);
    }

    #[test]
    fn test_submit_rejects_without_writing() {
        let mut conn = setup();
        let engine = AnalyticsEngine::default();

        let mut refunded = history(&["a"]);
        refunded[0].is_refunded = true;

        let err = submit(&mut conn, &engine, refunded).unwrap_err();
        let ingest = err.downcast_ref::<IngestError>().unwrap();
        assert_eq!(ingest.user_message(), "No valid purchases");

        assert_eq!(db::count_sessions(&conn).unwrap(), 0);
        assert!(db::latest_global_snapshot(&conn).unwrap().is_none());
    }

    #[test]
    fn test_view_ranks_against_all_sessions() {
        let mut conn = setup();
        let engine = AnalyticsEngine::default();

        let big = submit(&mut conn, &engine, history(&["a"; 10])).unwrap();
        let mid = submit(&mut conn, &engine, history(&["b"; 8])).unwrap();
        submit(&mut conn, &engine, history(&["c"; 8])).unwrap();
        submit(&mut conn, &engine, history(&["d"; 5])).unwrap();

        let view_mid = view(&conn, &mid.session_id).unwrap().unwrap();
        assert_eq!(view_mid.comparative_stats.rank, 2);
        assert_eq!(view_mid.comparative_stats.percentile, 50);
        assert_eq!(view_mid.comparative_stats.more_movies_than, 50);
        assert_eq!(view_mid.comparative_stats.average_movies, 8);
        assert_eq!(view_mid.comparative_stats.total_users, 4);
        assert_eq!(view_mid.analytics, mid.analytics);

        let view_big = view(&conn, &big.session_id).unwrap().unwrap();
        assert_eq!(view_big.comparative_stats.rank, 1);
    }

    #[test]
    fn test_view_unknown_session() {
        let conn = setup();
        assert!(view(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_view_is_recomputed_as_sessions_arrive() {
        let mut conn = setup();
        let engine = AnalyticsEngine::default();

        let first = submit(&mut conn, &engine, history(&["a"; 3])).unwrap();
        let alone = view(&conn, &first.session_id).unwrap().unwrap();
        assert_eq!(alone.comparative_stats.rank, 1);
        assert_eq!(alone.comparative_stats.percentile, 100);

        submit(&mut conn, &engine, history(&["b"; 9])).unwrap();
        let later = view(&conn, &first.session_id).unwrap().unwrap();
        assert_eq!(later.comparative_stats.rank, 2);
        assert_eq!(later.comparative_stats.total_users, 2);
        assert_eq!(later.analytics, first.analytics);
    }
}
