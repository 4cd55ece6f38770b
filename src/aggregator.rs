// 🎬 Aggregation Engine - valid purchases → MovieAnalytics
// Pure and deterministic: no I/O, output depends only on the batch contents

use crate::analytics::{
    CinemaCount, DayCount, DirectorCount, FilmSummary, MarketCount, MonthCount, MovieAnalytics,
    MovieCount, RatingCount, SeasonPassStats, TimeCount, TimeSlot, YearCount,
};
use crate::config::DEFAULT_TARGET_YEAR;
use crate::error::IngestError;
use crate::purchase::PurchaseRecord;
use chrono::{DateTime, Datelike, Utc};
use indexmap::{IndexMap, IndexSet};
use std::collections::BTreeMap;
use tracing::debug;

const TOP_MOVIES_LIMIT: usize = 10;
const TOP_DIRECTORS_LIMIT: usize = 10;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const DAY_NAMES: [&str; 7] = [
    "Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday",
];

const UNKNOWN: &str = "Unknown";
const NOT_RATED: &str = "Not Rated";

// ============================================================================
// ANALYSIS BATCH
// ============================================================================

/// A purchase that passed the refund/year filter, with its parsed showtime
#[derive(Debug, Clone)]
pub struct ValidPurchase {
    pub showtime: DateTime<Utc>,
    pub record: PurchaseRecord,
}

/// Non-empty list of purchases valid for analysis
///
/// The only way to build one is through the filter, so aggregation never
/// sees refunded, off-year or empty input.
#[derive(Debug, Clone)]
pub struct AnalysisBatch {
    purchases: Vec<ValidPurchase>,
    target_year: i32,
}

impl AnalysisBatch {
    /// Keep non-refunded purchases whose UTC showtime falls in `target_year`
    pub fn new(purchases: Vec<PurchaseRecord>, target_year: i32) -> Result<Self, IngestError> {
        let submitted = purchases.len();

        let valid: Vec<ValidPurchase> = purchases
            .into_iter()
            .filter(|p| !p.is_refunded)
            .filter_map(|record| {
                let showtime = record.session_time()?;
                (showtime.year() == target_year).then_some(ValidPurchase { showtime, record })
            })
            .collect();

        debug!(submitted, valid = valid.len(), target_year, "filtered purchases for analysis");

        if valid.is_empty() {
            return Err(IngestError::NoValidPurchases { target_year });
        }

        Ok(AnalysisBatch {
            purchases: valid,
            target_year,
        })
    }

    pub fn target_year(&self) -> i32 {
        self.target_year
    }

    pub fn len(&self) -> usize {
        self.purchases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.purchases.is_empty()
    }

    pub fn purchases(&self) -> &[ValidPurchase] {
        &self.purchases
    }

    pub fn records(&self) -> impl Iterator<Item = &PurchaseRecord> + '_ {
        self.purchases.iter().map(|p| &p.record)
    }

    /// First purchase in input order
    pub fn first(&self) -> &PurchaseRecord {
        // Non-empty by construction
        &self.purchases[0].record
    }

    /// Number of screenings of the film with this slug
    pub fn view_count(&self, slug: &str) -> u32 {
        self.records().filter(|p| p.film.slug == slug).count() as u32
    }
}

// ============================================================================
// ANALYTICS ENGINE
// ============================================================================

/// Aggregator configured for one target year
#[derive(Debug, Clone, Copy)]
pub struct AnalyticsEngine {
    pub target_year: i32,
}

impl Default for AnalyticsEngine {
    fn default() -> Self {
        AnalyticsEngine::new(DEFAULT_TARGET_YEAR)
    }
}

impl AnalyticsEngine {
    pub fn new(target_year: i32) -> Self {
        AnalyticsEngine { target_year }
    }

    /// Filter raw purchases down to an analysis batch
    pub fn prepare(&self, purchases: Vec<PurchaseRecord>) -> Result<AnalysisBatch, IngestError> {
        AnalysisBatch::new(purchases, self.target_year)
    }

    /// Filter and aggregate in one step
    pub fn analyze(&self, purchases: Vec<PurchaseRecord>) -> Result<MovieAnalytics, IngestError> {
        let batch = self.prepare(purchases)?;
        Ok(aggregate(&batch))
    }
}

/// Compute the full summary for a batch
pub fn aggregate(batch: &AnalysisBatch) -> MovieAnalytics {
    let total_movies = batch.len() as u32;
    let unique_movies = batch
        .records()
        .map(|p| p.film.slug.as_str())
        .collect::<IndexSet<_>>()
        .len() as u32;
    let minutes: u64 = batch.records().map(|p| u64::from(p.film.runtime())).sum();
    let total_minutes = saturate(minutes);

    let film_ranking = rank_films(batch);
    let favorite_movie = favorite_movie(batch, &film_ranking);
    let top_movies: Vec<MovieCount> = film_ranking.into_iter().take(TOP_MOVIES_LIMIT).collect();

    let analytics = MovieAnalytics {
        total_movies,
        unique_movies,
        total_minutes,
        total_hours: (minutes as f64 / 60.0 * 10.0).round() / 10.0,
        average_runtime: rounded_ratio(minutes, u64::from(total_movies)),
        movies_by_month: movies_by_month(batch),
        movies_by_day_of_week: movies_by_day_of_week(batch),
        movies_by_time_of_day: movies_by_time_of_day(batch),
        top_movies,
        market_distribution: market_distribution(batch),
        cinema_distribution: cinema_distribution(batch),
        rating_distribution: rating_distribution(batch),
        year_distribution: year_distribution(batch),
        top_directors: top_directors(batch),
        favorite_movie,
        longest_movie: longest_movie(batch),
        oldest_movie: oldest_movie(batch),
        newest_movie: newest_movie(batch),
        season_pass_stats: season_pass_stats(batch),
    };

    debug!(
        target_year = batch.target_year(),
        total_movies,
        unique_movies,
        total_minutes,
        "aggregated batch"
    );

    analytics
}

// ============================================================================
// NUMERIC HELPERS
// ============================================================================

/// Totals are summed in `u64`; output fields clamp at `u32::MAX`
fn saturate(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// `round(part / whole)`, 0 when `whole` is 0
fn rounded_ratio(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64).round() as u32
}

/// `round(100 * part / whole)`, 0 when `whole` is 0
pub(crate) fn percentage(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    (100.0 * part as f64 / whole as f64).round() as u32
}

/// Stable descending sort by count; ties keep first-seen order
fn sort_desc_by_count<T>(items: &mut [T], count: impl Fn(&T) -> u32) {
    items.sort_by(|a, b| count(b).cmp(&count(a)));
}

// ============================================================================
// TIME BREAKDOWNS
// ============================================================================

fn movies_by_month(batch: &AnalysisBatch) -> Vec<MonthCount> {
    let mut counts: BTreeMap<(i32, u32), u32> = BTreeMap::new();
    for p in batch.purchases() {
        *counts
            .entry((p.showtime.year(), p.showtime.month()))
            .or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|((year, month), count)| MonthCount {
            month: format!("{}-{:02}", year, month),
            count,
            label: format!("{} {}", MONTH_NAMES[(month - 1) as usize], year),
        })
        .collect()
}

fn movies_by_day_of_week(batch: &AnalysisBatch) -> Vec<DayCount> {
    let mut counts = [0u32; 7];
    for p in batch.purchases() {
        counts[p.showtime.weekday().num_days_from_sunday() as usize] += 1;
    }

    DAY_NAMES
        .iter()
        .enumerate()
        .map(|(index, label)| DayCount {
            day: index.to_string(),
            count: counts[index],
            label: label.to_string(),
        })
        .collect()
}

fn movies_by_time_of_day(batch: &AnalysisBatch) -> Vec<TimeCount> {
    let mut counts = [0u32; 4];
    for p in batch.records() {
        counts[TimeSlot::from_hour(p.local_hour()).index()] += 1;
    }

    TimeSlot::ALL
        .iter()
        .map(|slot| TimeCount {
            time_slot: *slot,
            count: counts[slot.index()],
            label: slot.label().to_string(),
        })
        .collect()
}

// ============================================================================
// DISTRIBUTIONS
// ============================================================================

/// Every film in the batch by view count, uncapped
fn rank_films(batch: &AnalysisBatch) -> Vec<MovieCount> {
    let mut films: IndexMap<&str, MovieCount> = IndexMap::new();
    for p in batch.records() {
        films
            .entry(p.film.slug.as_str())
            .or_insert_with(|| MovieCount {
                slug: p.film.slug.clone(),
                title: p.film.title.clone(),
                count: 0,
                year: p.film.year().map(str::to_string),
                poster_image: p.film.poster_image().map(str::to_string),
            })
            .count += 1;
    }

    let mut ranking: Vec<MovieCount> = films.into_values().collect();
    sort_desc_by_count(&mut ranking, |m| m.count);
    ranking
}

fn market_distribution(batch: &AnalysisBatch) -> Vec<MarketCount> {
    let mut counts: IndexMap<&str, u32> = IndexMap::new();
    for p in batch.records() {
        *counts.entry(p.market_name.as_str()).or_insert(0) += 1;
    }

    let total = batch.len() as u64;
    let mut markets: Vec<MarketCount> = counts
        .into_iter()
        .map(|(market, count)| MarketCount {
            market: market.to_string(),
            count,
            percentage: percentage(u64::from(count), total),
        })
        .collect();
    sort_desc_by_count(&mut markets, |m| m.count);
    markets
}

fn cinema_distribution(batch: &AnalysisBatch) -> Vec<CinemaCount> {
    let mut counts: IndexMap<(&str, &str), u32> = IndexMap::new();
    for p in batch.records() {
        *counts
            .entry((p.cinema_name.as_str(), p.market_name.as_str()))
            .or_insert(0) += 1;
    }

    let total = batch.len() as u64;
    let mut cinemas: Vec<CinemaCount> = counts
        .into_iter()
        .map(|((cinema, market), count)| CinemaCount {
            cinema: cinema.to_string(),
            market: market.to_string(),
            count,
            percentage: percentage(u64::from(count), total),
        })
        .collect();
    sort_desc_by_count(&mut cinemas, |c| c.count);
    cinemas
}

fn rating_distribution(batch: &AnalysisBatch) -> Vec<RatingCount> {
    let mut counts: IndexMap<&str, u32> = IndexMap::new();
    for p in batch.records() {
        *counts.entry(p.film.rating().unwrap_or(NOT_RATED)).or_insert(0) += 1;
    }

    let total = batch.len() as u64;
    let mut ratings: Vec<RatingCount> = counts
        .into_iter()
        .map(|(rating, count)| RatingCount {
            rating: rating.to_string(),
            count,
            percentage: percentage(u64::from(count), total),
        })
        .collect();
    sort_desc_by_count(&mut ratings, |r| r.count);
    ratings
}

fn year_distribution(batch: &AnalysisBatch) -> Vec<YearCount> {
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for p in batch.records() {
        *counts.entry(p.film.year().unwrap_or(UNKNOWN)).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|(year, count)| YearCount {
            year: year.to_string(),
            count,
        })
        .collect()
}

fn top_directors(batch: &AnalysisBatch) -> Vec<DirectorCount> {
    let mut directors: IndexMap<&str, (u32, IndexSet<&str>)> = IndexMap::new();
    for p in batch.records() {
        let entry = directors
            .entry(p.film.director().unwrap_or(UNKNOWN))
            .or_default();
        entry.0 += 1;
        entry.1.insert(p.film.title.as_str());
    }

    let mut ranked: Vec<DirectorCount> = directors
        .into_iter()
        .map(|(director, (count, movies))| DirectorCount {
            director: director.to_string(),
            count,
            movies: movies.into_iter().map(str::to_string).collect(),
        })
        .collect();
    sort_desc_by_count(&mut ranked, |d| d.count);
    ranked.truncate(TOP_DIRECTORS_LIMIT);
    ranked
}

fn season_pass_stats(batch: &AnalysisBatch) -> SeasonPassStats {
    let (total_tickets, season_pass_tickets) = batch
        .records()
        .map(PurchaseRecord::ticket_counts)
        .fold((0u64, 0u64), |(total, season), (t, s)| (total + t, season + s));

    let regular_tickets = total_tickets - season_pass_tickets;

    SeasonPassStats {
        total_tickets: saturate(total_tickets),
        season_pass_tickets: saturate(season_pass_tickets),
        regular_tickets: saturate(regular_tickets),
        season_pass_percentage: percentage(season_pass_tickets, total_tickets),
        regular_percentage: percentage(regular_tickets, total_tickets),
    }
}

// ============================================================================
// SUPERLATIVES
// ============================================================================

fn summarize(record: &PurchaseRecord, view_count: u32) -> FilmSummary {
    let film = &record.film;
    FilmSummary {
        title: film.title.clone(),
        year: film.year().unwrap_or(UNKNOWN).to_string(),
        runtime: film.runtime(),
        director: film.director().unwrap_or(UNKNOWN).to_string(),
        poster_image: film.poster_image().map(str::to_string),
        view_count,
    }
}

/// Most-watched film; display fields come from its first screening
///
/// The lookup goes by slug, so two different films sharing a title never
/// swap metadata.
fn favorite_movie(batch: &AnalysisBatch, ranking: &[MovieCount]) -> FilmSummary {
    let top = ranking.first();
    let record = top
        .and_then(|m| batch.records().find(|p| p.film.slug == m.slug))
        .unwrap_or_else(|| batch.first());

    summarize(record, top.map_or(1, |m| m.count))
}

/// Fold over the batch seeded with its first record; `better(candidate,
/// current)` must be strict so earlier records win ties
fn pick_film<'a>(
    batch: &'a AnalysisBatch,
    better: impl Fn(&PurchaseRecord, &PurchaseRecord) -> bool,
) -> &'a PurchaseRecord {
    batch
        .records()
        .skip(1)
        .fold(batch.first(), |best, p| if better(p, best) { p } else { best })
}

fn longest_movie(batch: &AnalysisBatch) -> FilmSummary {
    let longest = pick_film(batch, |p, best| p.film.runtime() > best.film.runtime());
    summarize(longest, batch.view_count(&longest.film.slug))
}

fn oldest_movie(batch: &AnalysisBatch) -> FilmSummary {
    let year = |p: &PurchaseRecord| p.film.release_year().unwrap_or(9999);
    let oldest = pick_film(batch, |p, best| year(p) < year(best));
    summarize(oldest, batch.view_count(&oldest.film.slug))
}

fn newest_movie(batch: &AnalysisBatch) -> FilmSummary {
    let year = |p: &PurchaseRecord| p.film.release_year().unwrap_or(0);
    let newest = pick_film(batch, |p, best| year(p) > year(best));
    summarize(newest, batch.view_count(&newest.film.slug))
}
