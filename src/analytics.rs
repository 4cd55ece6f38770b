// 📊 Movie Analytics - Year-in-review summary of one submitted batch
// Immutable once computed; stored as JSON next to the session row

use serde::{Deserialize, Serialize};

// ============================================================================
// SUMMARY
// ============================================================================

/// Everything computed from one session's valid purchases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieAnalytics {
    /// Valid screenings
    pub total_movies: u32,
    /// Distinct films by slug
    pub unique_movies: u32,
    pub total_minutes: u32,
    /// Total minutes in hours, one decimal
    pub total_hours: f64,
    pub average_runtime: u32,

    pub movies_by_month: Vec<MonthCount>,
    pub movies_by_day_of_week: Vec<DayCount>,
    pub movies_by_time_of_day: Vec<TimeCount>,
    pub top_movies: Vec<MovieCount>,
    pub market_distribution: Vec<MarketCount>,
    pub cinema_distribution: Vec<CinemaCount>,
    pub rating_distribution: Vec<RatingCount>,
    pub year_distribution: Vec<YearCount>,
    pub top_directors: Vec<DirectorCount>,

    pub favorite_movie: FilmSummary,
    pub longest_movie: FilmSummary,
    pub oldest_movie: FilmSummary,
    pub newest_movie: FilmSummary,

    pub season_pass_stats: SeasonPassStats,
}

impl MovieAnalytics {
    /// Market with the most screenings
    pub fn top_market(&self) -> Option<&str> {
        self.market_distribution.first().map(|m| m.market.as_str())
    }

    /// Cinema with the most screenings
    pub fn top_cinema(&self) -> Option<&str> {
        self.cinema_distribution.first().map(|c| c.cinema.as_str())
    }
}

// ============================================================================
// BUCKETS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthCount {
    /// `YYYY-MM`
    pub month: String,
    pub count: u32,
    /// `Mon YYYY`
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCount {
    /// "0" (Sunday) through "6" (Saturday)
    pub day: String,
    pub count: u32,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeCount {
    pub time_slot: TimeSlot,
    pub count: u32,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieCount {
    pub slug: String,
    pub title: String,
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketCount {
    pub market: String,
    pub count: u32,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CinemaCount {
    pub cinema: String,
    pub market: String,
    pub count: u32,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingCount {
    pub rating: String,
    pub count: u32,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearCount {
    pub year: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorCount {
    pub director: String,
    pub count: u32,
    /// Distinct titles, first-seen order
    pub movies: Vec<String>,
}

/// Display record for a superlative film (favorite, longest, oldest, newest)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmSummary {
    pub title: String,
    pub year: String,
    pub runtime: u32,
    pub director: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_image: Option<String>,
    pub view_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonPassStats {
    pub total_tickets: u32,
    pub season_pass_tickets: u32,
    pub regular_tickets: u32,
    pub season_pass_percentage: u32,
    pub regular_percentage: u32,
}

// ============================================================================
// TIME OF DAY
// ============================================================================

/// Fixed showtime buckets, keyed on the cinema-local hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeSlot {
    /// 05:00 - 11:59
    Morning,
    /// 12:00 - 16:59
    Afternoon,
    /// 17:00 - 21:59
    Evening,
    /// 22:00 - 04:59
    LateNight,
}

impl TimeSlot {
    /// Display order
    pub const ALL: [TimeSlot; 4] = [
        TimeSlot::Morning,
        TimeSlot::Afternoon,
        TimeSlot::Evening,
        TimeSlot::LateNight,
    ];

    /// Bucket for a wall-clock hour; anything outside the daytime ranges,
    /// including an unreadable hour, is late night
    pub fn from_hour(hour: Option<u32>) -> Self {
        match hour {
            Some(5..=11) => TimeSlot::Morning,
            Some(12..=16) => TimeSlot::Afternoon,
            Some(17..=21) => TimeSlot::Evening,
            _ => TimeSlot::LateNight,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeSlot::Morning => "Morning (5am-12pm)",
            TimeSlot::Afternoon => "Afternoon (12pm-5pm)",
            TimeSlot::Evening => "Evening (5pm-10pm)",
            TimeSlot::LateNight => "Late Night (10pm-5am)",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            TimeSlot::Morning => 0,
            TimeSlot::Afternoon => 1,
            TimeSlot::Evening => 2,
            TimeSlot::LateNight => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_slot_boundaries() {
        assert_eq!(TimeSlot::from_hour(Some(4)), TimeSlot::LateNight);
        assert_eq!(TimeSlot::from_hour(Some(5)), TimeSlot::Morning);
        assert_eq!(TimeSlot::from_hour(Some(11)), TimeSlot::Morning);
        assert_eq!(TimeSlot::from_hour(Some(12)), TimeSlot::Afternoon);
        assert_eq!(TimeSlot::from_hour(Some(17)), TimeSlot::Evening);
        assert_eq!(TimeSlot::from_hour(Some(21)), TimeSlot::Evening);
        assert_eq!(TimeSlot::from_hour(Some(22)), TimeSlot::LateNight);
        assert_eq!(TimeSlot::from_hour(Some(0)), TimeSlot::LateNight);
        assert_eq!(TimeSlot::from_hour(None), TimeSlot::LateNight);
    }

    #[test]
    fn test_time_slot_serializes_camel_case() {
        let json = serde_json::to_string(&TimeSlot::LateNight).unwrap();
        assert_eq!(json, "\"lateNight\"");

        for (i, slot) in TimeSlot::ALL.iter().enumerate() {
            assert_eq!(slot.index(), i);
        }
    }
}
