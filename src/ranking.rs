// 🏆 Comparative Ranking - one session against every stored session
// Recomputed on every view, never persisted

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparativeStats {
    /// `round(100 * rank / total)`; lower is better
    pub percentile: u32,
    /// Mean movie count across sessions, rounded
    pub average_movies: u32,
    pub total_users: u32,
    /// 1 = most movies
    pub rank: u32,
    /// Share of sessions this one outranks, in percent
    pub more_movies_than: u32,
}

impl ComparativeStats {
    /// A session compared only against itself
    fn solo(this_count: u32) -> Self {
        ComparativeStats {
            percentile: 100,
            average_movies: this_count,
            total_users: 1,
            rank: 1,
            more_movies_than: 0,
        }
    }
}

/// Rank a session's movie count within all sessions' counts
///
/// `all_counts` must include this session's own count exactly once and may
/// be in any order. Rank is 1 + the number of sessions with strictly more
/// movies, so equal counts share a rank.
pub fn rank(this_count: u32, all_counts: &[u32]) -> ComparativeStats {
    if all_counts.is_empty() {
        return ComparativeStats::solo(this_count);
    }

    let total = all_counts.len() as u64;
    let rank = 1 + all_counts.iter().filter(|&&c| c > this_count).count() as u64;
    let sum: u64 = all_counts.iter().map(|&c| u64::from(c)).sum();

    ComparativeStats {
        percentile: round_div(100 * rank, total),
        average_movies: round_div(sum, total),
        total_users: total as u32,
        rank: rank as u32,
        more_movies_than: round_div(100 * total.saturating_sub(rank), total),
    }
}

/// `round(num / den)` with a zero guard
fn round_div(num: u64, den: u64) -> u32 {
    if den == 0 {
        return 0;
    }
    (num as f64 / den as f64).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_with_ties() {
        let stats = rank(8, &[10, 8, 8, 5]);

        assert_eq!(stats.rank, 2);
        assert_eq!(stats.percentile, 50);
        assert_eq!(stats.more_movies_than, 50);
        assert_eq!(stats.total_users, 4);
        assert_eq!(stats.average_movies, 8); // 31 / 4 = 7.75
    }

    #[test]
    fn test_rank_order_independent() {
        assert_eq!(rank(8, &[5, 8, 10, 8]), rank(8, &[10, 8, 8, 5]));
    }

    #[test]
    fn test_single_session() {
        let stats = rank(7, &[7]);

        assert_eq!(stats.rank, 1);
        assert_eq!(stats.percentile, 100);
        assert_eq!(stats.more_movies_than, 0);
        assert_eq!(stats.average_movies, 7);
        assert_eq!(stats.total_users, 1);
    }

    #[test]
    fn test_top_and_bottom() {
        let top = rank(40, &[40, 12, 3]);
        assert_eq!(top.rank, 1);
        assert_eq!(top.percentile, 33);
        assert_eq!(top.more_movies_than, 67);

        let bottom = rank(3, &[40, 12, 3]);
        assert_eq!(bottom.rank, 3);
        assert_eq!(bottom.percentile, 100);
        assert_eq!(bottom.more_movies_than, 0);
    }

    #[test]
    fn test_empty_counts_treated_as_solo() {
        let stats = rank(4, &[]);
        assert_eq!(stats, ComparativeStats::solo(4));
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(rank(1, &[1])).unwrap();
        assert_eq!(json["moreMoviesThan"], 0);
        assert_eq!(json["totalUsers"], 1);
        assert_eq!(json["averageMovies"], 1);
    }
}
