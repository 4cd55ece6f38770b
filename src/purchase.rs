// 🎟️ Purchase Records - Wire model of a theater purchase-history export
// One PurchaseRecord per ticket transaction, as found in the export JSON

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// PURCHASE RECORD
// ============================================================================

/// One ticket transaction
///
/// Identifiers are opaque. Only the showtime, refund flag, location names,
/// film and line items feed the analytics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    #[serde(default)]
    pub vista_transaction_id: Option<i64>,

    #[serde(default)]
    pub loyalty_transaction_id: Option<i64>,

    #[serde(default)]
    pub booking_id: Option<String>,

    #[serde(default, rename = "transactionDateTimeUtc")]
    pub transaction_time: Option<String>,

    /// Showtime in UTC (ISO-8601)
    #[serde(rename = "sessionDateTimeUtc", alias = "sessionTime")]
    pub session_time_utc: String,

    /// Showtime in cinema-local wall-clock time. The time-of-day digits are
    /// read literally; this field is never converted between zones.
    #[serde(default, rename = "sessionDateTimeClt", alias = "sessionTimeLocal")]
    pub session_time_local: Option<String>,

    #[serde(default)]
    pub is_refunded: bool,

    #[serde(default)]
    pub market_name: String,

    #[serde(default)]
    pub cinema_name: String,

    pub film: FilmInfo,

    #[serde(default)]
    pub line_items: Vec<LineItem>,

    #[serde(default)]
    pub is_subscription_purchase: bool,
}

/// Film metadata embedded in every purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmInfo {
    /// Stable unique key
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub runtime_minutes: Option<u32>,
    #[serde(default)]
    pub rating: Option<String>,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub cast: Option<String>,
    #[serde(default)]
    pub poster_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub name: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub is_ticket: bool,
}

/// Treat `Some("")` the same as `None`
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl FilmInfo {
    pub fn year(&self) -> Option<&str> {
        present(&self.year)
    }

    pub fn rating(&self) -> Option<&str> {
        present(&self.rating)
    }

    pub fn director(&self) -> Option<&str> {
        present(&self.director)
    }

    pub fn cast(&self) -> Option<&str> {
        present(&self.cast)
    }

    pub fn poster_image(&self) -> Option<&str> {
        present(&self.poster_image)
    }

    /// Runtime in minutes, 0 when unknown
    pub fn runtime(&self) -> u32 {
        self.runtime_minutes.unwrap_or(0)
    }

    /// Release year as a number, if the year string starts with digits
    pub fn release_year(&self) -> Option<i32> {
        let year = self.year()?.trim();
        let digits: String = year.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }
}

impl PurchaseRecord {
    /// Parse the UTC showtime
    ///
    /// Accepts RFC 3339 (`2025-03-02T04:15:00.000Z`) and zone-less ISO
    /// timestamps, which are taken as UTC.
    pub fn session_time(&self) -> Option<DateTime<Utc>> {
        parse_utc(&self.session_time_utc)
    }

    /// Wall-clock hour of the showtime at the cinema
    ///
    /// Reads the literal hour digits of the local field, falling back to the
    /// UTC field when the local one is absent. Returns `None` when no hour
    /// can be read.
    pub fn local_hour(&self) -> Option<u32> {
        let stamp = present(&self.session_time_local).unwrap_or(&self.session_time_utc);
        literal_hour(stamp)
    }

    /// Ticket quantities flagged `isTicket`, split into (total, season pass)
    pub fn ticket_counts(&self) -> (u64, u64) {
        self.line_items
            .iter()
            .filter(|item| item.is_ticket)
            .fold((0, 0), |(total, season), item| {
                let is_pass = self.is_subscription_purchase || item.name.contains("Season Pass");
                let quantity = u64::from(item.quantity);
                (
                    total + quantity,
                    if is_pass { season + quantity } else { season },
                )
            })
    }

    /// Compute idempotency hash for duplicate detection across export pages
    /// NOTE: this is for DEDUPLICATION only; sessions have their own UUID
    pub fn compute_idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}|{}",
            self.vista_transaction_id.map(|v| v.to_string()).unwrap_or_default(),
            self.loyalty_transaction_id.map(|v| v.to_string()).unwrap_or_default(),
            self.booking_id.as_deref().unwrap_or_default(),
            self.session_time_utc,
            self.film.slug,
        ));
        format!("{:x}", hasher.finalize())
    }
}

fn parse_utc(stamp: &str) -> Option<DateTime<Utc>> {
    let stamp = stamp.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(stamp) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(stamp, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Hour digits between the date/time separator and the first colon
fn literal_hour(stamp: &str) -> Option<u32> {
    let (_, time) = stamp.trim().split_once(|c: char| c == 'T' || c == ' ')?;
    let hour = time.split(':').next()?;
    hour.trim().parse().ok().filter(|h| *h < 24)
}


#[cfg(test)]
mod tests {
    use super::fixtures::purchase;
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_deserialize_export_field_names() {
        let json = r#"{
            "vistaTransactionId": 101,
            "loyaltyTransactionId": 202,
            "bookingId": "BK1",
            "sessionDateTimeUtc": "2025-03-02T04:15:00.000Z",
            "sessionDateTimeClt": "2025-03-01T22:15:00",
            "marketId": "0000",
            "marketName": "Austin",
            "cinemaName": "Mueller",
            "isRefunded": false,
            "film": {
                "slug": "dune-2",
                "title": "Dune: Part Two",
                "year": "2024",
                "runtimeMinutes": 166,
                "rating": "PG-13"
            },
            "lineItems": [{ "name": "Adult", "quantity": 2, "isTicket": true }],
            "isSubscriptionPurchase": false
        }"#;

        let record: PurchaseRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.film.slug, "dune-2");
        assert_eq!(record.film.runtime(), 166);
        assert_eq!(record.film.director(), None);
        assert_eq!(record.cinema_name, "Mueller");
        assert_eq!(record.line_items[0].quantity, 2);
    }

    #[test]
    fn test_deserialize_short_field_aliases() {
        let json = r#"{
            "sessionTime": "2025-01-05T18:00:00Z",
            "sessionTimeLocal": "2025-01-05T12:00:00",
            "film": { "slug": "a", "title": "A" }
        }"#;

        let record: PurchaseRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.local_hour(), Some(12));
        assert!(!record.is_refunded);
        assert!(record.line_items.is_empty());
    }

    #[test]
    fn test_session_time_parses_rfc3339_and_naive() {
        let record = purchase("a", "A", "2025-12-31T23:30:00.000Z");
        let dt = record.session_time().unwrap();
        assert_eq!((dt.year(), dt.month(), dt.hour()), (2025, 12, 23));

        let naive = purchase("a", "A", "2025-06-01T10:00:00");
        assert_eq!(naive.session_time().unwrap().month(), 6);

        let offset = purchase("a", "A", "2025-01-01T01:00:00-06:00");
        assert_eq!(offset.session_time().unwrap().hour(), 7);

        assert!(purchase("a", "A", "not a date").session_time().is_none());
    }

    #[test]
    fn test_local_hour_is_read_literally() {
        let mut record = purchase("a", "A", "2025-03-02T05:15:00.000Z");
        record.session_time_local = Some("2025-03-01T23:15:00".to_string());
        assert_eq!(record.local_hour(), Some(23));

        // Offset suffix must not shift the hour
        record.session_time_local = Some("2025-03-01T09:05:00-08:00".to_string());
        assert_eq!(record.local_hour(), Some(9));
    }

    #[test]
    fn test_local_hour_falls_back_to_utc() {
        let mut record = purchase("a", "A", "2025-03-02T05:15:00.000Z");
        assert_eq!(record.local_hour(), Some(5));

        record.session_time_local = Some(String::new());
        assert_eq!(record.local_hour(), Some(5));

        record.session_time_utc = "garbage".to_string();
        assert_eq!(record.local_hour(), None);
    }

    #[test]
    fn test_empty_strings_count_as_missing() {
        let mut record = purchase("a", "A", "2025-01-01T00:00:00Z");
        record.film.director = Some(String::new());
        record.film.year = Some("1999".to_string());

        assert_eq!(record.film.director(), None);
        assert_eq!(record.film.release_year(), Some(1999));

        record.film.year = Some("TBD".to_string());
        assert_eq!(record.film.release_year(), None);
    }

    #[test]
    fn test_ticket_counts() {
        let mut record = purchase("a", "A", "2025-01-01T00:00:00Z");
        record.line_items = vec![
            LineItem { name: "Adult".into(), quantity: 2, is_ticket: true },
            LineItem { name: "Season Pass Ticket".into(), quantity: 1, is_ticket: true },
            LineItem { name: "Popcorn".into(), quantity: 3, is_ticket: false },
        ];
        assert_eq!(record.ticket_counts(), (3, 1));

        record.is_subscription_purchase = true;
        assert_eq!(record.ticket_counts(), (3, 3));
    }

    #[test]
    fn test_ticket_counts_large_quantities() {
        let mut record = purchase("a", "A", "2025-01-01T00:00:00Z");
        record.line_items = vec![
            LineItem { name: "Adult".into(), quantity: u32::MAX, is_ticket: true },
            LineItem { name: "Season Pass Ticket".into(), quantity: 2, is_ticket: true },
        ];
        assert_eq!(record.ticket_counts(), (u64::from(u32::MAX) + 2, 2));
    }

    #[test]
    fn test_compute_idempotency_hash() {
        let mut record = purchase("a", "A", "2025-01-01T00:00:00Z");
        record.vista_transaction_id = Some(42);

        let hash1 = record.compute_idempotency_hash();
        let hash2 = record.clone().compute_idempotency_hash();
        assert_eq!(hash1, hash2, "Same purchase should produce same hash");
        assert_eq!(hash1.len(), 64, "SHA-256 hash should be 64 hex characters");

        record.vista_transaction_id = Some(43);
        assert_ne!(hash1, record.compute_idempotency_hash());
    }
}
