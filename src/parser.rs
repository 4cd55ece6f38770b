// 🏗️ Export Parser - purchase-history JSON → PurchaseRecord list
// Shape checks, multi-page loading and cross-page deduplication

use crate::error::IngestError;
use crate::purchase::PurchaseRecord;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// ============================================================================
// SHAPE CHECKS
// ============================================================================

/// Parse one export page
///
/// Only the envelope is checked: `data.purchaseHistory.purchases` must exist,
/// be an array and be non-empty. Each purchase must carry a showtime and a
/// film with slug and title; everything else is optional.
pub fn parse_export(json: &str) -> Result<Vec<PurchaseRecord>, IngestError> {
    let root: Value =
        serde_json::from_str(json).map_err(|source| IngestError::InvalidJson { source })?;

    parse_export_value(root)
}

/// Same as [`parse_export`] for an already-decoded document
pub fn parse_export_value(root: Value) -> Result<Vec<PurchaseRecord>, IngestError> {
    let purchases = root
        .get("data")
        .and_then(|d| d.get("purchaseHistory"))
        .and_then(|h| h.get("purchases"))
        .ok_or(IngestError::MissingPurchases)?;

    let items = purchases.as_array().ok_or(IngestError::PurchasesNotArray)?;
    if items.is_empty() {
        return Err(IngestError::NoPurchases);
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item.clone())
                .map_err(|source| IngestError::InvalidPurchase { index, source })
        })
        .collect()
}

// ============================================================================
// FILE LOADING
// ============================================================================

/// Load one export page from disk
pub fn load_export(path: &Path) -> Result<Vec<PurchaseRecord>, IngestError> {
    let json = fs::read_to_string(path).map_err(|source| IngestError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let purchases = parse_export(&json)?;
    debug!(path = %path.display(), purchases = purchases.len(), "loaded export page");
    Ok(purchases)
}

/// Load several export pages and merge them into one purchase list
pub fn load_exports(paths: &[PathBuf]) -> Result<Vec<PurchaseRecord>, IngestError> {
    let pages = paths
        .iter()
        .map(|p| load_export(p))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(merge_pages(pages))
}

// ============================================================================
// MULTI-PAGE MERGE
// ============================================================================

/// Concatenate export pages in order
///
/// A record whose idempotency hash already appeared on an earlier page is
/// dropped so overlapping exports do not double-count screenings. Repeats
/// within one page are kept, so a single page yields the same purchases here
/// as through [`parse_export`].
pub fn merge_pages(pages: Vec<Vec<PurchaseRecord>>) -> Vec<PurchaseRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(pages.iter().map(Vec::len).sum());
    let mut duplicates = 0usize;

    for page in pages {
        let mut page_hashes = HashSet::with_capacity(page.len());

        for purchase in page {
            let hash = purchase.compute_idempotency_hash();
            if seen.contains(&hash) {
                duplicates += 1;
                continue;
            }
            page_hashes.insert(hash);
            merged.push(purchase);
        }

        seen.extend(page_hashes);
    }

    if duplicates > 0 {
        warn!(duplicates, kept = merged.len(), "dropped purchases repeated from earlier pages");
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::purchase::fixtures::purchase;
    use std::io::Write;

    fn export_json(purchases: &str) -> String {
        format!(r#"{{ "data": {{ "purchaseHistory": {{ "purchases": {} }} }} }}"#, purchases)
    }

    const ONE_PURCHASE: &str = r#"[{
        "vistaTransactionId": 1,
        "sessionDateTimeUtc": "2025-02-01T20:00:00.000Z",
        "sessionDateTimeClt": "2025-02-01T14:00:00",
        "marketName": "Austin",
        "cinemaName": "Lamar",
        "isRefunded": false,
        "film": { "slug": "dune-2", "title": "Dune: Part Two", "runtimeMinutes": 166 },
        "lineItems": [],
        "isSubscriptionPurchase": false
    }]"#;

    #[test]
    fn test_parse_export_valid() {
        let purchases = parse_export(&export_json(ONE_PURCHASE)).unwrap();

        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].film.slug, "dune-2");
        assert_eq!(purchases[0].local_hour(), Some(14));
    }

    #[test]
    fn test_parse_export_invalid_json() {
        let err = parse_export("{ not json").unwrap_err();
        assert!(matches!(err, IngestError::InvalidJson { .. }));
        assert_eq!(err.user_message(), "Invalid data format");
    }

    #[test]
    fn test_parse_export_missing_shape() {
        let err = parse_export(r#"{ "data": { "other": [] } }"#).unwrap_err();
        assert!(matches!(err, IngestError::MissingPurchases));
    }

    #[test]
    fn test_parse_export_purchases_not_array() {
        let err = parse_export(&export_json(r#"{ "a": 1 }"#)).unwrap_err();
        assert!(matches!(err, IngestError::PurchasesNotArray));
    }

    #[test]
    fn test_parse_export_empty_purchases() {
        let err = parse_export(&export_json("[]")).unwrap_err();
        assert!(matches!(err, IngestError::NoPurchases));
        assert_eq!(err.user_message(), "No purchases found");
    }

    #[test]
    fn test_parse_export_purchase_missing_film() {
        let err = parse_export(&export_json(
            r#"[{ "sessionDateTimeUtc": "2025-01-01T00:00:00Z" }]"#,
        ))
        .unwrap_err();

        match err {
            IngestError::InvalidPurchase { index, .. } => assert_eq!(index, 0),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_merge_pages_drops_repeats() {
        let mut a = purchase("a", "A", "2025-01-01T20:00:00Z");
        a.vista_transaction_id = Some(1);
        let mut b = purchase("b", "B", "2025-01-02T20:00:00Z");
        b.vista_transaction_id = Some(2);
        let mut c = purchase("a", "A", "2025-01-03T20:00:00Z");
        c.vista_transaction_id = Some(3);

        let merged = merge_pages(vec![
            vec![a.clone(), b.clone()],
            vec![b.clone(), c.clone()],
        ]);

        let slugs: Vec<_> = merged.iter().map(|p| p.film.slug.as_str()).collect();
        assert_eq!(slugs, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_merge_pages_keeps_repeats_within_one_page() {
        let mut a = purchase("a", "A", "2025-01-01T20:00:00Z");
        a.vista_transaction_id = Some(1);

        let single = merge_pages(vec![vec![a.clone(), a.clone()]]);
        assert_eq!(single.len(), 2);

        // Same page shape as the HTTP path sees it
        let parsed = parse_export(&export_json(&format!(
            "[{}, {}]",
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&a).unwrap()
        )))
        .unwrap();
        assert_eq!(merge_pages(vec![parsed.clone()]).len(), parsed.len());

        // A later page repeating it is still dropped
        let merged = merge_pages(vec![vec![a.clone(), a.clone()], vec![a]]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_load_exports_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let page1 = dir.path().join("page1.json");
        let page2 = dir.path().join("page2.json");

        let mut f1 = fs::File::create(&page1).unwrap();
        f1.write_all(export_json(ONE_PURCHASE).as_bytes()).unwrap();
        let mut f2 = fs::File::create(&page2).unwrap();
        f2.write_all(export_json(ONE_PURCHASE).as_bytes()).unwrap();

        // Same purchase on both pages is counted once
        let purchases = load_exports(&[page1, page2]).unwrap();
        assert_eq!(purchases.len(), 1);
    }

    #[test]
    fn test_load_export_missing_file() {
        let err = load_export(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, IngestError::FileRead { .. }));
    }
}
