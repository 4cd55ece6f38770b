//! Error types for export ingestion
//!
//! Everything here is a rejected submission. The HTTP layer reports these to
//! the user as "invalid data" and logs the detail.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid JSON format: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid data format: missing data.purchaseHistory.purchases")]
    MissingPurchases,

    #[error("Invalid data format: purchases must be an array")]
    PurchasesNotArray,

    #[error("Invalid purchase at index {index}: {source}")]
    InvalidPurchase {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("No purchases found")]
    NoPurchases,

    #[error("No valid purchases for {target_year} (all refunded or outside the year)")]
    NoValidPurchases { target_year: i32 },

    #[error("Failed to read export file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    /// Short message safe to show to the submitter
    pub fn user_message(&self) -> &'static str {
        match self {
            IngestError::NoPurchases => "No purchases found",
            IngestError::NoValidPurchases { .. } => "No valid purchases",
            IngestError::FileRead { .. } => "Could not read export",
            _ => "Invalid data format",
        }
    }
}
