// ⚙️ Configuration - runtime settings shared by the CLI and the server
// Binaries fill this from flags/env; library code only receives it

use std::path::PathBuf;

/// Calendar year analysed when nothing else is configured
pub const DEFAULT_TARGET_YEAR: i32 = 2025;

pub const DEFAULT_DATABASE_PATH: &str = "recap.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecapConfig {
    /// SQLite file holding sessions, screenings and film aggregates
    pub database_path: PathBuf,

    /// Only showtimes in this UTC calendar year are analysed
    pub target_year: i32,

    /// Listen address for the HTTP server
    pub bind_addr: String,
}

impl Default for RecapConfig {
    fn default() -> Self {
        RecapConfig {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            target_year: DEFAULT_TARGET_YEAR,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl RecapConfig {
    /// Builder pattern: override the database path
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Builder pattern: override the target year
    pub fn with_target_year(mut self, year: i32) -> Self {
        self.target_year = year;
        self
    }

    /// Builder pattern: override the listen address
    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }
}
