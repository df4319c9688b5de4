#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `DuckDB` storage for extracted semester results.
//!
//! One database file holds every semester. Students are keyed by roll
//! number and semester; their subjects are keyed additionally by subject
//! code, so merging the same sheet twice is a no-op.

pub mod paths;
pub mod results_db;

use marksheet_extract::store::StoreError;

pub use results_db::DuckDbStore;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// I/O error while preparing the data directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Conversion { .. } => Self::Constraint(e.to_string()),
            DbError::DuckDb(_) | DbError::Io(_) => Self::Unavailable(e.to_string()),
        }
    }
}
