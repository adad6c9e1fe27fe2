//! AnonCheck Common Library
//!
//! Core of the cross-environment anonymization validator: the data model,
//! name normalization, identifier handling, result-row disambiguation,
//! classification rules and the persisted progress ledger.

pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod identifier;
pub mod ledger;
pub mod normalize;
pub mod types;

// Re-export commonly used types
pub use classify::{classify, LegEvidence};
pub use config::{AppConfig, EnvironmentConfig, SearchMode};
pub use error::{Error, Result};
pub use extract::{LongestTextExtractor, RawResultTable, ResultExtractor};
pub use identifier::{
    check_identifier, clean_identifier, compute_check_digit, validate_identifier, IdentifierCheck,
};
pub use ledger::{LedgerSummary, ProgressLedger};
pub use normalize::normalize;
pub use types::*;

/// AnonCheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
