//! AnonCheck browser-driven validation
//!
//! This crate drives the customer-lookup application in both deployments
//! and turns what it shows into validation outcomes:
//! - Talks to a long-lived Playwright driver over newline-delimited JSON
//! - Retries connectivity loss with a fixed backoff, reloading the page
//! - Validates records one at a time, recycling the browser context
//! - Persists every outcome to the progress ledger as soon as it is known
//! - Renders the ledger to a spreadsheet and an HTML dashboard
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     BatchRunner                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RecordSource ──► SourceBatch { records, unpaired }         │
//! │  ProgressLedger ──► skip-set of OK identifiers              │
//! │  for each record:                                           │
//! │    ValidationEngine::validate(record)                       │
//! │      ├── SEARCH_REFERENCE  (SessionGateway, real name)      │
//! │      ├── SEARCH_ANONYMIZED (SessionGateway, masked name)    │
//! │      └── CLASSIFY          (ResultExtractor, normalize)     │
//! │    ProgressLedger::upsert(outcome)                          │
//! │    every N validations: SessionGateway::recycle()           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  report::write_spreadsheet / report::write_dashboard        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod engine;
pub mod error;
pub mod gateway;
pub mod playwright;
pub mod report;
pub mod retry;
pub mod runner;
pub mod source;

pub use engine::{Phase, ValidationEngine};
pub use error::{E2eError, E2eResult};
pub use gateway::{Session, SessionGateway, SessionTracker};
pub use playwright::{Browser, PlaywrightConfig, PlaywrightGateway};
pub use retry::{Recoverable, RetryPolicy};
pub use runner::{BatchRunner, BatchSummary};
pub use source::{RecordSource, SourceBatch};
