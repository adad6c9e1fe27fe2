//! Error types for browser-driven validation

use thiserror::Error;

use anoncheck_common::EnvironmentKind;

#[derive(Error, Debug)]
pub enum E2eError {
    /// Network offline or page needs a reload; retried, never terminal
    #[error("Connectivity lost: {0}")]
    Connectivity(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Unexpected login prompt in {0} environment")]
    UnexpectedLogin(EnvironmentKind),

    #[error("Authentication rejected by {environment} after {attempts} attempt(s): {reason}")]
    Authentication {
        environment: EnvironmentKind,
        attempts: u32,
        reason: String,
    },

    #[error("Session for {session} environment used while {active} is active")]
    StaleSession {
        session: EnvironmentKind,
        active: String,
    },

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("Gave up on {operation} after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last: String,
    },

    #[error("Record source error: {0}")]
    Source(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error(transparent)]
    Common(#[from] anoncheck_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl E2eError {
    /// Transient connectivity failure that the gateway retries
    pub fn is_connectivity(&self) -> bool {
        matches!(self, E2eError::Connectivity(_))
    }

    /// Failures that mean no session can be opened at all
    pub fn is_authentication(&self) -> bool {
        matches!(self, E2eError::Authentication { .. })
    }
}

impl From<calamine::Error> for E2eError {
    fn from(e: calamine::Error) -> Self {
        E2eError::Source(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for E2eError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        E2eError::Report(e.to_string())
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
