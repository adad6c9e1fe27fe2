//! Session gateway
//!
//! The engine never touches a browser directly. It asks a [`SessionGateway`]
//! for an authenticated session per environment and issues searches through
//! it. Implementations own connectivity retries; anything they return as an
//! error is an application failure for the record at hand.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use anoncheck_common::{EnvironmentConfig, EnvironmentKind, NameParts, RawResultTable};

use crate::error::{E2eError, E2eResult};

/// Proof of a successful login into one environment.
///
/// Only one environment is logged in at a time. A session is valid until the
/// next login or context recycle, whichever comes first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub environment: EnvironmentKind,
    /// Login counter at the time the session was opened
    pub generation: u64,
    pub opened_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionGateway: Send {
    /// Authenticate into `environment`, replacing any active session
    async fn login(
        &mut self,
        environment: EnvironmentKind,
        config: &EnvironmentConfig,
    ) -> E2eResult<Session>;

    async fn search_by_identifier(
        &mut self,
        session: &Session,
        identifier: &str,
    ) -> E2eResult<RawResultTable>;

    /// Search by name parts; a "no results" page is `RawResultTable::not_found()`
    async fn search_by_name(
        &mut self,
        session: &Session,
        name: &NameParts,
    ) -> E2eResult<RawResultTable>;

    /// Tear down and recreate the browser context, invalidating sessions
    async fn recycle(&mut self) -> E2eResult<()>;

    async fn close(&mut self) -> E2eResult<()>;
}

/// Bookkeeping for which session is currently live
#[derive(Debug, Default)]
pub struct SessionTracker {
    generation: u64,
    active: Option<Session>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a session for `environment`; any earlier session becomes stale
    pub fn open(&mut self, environment: EnvironmentKind) -> Session {
        self.generation += 1;
        let session = Session {
            environment,
            generation: self.generation,
            opened_at: Utc::now(),
        };
        self.active = Some(session.clone());
        session
    }

    /// Fail with `StaleSession` unless `session` is the live one
    pub fn check(&self, session: &Session) -> E2eResult<()> {
        match &self.active {
            Some(active)
                if active.generation == session.generation
                    && active.environment == session.environment =>
            {
                Ok(())
            }
            Some(active) => Err(E2eError::StaleSession {
                session: session.environment,
                active: format!("{} (generation {})", active.environment, active.generation),
            }),
            None => Err(E2eError::StaleSession {
                session: session.environment,
                active: "no session".to_string(),
            }),
        }
    }

    pub fn invalidate(&mut self) {
        self.active = None;
    }

    pub fn active(&self) -> Option<&Session> {
        self.active.as_ref()
    }

    /// Number of sessions opened so far
    pub fn logins(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_session_is_live() {
        let mut tracker = SessionTracker::new();
        let session = tracker.open(EnvironmentKind::Reference);
        assert!(tracker.check(&session).is_ok());
        assert_eq!(tracker.logins(), 1);
    }

    #[test]
    fn test_new_login_makes_previous_stale() {
        let mut tracker = SessionTracker::new();
        let reference = tracker.open(EnvironmentKind::Reference);
        let anonymized = tracker.open(EnvironmentKind::Anonymized);

        assert!(matches!(
            tracker.check(&reference),
            Err(E2eError::StaleSession { session: EnvironmentKind::Reference, .. })
        ));
        assert!(tracker.check(&anonymized).is_ok());
    }

    #[test]
    fn test_invalidate_rejects_everything() {
        let mut tracker = SessionTracker::new();
        let session = tracker.open(EnvironmentKind::Anonymized);
        tracker.invalidate();

        assert!(tracker.check(&session).is_err());
        assert!(tracker.active().is_none());
    }
}
