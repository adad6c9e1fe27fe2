//! Validation engine
//!
//! Per record: `INIT -> SEARCH_REFERENCE -> SEARCH_ANONYMIZED -> CLASSIFY`.
//! Each search leg logs into its own environment, runs one search and keeps
//! the first extracted candidate. Any error in a leg ends the record as
//! `ERROR_TECHNICAL` with the phase and error text as its note.

use tracing::{debug, error, info, instrument};

use anoncheck_common::classify::{final_status, mark_technical, record_anonymized, record_reference};
use anoncheck_common::{
    AppConfig, EnvironmentConfig, EnvironmentKind, LegEvidence, LongestTextExtractor, NameParts,
    Record, ResultExtractor, SearchMode, ValidationOutcome,
};

use crate::error::{E2eError, E2eResult};
use crate::gateway::{Session, SessionGateway};

/// Where a record is in its validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    SearchReference,
    SearchAnonymized,
    Classify,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::SearchReference => "search_reference",
            Phase::SearchAnonymized => "search_anonymized",
            Phase::Classify => "classify",
        }
    }

    fn environment(&self) -> Option<EnvironmentKind> {
        match self {
            Phase::SearchReference => Some(EnvironmentKind::Reference),
            Phase::SearchAnonymized => Some(EnvironmentKind::Anonymized),
            _ => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct ValidationEngine<G: SessionGateway> {
    gateway: G,
    extractor: Box<dyn ResultExtractor>,
    reference: EnvironmentConfig,
    anonymized: EnvironmentConfig,
    mode: SearchMode,
    sessions_opened: u64,
}

impl<G: SessionGateway> ValidationEngine<G> {
    pub fn new(gateway: G, config: &AppConfig) -> Self {
        Self {
            gateway,
            extractor: Box::new(LongestTextExtractor),
            reference: config.reference.clone(),
            anonymized: config.anonymized.clone(),
            mode: config.run.search_mode,
            sessions_opened: 0,
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn ResultExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_search_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn search_mode(&self) -> SearchMode {
        self.mode
    }

    /// Sessions successfully opened across the whole run
    pub fn sessions_opened(&self) -> u64 {
        self.sessions_opened
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    pub fn into_gateway(self) -> G {
        self.gateway
    }

    /// Validate one record.
    ///
    /// Returns `Err` only when the run cannot continue: credentials rejected
    /// before any session was ever opened. Every other failure is folded
    /// into an `ERROR_TECHNICAL` outcome.
    #[instrument(name = "validate", skip(self, record), fields(identifier = %record.identifier))]
    pub async fn validate(&mut self, record: &Record) -> E2eResult<ValidationOutcome> {
        let mut outcome = ValidationOutcome::pending(record);
        let mut phase = Phase::Init;
        debug!(phase = %phase, "Starting validation");

        match self.run_legs(record, &mut outcome, &mut phase).await {
            Ok(()) => {
                phase = Phase::Classify;
                outcome.final_status = final_status(&outcome);
            }
            Err(e) if e.is_authentication() && self.sessions_opened == 0 => {
                error!(phase = %phase, error = %e, "Cannot open any session");
                return Err(e);
            }
            Err(e) => {
                error!(phase = %phase, error = %e, "Technical failure");
                mark_technical(&mut outcome, format!("{}: {}", phase, e));
            }
        }

        info!(phase = %phase, status = %outcome.final_status, "Record validated");
        Ok(outcome.stamped())
    }

    async fn run_legs(
        &mut self,
        record: &Record,
        outcome: &mut ValidationOutcome,
        phase: &mut Phase,
    ) -> E2eResult<()> {
        *phase = Phase::SearchReference;
        let leg = self.search_leg(record, &record.real, *phase).await?;
        record_reference(outcome, leg);

        // The anonymized deployment indexes people under their masked identity.
        *phase = Phase::SearchAnonymized;
        let leg = self.search_leg(record, &record.masked, *phase).await?;
        record_anonymized(outcome, leg);

        Ok(())
    }

    async fn search_leg(
        &mut self,
        record: &Record,
        name: &NameParts,
        phase: Phase,
    ) -> E2eResult<LegEvidence> {
        let environment = phase
            .environment()
            .ok_or_else(|| E2eError::Driver(format!("no environment for phase {}", phase)))?;
        let session = self.login(environment).await?;

        let table = match self.mode {
            SearchMode::Name => self.gateway.search_by_name(&session, name).await?,
            SearchMode::Identifier => {
                self.gateway
                    .search_by_identifier(&session, &record.identifier)
                    .await?
            }
        };

        let candidates = self.extractor.extract(&table);
        let leg = LegEvidence::from_candidate(record, candidates.first());
        info!(
            phase = %phase,
            candidates = candidates.len(),
            returned = %leg.returned_name,
            identifier_matches = leg.identifier_matches,
            "Search finished"
        );
        Ok(leg)
    }

    async fn login(&mut self, environment: EnvironmentKind) -> E2eResult<Session> {
        let config = match environment {
            EnvironmentKind::Reference => &self.reference,
            EnvironmentKind::Anonymized => &self.anonymized,
        };
        let session = self.gateway.login(environment, config).await?;
        self.sessions_opened += 1;
        Ok(session)
    }

    pub async fn recycle(&mut self) -> E2eResult<()> {
        self.gateway.recycle().await
    }

    pub async fn close(&mut self) -> E2eResult<()> {
        self.gateway.close().await
    }
}
