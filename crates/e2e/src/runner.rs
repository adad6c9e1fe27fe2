//! Batch runner that drives the engine over a record source

use std::collections::HashSet;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use anoncheck_common::config::RunConfig;
use anoncheck_common::{LedgerSummary, ProgressLedger, Record, ValidationOutcome};

use crate::engine::ValidationEngine;
use crate::error::E2eResult;
use crate::gateway::SessionGateway;
use crate::source::SourceBatch;

/// Result of one batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Paired records supplied by the source
    pub input_records: usize,
    /// Records left after applying the limit
    pub considered: usize,
    /// Already `OK` in the ledger, not validated again
    pub skipped_ok: usize,
    pub validated: usize,
    /// Source rows without a masked counterpart
    pub unpaired: usize,
    pub recycles: usize,
    /// Outcomes produced by this run only
    pub run: LedgerSummary,
    /// Whole ledger after the run
    pub ledger: LedgerSummary,
}

impl BatchSummary {
    pub fn log(&self) {
        info!(
            run_id = %self.run_id,
            input = self.input_records,
            skipped = self.skipped_ok,
            validated = self.validated,
            "Batch finished in {} ms: {} OK, {} failed this run",
            self.duration_ms,
            self.run.ok,
            self.run.failed
        );
        if self.unpaired > 0 {
            warn!(unpaired = self.unpaired, "Records skipped for missing masked data");
        }
        self.ledger.log();
    }
}

pub struct BatchRunner<G: SessionGateway> {
    engine: ValidationEngine<G>,
    ledger: ProgressLedger,
    limit: Option<usize>,
    recycle_every: usize,
}

impl<G: SessionGateway> BatchRunner<G> {
    pub fn new(engine: ValidationEngine<G>, ledger: ProgressLedger, config: &RunConfig) -> Self {
        Self {
            engine,
            ledger,
            limit: config.limit,
            recycle_every: config.recycle_every.max(1),
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_recycle_every(mut self, every: usize) -> Self {
        self.recycle_every = every.max(1);
        self
    }

    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    pub fn engine(&self) -> &ValidationEngine<G> {
        &self.engine
    }

    pub fn into_parts(self) -> (ValidationEngine<G>, ProgressLedger) {
        (self.engine, self.ledger)
    }

    /// Validate every record not already `OK`, persisting each outcome.
    ///
    /// Fails only for conditions that make the rest of the run pointless:
    /// no session could be opened at all, or the ledger cannot be written.
    pub async fn run(&mut self, batch: &SourceBatch) -> E2eResult<BatchSummary> {
        let started_at = Utc::now();
        let start = Instant::now();
        let run_id = Uuid::new_v4();

        let considered = match self.limit {
            Some(limit) => &batch.records[..limit.min(batch.records.len())],
            None => &batch.records[..],
        };
        let skip: HashSet<String> = self.ledger.ok_identifiers();
        let pending: Vec<&Record> = considered
            .iter()
            .filter(|record| !skip.contains(&record.identifier))
            .collect();
        let skipped_ok = considered.len() - pending.len();

        info!(
            %run_id,
            input = batch.records.len(),
            considered = considered.len(),
            skipped = skipped_ok,
            pending = pending.len(),
            "Starting batch"
        );

        let mut outcomes: Vec<ValidationOutcome> = Vec::with_capacity(pending.len());
        let mut recycles = 0usize;
        let mut since_recycle = 0usize;

        for (index, record) in pending.iter().enumerate() {
            if since_recycle >= self.recycle_every {
                match self.engine.recycle().await {
                    Ok(()) => recycles += 1,
                    Err(e) => warn!(error = %e, "Context recycle failed, continuing"),
                }
                since_recycle = 0;
            }

            info!(
                identifier = %record.identifier,
                "Validating record {}/{}",
                index + 1,
                pending.len()
            );
            let outcome = self.engine.validate(record).await?;
            if let Err(e) = self.ledger.upsert(outcome.clone()) {
                error!(identifier = %record.identifier, error = %e, "Cannot persist outcome");
                return Err(e.into());
            }

            since_recycle += 1;
            outcomes.push(outcome);
        }

        let summary = BatchSummary {
            run_id,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            input_records: batch.records.len(),
            considered: considered.len(),
            skipped_ok,
            validated: outcomes.len(),
            unpaired: batch.unpaired.len(),
            recycles,
            run: LedgerSummary::from_outcomes(&outcomes),
            ledger: self.ledger.summary(),
        };
        summary.log();
        Ok(summary)
    }

    pub async fn close(&mut self) -> E2eResult<()> {
        self.engine.close().await
    }
}
