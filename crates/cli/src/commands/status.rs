//! Ledger status

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::Color;
use serde::Serialize;

use anoncheck_common::{AppConfig, FinalStatus, LedgerSummary, ProgressLedger, ValidationOutcome};

use crate::output::{print_info, print_item, print_list, status_color, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct StatusArgs {
    /// Ledger to inspect (defaults to run.ledger_path)
    #[arg(long)]
    pub ledger: Option<PathBuf>,

    /// Also list OK outcomes
    #[arg(long)]
    pub all: bool,
}

/// Totals line
#[derive(Serialize)]
pub struct TotalsDisplay {
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
    pub ok_percent: f64,
}

impl From<&LedgerSummary> for TotalsDisplay {
    fn from(summary: &LedgerSummary) -> Self {
        Self {
            total: summary.total,
            ok: summary.ok,
            failed: summary.failed,
            ok_percent: summary.ok_percent(),
        }
    }
}

impl TableDisplay for TotalsDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Total", "OK", "Failed", "OK %"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.total.to_string(),
            self.ok.to_string(),
            self.failed.to_string(),
            format!("{:.1}%", self.ok_percent),
        ]
    }

    fn colors(&self) -> Vec<Option<Color>> {
        vec![None, Some(Color::Green), Some(Color::Red), None]
    }
}

#[derive(Serialize)]
pub struct StatusCountDisplay {
    pub status: FinalStatus,
    pub label: &'static str,
    pub count: usize,
}

impl StatusCountDisplay {
    pub fn all(summary: &LedgerSummary) -> Vec<Self> {
        FinalStatus::ALL
            .iter()
            .map(|&status| Self {
                status,
                label: status.label(),
                count: summary.count(status),
            })
            .collect()
    }
}

impl TableDisplay for StatusCountDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Status", "Meaning", "Count"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.status.code().to_string(),
            self.label.to_string(),
            self.count.to_string(),
        ]
    }

    fn colors(&self) -> Vec<Option<Color>> {
        vec![Some(status_color(self.status))]
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeDisplay {
    pub identifier: String,
    pub status: FinalStatus,
    pub reference_name: String,
    pub anonymized_name: String,
    pub note: String,
}

impl From<&ValidationOutcome> for OutcomeDisplay {
    fn from(outcome: &ValidationOutcome) -> Self {
        Self {
            identifier: outcome.identifier.clone(),
            status: outcome.final_status,
            reference_name: outcome.name_returned_by_reference_env.clone(),
            anonymized_name: outcome.name_returned_by_anonymized_env.clone(),
            note: outcome.note.clone().unwrap_or_default(),
        }
    }
}

impl TableDisplay for OutcomeDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Identifier", "Status", "Reference env", "Anonymized env", "Note"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.identifier.clone(),
            self.status.code().to_string(),
            self.reference_name.clone(),
            self.anonymized_name.clone(),
            self.note.clone(),
        ]
    }

    fn colors(&self) -> Vec<Option<Color>> {
        vec![None, Some(status_color(self.status))]
    }
}

pub async fn execute(args: StatusArgs, config: &AppConfig, format: OutputFormat) -> Result<()> {
    let path = args.ledger.unwrap_or_else(|| config.run.ledger_path.clone());
    let outcomes = ProgressLedger::load_existing(&path)
        .with_context(|| format!("reading ledger {}", path.display()))?;
    let summary = LedgerSummary::from_outcomes(&outcomes);

    if outcomes.is_empty() {
        print_info(&format!("No outcomes recorded in {}", path.display()));
        return Ok(());
    }

    print_item(&TotalsDisplay::from(&summary), format);
    print_list(&StatusCountDisplay::all(&summary), format);

    let listed: Vec<OutcomeDisplay> = outcomes
        .iter()
        .filter(|outcome| args.all || !outcome.is_ok())
        .map(OutcomeDisplay::from)
        .collect();
    if !listed.is_empty() {
        print_list(&listed, format);
    }

    Ok(())
}
