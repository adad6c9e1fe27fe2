//! Regenerate reports from a ledger

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use anoncheck_common::{AppConfig, ProgressLedger};
use anoncheck_e2e::report;

use crate::output::{print_success, print_warning};

#[derive(Args)]
pub struct ReportArgs {
    /// Ledger to read (defaults to run.ledger_path)
    #[arg(long)]
    pub ledger: Option<PathBuf>,

    /// Spreadsheet output (defaults to run.report_path)
    #[arg(long)]
    pub xlsx: Option<PathBuf>,

    /// Dashboard output (defaults to run.dashboard_path)
    #[arg(long)]
    pub html: Option<PathBuf>,
}

pub async fn execute(args: ReportArgs, config: &AppConfig) -> Result<()> {
    let ledger = args.ledger.unwrap_or_else(|| config.run.ledger_path.clone());
    let xlsx = args.xlsx.unwrap_or_else(|| config.run.report_path.clone());
    let html = args.html.unwrap_or_else(|| config.run.dashboard_path.clone());

    let outcomes = ProgressLedger::load_existing(&ledger)
        .with_context(|| format!("reading ledger {}", ledger.display()))?;
    if outcomes.is_empty() {
        print_warning(&format!("{} has no outcomes; reports will be empty", ledger.display()));
    }

    write_reports(&outcomes, &xlsx, &html)
}

pub fn write_reports(
    outcomes: &[anoncheck_common::ValidationOutcome],
    xlsx: &std::path::Path,
    html: &std::path::Path,
) -> Result<()> {
    report::write_spreadsheet(outcomes, xlsx)
        .with_context(|| format!("writing {}", xlsx.display()))?;
    print_success(&format!("Spreadsheet report: {}", xlsx.display()));

    report::write_dashboard(outcomes, html)
        .with_context(|| format!("writing {}", html.display()))?;
    print_success(&format!("Dashboard: {}", html.display()));
    Ok(())
}
