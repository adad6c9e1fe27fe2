//! Run a validation batch

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use anoncheck_common::{AppConfig, ProgressLedger, SearchMode};
use anoncheck_e2e::{
    BatchRunner, BatchSummary, PlaywrightConfig, PlaywrightGateway, RecordSource, ValidationEngine,
};

use crate::commands::report::write_reports;
use crate::commands::status::StatusCountDisplay;
use crate::output::{print_info, print_item, print_list, print_warning, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct RunArgs {
    /// Only consider the first N source records
    #[arg(long, conflicts_with = "all")]
    pub limit: Option<usize>,

    /// Ignore any configured record limit
    #[arg(long)]
    pub all: bool,

    /// Search flow: name or identifier
    #[arg(long)]
    pub search_mode: Option<SearchMode>,

    /// Recreate the browser context after this many validations
    #[arg(long)]
    pub recycle_every: Option<usize>,

    /// Skip writing the spreadsheet and dashboard
    #[arg(long)]
    pub no_reports: bool,
}

#[derive(Serialize)]
struct RunDisplay<'a> {
    #[serde(flatten)]
    summary: &'a BatchSummary,
}

impl TableDisplay for RunDisplay<'_> {
    fn headers() -> Vec<&'static str> {
        vec!["Input", "Skipped (OK)", "Validated", "OK", "Failed", "Unpaired", "Duration"]
    }

    fn row(&self) -> Vec<String> {
        let s = self.summary;
        vec![
            s.input_records.to_string(),
            s.skipped_ok.to_string(),
            s.validated.to_string(),
            s.run.ok.to_string(),
            s.run.failed.to_string(),
            s.unpaired.to_string(),
            format!("{:.1}s", s.duration_ms as f64 / 1000.0),
        ]
    }
}

/// Apply command-line overrides on top of the loaded configuration
fn apply_args(config: &mut AppConfig, args: &RunArgs) {
    if args.all {
        config.run.limit = None;
    } else if let Some(limit) = args.limit {
        config.run.limit = Some(limit);
    }
    if let Some(mode) = args.search_mode {
        config.run.search_mode = mode;
    }
    if let Some(every) = args.recycle_every {
        config.run.recycle_every = every;
    }
}

pub async fn execute(args: RunArgs, mut config: AppConfig, format: OutputFormat) -> Result<()> {
    apply_args(&mut config, &args);
    config.validate().context("invalid configuration")?;

    let batch = RecordSource::new(config.source.clone())
        .load()
        .context("cannot read the record source")?;
    if !batch.unpaired.is_empty() {
        print_warning(&format!(
            "{} record(s) have no masked counterpart and will not be validated",
            batch.unpaired.len()
        ));
    }

    let ledger = ProgressLedger::open(&config.run.ledger_path)
        .with_context(|| format!("cannot open ledger {}", config.run.ledger_path.display()))?;

    if batch.is_empty() {
        print_info("No records to validate");
        return Ok(());
    }

    let gateway = PlaywrightGateway::launch(PlaywrightConfig::from_app(&config)?)
        .await
        .context("cannot start the browser driver")?;
    let engine = ValidationEngine::new(gateway, &config);
    let mut runner = BatchRunner::new(engine, ledger, &config.run);

    let result = runner.run(&batch).await;
    if let Err(e) = runner.close().await {
        tracing::warn!(error = %e, "Browser driver did not shut down cleanly");
    }
    let summary = result.context("batch aborted")?;

    print_item(&RunDisplay { summary: &summary }, format);
    print_list(&StatusCountDisplay::all(&summary.ledger), format);

    if !args.no_reports {
        write_reports(
            runner.ledger().outcomes(),
            &config.run.report_path,
            &config.run.dashboard_path,
        )?;
    }

    if summary.run.failed > 0 {
        print_warning(&format!(
            "{} record(s) failed validation this run; see the report for details",
            summary.run.failed
        ));
    }
    Ok(())
}
