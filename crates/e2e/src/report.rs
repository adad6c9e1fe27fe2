//! Report emitters
//!
//! Both reports are rendered from ledger outcomes only and are never read
//! back: a spreadsheet with cover, summary, detail and raw sheets, and a
//! self-contained HTML dashboard.

use std::path::Path;

use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use tracing::info;

use anoncheck_common::{FinalStatus, LedgerSummary, ValidationOutcome};

use crate::error::E2eResult;

const TITLE: &str = "Anonymization validation report";

const OK_FILL: u32 = 0xC6EFCE;
const FAIL_FILL: u32 = 0xFFC7CE;
const HEADER_FILL: u32 = 0x1F4E78;

const DETAIL_HEADERS: [(&str, f64); 15] = [
    ("Identifier", 14.0),
    ("Real name", 32.0),
    ("Masked name", 32.0),
    ("Name in reference env", 32.0),
    ("Name in anonymized env", 32.0),
    ("Identifier matches (reference)", 14.0),
    ("Identifier matches (anonymized)", 14.0),
    ("Real name in reference", 14.0),
    ("Real name in anonymized", 14.0),
    ("Masked name in anonymized", 14.0),
    ("Status", 26.0),
    ("Status label", 40.0),
    ("Note", 50.0),
    ("Validated at", 22.0),
    ("Full name in source", 32.0),
];

const RAW_HEADERS: [&str; 14] = [
    "identifier",
    "realName",
    "maskedName",
    "nameReturnedByReferenceEnv",
    "nameReturnedByAnonymizedEnv",
    "identifierMatchesReference",
    "identifierMatchesAnonymized",
    "nameMatchesOriginalReference",
    "nameMatchesOriginalAnonymized",
    "nameMatchesMaskedAnonymized",
    "finalStatus",
    "note",
    "validatedAt",
    "referenceFullName",
];

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

fn validated_at(outcome: &ValidationOutcome) -> String {
    outcome
        .validated_at
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center)
        .set_text_wrap()
}

fn status_format(status: FinalStatus) -> Format {
    let fill = if status.is_ok() { OK_FILL } else { FAIL_FILL };
    Format::new()
        .set_bold()
        .set_background_color(Color::RGB(fill))
        .set_border(FormatBorder::Thin)
}

/// Write the spreadsheet report
pub fn write_spreadsheet(outcomes: &[ValidationOutcome], path: &Path) -> E2eResult<()> {
    let generated_at = Utc::now();
    let summary = LedgerSummary::from_outcomes(outcomes);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut workbook = Workbook::new();
    write_cover(workbook.add_worksheet(), &summary, generated_at)?;
    write_summary(workbook.add_worksheet(), &summary)?;
    write_detail(workbook.add_worksheet(), outcomes)?;
    write_raw(workbook.add_worksheet(), outcomes)?;
    workbook.save(path)?;

    info!(path = %path.display(), rows = outcomes.len(), "Spreadsheet report written");
    Ok(())
}

fn write_cover(sheet: &mut Worksheet, summary: &LedgerSummary, generated_at: DateTime<Utc>) -> E2eResult<()> {
    sheet.set_name("Cover")?;
    sheet.set_column_width(0, 28.0)?;
    sheet.set_column_width(1, 40.0)?;

    let title = Format::new().set_bold().set_font_size(16.0);
    let label = Format::new().set_bold();

    sheet.write_string_with_format(0, 0, TITLE, &title)?;
    sheet.write_string_with_format(2, 0, "Generated", &label)?;
    sheet.write_string(2, 1, generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string())?;
    sheet.write_string_with_format(3, 0, "Records processed", &label)?;
    sheet.write_number(3, 1, summary.total as f64)?;
    sheet.write_string_with_format(4, 0, "Tool version", &label)?;
    sheet.write_string(4, 1, anoncheck_common::VERSION)?;
    Ok(())
}

fn write_summary(sheet: &mut Worksheet, summary: &LedgerSummary) -> E2eResult<()> {
    sheet.set_name("Summary")?;
    sheet.set_column_width(0, 44.0)?;
    sheet.set_column_width(1, 12.0)?;

    let header = header_format();
    let percent = Format::new().set_num_format("0.0%");

    sheet.write_string_with_format(0, 0, "Metric", &header)?;
    sheet.write_string_with_format(0, 1, "Value", &header)?;
    sheet.write_string(1, 0, "Total")?;
    sheet.write_number(1, 1, summary.total as f64)?;
    sheet.write_string(2, 0, "OK")?;
    sheet.write_number(2, 1, summary.ok as f64)?;
    sheet.write_string(3, 0, "Failed")?;
    sheet.write_number(3, 1, summary.failed as f64)?;
    sheet.write_string(4, 0, "OK %")?;
    sheet.write_number_with_format(4, 1, summary.ok_percent() / 100.0, &percent)?;

    let mut row = 6u32;
    sheet.write_string_with_format(row, 0, "Status", &header)?;
    sheet.write_string_with_format(row, 1, "Count", &header)?;
    for status in FinalStatus::ALL {
        row += 1;
        sheet.write_string_with_format(row, 0, status.label(), &status_format(status))?;
        sheet.write_number(row, 1, summary.count(status) as f64)?;
    }
    Ok(())
}

fn write_detail(sheet: &mut Worksheet, outcomes: &[ValidationOutcome]) -> E2eResult<()> {
    sheet.set_name("Detail")?;
    let header = header_format();
    for (col, (title, width)) in DETAIL_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
        sheet.set_column_width(col as u16, *width)?;
    }
    sheet.set_freeze_panes(1, 0)?;

    for (i, outcome) in outcomes.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, &outcome.identifier)?;
        sheet.write_string(row, 1, &outcome.real_name)?;
        sheet.write_string(row, 2, &outcome.masked_name)?;
        sheet.write_string(row, 3, &outcome.name_returned_by_reference_env)?;
        sheet.write_string(row, 4, &outcome.name_returned_by_anonymized_env)?;
        sheet.write_string(row, 5, yes_no(outcome.identifier_matches_reference))?;
        sheet.write_string(row, 6, yes_no(outcome.identifier_matches_anonymized))?;
        sheet.write_string(row, 7, yes_no(outcome.name_matches_original_reference))?;
        sheet.write_string(row, 8, yes_no(outcome.name_matches_original_anonymized))?;
        sheet.write_string(row, 9, yes_no(outcome.name_matches_masked_anonymized))?;
        sheet.write_string_with_format(
            row,
            10,
            outcome.final_status.code(),
            &status_format(outcome.final_status),
        )?;
        sheet.write_string(row, 11, outcome.final_status.label())?;
        sheet.write_string(row, 12, outcome.note.as_deref().unwrap_or(""))?;
        sheet.write_string(row, 13, validated_at(outcome))?;
        sheet.write_string(row, 14, outcome.reference_full_name.as_deref().unwrap_or(""))?;
    }
    Ok(())
}

fn write_raw(sheet: &mut Worksheet, outcomes: &[ValidationOutcome]) -> E2eResult<()> {
    sheet.set_name("Raw")?;
    let bold = Format::new().set_bold();
    for (col, title) in RAW_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &bold)?;
    }

    for (i, outcome) in outcomes.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, &outcome.identifier)?;
        sheet.write_string(row, 1, &outcome.real_name)?;
        sheet.write_string(row, 2, &outcome.masked_name)?;
        sheet.write_string(row, 3, &outcome.name_returned_by_reference_env)?;
        sheet.write_string(row, 4, &outcome.name_returned_by_anonymized_env)?;
        sheet.write_boolean(row, 5, outcome.identifier_matches_reference)?;
        sheet.write_boolean(row, 6, outcome.identifier_matches_anonymized)?;
        sheet.write_boolean(row, 7, outcome.name_matches_original_reference)?;
        sheet.write_boolean(row, 8, outcome.name_matches_original_anonymized)?;
        sheet.write_boolean(row, 9, outcome.name_matches_masked_anonymized)?;
        sheet.write_string(row, 10, outcome.final_status.code())?;
        sheet.write_string(row, 11, outcome.note.as_deref().unwrap_or(""))?;
        sheet.write_string(row, 12, validated_at(outcome))?;
        sheet.write_string(row, 13, outcome.reference_full_name.as_deref().unwrap_or(""))?;
    }
    Ok(())
}

/// Write the HTML dashboard
pub fn write_dashboard(outcomes: &[ValidationOutcome], path: &Path) -> E2eResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, render_dashboard(outcomes, Utc::now()))?;
    info!(path = %path.display(), rows = outcomes.len(), "Dashboard written");
    Ok(())
}

/// Escape text for HTML element content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

pub fn render_dashboard(outcomes: &[ValidationOutcome], generated_at: DateTime<Utc>) -> String {
    let summary = LedgerSummary::from_outcomes(outcomes);
    let mut html = String::new();

    html.push_str(&format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: system-ui, sans-serif; margin: 2rem; color: #1f2933; }}
.cards {{ display: flex; gap: 1rem; margin-bottom: 1.5rem; }}
.card {{ padding: 1rem 1.5rem; border-radius: 8px; background: #f0f4f8; min-width: 8rem; }}
.card .value {{ font-size: 2rem; font-weight: 700; }}
.ok {{ background: #c6efce; }}
.fail {{ background: #ffc7ce; }}
table {{ border-collapse: collapse; width: 100%; font-size: 0.9rem; }}
th, td {{ border: 1px solid #d9e2ec; padding: 0.35rem 0.5rem; text-align: left; }}
th {{ background: #1f4e78; color: white; position: sticky; top: 0; }}
.filters {{ margin-bottom: 1rem; display: flex; gap: 1rem; }}
</style>
</head>
<body>
<h1>{title}</h1>
<p>Generated {generated}</p>
<div class="cards">
<div class="card"><div>Total</div><div class="value">{total}</div></div>
<div class="card ok"><div>OK</div><div class="value">{ok}</div></div>
<div class="card fail"><div>Failed</div><div class="value">{failed}</div></div>
<div class="card"><div>OK %</div><div class="value">{percent:.1}%</div></div>
</div>
<div class="filters">
<input id="search" type="search" placeholder="Filter by identifier or name">
<select id="status">
<option value="">All statuses</option>
"#,
        title = TITLE,
        generated = generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        total = summary.total,
        ok = summary.ok,
        failed = summary.failed,
        percent = summary.ok_percent(),
    ));

    for status in FinalStatus::ALL {
        html.push_str(&format!(
            "<option value=\"{}\">{} ({})</option>\n",
            status.code(),
            escape_html(status.label()),
            summary.count(status)
        ));
    }

    html.push_str(
        r#"</select>
</div>
<table id="outcomes">
<thead><tr><th>Identifier</th><th>Real name</th><th>Masked name</th><th>Reference env</th><th>Anonymized env</th><th>Status</th><th>Note</th></tr></thead>
<tbody>
"#,
    );

    for outcome in outcomes {
        let class = if outcome.is_ok() { "ok" } else { "fail" };
        html.push_str(&format!(
            "<tr data-status=\"{status}\"><td>{id}</td><td>{real}</td><td>{masked}</td><td>{reference}</td><td>{anonymized}</td><td class=\"{class}\" title=\"{label}\">{status}</td><td>{note}</td></tr>\n",
            status = outcome.final_status.code(),
            id = escape_html(&outcome.identifier),
            real = escape_html(&outcome.real_name),
            masked = escape_html(&outcome.masked_name),
            reference = escape_html(&outcome.name_returned_by_reference_env),
            anonymized = escape_html(&outcome.name_returned_by_anonymized_env),
            class = class,
            label = escape_html(outcome.final_status.label()),
            note = escape_html(outcome.note.as_deref().unwrap_or("")),
        ));
    }

    html.push_str(
        r#"</tbody>
</table>
<script>
(function () {
  var search = document.getElementById('search');
  var status = document.getElementById('status');
  var rows = document.querySelectorAll('#outcomes tbody tr');
  function apply() {
    var text = search.value.toLowerCase();
    rows.forEach(function (row) {
      var matchesText = !text || row.textContent.toLowerCase().indexOf(text) !== -1;
      var matchesStatus = !status.value || row.dataset.status === status.value;
      row.style.display = matchesText && matchesStatus ? '' : 'none';
    });
  }
  search.addEventListener('input', apply);
  status.addEventListener('change', apply);
})();
</script>
</body>
</html>
"#,
    );

    html
}
