//! Record source backed by a two-sheet workbook
//!
//! One sheet holds the real identities, the other the masked identities for
//! the same people. Rows are paired by their cleaned identifier.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek};

use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use serde::Serialize;
use tracing::{debug, info, warn};

use anoncheck_common::config::SourceConfig;
use anoncheck_common::{check_identifier, clean_identifier, IdentifierCheck, NameParts, Record};

use crate::error::{E2eError, E2eResult};

/// Identifier cells that mark a repeated header row
const HEADER_TOKENS: [&str; 3] = ["BUCPE_RUT", "COD_MARCA", "PNT_RUT"];

/// Records ready to validate plus the identifiers that could not be paired
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
    pub records: Vec<Record>,
    /// Present in the original sheet but missing from the masked one
    pub unpaired: Vec<String>,
}

impl SourceBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One usable row of either sheet
#[derive(Debug, Clone, PartialEq, Eq)]
struct SheetRow {
    identifier: String,
    name: NameParts,
    full_name: Option<String>,
}

/// Check-digit analysis of one sheet
#[derive(Debug, Clone, Serialize)]
pub struct SheetCheck {
    pub sheet: String,
    pub total: usize,
    pub valid: usize,
    pub invalid: Vec<IdentifierCheck>,
}

pub struct RecordSource {
    config: SourceConfig,
}

impl RecordSource {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    /// Read both sheets and pair them.
    ///
    /// A missing workbook or sheet is an error; rows that cannot be paired
    /// are only reported.
    pub fn load(&self) -> E2eResult<SourceBatch> {
        let mut workbook = self.open()?;
        let originals = self.read_sheet(&mut workbook, &self.config.original_sheet)?;
        let masked = self.read_sheet(&mut workbook, &self.config.masked_sheet)?;

        let batch = pair(originals, masked);
        info!(
            workbook = %self.config.workbook.display(),
            records = batch.records.len(),
            unpaired = batch.unpaired.len(),
            "Loaded record source"
        );
        Ok(batch)
    }

    /// Validate the check character of every identifier in both sheets
    pub fn check_identifiers(&self) -> E2eResult<Vec<SheetCheck>> {
        let mut workbook = self.open()?;
        let mut checks = Vec::new();

        for sheet in [&self.config.original_sheet, &self.config.masked_sheet] {
            let rows = self.read_sheet(&mut workbook, sheet)?;
            let mut check = SheetCheck {
                sheet: sheet.clone(),
                total: rows.len(),
                valid: 0,
                invalid: Vec::new(),
            };
            for row in &rows {
                match check_identifier(&row.identifier) {
                    Some(result) if result.is_valid() => check.valid += 1,
                    Some(result) => check.invalid.push(result),
                    None => {}
                }
            }
            checks.push(check);
        }

        Ok(checks)
    }

    fn open(&self) -> E2eResult<Sheets<std::io::BufReader<std::fs::File>>> {
        let path = &self.config.workbook;
        if !path.exists() {
            return Err(E2eError::Source(format!("workbook not found: {}", path.display())));
        }
        open_workbook_auto(path)
            .map_err(|e| E2eError::Source(format!("Failed to open {}: {}", path.display(), e)))
    }

    fn read_sheet<RS: Read + Seek>(
        &self,
        workbook: &mut Sheets<RS>,
        sheet: &str,
    ) -> E2eResult<Vec<SheetRow>> {
        if !workbook.sheet_names().iter().any(|name| name == sheet) {
            return Err(E2eError::Source(format!(
                "sheet '{}' not found in {}",
                sheet,
                self.config.workbook.display()
            )));
        }

        let range = workbook
            .worksheet_range(sheet)
            .map_err(|e| E2eError::Source(format!("Failed to read sheet '{}': {}", sheet, e)))?;
        let rows = rows_from_range(&range, &self.config);
        debug!(sheet, rows = rows.len(), "Read sheet");
        Ok(rows)
    }
}

fn rows_from_range(range: &Range<Data>, config: &SourceConfig) -> Vec<SheetRow> {
    let mut rows = Vec::new();

    for (offset, row) in range.rows().enumerate().skip(config.header_rows) {
        let base = cell_text(row.get(config.identifier_col));
        if base.is_empty() || HEADER_TOKENS.contains(&base.to_uppercase().as_str()) {
            continue;
        }

        let check_digit = cell_text(row.get(config.check_digit_col));
        let identifier = clean_identifier(&format!("{}{}", base, check_digit));
        if identifier.is_empty() {
            debug!(row = offset + 1, "Row without a usable identifier");
            continue;
        }

        let full_name = config
            .full_name_col
            .map(|col| cell_text(row.get(col)))
            .filter(|text| !text.is_empty());

        rows.push(SheetRow {
            identifier,
            name: NameParts::new(
                cell_text(row.get(config.given_col)),
                cell_text(row.get(config.paternal_col)),
                cell_text(row.get(config.maternal_col)),
            ),
            full_name,
        });
    }

    rows
}

/// Spreadsheet cell as trimmed text; whole numbers lose their decimal part
fn cell_text(cell: Option<&Data>) -> String {
    match cell {
        None | Some(Data::Empty) => String::new(),
        Some(Data::String(s)) => s.trim().to_string(),
        Some(Data::Float(n)) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        Some(Data::Int(n)) => n.to_string(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

fn pair(originals: Vec<SheetRow>, masked: Vec<SheetRow>) -> SourceBatch {
    let mut masked_by_id: HashMap<String, SheetRow> = HashMap::with_capacity(masked.len());
    for row in masked {
        if masked_by_id.contains_key(&row.identifier) {
            warn!(identifier = %row.identifier, "Duplicate identifier in masked sheet, keeping the first");
            continue;
        }
        masked_by_id.insert(row.identifier.clone(), row);
    }

    let mut batch = SourceBatch::default();
    let mut seen = HashSet::new();
    for row in originals {
        if !seen.insert(row.identifier.clone()) {
            warn!(identifier = %row.identifier, "Duplicate identifier in original sheet, keeping the first");
            continue;
        }

        match masked_by_id.remove(&row.identifier) {
            Some(masked) => {
                if !anoncheck_common::validate_identifier(&row.identifier) {
                    warn!(identifier = %row.identifier, "Invalid check digit, validating anyway");
                }
                batch.records.push(Record {
                    identifier: row.identifier,
                    real: row.name,
                    masked: masked.name,
                    reference_full_name: row.full_name,
                });
            }
            None => {
                warn!(identifier = %row.identifier, "No masked counterpart, record skipped");
                batch.unpaired.push(row.identifier);
            }
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use tempfile::TempDir;

    type Row<'a> = (&'a str, &'a str, &'a str, &'a str, &'a str);

    /// Workbook in the default layout: identifier base in column C
    fn write_workbook(path: &std::path::Path, originals: &[Row], masked: &[Row]) {
        let mut workbook = Workbook::new();
        for (name, rows) in [("Registros Originales", originals), ("Registros enmascarados", masked)] {
            let sheet = workbook.add_worksheet();
            sheet.set_name(name).unwrap();
            for (col, header) in ["A", "B", "BUCPE_RUT", "DV", "PATERNO", "MATERNO", "NOMBRES", "NOMBRE"]
                .iter()
                .enumerate()
            {
                sheet.write_string(0, col as u16, *header).unwrap();
            }
            for (i, (base, dv, paternal, maternal, given)) in rows.iter().enumerate() {
                let r = i as u32 + 1;
                match base.parse::<f64>() {
                    Ok(n) => sheet.write_number(r, 2, n).unwrap(),
                    Err(_) => sheet.write_string(r, 2, *base).unwrap(),
                };
                sheet.write_string(r, 3, *dv).unwrap();
                sheet.write_string(r, 4, *paternal).unwrap();
                sheet.write_string(r, 5, *maternal).unwrap();
                sheet.write_string(r, 6, *given).unwrap();
                sheet
                    .write_string(r, 7, format!("{} {} {}", given, paternal, maternal))
                    .unwrap();
            }
        }
        workbook.save(path).unwrap();
    }

    fn source(tmp: &TempDir) -> RecordSource {
        RecordSource::new(SourceConfig {
            workbook: tmp.path().join("records.xlsx"),
            ..Default::default()
        })
    }

    #[test]
    fn test_pairs_by_identifier() {
        let tmp = TempDir::new().unwrap();
        write_workbook(
            &tmp.path().join("records.xlsx"),
            &[
                ("12345678", "5", "PEREZ", "SOTO", "JUAN"),
                ("11111111", "1", "ROJAS", "DIAZ", "MARIA"),
            ],
            &[
                ("11111111", "1", "R.", "D.", "M."),
                ("12345678", "5", "P.", "S.", "J."),
            ],
        );

        let batch = source(&tmp).load().unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch.unpaired.is_empty());

        let first = &batch.records[0];
        assert_eq!(first.identifier, "123456785");
        assert_eq!(first.real_full_name(), "JUAN PEREZ SOTO");
        assert_eq!(first.masked_full_name(), "J. P. S.");
        assert_eq!(first.reference_full_name.as_deref(), Some("JUAN PEREZ SOTO"));
    }

    #[test]
    fn test_unpaired_and_duplicates() {
        let tmp = TempDir::new().unwrap();
        write_workbook(
            &tmp.path().join("records.xlsx"),
            &[
                ("12345678", "5", "PEREZ", "SOTO", "JUAN"),
                ("12345678", "5", "OTRO", "OTRO", "OTRO"),
                ("10000013", "K", "LOPEZ", "VERA", "ANA"),
                ("PNT_RUT", "", "", "", ""),
            ],
            &[("12345678", "5", "P.", "S.", "J.")],
        );

        let batch = source(&tmp).load().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.records[0].real.paternal_surname, "PEREZ");
        assert_eq!(batch.unpaired, vec!["10000013K".to_string()]);
    }

    #[test]
    fn test_missing_workbook_or_sheet_is_fatal() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(source(&tmp).load(), Err(E2eError::Source(_))));

        write_workbook(&tmp.path().join("records.xlsx"), &[], &[]);
        let mut config = SourceConfig {
            workbook: tmp.path().join("records.xlsx"),
            ..Default::default()
        };
        config.masked_sheet = "Nope".to_string();
        let err = RecordSource::new(config).load().unwrap_err();
        assert!(err.to_string().contains("Nope"));
    }

    #[test]
    fn test_check_identifiers_reports_invalid() {
        let tmp = TempDir::new().unwrap();
        write_workbook(
            &tmp.path().join("records.xlsx"),
            &[
                ("12345678", "5", "PEREZ", "SOTO", "JUAN"),
                ("12345678", "9", "PEREZ", "SOTO", "JUAN"),
            ],
            &[("10000013", "k", "L.", "V.", "A.")],
        );

        let checks = source(&tmp).check_identifiers().unwrap();
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].total, 2);
        assert_eq!(checks[0].valid, 1);
        assert_eq!(checks[0].invalid[0].expected, Some('5'));
        assert_eq!(checks[1].valid, 1);
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(Some(&Data::Float(12345678.0))), "12345678");
        assert_eq!(cell_text(Some(&Data::String("  ana ".to_string()))), "ana");
        assert_eq!(cell_text(None), "");
    }
}
