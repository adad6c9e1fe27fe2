//! Check-digit analysis of the record source

use anyhow::Result;
use serde::Serialize;

use anoncheck_common::AppConfig;
use anoncheck_e2e::RecordSource;

use crate::output::{print_list, print_success, print_warning, OutputFormat, TableDisplay};

#[derive(Serialize)]
struct SheetDisplay {
    sheet: String,
    total: usize,
    valid: usize,
    invalid: usize,
}

impl TableDisplay for SheetDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Sheet", "Identifiers", "Valid", "Invalid"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.sheet.clone(),
            self.total.to_string(),
            self.valid.to_string(),
            self.invalid.to_string(),
        ]
    }
}

#[derive(Serialize)]
struct InvalidDisplay {
    sheet: String,
    identifier: String,
    check_digit: char,
    expected: Option<char>,
}

impl TableDisplay for InvalidDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Sheet", "Identifier", "Check digit", "Expected"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.sheet.clone(),
            self.identifier.clone(),
            self.check_digit.to_string(),
            self.expected
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]
    }
}

pub async fn execute(config: &AppConfig, format: OutputFormat) -> Result<()> {
    let checks = RecordSource::new(config.source.clone()).check_identifiers()?;

    let sheets: Vec<SheetDisplay> = checks
        .iter()
        .map(|check| SheetDisplay {
            sheet: check.sheet.clone(),
            total: check.total,
            valid: check.valid,
            invalid: check.invalid.len(),
        })
        .collect();
    print_list(&sheets, format);

    let invalid: Vec<InvalidDisplay> = checks
        .iter()
        .flat_map(|check| {
            check.invalid.iter().map(move |result| InvalidDisplay {
                sheet: check.sheet.clone(),
                identifier: format!("{}{}", result.base, result.check_digit),
                check_digit: result.check_digit,
                expected: result.expected,
            })
        })
        .collect();

    if invalid.is_empty() {
        print_success("All identifiers carry a valid check digit");
    } else {
        print_warning(&format!("{} identifier(s) with an invalid check digit", invalid.len()));
        print_list(&invalid, format);
    }
    Ok(())
}
