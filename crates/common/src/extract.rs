//! Result extraction from rendered search tables
//!
//! The lookup application renders a variable number of metadata columns
//! around the customer name, and the layout differs between deployments.
//! The identifier is always the first cell; the name has to be picked out of
//! the remaining cells. That heuristic lives here, behind [`ResultExtractor`],
//! so it can be swapped per target application without touching the engine.

use serde::{Deserialize, Serialize};

use crate::identifier::clean_identifier;
use crate::types::SearchResult;

/// Cell texts of a rendered result table, row by row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResultTable {
    /// Rows of `<td>` texts; header rows usually arrive empty
    #[serde(default)]
    pub rows: Vec<Vec<String>>,

    /// The application showed its "no results" indicator
    #[serde(default)]
    pub not_found: bool,
}

impl RawResultTable {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows,
            not_found: false,
        }
    }

    pub fn not_found() -> Self {
        Self {
            rows: Vec::new(),
            not_found: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.not_found || self.rows.is_empty()
    }
}

/// Turns a rendered result table into candidate `{identifier, name}` pairs
pub trait ResultExtractor: Send + Sync {
    fn extract(&self, table: &RawResultTable) -> Vec<SearchResult>;
}

/// Picks the longest free-text cell as the name.
///
/// Among all cells after the first, a name candidate must be non-empty,
/// contain no hyphen (dates, codes) and not be purely numeric. The longest
/// candidate wins; on equal length the earlier cell is kept. Rows with fewer
/// than two cells are ignored, and rows whose identifier cleans to an empty
/// string are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongestTextExtractor;

impl LongestTextExtractor {
    fn extract_row(row: &[String]) -> Option<SearchResult> {
        if row.len() < 2 {
            return None;
        }

        let identifier = clean_identifier(row[0].trim());
        if identifier.is_empty() {
            return None;
        }

        let mut name = "";
        let mut name_len = 0usize;
        for cell in &row[1..] {
            let text = cell.trim();
            let len = text.chars().count();
            if is_name_candidate(text) && len > name_len {
                name = text;
                name_len = len;
            }
        }

        Some(SearchResult {
            identifier,
            name: name.to_string(),
        })
    }
}

impl ResultExtractor for LongestTextExtractor {
    fn extract(&self, table: &RawResultTable) -> Vec<SearchResult> {
        if table.not_found {
            return Vec::new();
        }

        table
            .rows
            .iter()
            .filter_map(|row| Self::extract_row(row))
            .collect()
    }
}

fn is_name_candidate(text: &str) -> bool {
    !text.is_empty() && !text.contains('-') && !text.chars().all(|c| c.is_ascii_digit())
}
