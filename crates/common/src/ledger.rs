//! Progress ledger
//!
//! Persisted store of validation outcomes keyed by identifier. The whole
//! ledger is rewritten after every upsert through a temporary file in the
//! same directory followed by a rename, so the file on disk is always a
//! complete JSON array: a crash can lose the in-flight record but never
//! corrupt the ones already written.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::{FinalStatus, ValidationOutcome};

/// Ordered outcomes, at most one per identifier
#[derive(Debug)]
pub struct ProgressLedger {
    path: PathBuf,
    outcomes: Vec<ValidationOutcome>,
    index: HashMap<String, usize>,
}

impl ProgressLedger {
    /// Open the ledger at `path`, loading any outcomes already persisted.
    ///
    /// A missing file is an empty ledger. A file that exists but does not
    /// parse is an error: silently starting over would overwrite it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let existing = Self::load_existing(&path)?;

        let mut ledger = Self {
            path,
            outcomes: Vec::with_capacity(existing.len()),
            index: HashMap::new(),
        };
        for outcome in existing {
            ledger.insert(outcome);
        }

        if !ledger.is_empty() {
            info!(
                path = %ledger.path.display(),
                entries = ledger.len(),
                ok = ledger.ok_count(),
                "Loaded existing progress ledger"
            );
        }
        Ok(ledger)
    }

    /// Read the outcomes stored at `path` without opening a ledger
    pub fn load_existing(path: &Path) -> Result<Vec<ValidationOutcome>> {
        if !path.exists() {
            debug!(path = %path.display(), "No ledger file yet");
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| Error::LedgerCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Replace or append the outcome for its identifier, then flush.
    pub fn upsert(&mut self, outcome: ValidationOutcome) -> Result<()> {
        let identifier = outcome.identifier.clone();
        let replaced = self.insert(outcome);
        debug!(%identifier, replaced, "Ledger upsert");
        self.flush()
    }

    /// Write the full ledger atomically
    pub fn flush(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(&self.outcomes)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| Error::LedgerPersist {
            path: self.path.clone(),
            reason: e.error.to_string(),
        })?;

        Ok(())
    }

    fn insert(&mut self, outcome: ValidationOutcome) -> bool {
        match self.index.get(&outcome.identifier) {
            Some(&pos) => {
                self.outcomes[pos] = outcome;
                true
            }
            None => {
                self.index.insert(outcome.identifier.clone(), self.outcomes.len());
                self.outcomes.push(outcome);
                false
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, identifier: &str) -> Option<&ValidationOutcome> {
        self.index.get(identifier).map(|&pos| &self.outcomes[pos])
    }

    /// Whether `identifier` already has an `OK` outcome and can be skipped
    pub fn is_ok(&self, identifier: &str) -> bool {
        self.get(identifier).map(|o| o.is_ok()).unwrap_or(false)
    }

    /// Identifiers with an `OK` outcome: the resume skip-set
    pub fn ok_identifiers(&self) -> HashSet<String> {
        self.outcomes
            .iter()
            .filter(|o| o.is_ok())
            .map(|o| o.identifier.clone())
            .collect()
    }

    pub fn outcomes(&self) -> &[ValidationOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn ok_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn summary(&self) -> LedgerSummary {
        LedgerSummary::from_outcomes(&self.outcomes)
    }
}

/// Totals over a set of outcomes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
    pub by_status: BTreeMap<FinalStatus, usize>,
}

impl LedgerSummary {
    pub fn from_outcomes(outcomes: &[ValidationOutcome]) -> Self {
        let mut summary = Self {
            total: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            *summary.by_status.entry(outcome.final_status).or_default() += 1;
            if outcome.is_ok() {
                summary.ok += 1;
            } else {
                summary.failed += 1;
            }
        }
        summary
    }

    /// Share of `OK` outcomes, 0.0 when empty
    pub fn ok_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.ok as f64 / self.total as f64 * 100.0
        }
    }

    pub fn count(&self, status: FinalStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn log(&self) {
        info!(
            total = self.total,
            ok = self.ok,
            failed = self.failed,
            "Ledger: {} total, {} OK, {} failed ({:.1}% OK)",
            self.total,
            self.ok,
            self.failed,
            self.ok_percent()
        );
        for (status, count) in &self.by_status {
            if !status.is_ok() && *count > 0 {
                warn!(status = %status, count, "Non-OK outcomes");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NameParts, Record};
    use tempfile::TempDir;

    fn outcome(identifier: &str, status: FinalStatus) -> ValidationOutcome {
        let record = Record {
            identifier: identifier.to_string(),
            real: NameParts::new("JUAN", "PEREZ", "SOTO"),
            masked: NameParts::new("J.", "P.", "S."),
            reference_full_name: None,
        };
        let mut outcome = ValidationOutcome::pending(&record);
        outcome.final_status = status;
        outcome
    }

    #[test]
    fn test_missing_file_is_empty_ledger() {
        let tmp = TempDir::new().unwrap();
        let ledger = ProgressLedger::open(tmp.path().join("progress.json")).unwrap();
        assert!(ledger.is_empty());
        assert!(ledger.ok_identifiers().is_empty());
    }

    #[test]
    fn test_upsert_replaces_not_duplicates() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("progress.json");

        let mut ledger = ProgressLedger::open(&path).unwrap();
        ledger.upsert(outcome("111", FinalStatus::ErrorTechnical)).unwrap();
        ledger.upsert(outcome("222", FinalStatus::Ok)).unwrap();
        ledger.upsert(outcome("111", FinalStatus::Ok)).unwrap();

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.outcomes()[0].identifier, "111");
        assert!(ledger.is_ok("111"));

        let reloaded = ProgressLedger::open(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("111").unwrap().final_status, FinalStatus::Ok);
    }

    #[test]
    fn test_every_upsert_is_flushed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("progress.json");

        let mut ledger = ProgressLedger::open(&path).unwrap();
        ledger.upsert(outcome("111", FinalStatus::ErrorNameLeaked)).unwrap();

        let on_disk = ProgressLedger::load_existing(&path).unwrap();
        assert_eq!(on_disk.len(), 1);
        assert_eq!(on_disk[0].final_status, FinalStatus::ErrorNameLeaked);

        // Only the ledger itself remains in the directory, no temp leftovers.
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_corrupt_file_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("progress.json");
        std::fs::write(&path, "[{\"identifier\": ").unwrap();

        let err = ProgressLedger::open(&path).unwrap_err();
        assert!(matches!(err, Error::LedgerCorrupt { .. }));
    }

    #[test]
    fn test_duplicate_entries_on_disk_collapse() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("progress.json");
        let entries = vec![
            outcome("111", FinalStatus::ErrorTechnical),
            outcome("111", FinalStatus::Ok),
        ];
        std::fs::write(&path, serde_json::to_string(&entries).unwrap()).unwrap();

        let ledger = ProgressLedger::open(&path).unwrap();
        assert_eq!(ledger.len(), 1);
        assert!(ledger.is_ok("111"));
    }

    #[test]
    fn test_summary_counts() {
        let outcomes = vec![
            outcome("1", FinalStatus::Ok),
            outcome("2", FinalStatus::Ok),
            outcome("3", FinalStatus::ErrorNameLeaked),
            outcome("4", FinalStatus::ErrorTechnical),
        ];
        let summary = LedgerSummary::from_outcomes(&outcomes);

        assert_eq!(summary.total, 4);
        assert_eq!(summary.ok, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.count(FinalStatus::ErrorNameLeaked), 1);
        assert_eq!(summary.count(FinalStatus::ErrorInconsistent), 0);
        assert!((summary.ok_percent() - 50.0).abs() < f64::EPSILON);
        assert_eq!(LedgerSummary::default().ok_percent(), 0.0);
    }
}
