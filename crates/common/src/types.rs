//! Core types for AnonCheck

use serde::{Deserialize, Serialize};

/// Name recorded when a search leg returns no candidate rows
pub const NOT_FOUND_NAME: &str = "NOT_ENCONTRADO";

/// Which deployment a search runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentKind {
    /// Deployment expected to show real names
    Reference,
    /// Deployment expected to show masked names only
    Anonymized,
}

impl std::fmt::Display for EnvironmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvironmentKind::Reference => write!(f, "reference"),
            EnvironmentKind::Anonymized => write!(f, "anonymized"),
        }
    }
}

/// Raw name parts as the search form expects them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameParts {
    pub given_name: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
}

impl NameParts {
    pub fn new(
        given_name: impl Into<String>,
        paternal_surname: impl Into<String>,
        maternal_surname: impl Into<String>,
    ) -> Self {
        Self {
            given_name: given_name.into(),
            paternal_surname: paternal_surname.into(),
            maternal_surname: maternal_surname.into(),
        }
    }

    /// Display name in "given paternal maternal" order.
    ///
    /// Parts are joined with single spaces without collapsing empty parts;
    /// comparisons go through [`crate::normalize`], which trims the ends.
    pub fn full_name(&self) -> String {
        format!(
            "{} {} {}",
            self.given_name, self.paternal_surname, self.maternal_surname
        )
    }
}

/// One subject to validate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Cleaned national ID including check character
    pub identifier: String,
    /// Real identity as held by the reference environment
    pub real: NameParts,
    /// Expected identity in the anonymized environment
    pub masked: NameParts,
    /// Full name column carried by the source, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_full_name: Option<String>,
}

impl Record {
    pub fn real_full_name(&self) -> String {
        self.real.full_name()
    }

    pub fn masked_full_name(&self) -> String {
        self.masked.full_name()
    }
}

/// One candidate row returned by a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Identifier cleaned to digits plus check letter
    pub identifier: String,
    /// Longest free-text cell of the row
    pub name: String,
}

/// Final verdict for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalStatus {
    Ok,
    ErrorIdentifierMismatch,
    ErrorNameLeaked,
    ErrorInconsistent,
    ErrorTechnical,
}

impl FinalStatus {
    pub const ALL: [FinalStatus; 5] = [
        FinalStatus::Ok,
        FinalStatus::ErrorIdentifierMismatch,
        FinalStatus::ErrorNameLeaked,
        FinalStatus::ErrorInconsistent,
        FinalStatus::ErrorTechnical,
    ];

    pub fn is_ok(&self) -> bool {
        matches!(self, FinalStatus::Ok)
    }

    /// Machine code as stored in the ledger
    pub fn code(&self) -> &'static str {
        match self {
            FinalStatus::Ok => "OK",
            FinalStatus::ErrorIdentifierMismatch => "ERROR_IDENTIFIER_MISMATCH",
            FinalStatus::ErrorNameLeaked => "ERROR_NAME_LEAKED",
            FinalStatus::ErrorInconsistent => "ERROR_INCONSISTENT",
            FinalStatus::ErrorTechnical => "ERROR_TECHNICAL",
        }
    }

    /// Human-readable label for reports
    pub fn label(&self) -> &'static str {
        match self {
            FinalStatus::Ok => "OK",
            FinalStatus::ErrorIdentifierMismatch => "Identifier mismatch",
            FinalStatus::ErrorNameLeaked => "Real name leaked in anonymized environment",
            FinalStatus::ErrorInconsistent => "Inconsistent data",
            FinalStatus::ErrorTechnical => "Technical failure",
        }
    }
}

impl std::fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Final per-record verdict plus the evidence behind it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub identifier: String,
    pub real_name: String,
    pub masked_name: String,
    pub name_returned_by_reference_env: String,
    pub name_returned_by_anonymized_env: String,
    pub identifier_matches_reference: bool,
    pub identifier_matches_anonymized: bool,
    pub name_matches_original_reference: bool,
    pub name_matches_original_anonymized: bool,
    pub name_matches_masked_anonymized: bool,
    pub final_status: FinalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Full name exactly as the source spreadsheet spells it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ValidationOutcome {
    /// Outcome with no evidence yet: both legs not found, every flag false
    pub fn pending(record: &Record) -> Self {
        Self {
            identifier: record.identifier.clone(),
            real_name: record.real_full_name(),
            masked_name: record.masked_full_name(),
            name_returned_by_reference_env: NOT_FOUND_NAME.to_string(),
            name_returned_by_anonymized_env: NOT_FOUND_NAME.to_string(),
            identifier_matches_reference: false,
            identifier_matches_anonymized: false,
            name_matches_original_reference: false,
            name_matches_original_anonymized: false,
            name_matches_masked_anonymized: false,
            final_status: FinalStatus::ErrorInconsistent,
            note: None,
            reference_full_name: record.reference_full_name.clone(),
            validated_at: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.final_status.is_ok()
    }

    pub fn stamped(mut self) -> Self {
        self.validated_at = Some(chrono::Utc::now());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record {
            identifier: "12345678K".to_string(),
            real: NameParts::new("JUAN", "PEREZ", "SOTO"),
            masked: NameParts::new("J.", "P.", "S."),
            reference_full_name: None,
        }
    }

    #[test]
    fn test_full_name_keeps_empty_parts() {
        let parts = NameParts::new("ANA", "", "ROJAS");
        assert_eq!(parts.full_name(), "ANA  ROJAS");
    }

    #[test]
    fn test_pending_outcome_defaults() {
        let outcome = ValidationOutcome::pending(&record());
        assert_eq!(outcome.real_name, "JUAN PEREZ SOTO");
        assert_eq!(outcome.masked_name, "J. P. S.");
        assert_eq!(outcome.name_returned_by_reference_env, NOT_FOUND_NAME);
        assert!(!outcome.is_ok());
    }

    #[test]
    fn test_outcome_json_shape() {
        let mut outcome = ValidationOutcome::pending(&record());
        outcome.final_status = FinalStatus::ErrorNameLeaked;
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["identifier"], "12345678K");
        assert_eq!(json["finalStatus"], "ERROR_NAME_LEAKED");
        assert_eq!(json["nameMatchesMaskedAnonymized"], false);
        assert!(json.get("note").is_none());
        assert!(json.get("referenceFullName").is_none());
    }

    #[test]
    fn test_outcome_keeps_source_full_name() {
        let mut record = record();
        record.reference_full_name = Some("Juan Pérez Soto".to_string());

        let outcome = ValidationOutcome::pending(&record);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["referenceFullName"], "Juan Pérez Soto");

        let back: ValidationOutcome = serde_json::from_value(json).unwrap();
        assert_eq!(back.reference_full_name.as_deref(), Some("Juan Pérez Soto"));
    }

    #[test]
    fn test_status_code_matches_serde() {
        for status in FinalStatus::ALL {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.code());
        }
    }
}
