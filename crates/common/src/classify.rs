//! Outcome classification
//!
//! Each record yields two legs of evidence, one per environment. The
//! reference leg must return the real name under the record's identifier;
//! the anonymized leg must return the masked name and never the real one.

use crate::normalize::normalize;
use crate::types::{FinalStatus, Record, SearchResult, ValidationOutcome, NOT_FOUND_NAME};

/// What one environment returned for a record, with its match flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegEvidence {
    pub returned_name: String,
    pub identifier_matches: bool,
    pub matches_original: bool,
    pub matches_masked: bool,
}

impl LegEvidence {
    /// Evidence from the first candidate of a search, if there was one
    pub fn from_candidate(record: &Record, candidate: Option<&SearchResult>) -> Self {
        match candidate {
            Some(found) => {
                let returned = normalize(&found.name);
                Self {
                    returned_name: found.name.clone(),
                    identifier_matches: found.identifier == record.identifier,
                    matches_original: returned == normalize(&record.real_full_name()),
                    matches_masked: returned == normalize(&record.masked_full_name()),
                }
            }
            None => Self {
                returned_name: NOT_FOUND_NAME.to_string(),
                identifier_matches: false,
                matches_original: false,
                matches_masked: false,
            },
        }
    }
}

/// Store the reference leg on the outcome
pub fn record_reference(outcome: &mut ValidationOutcome, leg: LegEvidence) {
    outcome.name_returned_by_reference_env = leg.returned_name;
    outcome.identifier_matches_reference = leg.identifier_matches;
    outcome.name_matches_original_reference = leg.matches_original;
}

/// Store the anonymized leg on the outcome
pub fn record_anonymized(outcome: &mut ValidationOutcome, leg: LegEvidence) {
    outcome.name_returned_by_anonymized_env = leg.returned_name;
    outcome.identifier_matches_anonymized = leg.identifier_matches;
    outcome.name_matches_original_anonymized = leg.matches_original;
    outcome.name_matches_masked_anonymized = leg.matches_masked;
}

/// Reference leg passes: matching identifier, real name, and that name is
/// not also the masked name.
pub fn reference_leg_ok(outcome: &ValidationOutcome) -> bool {
    outcome.identifier_matches_reference
        && outcome.name_matches_original_reference
        && normalize(&outcome.name_returned_by_reference_env) != normalize(&outcome.masked_name)
}

/// Anonymized leg passes: matching identifier, masked name, never the real name
pub fn anonymized_leg_ok(outcome: &ValidationOutcome) -> bool {
    outcome.identifier_matches_anonymized
        && !outcome.name_matches_original_anonymized
        && outcome.name_matches_masked_anonymized
}

/// Final status from the evidence recorded on the outcome.
///
/// Failures are ranked: identifier mismatch on either leg first, then a real
/// name leaking through the anonymized leg, then anything else.
pub fn final_status(outcome: &ValidationOutcome) -> FinalStatus {
    if reference_leg_ok(outcome) && anonymized_leg_ok(outcome) {
        FinalStatus::Ok
    } else if !outcome.identifier_matches_reference || !outcome.identifier_matches_anonymized {
        FinalStatus::ErrorIdentifierMismatch
    } else if outcome.name_matches_original_anonymized {
        FinalStatus::ErrorNameLeaked
    } else {
        FinalStatus::ErrorInconsistent
    }
}

/// Classify a record from the first candidate of each search
pub fn classify(
    record: &Record,
    reference: Option<&SearchResult>,
    anonymized: Option<&SearchResult>,
) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::pending(record);
    record_reference(&mut outcome, LegEvidence::from_candidate(record, reference));
    record_anonymized(&mut outcome, LegEvidence::from_candidate(record, anonymized));
    outcome.final_status = final_status(&outcome);
    outcome
}

/// Mark an outcome as a technical failure, keeping whatever evidence was
/// gathered before the error.
pub fn mark_technical(outcome: &mut ValidationOutcome, note: impl Into<String>) {
    outcome.final_status = FinalStatus::ErrorTechnical;
    outcome.note = Some(note.into());
}
