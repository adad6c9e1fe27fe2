//! Validation engine driven by a scripted gateway

mod support;

use anoncheck_common::{EnvironmentKind, FinalStatus, SearchMode, NOT_FOUND_NAME};
use anoncheck_e2e::{E2eError, ValidationEngine};

use support::{config, people, ScriptedGateway};

#[tokio::test]
async fn test_full_success_logs_into_both_environments() {
    let record = &people()[0];
    let gateway = ScriptedGateway::new().with_person(record);
    let mut engine = ValidationEngine::new(gateway, &config());

    let outcome = engine.validate(record).await.unwrap();
    assert_eq!(outcome.final_status, FinalStatus::Ok);
    assert_eq!(outcome.name_returned_by_reference_env, "JUAN PEREZ SOTO");
    assert_eq!(outcome.name_returned_by_anonymized_env, "J. P. S.");
    assert!(outcome.validated_at.is_some());

    assert_eq!(
        engine.gateway().logins,
        vec![EnvironmentKind::Reference, EnvironmentKind::Anonymized]
    );
    assert_eq!(engine.sessions_opened(), 2);
}

#[tokio::test]
async fn test_accented_reference_name_matches() {
    let record = &people()[2];
    let mut gateway = ScriptedGateway::new().with_person(record);
    gateway.answer(EnvironmentKind::Reference, "ANA LÓPEZ VERA", "10000013K", "ana lopez vera");
    let mut engine = ValidationEngine::new(gateway, &config());

    let outcome = engine.validate(record).await.unwrap();
    assert!(outcome.name_matches_original_reference);
    assert_eq!(outcome.final_status, FinalStatus::Ok);
}

#[tokio::test]
async fn test_anonymized_leak_is_reported() {
    let record = &people()[0];
    let mut gateway = ScriptedGateway::new().with_person(record);
    gateway.answer(EnvironmentKind::Anonymized, "J. P. S.", "123456785", "JUAN PEREZ SOTO");
    let mut engine = ValidationEngine::new(gateway, &config());

    let outcome = engine.validate(record).await.unwrap();
    assert!(outcome.name_matches_original_anonymized);
    assert_eq!(outcome.final_status, FinalStatus::ErrorNameLeaked);
}

#[tokio::test]
async fn test_not_found_is_not_an_error() {
    let record = &people()[1];
    let mut gateway = ScriptedGateway::new().with_person(record);
    gateway.tables.retain(|(env, _), _| *env == EnvironmentKind::Reference);
    let mut engine = ValidationEngine::new(gateway, &config());

    let outcome = engine.validate(record).await.unwrap();
    assert_eq!(outcome.name_returned_by_anonymized_env, NOT_FOUND_NAME);
    assert!(!outcome.name_matches_masked_anonymized);
    assert_eq!(outcome.final_status, FinalStatus::ErrorIdentifierMismatch);
    assert!(outcome.note.is_none());
}

#[tokio::test]
async fn test_search_failure_becomes_technical_outcome() {
    let record = &people()[0];
    let mut gateway = ScriptedGateway::new().with_person(record);
    gateway.fail(EnvironmentKind::Anonymized, "J. P. S.");
    let mut engine = ValidationEngine::new(gateway, &config());

    let outcome = engine.validate(record).await.unwrap();
    assert_eq!(outcome.final_status, FinalStatus::ErrorTechnical);
    let note = outcome.note.unwrap();
    assert!(note.starts_with("search_anonymized: "), "note was {note}");
    // Evidence from the completed reference leg is kept.
    assert!(outcome.identifier_matches_reference);
}

#[tokio::test]
async fn test_rejected_credentials_before_any_session_are_fatal() {
    let record = &people()[0];
    let mut gateway = ScriptedGateway::new().with_person(record);
    gateway.reject_after = Some(0);
    let mut engine = ValidationEngine::new(gateway, &config());

    let err = engine.validate(record).await.unwrap_err();
    assert!(matches!(err, E2eError::Authentication { environment: EnvironmentKind::Reference, .. }));
}

#[tokio::test]
async fn test_rejected_credentials_after_a_session_degrade() {
    let record = &people()[0];
    let mut gateway = ScriptedGateway::new().with_person(record);
    gateway.reject_after = Some(1);
    let mut engine = ValidationEngine::new(gateway, &config());

    let outcome = engine.validate(record).await.unwrap();
    assert_eq!(outcome.final_status, FinalStatus::ErrorTechnical);
    assert!(outcome.note.unwrap().starts_with("search_anonymized: Authentication"));
}

#[tokio::test]
async fn test_identifier_search_mode() {
    let record = &people()[1];
    let gateway = ScriptedGateway::new().with_identifier_person(record);
    let mut engine = ValidationEngine::new(gateway, &config()).with_search_mode(SearchMode::Identifier);

    let outcome = engine.validate(record).await.unwrap();
    assert_eq!(engine.search_mode(), SearchMode::Identifier);
    assert_eq!(outcome.final_status, FinalStatus::Ok);
}
