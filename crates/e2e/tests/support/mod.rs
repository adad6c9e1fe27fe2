//! Scripted in-memory gateway for driving the engine without a browser

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use anoncheck_common::{AppConfig, EnvironmentConfig, EnvironmentKind, NameParts, RawResultTable, Record};
use anoncheck_e2e::{E2eError, E2eResult, Session, SessionGateway, SessionTracker};

#[derive(Default)]
pub struct ScriptedGateway {
    pub sessions: SessionTracker,
    /// Canned tables keyed by environment and search key (full name or identifier)
    pub tables: HashMap<(EnvironmentKind, String), RawResultTable>,
    /// Searches that fail with a timeout
    pub failing: HashSet<(EnvironmentKind, String)>,
    /// Reject credentials once this many logins succeeded
    pub reject_after: Option<u64>,
    pub logins: Vec<EnvironmentKind>,
    pub searches: usize,
    pub recycles: usize,
    pub closed: bool,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference shows the real name, anonymized shows the masked name
    pub fn with_person(mut self, record: &Record) -> Self {
        self.answer(EnvironmentKind::Reference, &record.real.full_name(), &record.identifier, &record.real.full_name());
        self.answer(EnvironmentKind::Anonymized, &record.masked.full_name(), &record.identifier, &record.masked.full_name());
        self
    }

    /// Both environments answer identifier searches
    pub fn with_identifier_person(mut self, record: &Record) -> Self {
        self.answer(EnvironmentKind::Reference, &record.identifier, &record.identifier, &record.real.full_name());
        self.answer(EnvironmentKind::Anonymized, &record.identifier, &record.identifier, &record.masked.full_name());
        self
    }

    pub fn answer(&mut self, env: EnvironmentKind, key: &str, identifier: &str, name: &str) {
        let rows = vec![vec![
            identifier.to_string(),
            "2024-01-01".to_string(),
            "42".to_string(),
            name.to_string(),
        ]];
        self.tables.insert((env, key.to_string()), RawResultTable::new(rows));
    }

    pub fn fail(&mut self, env: EnvironmentKind, key: &str) {
        self.failing.insert((env, key.to_string()));
    }

    fn lookup(&mut self, session: &Session, key: &str) -> E2eResult<RawResultTable> {
        self.sessions.check(session)?;
        self.searches += 1;
        let key = (session.environment, key.to_string());
        if self.failing.contains(&key) {
            return Err(E2eError::Timeout(format!("results for {}", key.1)));
        }
        Ok(self.tables.get(&key).cloned().unwrap_or_else(RawResultTable::not_found))
    }
}

#[async_trait]
impl SessionGateway for ScriptedGateway {
    async fn login(&mut self, environment: EnvironmentKind, _config: &EnvironmentConfig) -> E2eResult<Session> {
        if let Some(limit) = self.reject_after {
            if self.sessions.logins() >= limit {
                return Err(E2eError::Authentication {
                    environment,
                    attempts: 3,
                    reason: "invalid credentials".to_string(),
                });
            }
        }
        self.logins.push(environment);
        Ok(self.sessions.open(environment))
    }

    async fn search_by_identifier(&mut self, session: &Session, identifier: &str) -> E2eResult<RawResultTable> {
        self.lookup(session, identifier)
    }

    async fn search_by_name(&mut self, session: &Session, name: &NameParts) -> E2eResult<RawResultTable> {
        self.lookup(session, &name.full_name())
    }

    async fn recycle(&mut self) -> E2eResult<()> {
        self.sessions.invalidate();
        self.recycles += 1;
        Ok(())
    }

    async fn close(&mut self) -> E2eResult<()> {
        self.closed = true;
        Ok(())
    }
}

pub fn record(identifier: &str, real: (&str, &str, &str), masked: (&str, &str, &str)) -> Record {
    Record {
        identifier: identifier.to_string(),
        real: NameParts::new(real.0, real.1, real.2),
        masked: NameParts::new(masked.0, masked.1, masked.2),
        reference_full_name: None,
    }
}

/// Three distinct people with valid identifiers
pub fn people() -> Vec<Record> {
    vec![
        record("123456785", ("JUAN", "PEREZ", "SOTO"), ("J.", "P.", "S.")),
        record("111111111", ("MARIA", "ROJAS", "DIAZ"), ("M.", "R.", "D.")),
        record("10000013K", ("ANA", "LÓPEZ", "VERA"), ("A.", "L.", "V.")),
    ]
}

pub fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.reference.url = "http://reference.invalid/app/".to_string();
    config.reference.username = "ref".to_string();
    config.anonymized.url = "http://anonymized.invalid/app/".to_string();
    config.anonymized.username = "anon".to_string();
    config.run.limit = None;
    config
}
