//! AnonCheck configuration
//!
//! Loaded from a TOML file; every section has defaults so a partial file is
//! enough. Secrets and the batch limit can be overridden from the
//! environment so they never need to live in the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{Error, Result};
use crate::types::EnvironmentKind;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment expected to show real names
    pub reference: EnvironmentConfig,

    /// Deployment expected to show masked names
    pub anonymized: EnvironmentConfig,

    /// Record source workbook
    pub source: SourceConfig,

    /// Batch execution
    pub run: RunConfig,

    /// Connectivity retry policy
    pub retry: RetryConfig,

    /// Per-operation timeouts
    pub timeouts: TimeoutConfig,

    /// Browser driver
    pub browser: BrowserConfig,
}

/// Credentials and location of one deployment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Display name used in logs and reports
    pub name: String,

    /// Entry URL of the lookup application
    pub url: String,

    pub username: String,

    pub password: String,

    /// Put basic-auth credentials into the URL instead of relying on the form
    pub embed_credentials: bool,
}

impl EnvironmentConfig {
    /// URL to navigate to, with credentials embedded when configured.
    ///
    /// Special characters in the credentials are percent-encoded.
    pub fn login_url(&self) -> Result<String> {
        let mut url = Url::parse(&self.url).map_err(|e| Error::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;

        if self.embed_credentials {
            let invalid = |what: &str| Error::InvalidUrl {
                url: self.url.clone(),
                reason: format!("cannot carry {}", what),
            };
            url.set_username(&self.username)
                .map_err(|_| invalid("a username"))?;
            url.set_password(Some(&self.password))
                .map_err(|_| invalid("a password"))?;
        }

        Ok(url.to_string())
    }

    /// Name for logs, falling back to the environment kind
    pub fn display_name(&self, kind: EnvironmentKind) -> String {
        if self.name.is_empty() {
            kind.to_string()
        } else {
            self.name.clone()
        }
    }
}

/// Which search flow the engine drives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Search each environment by its own name parts (real vs masked)
    #[default]
    Name,
    /// Search both environments by the record identifier
    Identifier,
}

impl std::str::FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "name" => Ok(SearchMode::Name),
            "identifier" | "id" => Ok(SearchMode::Identifier),
            other => Err(Error::InvalidConfig(format!("unknown search mode '{}'", other))),
        }
    }
}

/// Spreadsheet schema of the record source. Column indices are 0-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub workbook: PathBuf,
    pub original_sheet: String,
    pub masked_sheet: String,
    pub header_rows: usize,
    pub identifier_col: usize,
    pub check_digit_col: usize,
    pub paternal_col: usize,
    pub maternal_col: usize,
    pub given_col: usize,
    pub full_name_col: Option<usize>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            workbook: PathBuf::from("data/records.xlsx"),
            original_sheet: "Registros Originales".to_string(),
            masked_sheet: "Registros enmascarados".to_string(),
            header_rows: 1,
            identifier_col: 2,
            check_digit_col: 3,
            paternal_col: 4,
            maternal_col: 5,
            given_col: 6,
            full_name_col: Some(7),
        }
    }
}

/// Batch execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Progress ledger, the single source of truth for resume
    pub ledger_path: PathBuf,

    /// Spreadsheet report
    pub report_path: PathBuf,

    /// HTML dashboard
    pub dashboard_path: PathBuf,

    /// Only consider the first N source records
    pub limit: Option<usize>,

    /// Recreate the browser context after this many validations
    pub recycle_every: usize,

    pub search_mode: SearchMode,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from("evidence/progress.json"),
            report_path: PathBuf::from("evidence/validation-report.xlsx"),
            dashboard_path: PathBuf::from("evidence/dashboard.html"),
            limit: Some(500),
            recycle_every: 50,
            search_mode: SearchMode::Name,
        }
    }
}

/// Connectivity retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Fixed wait between attempts
    pub backoff_ms: u64,

    /// Give up after this many attempts; absent means retry forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_ms: 2000,
            max_attempts: None,
        }
    }
}

/// Timeouts in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub navigation_ms: u64,
    pub login_marker_ms: u64,
    pub login_probe_ms: u64,
    pub login_form_ms: u64,
    /// Default for clicks, fills and selects
    pub action_ms: u64,
    pub name_results_ms: u64,
    pub identifier_results_ms: u64,
    /// Upper bound on a single driver round trip
    pub command_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation_ms: 120_000,
            login_marker_ms: 90_000,
            login_probe_ms: 5_000,
            login_form_ms: 10_000,
            action_ms: 30_000,
            name_results_ms: 20_000,
            identifier_results_ms: 15_000,
            command_ms: 300_000,
        }
    }
}

/// Browser driver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// chromium, firefox or webkit
    pub engine: String,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Attempts before rejected credentials become fatal
    pub login_attempts: u32,
    /// Element that only appears once logged in
    pub login_marker: String,
    /// NODE_PATH for resolving the playwright package
    pub node_path: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: "chromium".to_string(),
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            login_attempts: 3,
            login_marker: "text=/busqueda avanzada/i".to_string(),
            node_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from file, or defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `ANONCHECK_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("ANONCHECK_REFERENCE_USERNAME") {
            self.reference.username = v;
        }
        if let Some(v) = lookup("ANONCHECK_REFERENCE_PASSWORD") {
            self.reference.password = v;
        }
        if let Some(v) = lookup("ANONCHECK_ANONYMIZED_USERNAME") {
            self.anonymized.username = v;
        }
        if let Some(v) = lookup("ANONCHECK_ANONYMIZED_PASSWORD") {
            self.anonymized.password = v;
        }
        if let Some(v) = lookup("ANONCHECK_LIMIT") {
            let limit = v
                .trim()
                .parse::<usize>()
                .map_err(|_| Error::InvalidConfig(format!("ANONCHECK_LIMIT is not a number: '{}'", v)))?;
            self.run.limit = Some(limit);
        }
        Ok(())
    }

    /// Environment settings by kind
    pub fn environment(&self, kind: EnvironmentKind) -> &EnvironmentConfig {
        match kind {
            EnvironmentKind::Reference => &self.reference,
            EnvironmentKind::Anonymized => &self.anonymized,
        }
    }

    /// Reject settings that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        for kind in [EnvironmentKind::Reference, EnvironmentKind::Anonymized] {
            let env = self.environment(kind);
            if env.url.is_empty() {
                return Err(Error::InvalidConfig(format!("{} environment has no url", kind)));
            }
            env.login_url()?;
        }

        if self.reference.url == self.anonymized.url
            && self.reference.username == self.anonymized.username
        {
            return Err(Error::InvalidConfig(
                "reference and anonymized environments share url and username".to_string(),
            ));
        }

        if self.run.recycle_every == 0 {
            return Err(Error::InvalidConfig("run.recycle_every must be at least 1".to_string()));
        }

        if self.browser.login_attempts == 0 {
            return Err(Error::InvalidConfig("browser.login_attempts must be at least 1".to_string()));
        }

        Ok(())
    }
}
