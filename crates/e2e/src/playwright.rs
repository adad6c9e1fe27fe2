//! Playwright browser automation
//!
//! One Node process runs for the whole batch and keeps a single browser
//! context open. Commands go to it as JSON lines on stdin and each one gets
//! exactly one JSON line back on stdout, matched by id. The driver reports
//! failures with a kind (`connectivity`, `timeout`, `auth`, `login_prompt`,
//! `navigation`, `app`, `driver`) which maps onto [`E2eError`].

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tracing::{debug, info, warn};

use anoncheck_common::config::TimeoutConfig;
use anoncheck_common::{
    clean_identifier, AppConfig, EnvironmentConfig, EnvironmentKind, NameParts, RawResultTable,
};

use crate::error::{E2eError, E2eResult};
use crate::gateway::{Session, SessionGateway, SessionTracker};
use crate::retry::{Recoverable, RetryPolicy};

const DRIVER_BODY: &str = include_str!("driver.js");

/// Driver failures whose message says the page lost its connection even
/// though the driver could not tell.
static CONNECTIVITY_MESSAGE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)net::ERR_|ERR_INTERNET_DISCONNECTED|browser reports offline").ok()
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> E2eResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Driver(format!("unknown browser engine '{}'", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub timeouts: TimeoutConfig,
    pub login_attempts: u32,
    pub login_marker: String,
    pub node_path: Option<PathBuf>,
    pub retry: RetryPolicy,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self::from_parts(&AppConfig::default(), Browser::Chromium)
    }
}

impl PlaywrightConfig {
    pub fn from_app(config: &AppConfig) -> E2eResult<Self> {
        let browser = config.browser.engine.parse()?;
        Ok(Self::from_parts(config, browser))
    }

    fn from_parts(config: &AppConfig, browser: Browser) -> Self {
        Self {
            browser,
            headless: config.browser.headless,
            viewport_width: config.browser.viewport_width,
            viewport_height: config.browser.viewport_height,
            timeouts: config.timeouts.clone(),
            login_attempts: config.browser.login_attempts.max(1),
            login_marker: config.browser.login_marker.clone(),
            node_path: config.browser.node_path.clone(),
            retry: RetryPolicy::from(&config.retry),
        }
    }

    fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.command_ms)
    }

    fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.navigation_ms)
    }
}

/// Settings injected into the driver script as `CONFIG`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DriverSettings<'a> {
    browser: &'a str,
    headless: bool,
    viewport_width: u32,
    viewport_height: u32,
    navigation_timeout_ms: u64,
    login_probe_ms: u64,
    login_form_ms: u64,
    login_marker_ms: u64,
    action_timeout_ms: u64,
    name_results_ms: u64,
    identifier_results_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum DriverCommand<'a> {
    Login {
        url: &'a str,
        username: &'a str,
        password: &'a str,
        marker: &'a str,
    },
    SearchByName {
        given: &'a str,
        paternal: &'a str,
        maternal: &'a str,
    },
    SearchByIdentifier {
        identifier: &'a str,
    },
    Reload,
    Recycle,
    Close,
}

impl DriverCommand<'_> {
    fn op(&self) -> &'static str {
        match self {
            DriverCommand::Login { .. } => "login",
            DriverCommand::SearchByName { .. } => "search_by_name",
            DriverCommand::SearchByIdentifier { .. } => "search_by_identifier",
            DriverCommand::Reload => "reload",
            DriverCommand::Recycle => "recycle",
            DriverCommand::Close => "close",
        }
    }
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    command: &'a DriverCommand<'a>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriverReply {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    ready: Option<bool>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    via: Option<String>,
    #[serde(default)]
    rows: Vec<Vec<String>>,
    #[serde(default)]
    not_found: bool,
}

impl DriverReply {
    /// Turn a failed reply into the matching error.
    ///
    /// `environment` is the environment the command ran against, when known.
    fn into_result(self, environment: Option<EnvironmentKind>) -> E2eResult<Self> {
        if self.ok {
            return Ok(self);
        }

        let message = self
            .message
            .clone()
            .unwrap_or_else(|| "driver reported failure without a message".to_string());
        let kind = self.kind.as_deref().unwrap_or("app");

        Err(match (kind, environment) {
            ("connectivity", _) => E2eError::Connectivity(message),
            ("timeout", _) => E2eError::Timeout(message),
            ("navigation", _) => E2eError::Navigation(message),
            ("auth", Some(environment)) => E2eError::Authentication {
                environment,
                attempts: 1,
                reason: message,
            },
            ("login_prompt", Some(environment)) => E2eError::UnexpectedLogin(environment),
            ("driver", _) => E2eError::Driver(message),
            _ if looks_like_connectivity(&message) => E2eError::Connectivity(message),
            _ => E2eError::Driver(message),
        })
    }

    /// The browser, context or page behind the driver is gone
    fn lost_browser(&self) -> bool {
        !self.ok && self.kind.as_deref() == Some("driver")
    }

    fn into_table(self) -> RawResultTable {
        RawResultTable {
            rows: self.rows,
            not_found: self.not_found,
        }
    }
}

fn looks_like_connectivity(message: &str) -> bool {
    CONNECTIVITY_MESSAGE
        .as_ref()
        .map(|re| re.is_match(message))
        .unwrap_or(false)
}

/// The running Node process
struct DriverProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

impl DriverProcess {
    async fn spawn(script_path: &Path, config: &PlaywrightConfig) -> E2eResult<Self> {
        debug!("Starting Playwright driver: {}", script_path.display());

        let mut cmd = TokioCommand::new("node");
        cmd.arg(script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(node_path) = &config.node_path {
            cmd.env("NODE_PATH", node_path);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| E2eError::Driver(format!("Failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Driver("driver stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Driver("driver stdout unavailable".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "anoncheck::driver", "{}", line);
                }
            });
        }

        let mut driver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
        };
        driver.await_ready(config.startup_timeout()).await?;
        Ok(driver)
    }

    async fn await_ready(&mut self, limit: Duration) -> E2eResult<()> {
        let reply = tokio::time::timeout(limit, async {
            loop {
                let reply = self.next_reply().await?;
                if reply.ready.is_some() {
                    return Ok::<_, E2eError>(reply);
                }
            }
        })
        .await
        .map_err(|_| E2eError::Timeout("browser launch".to_string()))??;

        if reply.ready == Some(true) {
            info!("Playwright driver ready");
            return Ok(());
        }

        let message = reply.message.unwrap_or_default();
        if message.contains("Cannot find module 'playwright'") {
            Err(E2eError::PlaywrightNotFound)
        } else {
            Err(E2eError::Driver(format!("browser launch failed: {}", message)))
        }
    }

    /// Next JSON line from the driver, skipping anything that is not JSON
    async fn next_reply(&mut self) -> E2eResult<DriverReply> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| E2eError::Driver("driver exited".to_string()))?;
            match serde_json::from_str::<DriverReply>(&line) {
                Ok(reply) => return Ok(reply),
                Err(_) => debug!(target: "anoncheck::driver", "stdout: {}", line),
            }
        }
    }

    /// Send one command and wait for its reply.
    ///
    /// Errors from here mean the process itself is unusable; failures
    /// reported by the driver come back as a reply with `ok: false`.
    async fn request(&mut self, command: &DriverCommand<'_>, limit: Duration) -> E2eResult<DriverReply> {
        self.next_id += 1;
        let id = self.next_id;

        let mut line = serde_json::to_string(&Envelope { id, command })?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| E2eError::Driver(format!("driver stdin closed: {}", e)))?;
        self.stdin.flush().await?;

        let op = command.op();
        tokio::time::timeout(limit, async {
            loop {
                let reply = self.next_reply().await?;
                if reply.id == Some(id) {
                    return Ok::<_, E2eError>(reply);
                }
                debug!(expected = id, got = ?reply.id, "Discarding stale driver reply");
            }
        })
        .await
        .map_err(|_| E2eError::Timeout(format!("driver reply to {}", op)))?
    }

    async fn shutdown(self) {
        let Self { mut child, stdin, .. } = self;
        drop(stdin);

        match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "Playwright driver exited"),
            _ => {
                #[cfg(unix)]
                {
                    use nix::sys::signal::{kill, Signal};
                    use nix::unistd::Pid;

                    if let Some(pid) = child.id() {
                        if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                            tokio::time::sleep(Duration::from_millis(500)).await;
                        }
                    }
                }
                let _ = child.kill().await;
            }
        }
    }
}

/// [`SessionGateway`] backed by a Playwright driver process
pub struct PlaywrightGateway {
    config: PlaywrightConfig,
    script_dir: TempDir,
    driver: Option<DriverProcess>,
    sessions: SessionTracker,
}

impl PlaywrightGateway {
    /// Check Playwright is available and start the driver
    pub async fn launch(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed()?;

        let script_dir = tempfile::tempdir()?;
        std::fs::write(Self::script_path_in(&script_dir), build_driver_script(&config)?)?;

        let mut gateway = Self {
            config,
            script_dir,
            driver: None,
            sessions: SessionTracker::new(),
        };
        gateway.ensure_driver().await?;
        Ok(gateway)
    }

    /// Check if Playwright is installed
    fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    fn script_path_in(dir: &TempDir) -> PathBuf {
        dir.path().join("anoncheck-driver.js")
    }

    async fn ensure_driver(&mut self) -> E2eResult<&mut DriverProcess> {
        if self.driver.is_none() {
            let script = Self::script_path_in(&self.script_dir);
            let driver = DriverProcess::spawn(&script, &self.config).await?;
            self.sessions.invalidate();
            self.driver = Some(driver);
        }
        self.driver
            .as_mut()
            .ok_or_else(|| E2eError::Driver("driver not running".to_string()))
    }

    async fn discard_driver(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.shutdown().await;
        }
        self.sessions.invalidate();
    }

    /// Round trip under the retry policy, reloading the page between
    /// connectivity retries.
    async fn call(
        &mut self,
        command: DriverCommand<'_>,
        environment: Option<EnvironmentKind>,
    ) -> E2eResult<DriverReply> {
        let retry = self.config.retry;
        let operation = command.op();
        let mut call = DriverCall {
            link: self,
            command: &command,
            environment,
        };
        retry.run_with_recovery(operation, &mut call).await
    }
}

/// One request/reply exchange with a driver, plus the page reload used to
/// recover from lost connectivity
#[async_trait]
trait DriverLink: Send {
    async fn round_trip(&mut self, command: &DriverCommand<'_>) -> E2eResult<DriverReply>;

    async fn reload(&mut self) -> E2eResult<()>;
}

#[async_trait]
impl DriverLink for PlaywrightGateway {
    /// A dead process, or a driver whose browser is gone, is discarded so
    /// the next call starts a fresh one.
    async fn round_trip(&mut self, command: &DriverCommand<'_>) -> E2eResult<DriverReply> {
        let limit = self.config.command_timeout();
        let driver = self.ensure_driver().await?;

        match driver.request(command, limit).await {
            Ok(reply) => {
                if reply.lost_browser() {
                    warn!(
                        op = command.op(),
                        message = reply.message.as_deref().unwrap_or(""),
                        "Browser lost, restarting the driver on next call"
                    );
                    self.discard_driver().await;
                }
                Ok(reply)
            }
            Err(e) => {
                warn!(op = command.op(), error = %e, "Playwright driver unusable, restarting on next call");
                self.discard_driver().await;
                Err(e)
            }
        }
    }

    async fn reload(&mut self) -> E2eResult<()> {
        self.round_trip(&DriverCommand::Reload).await?.into_result(None)?;
        Ok(())
    }
}

/// A driver command repeated under the retry policy
struct DriverCall<'a, L: DriverLink> {
    link: &'a mut L,
    command: &'a DriverCommand<'a>,
    environment: Option<EnvironmentKind>,
}

#[async_trait]
impl<'a, L: DriverLink> Recoverable for DriverCall<'a, L> {
    type Output = DriverReply;

    async fn attempt(&mut self) -> E2eResult<DriverReply> {
        self.link
            .round_trip(self.command)
            .await?
            .into_result(self.environment)
    }

    async fn recover(&mut self) -> E2eResult<()> {
        self.link.reload().await
    }
}

#[async_trait]
impl SessionGateway for PlaywrightGateway {
    async fn login(
        &mut self,
        environment: EnvironmentKind,
        config: &EnvironmentConfig,
    ) -> E2eResult<Session> {
        let url = config.login_url()?;
        let display_name = config.display_name(environment);
        let attempts = self.config.login_attempts;
        let marker = self.config.login_marker.clone();
        let mut last_reason = String::new();

        self.sessions.invalidate();
        for attempt in 1..=attempts {
            info!(environment = %display_name, attempt, "Logging in");
            let command = DriverCommand::Login {
                url: &url,
                username: &config.username,
                password: &config.password,
                marker: &marker,
            };
            match self.call(command, Some(environment)).await {
                Ok(reply) => {
                    let session = self.sessions.open(environment);
                    info!(
                        environment = %display_name,
                        via = reply.via.as_deref().unwrap_or("unknown"),
                        generation = session.generation,
                        "Logged in"
                    );
                    return Ok(session);
                }
                Err(E2eError::Authentication { reason, .. }) => {
                    warn!(environment = %display_name, attempt, %reason, "Credentials rejected");
                    last_reason = reason;
                }
                Err(e) => return Err(e),
            }
        }

        Err(E2eError::Authentication {
            environment,
            attempts,
            reason: last_reason,
        })
    }

    async fn search_by_identifier(
        &mut self,
        session: &Session,
        identifier: &str,
    ) -> E2eResult<RawResultTable> {
        self.sessions.check(session)?;
        let identifier = clean_identifier(identifier);
        debug!(environment = %session.environment, %identifier, "Searching by identifier");

        let reply = self
            .call(
                DriverCommand::SearchByIdentifier { identifier: &identifier },
                Some(session.environment),
            )
            .await?;
        Ok(reply.into_table())
    }

    async fn search_by_name(
        &mut self,
        session: &Session,
        name: &NameParts,
    ) -> E2eResult<RawResultTable> {
        self.sessions.check(session)?;
        debug!(environment = %session.environment, name = %name.full_name(), "Searching by name");

        let reply = self
            .call(
                DriverCommand::SearchByName {
                    given: &name.given_name,
                    paternal: &name.paternal_surname,
                    maternal: &name.maternal_surname,
                },
                Some(session.environment),
            )
            .await?;
        Ok(reply.into_table())
    }

    async fn recycle(&mut self) -> E2eResult<()> {
        info!("Recycling browser context");
        self.sessions.invalidate();
        self.call(DriverCommand::Recycle, None).await?;
        Ok(())
    }

    async fn close(&mut self) -> E2eResult<()> {
        self.sessions.invalidate();
        if let Some(mut driver) = self.driver.take() {
            let limit = Duration::from_millis(self.config.timeouts.action_ms);
            if let Err(e) = driver.request(&DriverCommand::Close, limit).await {
                debug!(error = %e, "Driver did not acknowledge close");
            }
            driver.shutdown().await;
            info!("Playwright driver stopped");
        }
        Ok(())
    }
}

/// Full driver script: the settings object followed by the driver body
pub fn build_driver_script(config: &PlaywrightConfig) -> E2eResult<String> {
    let settings = DriverSettings {
        browser: config.browser.as_str(),
        headless: config.headless,
        viewport_width: config.viewport_width,
        viewport_height: config.viewport_height,
        navigation_timeout_ms: config.timeouts.navigation_ms,
        login_probe_ms: config.timeouts.login_probe_ms,
        login_form_ms: config.timeouts.login_form_ms,
        login_marker_ms: config.timeouts.login_marker_ms,
        action_timeout_ms: config.timeouts.action_ms,
        name_results_ms: config.timeouts.name_results_ms,
        identifier_results_ms: config.timeouts.identifier_results_ms,
    };

    Ok(format!(
        "const CONFIG = {};\n{}",
        serde_json::to_string(&settings)?,
        DRIVER_BODY
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn reply(json: &str) -> DriverReply {
        serde_json::from_str(json).unwrap()
    }

    #[test_case("chromium" => Some(Browser::Chromium) ; "lowercase")]
    #[test_case("Chromium" => Some(Browser::Chromium) ; "mixed case")]
    #[test_case("firefox" => Some(Browser::Firefox) ; "firefox")]
    #[test_case("webkit" => Some(Browser::Webkit) ; "webkit")]
    #[test_case("netscape" => None ; "unknown")]
    fn test_browser_parse(input: &str) -> Option<Browser> {
        input.parse::<Browser>().ok()
    }

    #[test]
    fn test_command_wire_shape() {
        let command = DriverCommand::SearchByName {
            given: "JUAN",
            paternal: "PEREZ",
            maternal: "SOTO",
        };
        let json = serde_json::to_value(Envelope { id: 7, command: &command }).unwrap();

        assert_eq!(json["id"], 7);
        assert_eq!(json["op"], "search_by_name");
        assert_eq!(json["maternal"], "SOTO");

        let json = serde_json::to_value(Envelope { id: 8, command: &DriverCommand::Recycle }).unwrap();
        assert_eq!(json, serde_json::json!({ "id": 8, "op": "recycle" }));
    }

    #[test]
    fn test_script_carries_settings() {
        let mut config = PlaywrightConfig::default();
        config.browser = Browser::Firefox;
        config.timeouts.name_results_ms = 4321;

        let script = build_driver_script(&config).unwrap();
        assert!(script.starts_with("const CONFIG = {"));
        assert!(script.contains("\"browser\":\"firefox\""));
        assert!(script.contains("\"nameResultsMs\":4321"));
        assert!(script.contains("HANDLERS"));
    }

    #[test]
    fn test_successful_reply_becomes_table() {
        let table = reply(r#"{"id":1,"ok":true,"rows":[["123","ANA"]],"notFound":false}"#)
            .into_result(Some(EnvironmentKind::Reference))
            .unwrap()
            .into_table();
        assert_eq!(table.rows, vec![vec!["123".to_string(), "ANA".to_string()]]);
        assert!(!table.not_found);

        let table = reply(r#"{"id":2,"ok":true,"rows":[],"notFound":true}"#)
            .into_result(None)
            .unwrap()
            .into_table();
        assert!(table.not_found);
    }

    #[test]
    fn test_failure_kinds_map_to_errors() {
        let env = Some(EnvironmentKind::Anonymized);
        let err = |json: &str, env| reply(json).into_result(env).unwrap_err();

        assert!(err(r#"{"id":1,"ok":false,"kind":"connectivity","message":"offline"}"#, env).is_connectivity());
        assert!(matches!(
            err(r#"{"id":1,"ok":false,"kind":"timeout","message":"results"}"#, env),
            E2eError::Timeout(_)
        ));
        assert!(matches!(
            err(r#"{"id":1,"ok":false,"kind":"auth","message":"rejected"}"#, env),
            E2eError::Authentication { environment: EnvironmentKind::Anonymized, .. }
        ));
        assert!(matches!(
            err(r#"{"id":1,"ok":false,"kind":"login_prompt","message":"form"}"#, env),
            E2eError::UnexpectedLogin(EnvironmentKind::Anonymized)
        ));
        assert!(matches!(
            err(r#"{"id":1,"ok":false,"kind":"auth","message":"rejected"}"#, None),
            E2eError::Driver(_)
        ));
    }

    #[test]
    fn test_app_failure_with_network_message_is_connectivity() {
        let e = reply(r#"{"id":1,"ok":false,"kind":"app","message":"page.goto: net::ERR_CONNECTION_RESET"}"#)
            .into_result(None)
            .unwrap_err();
        assert!(e.is_connectivity());

        let e = reply(r#"{"id":1,"ok":false,"kind":"app","message":"select has no option"}"#)
            .into_result(None)
            .unwrap_err();
        assert!(!e.is_connectivity());
    }

    /// Driver stand-in answering from a queue of reply lines
    struct ScriptedLink {
        replies: std::collections::VecDeque<&'static str>,
        reload_reply: &'static str,
        sent: Vec<&'static str>,
        reloads: u32,
    }

    impl ScriptedLink {
        fn new(replies: &[&'static str]) -> Self {
            Self {
                replies: replies.iter().copied().collect(),
                reload_reply: r#"{"id":0,"ok":true}"#,
                sent: Vec::new(),
                reloads: 0,
            }
        }
    }

    #[async_trait]
    impl DriverLink for ScriptedLink {
        async fn round_trip(&mut self, command: &DriverCommand<'_>) -> E2eResult<DriverReply> {
            self.sent.push(command.op());
            let line = self
                .replies
                .pop_front()
                .ok_or_else(|| E2eError::Driver("no scripted reply left".to_string()))?;
            Ok(serde_json::from_str(line)?)
        }

        async fn reload(&mut self) -> E2eResult<()> {
            self.reloads += 1;
            reply(self.reload_reply).into_result(None)?;
            Ok(())
        }
    }

    const OFFLINE: &str = r#"{"id":1,"ok":false,"kind":"connectivity","message":"page.goto: net::ERR_INTERNET_DISCONNECTED"}"#;
    const FOUND: &str = r#"{"id":1,"ok":true,"rows":[["123456785","JUAN PEREZ SOTO"]],"notFound":false}"#;

    async fn search(link: &mut ScriptedLink, retry: RetryPolicy) -> E2eResult<DriverReply> {
        let command = DriverCommand::SearchByIdentifier { identifier: "123456785" };
        let mut call = DriverCall {
            link,
            command: &command,
            environment: Some(EnvironmentKind::Reference),
        };
        retry.run_with_recovery(command.op(), &mut call).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_reloads_between_connectivity_retries() {
        let mut link = ScriptedLink::new(&[OFFLINE, OFFLINE, OFFLINE, FOUND]);
        let started = tokio::time::Instant::now();

        let table = search(&mut link, RetryPolicy::unbounded(Duration::from_secs(2)))
            .await
            .unwrap()
            .into_table();

        assert_eq!(table.rows[0][1], "JUAN PEREZ SOTO");
        assert_eq!(link.sent.len(), 4);
        assert_eq!(link.reloads, 3);
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[test_case(r#"{"id":1,"ok":false,"kind":"timeout","message":"results"}"# ; "timeout")]
    #[test_case(r#"{"id":1,"ok":false,"kind":"app","message":"select has no option"}"# ; "app")]
    #[test_case(r#"{"id":1,"ok":false,"kind":"login_prompt","message":"form"}"# ; "login prompt")]
    #[test_case(r#"{"id":1,"ok":false,"kind":"driver","message":"Target page, context or browser has been closed"}"# ; "closed browser")]
    #[tokio::test(start_paused = true)]
    async fn test_call_surfaces_other_failures_at_once(failure: &'static str) {
        let mut link = ScriptedLink::new(&[failure, FOUND]);

        let err = search(&mut link, RetryPolicy::unbounded(Duration::from_secs(2)))
            .await
            .unwrap_err();

        assert!(!err.is_connectivity());
        assert_eq!(link.sent.len(), 1);
        assert_eq!(link.reloads, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_stops_when_reload_finds_browser_gone() {
        let mut link = ScriptedLink::new(&[OFFLINE, OFFLINE, FOUND]);
        link.reload_reply =
            r#"{"id":0,"ok":false,"kind":"driver","message":"Target page, context or browser has been closed"}"#;

        let err = search(&mut link, RetryPolicy::unbounded(Duration::from_secs(2)))
            .await
            .unwrap_err();

        assert!(matches!(err, E2eError::Driver(_)));
        assert_eq!(link.sent.len(), 1);
        assert_eq!(link.reloads, 1);
    }

    #[test]
    fn test_closed_browser_is_not_connectivity() {
        let closed = reply(
            r#"{"id":1,"ok":false,"kind":"driver","message":"Target page, context or browser has been closed"}"#,
        );
        assert!(closed.lost_browser());
        assert!(matches!(closed.into_result(None), Err(E2eError::Driver(_))));

        let e = reply(r#"{"id":1,"ok":false,"kind":"app","message":"page unavailable: Target closed"}"#)
            .into_result(None)
            .unwrap_err();
        assert!(!e.is_connectivity());
    }
}
