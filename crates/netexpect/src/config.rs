//! Configuration types for netexpect.
//!
//! This module defines configuration structures for sessions, credentials,
//! timeouts, and the externally tunable prompt patterns.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{NetError, Result};
use crate::pattern::Pattern;

/// Default login timeout (30 seconds).
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default per-command stall timeout (45 seconds).
///
/// This bounds stalls, not total duration: it resets whenever new data
/// arrives from the device.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(45);

/// Default settle window used when reading "the next settled line" during
/// prompt detection.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_millis(300);

/// Default close timeout for graceful teardown.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of extra connect retries (total tries = retries + 1).
pub const DEFAULT_CONNECT_RETRIES: usize = 1;

/// Retry bound shared by prompt detection and tentative-prompt confirmation.
pub const PROMPT_RETRY_BOUND: usize = 25;

/// Default terminal dimensions.
pub const DEFAULT_TERMINAL_WIDTH: u16 = 132;
/// Default terminal height.
pub const DEFAULT_TERMINAL_HEIGHT: u16 = 24;

/// Default spawn-command templates, tried in order on every connect attempt.
pub const DEFAULT_SPAWN_TEMPLATES: &[&str] = &[
    "ssh -x -l {username} -p {port} {address}",
    "telnet {address}",
    "ssh -x -o StrictHostKeyChecking=no -l {username} -p {port} {address}",
    "telnet -8 {address}",
];

/// Authentication material for one device.
#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    /// Login username. Empty together with `password` selects no-login mode.
    #[serde(default)]
    pub username: String,

    /// Login password.
    #[serde(default)]
    pub password: String,

    /// Privileged-mode (enable) password; `None` skips enable negotiation.
    #[serde(default)]
    pub enable_password: Option<String>,
}

impl Credentials {
    /// Create credentials with a username and password.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            enable_password: None,
        }
    }

    /// Set the enable password.
    #[must_use]
    pub fn enable_password(mut self, password: impl Into<String>) -> Self {
        self.enable_password = Some(password.into());
        self
    }

    /// Check whether this credential set selects no-login mode.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

/// Source consulted at connect time for credential fields left empty in the
/// configuration, typically by asking the operator.
pub trait CredentialSource: std::fmt::Debug + Send + Sync {
    /// Obtain the login username for `address`.
    fn username(&self, address: &str) -> std::io::Result<String>;

    /// Obtain the login password for `address`. Implementations must not
    /// echo the collected value.
    fn password(&self, address: &str) -> std::io::Result<String>;
}

/// Interactive credential collection on the controlling terminal.
///
/// Usernames are read with normal echo; passwords are read with terminal
/// echo disabled for the duration of the read.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct TtyPrompt;

#[cfg(unix)]
impl TtyPrompt {
    fn open_tty() -> std::io::Result<std::fs::File> {
        std::fs::OpenOptions::new().read(true).write(true).open("/dev/tty")
    }

    fn read_line(tty: &mut std::fs::File) -> std::io::Result<String> {
        use std::io::Read;
        // Byte at a time: the tty must not be buffered past the newline.
        let mut line = String::new();
        let mut byte = [0u8; 1];
        loop {
            if tty.read(&mut byte)? == 0 || byte[0] == b'\n' {
                return Ok(line.trim_end().to_string());
            }
            line.push(char::from(byte[0]));
        }
    }
}

#[cfg(unix)]
impl CredentialSource for TtyPrompt {
    fn username(&self, address: &str) -> std::io::Result<String> {
        use std::io::Write;
        let mut tty = Self::open_tty()?;
        write!(tty, "{address} username: ")?;
        tty.flush()?;
        Self::read_line(&mut tty)
    }

    fn password(&self, address: &str) -> std::io::Result<String> {
        use std::io::Write;
        let mut tty = Self::open_tty()?;
        write!(tty, "{address} password: ")?;
        tty.flush()?;

        let saved = rustix::termios::tcgetattr(&tty).map_err(errno_to_io)?;
        let mut masked = saved.clone();
        masked.local_modes &= !rustix::termios::LocalModes::ECHO;
        rustix::termios::tcsetattr(&tty, rustix::termios::OptionalActions::Flush, &masked)
            .map_err(errno_to_io)?;

        let line = Self::read_line(&mut tty);
        let restored =
            rustix::termios::tcsetattr(&tty, rustix::termios::OptionalActions::Flush, &saved);
        writeln!(tty)?;

        let line = line?;
        restored.map_err(errno_to_io)?;
        Ok(line)
    }
}

#[cfg(unix)]
fn errno_to_io(e: rustix::io::Errno) -> std::io::Error {
    std::io::Error::from_raw_os_error(e.raw_os_error())
}

// Passwords must never leak through Debug output.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("enable_password", &self.enable_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Configuration for timeouts.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for the whole login negotiation.
    pub login: Duration,

    /// Per-command stall timeout (resets on any received data).
    pub command: Duration,

    /// Quiet window after which a partial read is considered settled.
    pub settle: Duration,

    /// Timeout for graceful close before escalating to a kill signal.
    pub close: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            login: DEFAULT_LOGIN_TIMEOUT,
            command: DEFAULT_COMMAND_TIMEOUT,
            settle: DEFAULT_SETTLE_TIMEOUT,
            close: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

impl TimeoutConfig {
    /// Set the login timeout.
    #[must_use]
    pub const fn login(mut self, timeout: Duration) -> Self {
        self.login = timeout;
        self
    }

    /// Set the command stall timeout.
    #[must_use]
    pub const fn command(mut self, timeout: Duration) -> Self {
        self.command = timeout;
        self
    }

    /// Set the settle window.
    #[must_use]
    pub const fn settle(mut self, timeout: Duration) -> Self {
        self.settle = timeout;
        self
    }
}

/// Externally configurable prompt patterns.
///
/// These are collaborator-supplied tunables, not hardcoded heuristics: every
/// field is a regular expression source string, compiled once per session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptPatterns {
    /// Username/login prompt.
    pub username_prompt: String,
    /// Password prompt.
    pub password_prompt: String,
    /// Connection rejected before login (refused, timed out, bad host key).
    pub bad_open: String,
    /// Authentication rejected.
    pub bad_password: String,
    /// Shape of a candidate command prompt line.
    pub prompt_shape: String,
    /// Pagination ("more output") prompt.
    pub pagination: String,
}

impl Default for PromptPatterns {
    fn default() -> Self {
        Self {
            username_prompt: r"(?i)(user ?name|login)\s*:\s*$".into(),
            password_prompt: r"(?i)pass(word|code)\s*:\s*$".into(),
            bad_open: r"(?i)(connection refused|connection timed out|connection closed by|no route to host|host key verification failed|unknown host|name or service not known)".into(),
            bad_password: r"(?i)(permission denied|authentication failed|login invalid|access denied|bad passwords|bad secrets|incorrect password)".into(),
            prompt_shape: r"(?m)^[\w.@/()-]+[#>$%]\s?$".into(),
            pagination: r"(?i) ?(--+ ?more ?--+|<-+ ?more ?-+>) ?".into(),
        }
    }
}

impl PromptPatterns {
    /// Compile every pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex source is invalid.
    pub fn compile(&self) -> Result<CompiledPrompts> {
        Ok(CompiledPrompts {
            username_prompt: Pattern::regex(&self.username_prompt)?,
            password_prompt: Pattern::regex(&self.password_prompt)?,
            bad_open: Pattern::regex(&self.bad_open)?,
            bad_password: Pattern::regex(&self.bad_password)?,
            prompt_shape: Pattern::regex(&self.prompt_shape)?,
            pagination: Pattern::regex(&self.pagination)?,
        })
    }
}

/// Compiled form of [`PromptPatterns`].
#[derive(Debug, Clone)]
pub struct CompiledPrompts {
    /// Username/login prompt.
    pub username_prompt: Pattern,
    /// Password prompt.
    pub password_prompt: Pattern,
    /// Connection rejected before login.
    pub bad_open: Pattern,
    /// Authentication rejected.
    pub bad_password: Pattern,
    /// Shape of a candidate command prompt line.
    pub prompt_shape: Pattern,
    /// Pagination prompt.
    pub pagination: Pattern,
}

/// Bastion (jump host) configuration.
///
/// The bastion is spawned and fully authenticated first; the target spawn
/// command is then transmitted as a line of input through the open bastion
/// channel instead of spawning a second process.
#[derive(Debug, Clone, Deserialize)]
pub struct BastionConfig {
    /// Bastion address.
    pub address: String,

    /// Bastion port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bastion credentials; `None` reuses the session credentials.
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

fn default_port() -> u16 {
    22
}

/// Configuration for one device session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Target address or hostname.
    pub address: String,

    /// Target port, substituted into `{port}` placeholders.
    pub port: u16,

    /// Authentication material.
    pub credentials: Credentials,

    /// Optional source consulted at connect time for credential fields left
    /// empty in `credentials`.
    pub credential_source: Option<Arc<dyn CredentialSource>>,

    /// Spawn-command templates, tried in order.
    pub spawn_templates: Vec<String>,

    /// Optional bastion host to hop through.
    pub bastion: Option<BastionConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Extra connect retries beyond the first attempt.
    pub retries: usize,

    /// Terminal dimensions (cols, rows).
    pub dimensions: (u16, u16),

    /// Prompt pattern configuration.
    pub prompts: PromptPatterns,

    /// Transcript file to append command/output pairs to (record mode).
    pub record_path: Option<PathBuf>,

    /// Transcript file to replay instead of spawning a process.
    pub replay_path: Option<PathBuf>,
}

impl SessionConfig {
    /// Create a configuration for the given target address.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: 22,
            credentials: Credentials::default(),
            credential_source: None,
            spawn_templates: DEFAULT_SPAWN_TEMPLATES.iter().map(ToString::to_string).collect(),
            bastion: None,
            timeouts: TimeoutConfig::default(),
            retries: DEFAULT_CONNECT_RETRIES,
            dimensions: (DEFAULT_TERMINAL_WIDTH, DEFAULT_TERMINAL_HEIGHT),
            prompts: PromptPatterns::default(),
            record_path: None,
            replay_path: None,
        }
    }

    /// Set the credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the target port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set a credential source consulted at connect time when the username
    /// or password is empty (e.g. [`TtyPrompt`] for interactive collection).
    #[must_use]
    pub fn credential_source(mut self, source: Arc<dyn CredentialSource>) -> Self {
        self.credential_source = Some(source);
        self
    }

    /// Replace the spawn-command templates (at most four are attempted).
    #[must_use]
    pub fn spawn_templates<I, S>(mut self, templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spawn_templates = templates.into_iter().map(Into::into).collect();
        self
    }

    /// Set the bastion host.
    #[must_use]
    pub fn bastion(mut self, bastion: BastionConfig) -> Self {
        self.bastion = Some(bastion);
        self
    }

    /// Set the timeout configuration.
    #[must_use]
    pub const fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the retry count.
    #[must_use]
    pub const fn retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Set the prompt patterns.
    #[must_use]
    pub fn prompts(mut self, prompts: PromptPatterns) -> Self {
        self.prompts = prompts;
        self
    }

    /// Record every command/output pair to the given transcript file.
    #[must_use]
    pub fn record_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.record_path = Some(path.into());
        self
    }

    /// Replay commands from the given transcript file instead of spawning.
    #[must_use]
    pub fn replay_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.replay_path = Some(path.into());
        self
    }

    /// Check whether this session runs in replay mode.
    #[must_use]
    pub const fn is_replay(&self) -> bool {
        self.replay_path.is_some()
    }

    /// Check whether login should be skipped entirely: username and password
    /// both intentionally empty, with no credential source to ask.
    #[must_use]
    pub fn is_no_login(&self) -> bool {
        self.credentials.is_empty() && self.credential_source.is_none()
    }

    /// Fill empty credential fields from the configured credential source.
    ///
    /// Called once per connect, before spawn templates are rendered (the
    /// username feeds `{username}` placeholders). A no-op without a source.
    ///
    /// # Errors
    ///
    /// Returns the source's I/O error with collection context.
    pub fn resolve_credentials(&mut self) -> Result<()> {
        let Some(source) = self.credential_source.clone() else {
            return Ok(());
        };
        if self.credentials.username.is_empty() {
            self.credentials.username = source
                .username(&self.address)
                .map_err(|e| NetError::io_context("collecting username", e))?;
        }
        if self.credentials.password.is_empty() {
            self.credentials.password = source
                .password(&self.address)
                .map_err(|e| NetError::io_context("collecting password", e))?;
        }
        Ok(())
    }

    /// Every configured secret value, for log redaction.
    #[must_use]
    pub fn secrets(&self) -> Vec<String> {
        let mut secrets = Vec::new();
        if !self.credentials.password.is_empty() {
            secrets.push(self.credentials.password.clone());
        }
        if let Some(enable) = &self.credentials.enable_password {
            secrets.push(enable.clone());
        }
        if let Some(creds) = self.bastion.as_ref().and_then(|b| b.credentials.as_ref()) {
            if !creds.password.is_empty() {
                secrets.push(creds.password.clone());
            }
        }
        secrets
    }

    /// Load a session configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the TOML does not parse or required
    /// fields are missing.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: FileConfig =
            toml::from_str(text).map_err(|e| NetError::config(format!("invalid TOML: {e}")))?;
        Ok(file.into_config())
    }
}

/// On-disk representation of a session configuration.
///
/// Durations are expressed in milliseconds so the TOML stays flat.
#[derive(Debug, Deserialize)]
struct FileConfig {
    address: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    credentials: Credentials,
    #[serde(default)]
    spawn_templates: Option<Vec<String>>,
    #[serde(default)]
    bastion: Option<BastionConfig>,
    #[serde(default)]
    login_timeout_ms: Option<u64>,
    #[serde(default)]
    command_timeout_ms: Option<u64>,
    #[serde(default)]
    retries: Option<usize>,
    #[serde(default)]
    prompts: PromptPatterns,
    #[serde(default)]
    record_path: Option<PathBuf>,
    #[serde(default)]
    replay_path: Option<PathBuf>,
}

impl FileConfig {
    fn into_config(self) -> SessionConfig {
        let mut config = SessionConfig::new(self.address).port(self.port);
        config.credentials = self.credentials;
        if let Some(templates) = self.spawn_templates {
            config.spawn_templates = templates;
        }
        config.bastion = self.bastion;
        if let Some(ms) = self.login_timeout_ms {
            config.timeouts.login = Duration::from_millis(ms);
        }
        if let Some(ms) = self.command_timeout_ms {
            config.timeouts.command = Duration::from_millis(ms);
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        config.prompts = self.prompts;
        config.record_path = self.record_path;
        config.replay_path = self.replay_path;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_builder() {
        let config = SessionConfig::new("r1.example.net")
            .port(2022)
            .credentials(Credentials::new("admin", "secret").enable_password("enable"))
            .retries(3);

        assert_eq!(config.address, "r1.example.net");
        assert_eq!(config.port, 2022);
        assert_eq!(config.retries, 3);
        assert!(!config.is_no_login());
        assert_eq!(config.secrets(), vec!["secret".to_string(), "enable".to_string()]);
    }

    #[test]
    fn empty_credentials_select_no_login() {
        let config = SessionConfig::new("r1");
        assert!(config.is_no_login());
        assert!(config.secrets().is_empty());
    }

    #[derive(Debug)]
    struct ScriptedSource;

    impl CredentialSource for ScriptedSource {
        fn username(&self, _address: &str) -> std::io::Result<String> {
            Ok("opsuser".into())
        }

        fn password(&self, _address: &str) -> std::io::Result<String> {
            Ok("opspw".into())
        }
    }

    #[test]
    fn credential_source_fills_empty_fields() {
        let mut config = SessionConfig::new("r1").credential_source(Arc::new(ScriptedSource));
        // A source means "ask", not "skip login".
        assert!(!config.is_no_login());

        config.resolve_credentials().unwrap();
        assert_eq!(config.credentials.username, "opsuser");
        assert_eq!(config.credentials.password, "opspw");
        assert_eq!(config.secrets(), vec!["opspw".to_string()]);
    }

    #[test]
    fn credential_source_keeps_configured_fields() {
        let mut config = SessionConfig::new("r1")
            .credentials(Credentials::new("admin", ""))
            .credential_source(Arc::new(ScriptedSource));

        config.resolve_credentials().unwrap();
        assert_eq!(config.credentials.username, "admin");
        assert_eq!(config.credentials.password, "opspw");
    }

    #[derive(Debug)]
    struct UnavailableSource;

    impl CredentialSource for UnavailableSource {
        fn username(&self, _address: &str) -> std::io::Result<String> {
            Err(std::io::Error::other("no terminal"))
        }

        fn password(&self, _address: &str) -> std::io::Result<String> {
            Err(std::io::Error::other("no terminal"))
        }
    }

    #[test]
    fn credential_source_failure_carries_context() {
        let mut config = SessionConfig::new("r1").credential_source(Arc::new(UnavailableSource));
        let err = config.resolve_credentials().unwrap_err();
        assert!(matches!(err, NetError::IoWithContext { .. }));
        assert!(err.to_string().contains("collecting username"));
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::new("admin", "hunter2").enable_password("s3cret");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("admin"));
    }

    #[test]
    fn default_prompt_patterns_compile() {
        assert!(PromptPatterns::default().compile().is_ok());
    }

    #[test]
    fn default_patterns_match_common_prompts() {
        let prompts = PromptPatterns::default().compile().unwrap();
        assert!(prompts.username_prompt.matches("Username: ").is_some());
        assert!(prompts.password_prompt.matches("Password: ").is_some());
        assert!(prompts.prompt_shape.matches("router1#\n").is_some());
        assert!(prompts.prompt_shape.matches("sw-core.pop1>\n").is_some());
        assert!(prompts.pagination.matches(" --More-- ").is_some());
        assert!(prompts.bad_open.matches("telnet: Connection refused").is_some());
        assert!(prompts.bad_password.matches("% Access denied").is_some());
    }

    #[test]
    fn prompt_shape_rejects_output_lines() {
        let prompts = PromptPatterns::default().compile().unwrap();
        assert!(prompts.prompt_shape.matches("Cisco IOS Software, Version 15.2\n").is_none());
    }

    #[test]
    fn from_toml_str_minimal() {
        let config = SessionConfig::from_toml_str(r#"address = "r1.example.net""#).unwrap();
        assert_eq!(config.address, "r1.example.net");
        assert_eq!(config.port, 22);
        assert!(config.is_no_login());
    }

    #[test]
    fn from_toml_str_full() {
        let toml = r#"
            address = "r2.example.net"
            port = 23
            login_timeout_ms = 5000
            retries = 2

            [credentials]
            username = "ops"
            password = "pw"
        "#;
        let config = SessionConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.port, 23);
        assert_eq!(config.timeouts.login, Duration::from_millis(5000));
        assert_eq!(config.retries, 2);
        assert_eq!(config.credentials.username, "ops");
    }

    #[test]
    fn from_toml_str_invalid() {
        assert!(SessionConfig::from_toml_str("not toml at all [").is_err());
    }
}
