//! Configuration system (layered: code > env > config file > defaults).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::auth::TokenStore;
use crate::error::{CgmError, Result};
use crate::storage::FileKeyValueStore;

const PRODUCTION_BASE_URL: &str = "https://api.dexcom.com";
const SANDBOX_BASE_URL: &str = "https://sandbox-api.dexcom.com";

/// Default bound on every provider call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default minimum remaining validity before a token is refreshed.
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Provider deployment to talk to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Sandbox,
}

impl Environment {
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_BASE_URL,
            Self::Sandbox => SANDBOX_BASE_URL,
        }
    }
}

/// Settings for the provider integration.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use cgm_link::config::{CgmConfig, Environment};
///
/// let config = CgmConfig::new("client", "secret", "mealtrack://auth/callback")
///     .with_environment(Environment::Sandbox)
///     .with_timeout(Duration::from_secs(10));
/// assert_eq!(config.base_url(), "https://sandbox-api.dexcom.com");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct CgmConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub environment: Environment,
    pub base_url_override: Option<String>,
    pub timeout: Duration,
    pub safety_margin: Duration,
    pub token_dir: Option<PathBuf>,
}

impl fmt::Debug for CgmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CgmConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("environment", &self.environment)
            .field("base_url_override", &self.base_url_override)
            .field("timeout", &self.timeout)
            .field("safety_margin", &self.safety_margin)
            .field("token_dir", &self.token_dir)
            .finish()
    }
}

impl Default for CgmConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            environment: Environment::default(),
            base_url_override: None,
            timeout: DEFAULT_TIMEOUT,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            token_dir: None,
        }
    }
}

impl CgmConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            ..Self::default()
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Point at an explicit base URL (mock servers, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url_override = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = margin;
        self
    }

    pub fn with_token_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.token_dir = Some(dir.into());
        self
    }

    /// Load from environment variables (`CGM_CLIENT_ID`, `CGM_CLIENT_SECRET`, ...).
    ///
    /// A `.env` file in the working directory is honored when present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::default().merge_lookup(|name| std::env::var(name).ok())
    }

    /// Load a TOML config file, then let environment variables override it.
    pub fn from_file_and_env(path: impl AsRef<Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::load_from_path(path)?.merge_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings from a TOML file on top of the defaults.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            CgmError::Configuration(format!("cannot read {}: {err}", path.display()))
        })?;
        let file: ConfigFile = toml::from_str(&raw).map_err(|err| {
            CgmError::Configuration(format!("invalid config {}: {err}", path.display()))
        })?;
        Ok(Self::default().merge_file(file))
    }

    fn merge_file(mut self, file: ConfigFile) -> Self {
        if let Some(value) = file.client_id {
            self.client_id = value;
        }
        if let Some(value) = file.client_secret {
            self.client_secret = value;
        }
        if let Some(value) = file.redirect_uri {
            self.redirect_uri = value;
        }
        if let Some(value) = file.environment {
            self.environment = value;
        }
        if file.base_url.is_some() {
            self.base_url_override = file.base_url;
        }
        if let Some(secs) = file.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.safety_margin_secs {
            self.safety_margin = Duration::from_secs(secs);
        }
        if file.token_dir.is_some() {
            self.token_dir = file.token_dir;
        }
        self
    }

    pub(crate) fn merge_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup("CGM_CLIENT_ID") {
            self.client_id = value;
        }
        if let Some(value) = lookup("CGM_CLIENT_SECRET") {
            self.client_secret = value;
        }
        if let Some(value) = lookup("CGM_REDIRECT_URI") {
            self.redirect_uri = value;
        }
        if let Some(value) = lookup("CGM_ENVIRONMENT") {
            self.environment = Environment::from_str(value.trim()).map_err(|_| {
                CgmError::Configuration(format!(
                    "CGM_ENVIRONMENT must be production or sandbox, got {value:?}"
                ))
            })?;
        }
        if let Some(value) = lookup("CGM_BASE_URL") {
            self.base_url_override = Some(value);
        }
        if let Some(value) = lookup("CGM_TIMEOUT_SECS") {
            self.timeout = Duration::from_secs(parse_secs("CGM_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = lookup("CGM_SAFETY_MARGIN_SECS") {
            self.safety_margin =
                Duration::from_secs(parse_secs("CGM_SAFETY_MARGIN_SECS", &value)?);
        }
        if let Some(value) = lookup("CGM_TOKEN_DIR") {
            self.token_dir = Some(PathBuf::from(value));
        }
        Ok(self)
    }

    /// Base URL for provider requests, without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url_override
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
            .trim_end_matches('/')
    }

    /// Directory the file-backed token store writes to.
    pub fn resolved_token_dir(&self) -> PathBuf {
        self.token_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// Token store persisted under [`resolved_token_dir`](Self::resolved_token_dir).
    pub fn file_token_store(&self) -> TokenStore {
        TokenStore::new(Arc::new(FileKeyValueStore::new(self.resolved_token_dir())))
    }

    /// Check that the settings needed to talk to the provider are present.
    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(CgmError::Configuration(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }
        Url::parse(self.base_url()).map_err(|err| {
            CgmError::Configuration(format!("invalid base URL {:?}: {err}", self.base_url()))
        })?;
        if self.timeout.is_zero() {
            return Err(CgmError::Configuration(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.client_id.trim().is_empty() {
            missing.push("client_id");
        }
        if self.client_secret.trim().is_empty() {
            missing.push("client_secret");
        }
        if self.redirect_uri.trim().is_empty() {
            missing.push("redirect_uri");
        }
        missing
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    environment: Option<Environment>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    safety_margin_secs: Option<u64>,
    token_dir: Option<PathBuf>,
}

fn parse_secs(name: &str, value: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|_| {
        CgmError::Configuration(format!("{name} must be a whole number of seconds, got {value:?}"))
    })
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "cgm-link")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".cgm-link"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn env_lookup_populates_every_field() {
        let config = CgmConfig::default()
            .merge_lookup(lookup(&[
                ("CGM_CLIENT_ID", "id"),
                ("CGM_CLIENT_SECRET", "secret"),
                ("CGM_REDIRECT_URI", "mealtrack://auth/callback"),
                ("CGM_ENVIRONMENT", "Sandbox"),
                ("CGM_TIMEOUT_SECS", "12"),
                ("CGM_SAFETY_MARGIN_SECS", "120"),
                ("CGM_TOKEN_DIR", "/var/lib/cgm"),
            ]))
            .unwrap();
        assert_eq!(config.client_id, "id");
        assert_eq!(config.environment, Environment::Sandbox);
        assert_eq!(config.base_url(), SANDBOX_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(12));
        assert_eq!(config.safety_margin, Duration::from_secs(120));
        assert_eq!(config.resolved_token_dir(), PathBuf::from("/var/lib/cgm"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn base_url_override_wins_and_is_trimmed() {
        let config = CgmConfig::new("id", "secret", "app://cb")
            .with_environment(Environment::Sandbox)
            .with_base_url("http://127.0.0.1:9999/");
        assert_eq!(config.base_url(), "http://127.0.0.1:9999");
    }

    #[test]
    fn invalid_numbers_and_environments_are_rejected() {
        let err = CgmConfig::default()
            .merge_lookup(lookup(&[("CGM_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, CgmError::Configuration(msg) if msg.contains("CGM_TIMEOUT_SECS")));

        let err = CgmConfig::default()
            .merge_lookup(lookup(&[("CGM_ENVIRONMENT", "staging")]))
            .unwrap_err();
        assert!(matches!(err, CgmError::Configuration(_)));
    }

    #[test]
    fn validate_lists_missing_fields() {
        let err = CgmConfig::default().validate().unwrap_err();
        match err {
            CgmError::Configuration(msg) => {
                assert!(msg.contains("client_id"));
                assert!(msg.contains("client_secret"));
                assert!(msg.contains("redirect_uri"));
            }
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let config = CgmConfig::new("id", "secret", "app://cb").with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        let config = CgmConfig::new("id", "super-secret", "app://cb");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn toml_file_is_layered_under_env() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cgm-link.toml");
        std::fs::write(
            &path,
            r#"
client_id = "file-id"
client_secret = "file-secret"
redirect_uri = "app://cb"
environment = "sandbox"
timeout_secs = 5
"#,
        )
        .unwrap();

        let config = CgmConfig::load_from_path(&path)
            .unwrap()
            .merge_lookup(lookup(&[("CGM_CLIENT_ID", "env-id")]))
            .unwrap();
        assert_eq!(config.client_id, "env-id");
        assert_eq!(config.client_secret, "file-secret");
        assert_eq!(config.environment, Environment::Sandbox);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.safety_margin, DEFAULT_SAFETY_MARGIN);
    }

    #[test]
    fn unknown_toml_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cgm-link.toml");
        std::fs::write(&path, "client_idd = \"typo\"\n").unwrap();
        assert!(matches!(
            CgmConfig::load_from_path(&path),
            Err(CgmError::Configuration(_))
        ));
    }

    #[test]
    fn environment_round_trips_through_strings() {
        assert_eq!(Environment::Production.to_string(), "production");
        assert_eq!("SANDBOX".parse::<Environment>().unwrap(), Environment::Sandbox);
    }
}
