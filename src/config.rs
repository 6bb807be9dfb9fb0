//! Process configuration, read once at startup.
//!
//! Values come from an optional TOML file (path in `HOOK_RELAY_CONFIG`) and
//! are overridden by environment variables. Everything has a default except
//! the Akkeris API token.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RelayError, Result};

pub const DEFAULT_PORT: u16 = 9000;
pub const DEFAULT_AKKERIS_API_URL: &str = "https://controller-api.maru.octanner.io";
pub const DEFAULT_IMAGE_REPO: &str = "akkeris/ui";
pub const DEFAULT_IMAGE_TAG_PREFIX: &str = "release-";
pub const DEFAULT_TAAS_URL: &str = "https://taas-maru.octanner.io";
pub const DEFAULT_TAAS_TEST_NAME: &str = "ui-tests-taas";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SYNC_PERIOD_SECS: u64 = 5 * 60;
pub const DEFAULT_SYNC_OFFSET_SECS: u64 = 60;
pub const MAX_SYNC_PERIOD_SECS: u64 = 24 * 60 * 60;

pub const CONFIG_PATH_VAR: &str = "HOOK_RELAY_CONFIG";

/// How strictly inbound payloads are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Missing fields are answered with 400.
    #[default]
    Strict,
    /// Missing fields are logged and acknowledged with 200.
    Lenient,
}

/// When the webhook caller receives its 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AckMode {
    /// Respond right after validation; resolution runs in the background.
    #[default]
    Immediate,
    /// Respond once the release is resolved and the trigger is scheduled.
    AfterResolve,
}

impl ValidationMode {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(RelayError::StartupConfig(format!(
                "HOOK_VALIDATION must be 'strict' or 'lenient', got '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lenient => "lenient",
        }
    }
}

impl AckMode {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "immediate" => Ok(Self::Immediate),
            "after-resolve" | "after_resolve" => Ok(Self::AfterResolve),
            other => Err(RelayError::StartupConfig(format!(
                "HOOK_ACK must be 'immediate' or 'after-resolve', got '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::AfterResolve => "after-resolve",
        }
    }
}

/// Optional settings file. Keys mirror the environment variables in lower case.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub akkeris_api_token: Option<String>,
    pub akkeris_api_url: Option<String>,
    pub ui_image_repo: Option<String>,
    pub ui_image_tag_prefix: Option<String>,
    pub taas_url: Option<String>,
    pub taas_test_name: Option<String>,
    pub hook_validation: Option<ValidationMode>,
    pub hook_ack: Option<AckMode>,
    pub http_timeout_secs: Option<u64>,
    pub sync_period_secs: Option<u64>,
    pub sync_offset_secs: Option<u64>,
    pub log_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::StartupConfig(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(toml::from_str(&content)?)
    }
}

/// Immutable relay configuration shared by every pipeline.
#[derive(Clone)]
pub struct RelayConfig {
    pub port: u16,
    pub api_token: String,
    pub akkeris_api_url: String,
    pub image_repo: String,
    pub image_tag_prefix: String,
    pub taas_url: String,
    pub test_name: String,
    pub validation: ValidationMode,
    pub ack: AckMode,
    pub http_timeout: Duration,
    pub sync_period: Duration,
    pub sync_offset: Duration,
    pub log_dir: Option<PathBuf>,
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("port", &self.port)
            .field("api_token", &"<redacted>")
            .field("akkeris_api_url", &self.akkeris_api_url)
            .field("image_repo", &self.image_repo)
            .field("image_tag_prefix", &self.image_tag_prefix)
            .field("taas_url", &self.taas_url)
            .field("test_name", &self.test_name)
            .field("validation", &self.validation)
            .field("ack", &self.ack)
            .field("http_timeout", &self.http_timeout)
            .field("sync_period", &self.sync_period)
            .field("sync_offset", &self.sync_offset)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

impl RelayConfig {
    /// Config with every default filled in and the given token.
    pub fn with_token(api_token: impl Into<String>) -> Self {
        Self {
            port: DEFAULT_PORT,
            api_token: api_token.into(),
            akkeris_api_url: DEFAULT_AKKERIS_API_URL.to_string(),
            image_repo: DEFAULT_IMAGE_REPO.to_string(),
            image_tag_prefix: DEFAULT_IMAGE_TAG_PREFIX.to_string(),
            taas_url: DEFAULT_TAAS_URL.to_string(),
            test_name: DEFAULT_TAAS_TEST_NAME.to_string(),
            validation: ValidationMode::default(),
            ack: AckMode::default(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            sync_period: Duration::from_secs(DEFAULT_SYNC_PERIOD_SECS),
            sync_offset: Duration::from_secs(DEFAULT_SYNC_OFFSET_SECS),
            log_dir: None,
        }
    }

    /// Reads the process environment, plus the TOML file it points at.
    pub fn from_env() -> Result<Self> {
        let file = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.is_empty() => FileConfig::load(Path::new(&path))?,
            _ => FileConfig::default(),
        };
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Merges file values with variables from `lookup`; variables win.
    pub fn resolve<F>(file: FileConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let api_token = var("AKKERIS_API_TOKEN")
            .or(file.akkeris_api_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                RelayError::StartupConfig("Missing AKKERIS_API_TOKEN environment variable.".into())
            })?;

        let mut config = Self::with_token(api_token);

        if let Some(port) = var("PORT") {
            config.port = parse_number("PORT", &port)?;
        } else if let Some(port) = file.port {
            config.port = port;
        }

        if let Some(url) = var("AKKERIS_API_URL").or(file.akkeris_api_url) {
            config.akkeris_api_url = trim_base_url(&url);
        }
        if let Some(repo) = var("UI_IMAGE_REPO").or(file.ui_image_repo) {
            config.image_repo = repo;
        }
        // An explicitly empty prefix is allowed and matches every tag.
        if let Some(prefix) = lookup("UI_IMAGE_TAG_PREFIX").or(file.ui_image_tag_prefix) {
            config.image_tag_prefix = prefix;
        }
        if let Some(url) = var("TAAS_URL").or(file.taas_url) {
            config.taas_url = trim_base_url(&url);
        }
        if let Some(name) = var("TAAS_TEST_NAME").or(file.taas_test_name) {
            config.test_name = name;
        }

        config.validation = match var("HOOK_VALIDATION") {
            Some(v) => ValidationMode::parse(&v)?,
            None => file.hook_validation.unwrap_or_default(),
        };
        config.ack = match var("HOOK_ACK") {
            Some(v) => AckMode::parse(&v)?,
            None => file.hook_ack.unwrap_or_default(),
        };

        let timeout = seconds(&var, "HTTP_TIMEOUT_SECS", file.http_timeout_secs)?
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
        let period = seconds(&var, "SYNC_PERIOD_SECS", file.sync_period_secs)?
            .unwrap_or(DEFAULT_SYNC_PERIOD_SECS);
        let offset = seconds(&var, "SYNC_OFFSET_SECS", file.sync_offset_secs)?
            .unwrap_or(DEFAULT_SYNC_OFFSET_SECS);

        if timeout == 0 {
            return Err(RelayError::StartupConfig(
                "HTTP_TIMEOUT_SECS must be greater than zero".into(),
            ));
        }
        if period == 0 || offset == 0 || offset >= period {
            return Err(RelayError::StartupConfig(format!(
                "SYNC_OFFSET_SECS ({}) must be positive and below SYNC_PERIOD_SECS ({})",
                offset, period
            )));
        }
        if period > MAX_SYNC_PERIOD_SECS {
            return Err(RelayError::StartupConfig(format!(
                "SYNC_PERIOD_SECS ({}) must not exceed {}",
                period, MAX_SYNC_PERIOD_SECS
            )));
        }
        config.http_timeout = Duration::from_secs(timeout);
        config.sync_period = Duration::from_secs(period);
        config.sync_offset = Duration::from_secs(offset);

        config.log_dir = var("LOG_DIR").map(PathBuf::from).or(file.log_dir);

        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn seconds<F>(var: &F, key: &str, from_file: Option<u64>) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => parse_number(key, &raw).map(Some),
        None => Ok(from_file),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| RelayError::StartupConfig(format!("{} is not a valid number: '{}'", key, raw)))
}

fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
