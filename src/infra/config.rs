use crate::domain::MAX_DAY_START_HOUR;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const CONFIG_ENV: &str = "STOPWATCH_CONFIG";
pub const DAY_START_HOUR_ENV: &str = "STOPWATCH_DAY_START_HOUR";

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub stopwatch: StopwatchConfig,
    pub http: HttpConfig,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopwatchConfig {
    pub day_start_hour: u32,
    /// Log file; `~/.stopwatch/stopwatch.log` when unset.
    pub log: Option<PathBuf>,
}

impl Default for StopwatchConfig {
    fn default() -> Self {
        Self {
            day_start_hour: 8,
            log: None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Path prefix of the stopwatch endpoints (e.g. when served behind a proxy).
    pub href_prefix: String,
    pub tls: bool,
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            href_prefix: "/stopwatch".to_string(),
            tls: false,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("home directory not found")]
    HomeDirNotFound,

    #[error("failed to read config {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("day_start_hour must be an integer between 0 and 23, got {0}")]
    InvalidDayStartHour(String),

    #[error("invalid server url: {0}")]
    Url(String),

    #[error("failed to encode config: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Config {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.stopwatch.day_start_hour > MAX_DAY_START_HOUR {
            return Err(ConfigError::InvalidDayStartHour(
                self.stopwatch.day_start_hour.to_string(),
            ));
        }
        self.base_url()?;
        Ok(self)
    }

    pub fn day_start_hour(&self) -> u32 {
        self.stopwatch.day_start_hour
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs.max(1))
    }

    /// `http://host[:port]{href_prefix}`; the port is left out when it is the
    /// scheme's default.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let (scheme, default_port) = if self.http.tls {
            ("https", 443)
        } else {
            ("http", 80)
        };
        let host = self.http.host.trim();
        if host.is_empty() {
            return Err(ConfigError::Url("empty host".to_string()));
        }

        let mut raw = format!("{scheme}://{host}");
        if self.http.port != default_port {
            raw.push_str(&format!(":{}", self.http.port));
        }
        raw.push_str(&normalize_prefix(&self.http.href_prefix));

        Url::parse(&raw).map_err(|error| ConfigError::Url(format!("{raw}: {error}")))
    }

    pub fn endpoint_url(&self, path: &str) -> Result<Url, ConfigError> {
        let base = self.base_url()?;
        let raw = format!(
            "{}/{}",
            base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&raw).map_err(|error| ConfigError::Url(format!("{raw}: {error}")))
    }

    pub fn updates_url(&self) -> Result<Url, ConfigError> {
        let mut url = self.endpoint_url("updates")?;
        let scheme = if self.http.tls { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| ConfigError::Url(format!("cannot switch {url} to {scheme}")))?;
        Ok(url)
    }

    pub fn log_path(&self, state_dir: &Path) -> PathBuf {
        match &self.stopwatch.log {
            Some(path) => expand_home(path),
            None => state_dir.join("stopwatch.log"),
        }
    }

    pub fn with_day_start_hour_override(mut self, raw: Option<&str>) -> Result<Self, ConfigError> {
        let Some(raw) = raw else {
            return Ok(self);
        };
        let trimmed = raw.trim();
        let hour = trimmed
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidDayStartHour(trimmed.to_string()))?;
        self.stopwatch.day_start_hour = hour;
        Ok(self)
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

pub fn resolve_state_dir() -> Result<PathBuf, ConfigError> {
    let Some(home) = dirs::home_dir() else {
        return Err(ConfigError::HomeDirNotFound);
    };
    Ok(home.join(".stopwatch"))
}

pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(override_path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(override_path));
    }
    Ok(resolve_state_dir()?.join("config.json"))
}

/// Reads the config file; a missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(error) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                source: error,
            });
        }
    };

    serde_json::from_str(&raw).map_err(|error| ConfigError::Parse {
        path: path.display().to_string(),
        source: error,
    })
}

/// Config file, then environment overrides, then validation.
pub fn load_effective_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let path = resolve_config_path(explicit)?;
    let env_hour = std::env::var(DAY_START_HOUR_ENV).ok();
    load_config(&path)?
        .with_day_start_hour_override(env_hour.as_deref())?
        .validate()
}

pub fn default_config_json() -> Result<String, ConfigError> {
    Ok(serde_json::to_string_pretty(&Config::default())?)
}
