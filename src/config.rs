//! Runtime configuration.
//!
//! Values are layered: built-in defaults, then the optional TOML file, then
//! environment variables, then whatever the command line overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::sender::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};
use crate::store::CACHE_NAMESPACE;

/// Environment variable overriding the collection server.
pub const ENV_URL: &str = "HOSTREPORT_URL";
/// Environment variable overriding the probe filesystem root.
pub const ENV_ROOT: &str = "HOSTREPORT_ROOT";
/// Environment variable toggling whether opt-outs reach the server.
pub const ENV_SEND_OPT_OUT: &str = "HOSTREPORT_SEND_OPT_OUT";
/// Base cache directory override.
pub const ENV_CACHE_HOME: &str = "XDG_CACHE_HOME";

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Collection server base URL.
    pub url: Option<String>,
    /// Request deadline in seconds.
    pub timeout_secs: Option<u64>,
    /// Whether opt-outs are reported to the server.
    pub send_opt_out: Option<bool>,
}

/// Effective configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base cache directory; records live in its `hostreport/` folder.
    pub cache_dir: PathBuf,
    /// Collection server base URL.
    pub endpoint: String,
    /// Deadline for the POST.
    pub timeout: Duration,
    /// Whether opt-outs are sent to the server or only stored.
    pub send_opt_out: bool,
    /// Filesystem root probes read from.
    pub root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            send_opt_out: true,
            root: PathBuf::from("/"),
        }
    }
}

impl Config {
    /// Defaults, the user's config file if present, then the environment.
    pub fn load() -> Result<Self> {
        let mut config = match user_config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with one TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let file: FileConfig = toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))?;

        debug!("Loaded configuration from {}", path.display());
        let mut config = Self::default();
        config.apply_file(file);
        Ok(config)
    }

    /// Overlay values from a parsed config file.
    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(url) = file.url {
            self.endpoint = url;
        }
        if let Some(secs) = file.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(send) = file.send_opt_out {
            self.send_opt_out = send;
        }
    }

    /// Overlay values from environment variables, looked up through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |name: &str| lookup(name).filter(|value| !value.is_empty());

        if let Some(cache) = get(ENV_CACHE_HOME) {
            self.cache_dir = PathBuf::from(cache);
        }
        if let Some(url) = get(ENV_URL) {
            self.endpoint = url;
        }
        if let Some(root) = get(ENV_ROOT) {
            self.root = PathBuf::from(root);
        }
        if let Some(send) = get(ENV_SEND_OPT_OUT) {
            self.send_opt_out = parse_bool(&send).ok_or_else(|| {
                Error::ConfigError(format!(
                    "{} must be true or false, got {}",
                    ENV_SEND_OPT_OUT, send
                ))
            })?;
        }
        Ok(())
    }

    /// Override the collection server.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Override the base cache directory.
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    /// Override the probe root.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Override the opt-out transmission policy.
    pub fn with_send_opt_out(mut self, send_opt_out: bool) -> Self {
        self.send_opt_out = send_opt_out;
        self
    }

    /// Override the request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject settings that can't work.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| Error::ConfigError(format!("Invalid URL {}: {}", self.endpoint, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::ConfigError(format!(
                "URL must be http or https: {}",
                self.endpoint
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::ConfigError("timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// The platform cache directory. `XDG_CACHE_HOME` is applied by [`Config::apply_env`].
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir().unwrap_or_else(std::env::temp_dir)
}

/// `<config dir>/hostreport/config.toml`.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CACHE_NAMESPACE).join("config.toml"))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
