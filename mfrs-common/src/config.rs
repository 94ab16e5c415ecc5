//! Configuration loading for the risk service
//!
//! Each setting resolves in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Built-in default (fallback)
//!
//! Command-line and environment values arrive together as
//! [`ConfigOverrides`] (clap reads both); this module merges them with the
//! TOML file and the defaults into a [`ServiceConfig`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, UdpSocket};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_HTTP: &str = ":9000";
pub const DEFAULT_FHIR_URL: &str = "http://localhost:3001";
pub const DEFAULT_CRON: &str = "0 0 22 * * *";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CYCLE_TIMEOUT_SECS: u64 = 1800;

/// Configuration file contents
///
/// Every field is optional; anything missing falls through to the defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub http: Option<String>,
    #[serde(default)]
    pub fhir_url: Option<String>,
    #[serde(default)]
    pub redcap_url: Option<String>,
    #[serde(default)]
    pub redcap_token: Option<String>,
    #[serde(default)]
    pub cron: Option<String>,
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub pie_base_url: Option<String>,
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
    #[serde(default)]
    pub cycle_timeout_secs: Option<u64>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Load a TOML config file
    ///
    /// A missing or unreadable file yields the empty configuration; a file
    /// that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not read config file {}: {}", path.display(), e);
                return Ok(Self::default());
            }
        };

        let config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
        info!("Loaded config file {}", path.display());
        Ok(config)
    }

    /// Load the given file, or the platform default file if none is given
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match default_config_path() {
                Some(path) => Self::load(&path),
                None => Ok(Self::default()),
            },
        }
    }
}

/// Values supplied on the command line or through environment variables
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub http: Option<String>,
    pub fhir_url: Option<String>,
    pub redcap_url: Option<String>,
    pub redcap_token: Option<String>,
    pub cron: Option<String>,
    pub database_path: Option<PathBuf>,
    pub pie_base_url: Option<String>,
    pub http_timeout_secs: Option<u64>,
    pub cycle_timeout_secs: Option<u64>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Listen address as configured (may omit the host, e.g. `:9000`)
    pub http: String,
    /// FHIR server base URL, without trailing slash
    pub fhir_url: String,
    pub redcap_url: String,
    pub redcap_token: String,
    /// Cron expression for scheduled refreshes (seconds field first)
    pub cron: String,
    /// SQLite database holding the risk pies
    pub database_path: PathBuf,
    /// Base URL under which pies are served, without trailing slash
    pub pie_base_url: String,
    /// Bound on every upstream HTTP request
    pub http_timeout: Duration,
    /// Bound on one whole refresh cycle
    pub cycle_timeout: Duration,
}

impl ServiceConfig {
    /// Merge overrides, file values and defaults
    ///
    /// `discover_host` is only called when the pie base URL has to be
    /// derived from a listen address without a host.
    pub fn resolve<F>(overrides: ConfigOverrides, file: TomlConfig, discover_host: F) -> Result<Self>
    where
        F: FnOnce() -> String,
    {
        let http = first_non_empty(overrides.http, file.http)
            .unwrap_or_else(|| DEFAULT_HTTP.to_string());

        let fhir_url = normalize_url(
            &first_non_empty(overrides.fhir_url, file.fhir_url)
                .unwrap_or_else(|| DEFAULT_FHIR_URL.to_string()),
        );

        let redcap_url = first_non_empty(overrides.redcap_url, file.redcap_url).ok_or_else(|| {
            Error::Config(
                "REDCap URL must be passed in as an argument (--redcap) or environment variable (REDCAP_URL)"
                    .to_string(),
            )
        })?;
        let redcap_url = normalize_url(&redcap_url);

        let redcap_token =
            first_non_empty(overrides.redcap_token, file.redcap_token).ok_or_else(|| {
                Error::Config(
                    "REDCap API token must be passed in as an argument (--token) or environment variable (REDCAP_TOKEN)"
                        .to_string(),
                )
            })?;

        let cron = first_non_empty(overrides.cron, file.cron)
            .unwrap_or_else(|| DEFAULT_CRON.to_string());

        let database_path = overrides
            .database_path
            .or(file.database_path)
            .unwrap_or_else(default_database_path);

        let pie_base_url = match first_non_empty(overrides.pie_base_url, file.pie_base_url) {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => derive_pie_base_url(&http, discover_host),
        };

        let http_timeout_secs = overrides
            .http_timeout_secs
            .or(file.http_timeout_secs)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
        let cycle_timeout_secs = overrides
            .cycle_timeout_secs
            .or(file.cycle_timeout_secs)
            .unwrap_or(DEFAULT_CYCLE_TIMEOUT_SECS);
        if http_timeout_secs == 0 || cycle_timeout_secs == 0 {
            return Err(Error::Config("Timeouts must be at least one second".to_string()));
        }

        Ok(Self {
            http,
            fhir_url,
            redcap_url,
            redcap_token,
            cron,
            database_path,
            pie_base_url,
            http_timeout: Duration::from_secs(http_timeout_secs),
            cycle_timeout: Duration::from_secs(cycle_timeout_secs),
        })
    }

    /// Socket address to bind; a missing host binds all interfaces
    pub fn listen_addr(&self) -> String {
        if self.http.starts_with(':') {
            format!("0.0.0.0{}", self.http)
        } else {
            self.http.clone()
        }
    }
}

/// Log level for the tracing filter: the override if set, else the file's
/// `[logging] level`
///
/// Resolved apart from [`ServiceConfig`] because tracing starts before the
/// rest of the configuration is validated.
pub fn resolve_log_level(level: Option<String>, file: &TomlConfig) -> String {
    first_non_empty(level, Some(file.logging.level.clone())).unwrap_or_else(default_log_level)
}

fn first_non_empty(primary: Option<String>, fallback: Option<String>) -> Option<String> {
    primary
        .filter(|v| !v.trim().is_empty())
        .or_else(|| fallback.filter(|v| !v.trim().is_empty()))
}

/// Expand `:port` shorthand to a localhost URL and drop any trailing slash
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let url = if url.starts_with(':') {
        format!("http://localhost{}", url)
    } else {
        url.to_string()
    };
    url.trim_end_matches('/').to_string()
}

/// Base URL for pies served by this process
pub fn derive_pie_base_url<F>(http: &str, discover_host: F) -> String
where
    F: FnOnce() -> String,
{
    let endpoint = if http.starts_with(':') {
        format!("{}{}", discover_host(), http)
    } else {
        http.to_string()
    };
    format!("http://{}/pies", endpoint)
}

/// Find a non-loopback IPv4 address for this host
///
/// Connecting a UDP socket sends no packets; it only selects the outbound
/// interface. Falls back to `localhost`.
pub fn discover_host() -> String {
    let discovered = UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .ok()
        .map(|addr| addr.ip())
        .filter(|ip| matches!(ip, IpAddr::V4(v4) if !v4.is_loopback() && !v4.is_unspecified()));

    match discovered {
        Some(ip) => ip.to_string(),
        None => {
            warn!("Unable to determine IP address. Defaulting to localhost.");
            "localhost".to_string()
        }
    }
}

/// Platform config file location (`~/.config/mfrs/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mfrs").join("config.toml"))
}

/// Platform default location of the pie database
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mfrs").join("riskservice.db"))
        .unwrap_or_else(|| PathBuf::from("./mfrs_data/riskservice.db"))
}
