use crate::error::{ProvisionError, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_SITE_NAME: &str = "mysite";
pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const DEFAULT_WEB_PARENT: &str = "/var/www";
pub const DEFAULT_NGINX_DIR: &str = "/etc/nginx";
pub const DEFAULT_SSL_DIR: &str = "/etc/nginx/ssl";
pub const DEFAULT_LETSENCRYPT_DIR: &str = "/etc/letsencrypt";
pub const DEFAULT_METADATA_URL: &str = "http://169.254.169.254";
pub const DEFAULT_IP_ECHO_URL: &str = "https://api.ipify.org";
pub const DEFAULT_LOCAL_PROBE_URL: &str = "https://127.0.0.1/";
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;

/// Optional settings file
///
/// Every field is optional. Values here act as defaults that the environment
/// variables override.
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub site_name: Option<String>,
    pub web_root: Option<PathBuf>,
    pub domain: Option<String>,
    pub email: Option<String>,
    pub timezone: Option<String>,
    pub nginx_dir: Option<PathBuf>,
    pub ssl_dir: Option<PathBuf>,
    pub letsencrypt_dir: Option<PathBuf>,
    pub metadata_url: Option<String>,
    pub ip_echo_url: Option<String>,
    pub local_probe_url: Option<String>,
    pub probe_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Load settings from a JSON5 file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!("Loading configuration file {}", path.display());
        let config_str = fs::read_to_string(path).map_err(ProvisionError::ConfigRead)?;
        let config: FileConfig = json5::from_str(&config_str)?;
        tracing::info!("Configuration file {} loaded", path.display());
        Ok(config)
    }
}

/// URLs of the HTTP services the run talks to
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    /// Base of the instance metadata service
    pub metadata_url: Url,
    /// External service answering with the caller's public IP as plain text
    pub ip_echo_url: Url,
    /// Loopback HTTPS URL used for the local reachability probe
    pub local_probe_url: Url,
}

/// Fully resolved settings for one run; immutable once built.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub site_name: String,
    pub web_root: PathBuf,
    pub domain: Option<String>,
    pub email: Option<String>,
    pub timezone: Tz,
    /// Deployment time rendered in `timezone`
    pub timestamp: String,
    pub nginx_dir: PathBuf,
    pub ssl_dir: PathBuf,
    pub letsencrypt_dir: PathBuf,
    pub endpoints: Endpoints,
    pub probe_timeout: Duration,
}

impl SiteConfig {
    /// Resolve the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured endpoint is not a valid URL
    pub fn from_env(file: FileConfig) -> Result<Self> {
        Self::resolve(file, |key| std::env::var(key).ok(), Utc::now())
    }

    /// Resolve the configuration from `lookup`, layered over `file`.
    ///
    /// Empty variables count as unset. An unknown timezone falls back to UTC.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured endpoint is not a valid URL
    pub fn resolve<F>(file: FileConfig, lookup: F, now: DateTime<Utc>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let site_name = var("SITE_NAME")
            .or(file.site_name)
            .unwrap_or_else(|| DEFAULT_SITE_NAME.to_string());
        let web_root = var("WEB_ROOT")
            .map(PathBuf::from)
            .or(file.web_root)
            .unwrap_or_else(|| Path::new(DEFAULT_WEB_PARENT).join(&site_name));
        let domain = var("DOMAIN").or(file.domain);
        let email = var("EMAIL").or(file.email);

        let tz_name = var("TZ")
            .or(file.timezone)
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone = tz_name.parse::<Tz>().unwrap_or_else(|_| {
            tracing::warn!("Unknown timezone {tz_name:?}, falling back to {DEFAULT_TIMEZONE}");
            Tz::UTC
        });
        let timestamp = crate::utils::format_timestamp(now, timezone);

        let endpoints = Endpoints {
            metadata_url: parse_url(file.metadata_url.as_deref(), DEFAULT_METADATA_URL)?,
            ip_echo_url: parse_url(file.ip_echo_url.as_deref(), DEFAULT_IP_ECHO_URL)?,
            local_probe_url: parse_url(file.local_probe_url.as_deref(), DEFAULT_LOCAL_PROBE_URL)?,
        };

        let config = SiteConfig {
            site_name,
            web_root,
            domain,
            email,
            timezone,
            timestamp,
            nginx_dir: file.nginx_dir.unwrap_or_else(|| DEFAULT_NGINX_DIR.into()),
            ssl_dir: file.ssl_dir.unwrap_or_else(|| DEFAULT_SSL_DIR.into()),
            letsencrypt_dir: file
                .letsencrypt_dir
                .unwrap_or_else(|| DEFAULT_LETSENCRYPT_DIR.into()),
            endpoints,
            probe_timeout: Duration::from_secs(
                file.probe_timeout_secs.unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS),
            ),
        };

        tracing::info!(
            "Resolved site {} (web root {}, domain {})",
            config.site_name,
            config.web_root.display(),
            config.domain.as_deref().unwrap_or("none")
        );
        Ok(config)
    }

    /// Both a domain and a contact email are configured
    #[must_use]
    pub fn wants_letsencrypt(&self) -> bool {
        self.domain.is_some() && self.email.is_some()
    }
}

fn parse_url(value: Option<&str>, default: &str) -> Result<Url> {
    Ok(Url::parse(value.unwrap_or(default))?)
}
