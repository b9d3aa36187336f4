//! Reachability verification
//!
//! Probes the site over HTTPS from the host itself and through its public
//! address, then classifies the pair of results into a `Reachability` verdict.
//! Probe outcomes only shape the verdict; they never fail the run.

use crate::error::{ProvisionError, Result};
use crate::report::{Stage, Warnings};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Outcome of a single HTTPS probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Up,
    Down,
    /// No target was known, so the probe never ran
    Skipped,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Up => f.write_str("up"),
            ProbeStatus::Down => f.write_str("down"),
            ProbeStatus::Skipped => f.write_str("skipped"),
        }
    }
}

/// Overall verdict of the verification stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    FullyReachable,
    LocalOnly,
    Unreachable,
}

impl Reachability {
    /// The public probe decides full reachability; the local probe separates
    /// a firewall problem from a broken nginx.
    #[must_use]
    pub fn classify(local: ProbeStatus, public: ProbeStatus) -> Self {
        match (local, public) {
            (_, ProbeStatus::Up) => Reachability::FullyReachable,
            (ProbeStatus::Up, _) => Reachability::LocalOnly,
            _ => Reachability::Unreachable,
        }
    }

    #[must_use]
    pub fn headline(self) -> &'static str {
        match self {
            Reachability::FullyReachable => "SUCCESS: site is reachable over HTTPS",
            Reachability::LocalOnly => "WARNING: site answers locally but not from its public address",
            Reachability::Unreachable => "WARNING: site is not answering over HTTPS",
        }
    }

    #[must_use]
    pub fn guidance(self) -> &'static [&'static str] {
        match self {
            Reachability::FullyReachable => &[
                "Replace the placeholder index.html with your content",
                "With a self-signed certificate browsers will show a warning until a real certificate is installed",
            ],
            Reachability::LocalOnly => &[
                "Open inbound TCP 80 and 443 in the host firewall (ufw / firewalld)",
                "Check the cloud security group or network ACL for ports 80 and 443",
                "If DOMAIN is set, confirm its DNS A record points at this host's public IP",
            ],
            Reachability::Unreachable => &[
                "Check `systemctl status nginx` and `journalctl -u nginx`",
                "Run `nginx -t` to validate the configuration",
                "Confirm nothing else is bound to port 443 (`ss -ltnp`)",
            ],
        }
    }
}

/// Something that can tell whether an HTTPS URL answers
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, url: &Url) -> ProbeStatus;
}

/// reqwest-backed probe that tolerates self-signed certificates
pub struct HttpsProbe {
    client: reqwest::Client,
}

impl HttpsProbe {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .map_err(|e| ProvisionError::Generic(format!("Failed to build probe client: {e}")))?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Probe for HttpsProbe {
    async fn check(&self, url: &Url) -> ProbeStatus {
        debug!("Probing {url}");
        match self.client.get(url.clone()).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    debug!("{url} is UP: status {status}");
                    ProbeStatus::Up
                } else {
                    debug!("{url} is DOWN: status {status}");
                    ProbeStatus::Down
                }
            }
            Err(e) => {
                debug!("{url} is DOWN: error {e}");
                ProbeStatus::Down
            }
        }
    }
}

/// Result of the verification stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub local: ProbeStatus,
    pub public: ProbeStatus,
    pub public_url: Option<Url>,
    pub verdict: Reachability,
}

/// Public HTTPS URL for `target` (a domain or IP)
///
/// # Errors
///
/// Returns an error if `target` does not form a valid host
pub fn public_url(target: &str) -> Result<Url> {
    let host = if target.contains(':') && !target.starts_with('[') {
        format!("[{target}]")
    } else {
        target.to_string()
    };
    Ok(Url::parse(&format!("https://{host}/"))?)
}

/// Probe the loopback URL and, when a public target is known, the public URL.
///
/// # Arguments
///
/// * `probe` - Performs the HTTPS requests
/// * `local_url` - Loopback URL, normally `https://127.0.0.1/`
/// * `public_target` - Domain or public IP, if either is known
/// * `warnings` - Records a target that cannot be turned into a URL
///
/// # Returns
///
/// Both probe states, the public URL that was probed, and the verdict
pub async fn verify(
    probe: &dyn Probe,
    local_url: &Url,
    public_target: Option<&str>,
    warnings: &mut Warnings,
) -> Verification {
    let local = probe.check(local_url).await;

    let public_url = match public_target.map(|target| (target, public_url(target))) {
        Some((_, Ok(url))) => Some(url),
        Some((target, Err(e))) => {
            warnings.push(
                Stage::Verify,
                format!("Skipping public probe, {target:?} is not a valid host: {e}"),
            );
            None
        }
        None => None,
    };
    let public = match &public_url {
        Some(url) => probe.check(url).await,
        None => ProbeStatus::Skipped,
    };

    let verdict = Reachability::classify(local, public);
    tracing::info!("Verification: local {local}, public {public}, verdict {verdict:?}");
    Verification {
        local,
        public,
        public_url,
        verdict,
    }
}
