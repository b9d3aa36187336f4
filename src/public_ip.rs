//! Public IP detection
//!
//! Asks the AWS instance metadata service first (IMDSv2 with a session token,
//! then IMDSv1) and falls back to a plain-text IP echo service. A response only
//! counts when its body parses as an IP address.

use crate::config::Endpoints;
use crate::error::{ProvisionError, Result};
use crate::report::{Stage, Warnings};
use std::net::IpAddr;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

const TOKEN_PATH: &str = "latest/api/token";
const PUBLIC_IPV4_PATH: &str = "latest/meta-data/public-ipv4";
const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";
const TOKEN_TTL_SECS: &str = "21600";

const METADATA_TIMEOUT: Duration = Duration::from_secs(2);
const ECHO_TIMEOUT: Duration = Duration::from_secs(5);

/// Finds the host's public address: IMDSv2, then IMDSv1, then an IP echo service
pub struct PublicIpResolver {
    client: reqwest::Client,
    token_url: Url,
    metadata_ip_url: Url,
    echo_url: Url,
}

impl PublicIpResolver {
    /// # Errors
    ///
    /// Returns an error if the metadata URLs cannot be built or the HTTP client
    /// cannot be constructed
    pub fn new(endpoints: &Endpoints) -> Result<Self> {
        let base = with_trailing_slash(&endpoints.metadata_url);
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| ProvisionError::Generic(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            token_url: base.join(TOKEN_PATH)?,
            metadata_ip_url: base.join(PUBLIC_IPV4_PATH)?,
            echo_url: endpoints.ip_echo_url.clone(),
        })
    }

    /// Try each source in order and return the first address found.
    ///
    /// Each failed source is logged at warn level. The report only gets one
    /// `PublicIp` warning, recorded when every source has failed.
    ///
    /// # Arguments
    ///
    /// * `warnings` - Receives the warning when no source answers
    ///
    /// # Returns
    ///
    /// The public address, or `None` when it could not be detected
    pub async fn resolve(&self, warnings: &mut Warnings) -> Option<IpAddr> {
        match self.from_imds_v2().await {
            Ok(ip) => return Some(found(ip, "IMDSv2")),
            Err(e) => warn!("IMDSv2 lookup failed: {e}"),
        }
        match self.from_imds_v1().await {
            Ok(ip) => return Some(found(ip, "IMDSv1")),
            Err(e) => warn!("IMDSv1 lookup failed: {e}"),
        }
        match self.from_echo().await {
            Ok(ip) => return Some(found(ip, self.echo_url.as_str())),
            Err(e) => warn!("IP echo lookup failed: {e}"),
        }
        warnings.push(
            Stage::PublicIp,
            "Could not detect the public IP from instance metadata or the IP echo service",
        );
        None
    }

    async fn from_imds_v2(&self) -> Result<IpAddr> {
        let token = self
            .client
            .put(self.token_url.clone())
            .header(TOKEN_TTL_HEADER, TOKEN_TTL_SECS)
            .timeout(METADATA_TIMEOUT)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(http_error)?
            .text()
            .await
            .map_err(http_error)?;

        let request = self
            .client
            .get(self.metadata_ip_url.clone())
            .header(TOKEN_HEADER, token.trim())
            .timeout(METADATA_TIMEOUT);
        fetch_ip(request).await
    }

    async fn from_imds_v1(&self) -> Result<IpAddr> {
        let request = self
            .client
            .get(self.metadata_ip_url.clone())
            .timeout(METADATA_TIMEOUT);
        fetch_ip(request).await
    }

    async fn from_echo(&self) -> Result<IpAddr> {
        let request = self.client.get(self.echo_url.clone()).timeout(ECHO_TIMEOUT);
        fetch_ip(request).await
    }
}

fn found(ip: IpAddr, source: &str) -> IpAddr {
    info!("Public IP {ip} (via {source})");
    ip
}

async fn fetch_ip(request: reqwest::RequestBuilder) -> Result<IpAddr> {
    let body = request
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(http_error)?
        .text()
        .await
        .map_err(http_error)?;
    parse_ip(&body)
}

/// Parse a plain-text IP response, ignoring surrounding whitespace
///
/// # Errors
///
/// Returns an error if the body is not an IP address
pub fn parse_ip(body: &str) -> Result<IpAddr> {
    let trimmed = body.trim();
    trimmed
        .parse()
        .map_err(|_| ProvisionError::Generic(format!("Not an IP address: {trimmed:?}")))
}

fn http_error(e: reqwest::Error) -> ProvisionError {
    ProvisionError::Generic(format!("HTTP request failed: {e}"))
}

fn with_trailing_slash(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
