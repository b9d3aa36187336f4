use crate::command::{run_checked, run_lenient, CommandRunner};
use crate::config::SiteConfig;
use crate::error::Result;
use crate::nginx::PLACEHOLDER_SERVER_NAME;
use crate::report::{Stage, Warnings};
use crate::utils::ensure_dir;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

pub const SELF_SIGNED_DAYS: &str = "365";
pub const SELF_SIGNED_KEY: &str = "rsa:2048";

/// Which certificate the virtual host points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    SelfSigned,
    LetsEncrypt,
}

impl fmt::Display for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsMode::SelfSigned => f.write_str("self-signed"),
            TlsMode::LetsEncrypt => f.write_str("Let's Encrypt"),
        }
    }
}

/// Certificate and key the virtual host references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSet {
    pub mode: TlsMode,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl CertificateSet {
    #[must_use]
    pub fn self_signed(ssl_dir: &Path, site_name: &str) -> Self {
        Self {
            mode: TlsMode::SelfSigned,
            cert_path: ssl_dir.join(format!("{site_name}.crt")),
            key_path: ssl_dir.join(format!("{site_name}.key")),
        }
    }

    /// Paths certbot maintains under `live/<domain>`
    #[must_use]
    pub fn letsencrypt(letsencrypt_dir: &Path, domain: &str) -> Self {
        let live = letsencrypt_dir.join("live").join(domain);
        Self {
            mode: TlsMode::LetsEncrypt,
            cert_path: live.join("fullchain.pem"),
            key_path: live.join("privkey.pem"),
        }
    }

    fn exists(&self) -> bool {
        self.cert_path.is_file() && self.key_path.is_file()
    }
}

/// Subject CN for the self-signed certificate
#[must_use]
pub fn common_name(server_name: &str) -> &str {
    if server_name == PLACEHOLDER_SERVER_NAME {
        "localhost"
    } else {
        server_name
    }
}

/// Generate a fresh 365-day RSA-2048 self-signed pair, overwriting any previous one.
///
/// # Errors
///
/// Returns an error if the certificate directory cannot be created or openssl fails
pub async fn generate_self_signed(
    runner: &dyn CommandRunner,
    ssl_dir: &Path,
    site_name: &str,
    server_name: &str,
) -> Result<CertificateSet> {
    ensure_dir(ssl_dir)?;
    let certs = CertificateSet::self_signed(ssl_dir, site_name);
    let key = certs.key_path.display().to_string();
    let cert = certs.cert_path.display().to_string();
    let subject = format!("/CN={}", common_name(server_name));

    run_checked(
        runner,
        "openssl",
        &[
            "req", "-x509", "-nodes", "-days", SELF_SIGNED_DAYS, "-newkey", SELF_SIGNED_KEY,
            "-keyout", key.as_str(), "-out", cert.as_str(), "-subj", subject.as_str(),
        ],
    )
    .await?;
    restrict_key(&certs.key_path)?;

    info!("Self-signed certificate written to {cert}");
    Ok(certs)
}

#[cfg(unix)]
fn restrict_key(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if path.exists() {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn restrict_key(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Try to obtain a Let's Encrypt certificate for the configured domain.
///
/// Returns `None` when issuance is not configured or fails; every failure is
/// recorded in `warnings` and the caller keeps the self-signed certificate.
pub async fn try_letsencrypt(
    runner: &dyn CommandRunner,
    config: &SiteConfig,
    warnings: &mut Warnings,
) -> Option<CertificateSet> {
    let domain = config.domain.as_deref()?;
    let Some(email) = config.email.as_deref() else {
        warnings.push(
            Stage::Certificates,
            format!("EMAIL is not set; skipping Let's Encrypt for {domain}, keeping self-signed certificate"),
        );
        return None;
    };
    if !runner.has_program("certbot") {
        warnings.push(
            Stage::Certificates,
            "certbot is not installed; keeping self-signed certificate",
        );
        return None;
    }

    info!("Requesting Let's Encrypt certificate for {domain}");
    let out = run_lenient(
        runner,
        "certbot",
        &[
            "certonly", "--nginx", "--non-interactive", "--agree-tos", "-m", email, "-d", domain,
        ],
    )
    .await;
    if !out.success {
        warnings.push(
            Stage::Certificates,
            format!(
                "certbot failed for {domain}, keeping self-signed certificate: {}",
                out.stderr.trim()
            ),
        );
        return None;
    }

    let certs = CertificateSet::letsencrypt(&config.letsencrypt_dir, domain);
    if !certs.exists() {
        warnings.push(
            Stage::Certificates,
            format!(
                "certbot reported success but {} is missing, keeping self-signed certificate",
                certs.cert_path.display()
            ),
        );
        return None;
    }

    info!("Let's Encrypt certificate ready for {domain}");
    Some(certs)
}
