use crate::certs::{self, CertificateSet};
use crate::command::{run_checked, run_lenient, CommandRunner};
use crate::config::SiteConfig;
use crate::error::{ProvisionError, Result};
use crate::host::{HostProfile, NginxLayout, PackageManager};
use crate::nginx;
use crate::packages;
use crate::public_ip::PublicIpResolver;
use crate::report::{Report, Stage, Warnings};
use crate::service::{self, NGINX_SERVICE};
use crate::site;
use crate::verify::{self, Probe};
use std::sync::Arc;
use tracing::info;

/// Runs every stage in order against one host
pub struct Provisioner {
    config: SiteConfig,
    runner: Arc<dyn CommandRunner>,
    probe: Arc<dyn Probe>,
}

impl Provisioner {
    #[must_use]
    pub fn new(config: SiteConfig, runner: Arc<dyn CommandRunner>, probe: Arc<dyn Probe>) -> Self {
        Self {
            config,
            runner,
            probe,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Provision the host and build the final report.
    ///
    /// # Errors
    ///
    /// Returns an error on any fatal condition: not running as root, no package
    /// manager, nginx not active, a rejected nginx configuration, or a failed
    /// self-signed certificate. Best-effort failures end up in the report instead.
    pub async fn run(&self) -> Result<Report> {
        let runner = self.runner.as_ref();
        let config = &self.config;
        let mut warnings = Warnings::default();

        ensure_root(runner).await?;

        info!("Installing packages");
        let package_manager = PackageManager::detect(runner)?;
        packages::install_packages(runner, package_manager, config.domain.is_some(), &mut warnings)
            .await?;
        service::ensure_service_active(runner, NGINX_SERVICE, &mut warnings).await?;

        let profile = HostProfile {
            package_manager,
            nginx_layout: NginxLayout::detect(&config.nginx_dir),
        };
        info!("Host profile: {profile:?}");

        info!("Writing site content");
        let hostname = site::resolve_hostname(runner, &mut warnings).await;
        site::materialize(config, &hostname)?;

        info!("Configuring nginx");
        let public_ip = PublicIpResolver::new(&config.endpoints)?
            .resolve(&mut warnings)
            .await;
        let server_name = nginx::server_name(config.domain.as_deref(), public_ip);

        let self_signed =
            certs::generate_self_signed(runner, &config.ssl_dir, &config.site_name, &server_name)
                .await?;
        nginx::write_vhost(config, &profile.nginx_layout, &server_name, &self_signed)?;
        service::reload_nginx(runner).await?;

        let active = self
            .activate_letsencrypt(&profile, &server_name, self_signed, &mut warnings)
            .await?;

        info!("Verifying deployment");
        let public_target = config
            .domain
            .clone()
            .or_else(|| public_ip.map(|ip| ip.to_string()));
        let verification = verify::verify(
            self.probe.as_ref(),
            &config.endpoints.local_probe_url,
            public_target.as_deref(),
            &mut warnings,
        )
        .await;

        let disk_usage = disk_usage(runner, config, &mut warnings).await;
        let service_status = service::status(runner, NGINX_SERVICE).await;
        let url = verification
            .public_url
            .as_ref()
            .unwrap_or(&config.endpoints.local_probe_url)
            .to_string();

        Ok(Report {
            site_name: config.site_name.clone(),
            web_root: config.web_root.clone(),
            timestamp: config.timestamp.clone(),
            disk_usage,
            service_status,
            public_ip,
            url,
            tls_mode: active.mode,
            local_probe: verification.local,
            public_probe: verification.public,
            verdict: verification.verdict,
            warnings,
        })
    }

    /// Switch the vhost to a Let's Encrypt certificate when one can be issued.
    /// If nginx rejects the switched config the self-signed vhost is restored.
    async fn activate_letsencrypt(
        &self,
        profile: &HostProfile,
        server_name: &str,
        self_signed: CertificateSet,
        warnings: &mut Warnings,
    ) -> Result<CertificateSet> {
        let runner = self.runner.as_ref();
        let Some(issued) = certs::try_letsencrypt(runner, &self.config, warnings).await else {
            return Ok(self_signed);
        };

        nginx::write_vhost(&self.config, &profile.nginx_layout, server_name, &issued)?;
        match service::reload_nginx(runner).await {
            Ok(()) => Ok(issued),
            Err(e) => {
                warnings.push(
                    Stage::Certificates,
                    format!("nginx rejected the Let's Encrypt configuration, restoring self-signed: {e}"),
                );
                nginx::write_vhost(&self.config, &profile.nginx_layout, server_name, &self_signed)?;
                service::reload_nginx(runner).await?;
                Ok(self_signed)
            }
        }
    }
}

async fn ensure_root(runner: &dyn CommandRunner) -> Result<()> {
    let out = run_checked(runner, "id", &["-u"]).await?;
    if out.stdout.trim() == "0" {
        Ok(())
    } else {
        Err(ProvisionError::NotRoot)
    }
}

async fn disk_usage(runner: &dyn CommandRunner, config: &SiteConfig, warnings: &mut Warnings) -> String {
    let web_root = config.web_root.display().to_string();
    let out = run_lenient(runner, "du", &["-sh", web_root.as_str()]).await;
    match out.stdout.split_whitespace().next() {
        Some(size) if out.success => size.to_string(),
        _ => {
            warnings.push(
                Stage::Verify,
                format!("Could not measure disk usage of {web_root}"),
            );
            "unknown".to_string()
        }
    }
}
