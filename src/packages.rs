//! Package installation
//!
//! Installation is an ensure operation: the package database is queried first
//! (`dpkg -s` or `rpm -q`) and only missing packages are installed. The base
//! packages are required; certbot and its nginx plugin are best-effort.

use crate::command::{run_checked, run_lenient, CommandRunner};
use crate::error::Result;
use crate::host::PackageManager;
use crate::report::{Stage, Warnings};
use tracing::{debug, info};

/// Packages every run needs
pub const BASE_PACKAGES: [&str; 3] = ["nginx", "curl", "openssl"];

/// Packages needed for Let's Encrypt issuance through the nginx plugin
pub const CERTBOT_PACKAGES: [&str; 2] = ["certbot", "python3-certbot-nginx"];

/// Return the subset of `packages` the package database does not report as installed
///
/// # Arguments
///
/// * `runner` - Runs the package query commands
/// * `manager` - Decides between `dpkg -s` and `rpm -q`
/// * `packages` - Package names to check
///
/// # Returns
///
/// The missing packages, in the order given
pub async fn missing_packages<'a>(
    runner: &dyn CommandRunner,
    manager: PackageManager,
    packages: &[&'a str],
) -> Vec<&'a str> {
    let mut missing = Vec::new();
    for &package in packages {
        let (program, args) = manager.query_command(package);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        if run_lenient(runner, program, &args).await.success {
            debug!("Package {package} already installed");
        } else {
            missing.push(package);
        }
    }
    missing
}

/// Install whatever part of `packages` is missing.
///
/// Returns the packages that were installed; an empty list means nothing had
/// to be done.
///
/// # Errors
///
/// Returns an error if the install command fails
pub async fn ensure_installed<'a>(
    runner: &dyn CommandRunner,
    manager: PackageManager,
    packages: &[&'a str],
) -> Result<Vec<&'a str>> {
    let missing = missing_packages(runner, manager, packages).await;
    if missing.is_empty() {
        return Ok(missing);
    }

    info!("Installing {} with {manager}", missing.join(", "));
    let args = manager.install_args(&missing);
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    run_checked(runner, manager.binary(), &args).await?;
    Ok(missing)
}

/// Install the base packages and, when a domain is configured, certbot.
///
/// Certbot is best-effort on every package manager family: a failure is
/// recorded as a warning and the run continues with the self-signed
/// certificate. On dnf and yum `epel-release` is installed first, also
/// best-effort. Nothing runs, not even the apt index refresh, when every
/// wanted package is already present.
///
/// # Arguments
///
/// * `runner` - Runs the package manager
/// * `manager` - Package manager family detected on the host
/// * `with_certbot` - Whether a domain is configured
/// * `warnings` - Collects refresh and certbot failures
///
/// # Errors
///
/// Returns an error if the base packages cannot be installed
pub async fn install_packages(
    runner: &dyn CommandRunner,
    manager: PackageManager,
    with_certbot: bool,
    warnings: &mut Warnings,
) -> Result<()> {
    let wanted: Vec<&str> = if with_certbot {
        BASE_PACKAGES.iter().chain(CERTBOT_PACKAGES.iter()).copied().collect()
    } else {
        BASE_PACKAGES.to_vec()
    };

    if missing_packages(runner, manager, &wanted).await.is_empty() {
        info!("All required packages already installed");
        return Ok(());
    }

    if let Some(args) = manager.refresh_args() {
        let out = run_lenient(runner, manager.binary(), args).await;
        if !out.success {
            warnings.push(
                Stage::Packages,
                format!("Package index refresh failed: {}", out.stderr.trim()),
            );
        }
    }

    ensure_installed(runner, manager, &BASE_PACKAGES).await?;

    if with_certbot {
        if let Some(repository) = manager.certbot_repository() {
            if let Err(e) = ensure_installed(runner, manager, &[repository]).await {
                warnings.push(
                    Stage::Packages,
                    format!("Could not install {repository}: {e}"),
                );
            }
        }
        if let Err(e) = ensure_installed(runner, manager, &CERTBOT_PACKAGES).await {
            warnings.push(Stage::Packages, format!("Could not install certbot: {e}"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::fake::FakeRunner;
    use crate::command::CommandOutput;

    fn nothing_installed_apt() -> FakeRunner {
        FakeRunner::with_programs(&["apt-get"]).respond("dpkg -s", CommandOutput::failed(1, ""))
    }

    #[tokio::test]
    async fn test_apt_installs_base_packages() {
        let runner = nothing_installed_apt();
        let mut warnings = Warnings::default();

        install_packages(&runner, PackageManager::Apt, false, &mut warnings)
            .await
            .unwrap();

        assert!(runner.called("apt-get update -y"));
        assert!(runner.called("apt-get install -y nginx curl openssl"));
        assert!(!runner.called("apt-get install -y certbot"));
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_skips_everything_when_installed() {
        let runner = FakeRunner::with_programs(&["apt-get"]);
        let mut warnings = Warnings::default();

        install_packages(&runner, PackageManager::Apt, true, &mut warnings)
            .await
            .unwrap();

        assert!(!runner.called("apt-get"));
    }

    #[tokio::test]
    async fn test_dnf_installs_epel_then_certbot() {
        let runner =
            FakeRunner::with_programs(&["dnf"]).respond("rpm -q", CommandOutput::failed(1, ""));
        let mut warnings = Warnings::default();

        install_packages(&runner, PackageManager::Dnf, true, &mut warnings)
            .await
            .unwrap();

        let calls = runner.calls();
        let epel = calls
            .iter()
            .position(|c| c == "dnf install -y epel-release")
            .unwrap();
        let certbot = calls
            .iter()
            .position(|c| c == "dnf install -y certbot python3-certbot-nginx")
            .unwrap();
        assert!(epel < certbot);
        assert!(!runner.called("dnf update"));
    }

    #[tokio::test]
    async fn test_certbot_failure_is_a_warning_on_every_family() {
        for manager in PackageManager::PREFERENCE {
            let (query, _) = manager.query_command("x");
            let runner = FakeRunner::with_programs(&[manager.binary()])
                .respond(query, CommandOutput::failed(1, ""))
                .respond(
                    &format!("{} install -y certbot", manager.binary()),
                    CommandOutput::failed(100, "no candidate"),
                );
            let mut warnings = Warnings::default();

            install_packages(&runner, manager, true, &mut warnings)
                .await
                .unwrap();

            let certbot_warnings = warnings.in_stage(Stage::Packages);
            assert!(
                certbot_warnings
                    .iter()
                    .any(|w| w.message.contains("certbot")),
                "{manager}: expected certbot warning"
            );
        }
    }

    #[tokio::test]
    async fn test_base_install_failure_is_fatal() {
        let runner = nothing_installed_apt().respond(
            "apt-get install -y nginx",
            CommandOutput::failed(100, "E: Unable to locate package nginx"),
        );
        let mut warnings = Warnings::default();

        let result = install_packages(&runner, PackageManager::Apt, false, &mut warnings).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_refresh_failure_is_a_warning() {
        let runner =
            nothing_installed_apt().respond("apt-get update", CommandOutput::failed(100, "offline"));
        let mut warnings = Warnings::default();

        install_packages(&runner, PackageManager::Apt, false, &mut warnings)
            .await
            .unwrap();
        assert_eq!(warnings.in_stage(Stage::Packages).len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_installed_only_installs_missing() {
        let runner = FakeRunner::with_programs(&["yum"])
            .respond("rpm -q curl", CommandOutput::failed(1, "package curl is not installed"));

        let installed = ensure_installed(&runner, PackageManager::Yum, &BASE_PACKAGES)
            .await
            .unwrap();
        assert_eq!(installed, vec!["curl"]);
        assert!(runner.called("yum install -y curl"));
    }
}
