//! systemd control of the nginx unit
//!
//! Every change to the nginx configuration goes through `reload_nginx`, which
//! refuses to reload a configuration `nginx -t` rejects.

use crate::command::{run_checked, run_lenient, CommandRunner};
use crate::error::{ProvisionError, Result};
use crate::report::{Stage, Warnings};
use tracing::{error, info};

/// systemd unit name of the web server
pub const NGINX_SERVICE: &str = "nginx";

/// Enable and start `service`, then confirm systemd reports it active.
///
/// Nothing is touched when the unit is already active. Enabling the unit at
/// boot is best-effort: a failure is recorded in `warnings` and the start is
/// still attempted.
///
/// # Arguments
///
/// * `runner` - Runs the `systemctl` commands
/// * `service` - Unit name, e.g. `nginx`
/// * `warnings` - Collects the failed enable, if any
///
/// # Errors
///
/// Returns `ProvisionError::ServiceInactive` when the unit is not active afterwards
pub async fn ensure_service_active(
    runner: &dyn CommandRunner,
    service: &str,
    warnings: &mut Warnings,
) -> Result<()> {
    if is_active(runner, service).await {
        info!("Service {service} already active");
        return Ok(());
    }

    let enable = run_lenient(runner, "systemctl", &["enable", service]).await;
    if !enable.success {
        warnings.push(
            Stage::Service,
            format!(
                "systemctl enable {service} failed, it may not start at boot: {}",
                enable.stderr.trim()
            ),
        );
    }
    let start = run_lenient(runner, "systemctl", &["start", service]).await;
    if !start.success {
        error!("systemctl start {service} failed: {}", start.stderr.trim());
    }

    if is_active(runner, service).await {
        info!("Service {service} is active");
        Ok(())
    } else {
        Err(ProvisionError::ServiceInactive(service.to_string()))
    }
}

/// Validate the nginx configuration and reload the running service.
///
/// Runs `nginx -t`, then `systemctl reload nginx`, then checks the unit is
/// still active.
///
/// # Errors
///
/// Returns an error if `nginx -t` rejects the configuration, the reload fails,
/// or nginx is not active afterwards
pub async fn reload_nginx(runner: &dyn CommandRunner) -> Result<()> {
    run_checked(runner, "nginx", &["-t"]).await?;
    run_checked(runner, "systemctl", &["reload", NGINX_SERVICE]).await?;
    if !is_active(runner, NGINX_SERVICE).await {
        return Err(ProvisionError::ServiceInactive(NGINX_SERVICE.to_string()));
    }
    info!("nginx reloaded");
    Ok(())
}

async fn is_active(runner: &dyn CommandRunner, service: &str) -> bool {
    run_lenient(runner, "systemctl", &["is-active", "--quiet", service])
        .await
        .success
}

/// State string reported by `systemctl is-active`, e.g. `active` or `failed`
///
/// # Returns
///
/// The trimmed state, or `unknown` when systemctl printed nothing
pub async fn status(runner: &dyn CommandRunner, service: &str) -> String {
    let out = run_lenient(runner, "systemctl", &["is-active", service]).await;
    let state = out.stdout.trim();
    if state.is_empty() {
        "unknown".to_string()
    } else {
        state.to_string()
    }
}
