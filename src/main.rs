//! # nginx_bootstrap Entry Point
//!
//! Provisions nginx with HTTPS on the local host and prints a summary.
//!
//! The only optional argument is the path of a JSON5 configuration file.
//! Environment variables (`SITE_NAME`, `WEB_ROOT`, `DOMAIN`, `EMAIL`, `TZ`)
//! override values from that file.
//!
//! ## Example Usage
//!
//! ```bash
//! # Defaults: site "mysite" in /var/www/mysite, self-signed certificate
//! sudo nginx_bootstrap
//!
//! # Real domain with Let's Encrypt
//! sudo DOMAIN=example.com EMAIL=ops@example.com nginx_bootstrap
//!
//! # Settings from a file
//! sudo nginx_bootstrap /etc/nginx_bootstrap.json5
//! ```
//!
//! Log levels can be controlled through the `RUST_LOG` environment variable.

use nginx_bootstrap::command::SystemRunner;
use nginx_bootstrap::config::{FileConfig, SiteConfig};
use nginx_bootstrap::error::ProvisionError;
use nginx_bootstrap::provision::Provisioner;
use nginx_bootstrap::verify::HttpsProbe;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), ProvisionError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_file_path = env::args().nth(1).map(PathBuf::from);

    tracing::info!("Starting nginx_bootstrap");
    if let Err(e) = run(config_file_path).await {
        tracing::error!("{e}");
        return Err(e);
    }
    Ok(())
}

async fn run(config_file_path: Option<PathBuf>) -> Result<(), ProvisionError> {
    let file = match config_file_path {
        Some(path) => FileConfig::load(&path)?,
        None => FileConfig::default(),
    };
    let config = SiteConfig::from_env(file)?;
    let probe = HttpsProbe::new(config.probe_timeout)?;

    let report = Provisioner::new(config, Arc::new(SystemRunner), Arc::new(probe))
        .run()
        .await?;

    println!("{report}");
    tracing::info!("Provisioning finished");
    Ok(())
}
