//! # nginx_bootstrap Library
//!
//! Provisions a single nginx web server: installs the packages, writes a
//! placeholder page, generates a virtual host with an HTTP to HTTPS redirect,
//! creates a self-signed certificate, optionally obtains a Let's Encrypt
//! certificate, and reports whether the result is reachable.
//!
//! ## Overview
//!
//! - `config`: Resolves the site configuration from the environment and an optional JSON5 file
//! - `host`: Detects the package manager family and the nginx layout convention
//! - `packages`: Ensures nginx, curl, openssl and (optionally) certbot are installed
//! - `service`: Keeps the nginx unit active and reloads it after config changes
//! - `site`: Writes the web root and placeholder `index.html`
//! - `public_ip`: Finds the public address through instance metadata or an echo service
//! - `nginx`: Renders and enables the virtual host
//! - `certs`: Self-signed and Let's Encrypt certificates
//! - `verify`: Local and public HTTPS probes and the reachability verdict
//! - `report`: Warnings collected during the run and the final summary
//! - `provision`: Runs the stages in order
//!
//! ## Getting Started
//!
//! ```no_run
//! use nginx_bootstrap::command::SystemRunner;
//! use nginx_bootstrap::config::{FileConfig, SiteConfig};
//! use nginx_bootstrap::provision::Provisioner;
//! use nginx_bootstrap::verify::HttpsProbe;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), nginx_bootstrap::error::ProvisionError> {
//!     let config = SiteConfig::from_env(FileConfig::default())?;
//!     let probe = HttpsProbe::new(config.probe_timeout)?;
//!     let report = Provisioner::new(config, Arc::new(SystemRunner), Arc::new(probe))
//!         .run()
//!         .await?;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```

/// Custom error types module
///
/// Defines `ProvisionError`, the single error type for fatal conditions.
pub mod error;

/// External command execution behind the `CommandRunner` trait
pub mod command;

/// Configuration management module
///
/// Environment variables layered over an optional JSON5 file, resolved once
/// into an immutable `SiteConfig`.
pub mod config;

/// Host conventions: package manager family and nginx layout
pub mod host;

/// Package installation
///
/// Ensures the base packages are present and tries certbot when a domain is
/// configured.
pub mod packages;

/// systemd control of the nginx service
pub mod service;

/// Placeholder site generation
pub mod site;

/// Public IP detection
///
/// Tries AWS IMDSv2, then IMDSv1, then an external echo service.
pub mod public_ip;

/// Virtual host rendering and activation
pub mod nginx;

/// Certificate provisioning
///
/// A self-signed pair is always generated; Let's Encrypt is attempted when a
/// domain and email are configured and falls back with a warning on failure.
pub mod certs;

/// Reachability verification
pub mod verify;

/// Warning collection and the final summary
pub mod report;

/// Stage orchestration
pub mod provision;

/// Utility functions module
///
/// Timestamp formatting and the idempotent filesystem "ensure" helpers.
pub mod utils;
