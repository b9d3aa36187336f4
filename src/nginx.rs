use crate::certs::CertificateSet;
use crate::config::SiteConfig;
use crate::error::Result;
use crate::host::NginxLayout;
use crate::utils::{ensure_file_content, ensure_symlink, Change};
use askama::Template;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::info;

/// `server_name` used when neither a domain nor a public IP is known
pub const PLACEHOLDER_SERVER_NAME: &str = "_";

/// Two server blocks: a plain HTTP redirect and the TLS site
#[derive(Template)]
#[template(path = "vhost.conf", escape = "none")]
pub struct VhostTemplate<'a> {
    pub site_name: &'a str,
    pub server_name: &'a str,
    pub web_root: &'a str,
    pub cert_path: &'a str,
    pub key_path: &'a str,
}

/// Domain if set, else the detected IP, else the placeholder
#[must_use]
pub fn server_name(domain: Option<&str>, public_ip: Option<IpAddr>) -> String {
    match (domain, public_ip) {
        (Some(domain), _) => domain.to_string(),
        (None, Some(ip)) => ip.to_string(),
        (None, None) => PLACEHOLDER_SERVER_NAME.to_string(),
    }
}

/// # Errors
///
/// Returns an error if the template fails to render
pub fn render_vhost(config: &SiteConfig, server_name: &str, certs: &CertificateSet) -> Result<String> {
    let web_root = config.web_root.display().to_string();
    let cert_path = certs.cert_path.display().to_string();
    let key_path = certs.key_path.display().to_string();
    Ok(VhostTemplate {
        site_name: &config.site_name,
        server_name,
        web_root: &web_root,
        cert_path: &cert_path,
        key_path: &key_path,
    }
    .render()?)
}

/// Write the virtual host where `layout` expects it and enable it.
///
/// Returns the path of the written config file.
///
/// # Errors
///
/// Returns an error if rendering, writing, or linking fails
pub fn write_vhost(
    config: &SiteConfig,
    layout: &NginxLayout,
    server_name: &str,
    certs: &CertificateSet,
) -> Result<PathBuf> {
    let rendered = render_vhost(config, server_name, certs)?;
    let path = layout.config_path(&config.site_name);
    let change = ensure_file_content(&path, &rendered)?;
    info!(
        "Virtual host {} for {server_name} ({change:?}, {})",
        path.display(),
        certs.mode
    );

    if let Some(link) = layout.enabled_link(&config.site_name) {
        if ensure_symlink(&path, &link)? != Change::Unchanged {
            info!("Enabled site via {}", link.display());
        }
    }
    Ok(path)
}
