use crate::command::{run_lenient, CommandRunner};
use crate::config::SiteConfig;
use crate::error::Result;
use crate::report::{Stage, Warnings};
use crate::utils::{ensure_dir, ensure_file_content, Change};
use askama::Template;
use std::path::PathBuf;

const FALLBACK_HOSTNAME: &str = "localhost";

/// Placeholder landing page. Values come from the local environment and are
/// written verbatim.
#[derive(Template)]
#[template(path = "index.html", escape = "none")]
pub struct IndexTemplate<'a> {
    pub site_name: &'a str,
    pub hostname: &'a str,
    pub timestamp: &'a str,
}

/// Hostname as reported by the `hostname` command
pub async fn resolve_hostname(runner: &dyn CommandRunner, warnings: &mut Warnings) -> String {
    let out = run_lenient(runner, "hostname", &[]).await;
    let name = out.stdout.trim();
    if out.success && !name.is_empty() {
        name.to_string()
    } else {
        warnings.push(
            Stage::Site,
            format!("Could not determine hostname, using {FALLBACK_HOSTNAME}"),
        );
        FALLBACK_HOSTNAME.to_string()
    }
}

/// Create the web root and write `index.html` into it.
///
/// Returns the path of the page.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written or the template
/// fails to render
pub fn materialize(config: &SiteConfig, hostname: &str) -> Result<PathBuf> {
    tracing::debug!("Rendering index page for {}", config.site_name);
    if ensure_dir(&config.web_root)? == Change::Created {
        tracing::info!("Created web root {}", config.web_root.display());
    }

    let page = IndexTemplate {
        site_name: &config.site_name,
        hostname,
        timestamp: &config.timestamp,
    }
    .render()?;

    let index = config.web_root.join("index.html");
    let change = ensure_file_content(&index, &page)?;
    tracing::info!("Index page {} ({change:?})", index.display());
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::fake::FakeRunner;
    use crate::command::CommandOutput;
    use crate::config::FileConfig;
    use chrono::Utc;
    use std::fs;

    fn config_in(dir: &std::path::Path) -> SiteConfig {
        let file = FileConfig {
            site_name: Some("demo".to_string()),
            web_root: Some(dir.join("www/demo")),
            ..FileConfig::default()
        };
        SiteConfig::resolve(file, |_| None, Utc::now()).unwrap()
    }

    #[test]
    fn test_template_embeds_values_verbatim() {
        let html = IndexTemplate {
            site_name: "Tom & Jerry",
            hostname: "web-01",
            timestamp: "2024-03-01 12:30:00 UTC",
        }
        .render()
        .unwrap();
        assert!(html.contains("<title>Tom & Jerry</title>"));
        assert!(html.contains("web-01"));
        assert!(html.contains("2024-03-01 12:30:00 UTC"));
    }

    #[test]
    fn test_materialize_writes_index_and_is_rerunnable() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let index = materialize(&config, "web-01").unwrap();
        assert_eq!(index, dir.path().join("www/demo/index.html"));
        let first = fs::read_to_string(&index).unwrap();
        assert!(first.contains("demo"));

        fs::write(&index, "stale").unwrap();
        materialize(&config, "web-01").unwrap();
        assert_eq!(fs::read_to_string(&index).unwrap(), first);
    }

    #[tokio::test]
    async fn test_hostname_from_command() {
        let runner = FakeRunner::default().respond("hostname", CommandOutput::ok("web-01\n"));
        let mut warnings = Warnings::default();
        assert_eq!(resolve_hostname(&runner, &mut warnings).await, "web-01");
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_hostname_fallback_warns() {
        let runner = FakeRunner::default().respond("hostname", CommandOutput::failed(1, ""));
        let mut warnings = Warnings::default();
        assert_eq!(resolve_hostname(&runner, &mut warnings).await, "localhost");
        assert_eq!(warnings.in_stage(Stage::Site).len(), 1);
    }
}
