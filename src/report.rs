use crate::certs::TlsMode;
use crate::verify::{ProbeStatus, Reachability};
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;

/// Pipeline stage a warning was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Packages,
    Service,
    Site,
    PublicIp,
    Certificates,
    Verify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Packages => "packages",
            Stage::Service => "service",
            Stage::Site => "site",
            Stage::PublicIp => "public-ip",
            Stage::Certificates => "certificates",
            Stage::Verify => "verify",
        };
        f.write_str(name)
    }
}

/// A best-effort step that failed and was replaced by a fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub stage: Stage,
    pub message: String,
}

/// Warnings collected over a run, printed in the final report
#[derive(Debug, Default, Clone)]
pub struct Warnings(Vec<Warning>);

impl Warnings {
    /// Record a warning and log it
    pub fn push(&mut self, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("[{stage}] {message}");
        self.0.push(Warning { stage, message });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.0.iter()
    }

    #[must_use]
    pub fn in_stage(&self, stage: Stage) -> Vec<&Warning> {
        self.0.iter().filter(|w| w.stage == stage).collect()
    }
}

/// End-of-run summary
#[derive(Debug, Clone)]
pub struct Report {
    pub site_name: String,
    pub web_root: PathBuf,
    pub timestamp: String,
    pub disk_usage: String,
    pub service_status: String,
    pub public_ip: Option<IpAddr>,
    pub url: String,
    pub tls_mode: TlsMode,
    pub local_probe: ProbeStatus,
    pub public_probe: ProbeStatus,
    pub verdict: Reachability,
    pub warnings: Warnings,
}

const RULE: &str = "==================================================";

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let public_ip = self
            .public_ip
            .map_or_else(|| "not detected".to_string(), |ip| ip.to_string());

        writeln!(f, "{RULE}")?;
        writeln!(f, " Deployment summary")?;
        writeln!(f, "{RULE}")?;
        writeln!(f, " Site name     : {}", self.site_name)?;
        writeln!(f, " Directory     : {}", self.web_root.display())?;
        writeln!(f, " Deployed at   : {}", self.timestamp)?;
        writeln!(f, " Disk usage    : {}", self.disk_usage)?;
        writeln!(f, " nginx status  : {}", self.service_status)?;
        writeln!(f, " Public IP     : {public_ip}")?;
        writeln!(f, " URL           : {}", self.url)?;
        writeln!(f, " TLS mode      : {}", self.tls_mode)?;
        writeln!(f, " Local HTTPS   : {}", self.local_probe)?;
        writeln!(f, " Public HTTPS  : {}", self.public_probe)?;
        writeln!(f, "{}", "-".repeat(RULE.len()))?;
        writeln!(f, " {}", self.verdict.headline())?;
        for line in self.verdict.guidance() {
            writeln!(f, "   - {line}")?;
        }
        if !self.warnings.is_empty() {
            writeln!(f, " Warnings:")?;
            for warning in self.warnings.iter() {
                writeln!(f, "   - [{}] {}", warning.stage, warning.message)?;
            }
        }
        write!(f, "{RULE}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> Report {
        Report {
            site_name: "demo".to_string(),
            web_root: PathBuf::from("/var/www/demo"),
            timestamp: "2024-03-01 12:30:00 UTC".to_string(),
            disk_usage: "8.0K".to_string(),
            service_status: "active".to_string(),
            public_ip: Some("203.0.113.7".parse().unwrap()),
            url: "https://203.0.113.7".to_string(),
            tls_mode: TlsMode::SelfSigned,
            local_probe: ProbeStatus::Up,
            public_probe: ProbeStatus::Down,
            verdict: Reachability::LocalOnly,
            warnings: Warnings::default(),
        }
    }

    #[test]
    fn test_report_lists_every_field() {
        let text = sample_report().to_string();
        for expected in [
            "Site name     : demo",
            "Directory     : /var/www/demo",
            "Deployed at   : 2024-03-01 12:30:00 UTC",
            "Disk usage    : 8.0K",
            "nginx status  : active",
            "Public IP     : 203.0.113.7",
            "URL           : https://203.0.113.7",
            "TLS mode      : self-signed",
            "Local HTTPS   : up",
            "Public HTTPS  : down",
        ] {
            assert!(text.contains(expected), "missing {expected:?} in\n{text}");
        }
        assert!(text.contains(Reachability::LocalOnly.headline()));
        assert!(!text.contains("Warnings:"));
    }

    #[test]
    fn test_report_without_ip() {
        let mut report = sample_report();
        report.public_ip = None;
        assert!(report.to_string().contains("Public IP     : not detected"));
    }

    #[test]
    fn test_report_prints_warnings() {
        let mut report = sample_report();
        report
            .warnings
            .push(Stage::Certificates, "EMAIL is not set; skipping Let's Encrypt");
        let text = report.to_string();
        assert!(text.contains("Warnings:"));
        assert!(text.contains("[certificates] EMAIL is not set; skipping Let's Encrypt"));
    }

    #[test]
    fn test_warnings_in_stage() {
        let mut warnings = Warnings::default();
        warnings.push(Stage::Packages, "certbot install failed");
        warnings.push(Stage::PublicIp, "no public IP");
        assert_eq!(warnings.in_stage(Stage::Packages).len(), 1);
        assert!(warnings.in_stage(Stage::Site).is_empty());
    }
}
