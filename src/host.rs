use crate::command::CommandRunner;
use crate::error::{ProvisionError, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Supported package manager families, in detection preference order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
}

impl PackageManager {
    pub const PREFERENCE: [PackageManager; 3] =
        [PackageManager::Apt, PackageManager::Dnf, PackageManager::Yum];

    /// Pick the first manager whose binary is on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns `ProvisionError::NoPackageManager` when none is present
    pub fn detect(runner: &dyn CommandRunner) -> Result<Self> {
        let found = Self::PREFERENCE
            .into_iter()
            .find(|pm| runner.has_program(pm.binary()))
            .ok_or(ProvisionError::NoPackageManager)?;
        tracing::info!("Detected package manager: {found}");
        Ok(found)
    }

    #[must_use]
    pub fn binary(self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Dnf => "dnf",
            PackageManager::Yum => "yum",
        }
    }

    /// Command that exits zero when `package` is installed
    #[must_use]
    pub fn query_command(self, package: &str) -> (&'static str, Vec<String>) {
        match self {
            PackageManager::Apt => ("dpkg", vec!["-s".to_string(), package.to_string()]),
            PackageManager::Dnf | PackageManager::Yum => {
                ("rpm", vec!["-q".to_string(), package.to_string()])
            }
        }
    }

    /// Arguments to refresh the package index before installing, if the family needs it
    #[must_use]
    pub fn refresh_args(self) -> Option<&'static [&'static str]> {
        match self {
            PackageManager::Apt => Some(&["update", "-y"]),
            PackageManager::Dnf | PackageManager::Yum => None,
        }
    }

    #[must_use]
    pub fn install_args(self, packages: &[&str]) -> Vec<String> {
        let mut args = vec!["install".to_string(), "-y".to_string()];
        args.extend(packages.iter().map(ToString::to_string));
        args
    }

    /// Extra repository package needed before certbot can be installed
    #[must_use]
    pub fn certbot_repository(self) -> Option<&'static str> {
        match self {
            PackageManager::Apt => None,
            PackageManager::Dnf | PackageManager::Yum => Some("epel-release"),
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

/// Where nginx expects virtual host files on this host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NginxLayout {
    /// Debian style `sites-available`, linked into `sites-enabled` when that exists
    SitesAvailable {
        available: PathBuf,
        enabled: Option<PathBuf>,
    },
    /// RHEL style drop-in directory
    ConfD { dir: PathBuf },
}

impl NginxLayout {
    #[must_use]
    pub fn detect(nginx_dir: &Path) -> Self {
        let available = nginx_dir.join("sites-available");
        let layout = if available.is_dir() {
            let enabled = nginx_dir.join("sites-enabled");
            NginxLayout::SitesAvailable {
                available,
                enabled: enabled.is_dir().then_some(enabled),
            }
        } else {
            NginxLayout::ConfD {
                dir: nginx_dir.join("conf.d"),
            }
        };
        tracing::debug!("Detected nginx layout: {layout:?}");
        layout
    }

    #[must_use]
    pub fn config_path(&self, site_name: &str) -> PathBuf {
        match self {
            NginxLayout::SitesAvailable { available, .. } => available.join(site_name),
            NginxLayout::ConfD { dir } => dir.join(format!("{site_name}.conf")),
        }
    }

    /// Symlink that activates the site, when the layout uses one
    #[must_use]
    pub fn enabled_link(&self, site_name: &str) -> Option<PathBuf> {
        match self {
            NginxLayout::SitesAvailable {
                enabled: Some(enabled),
                ..
            } => Some(enabled.join(site_name)),
            _ => None,
        }
    }
}

/// Host conventions resolved once and handed to every later stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostProfile {
    pub package_manager: PackageManager,
    pub nginx_layout: NginxLayout,
}
