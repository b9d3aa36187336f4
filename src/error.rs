//! Custom error types for the provisioning run
//!
//! Only fatal conditions are represented here. Best-effort failures never become
//! a `ProvisionError`; they are recorded as warnings and surface in the final report.

use std::fmt;

/// Main error type for a provisioning run
#[derive(Debug)]
pub enum ProvisionError {
    /// The process is not running with superuser privileges
    NotRoot,

    /// None of the supported package managers is installed
    NoPackageManager,

    /// nginx did not reach the active state
    ServiceInactive(String),

    /// An external command exited unsuccessfully
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Filesystem or process spawning error
    Io(std::io::Error),

    /// Error occurred while reading the configuration file
    ConfigRead(std::io::Error),

    /// Error occurred while parsing the configuration file
    ConfigParse(json5::Error),

    /// A configured endpoint is not a valid URL
    UrlParse(url::ParseError),

    /// Error occurred while rendering a template
    Template(askama::Error),

    /// Generic error with a message
    Generic(String),
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionError::NotRoot => {
                write!(f, "This tool must be run as root")
            }
            ProvisionError::NoPackageManager => {
                write!(f, "No supported package manager found (apt-get, dnf, yum)")
            }
            ProvisionError::ServiceInactive(service) => {
                write!(f, "Service {service} failed to become active")
            }
            ProvisionError::CommandFailed {
                program,
                code,
                stderr,
            } => {
                let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                write!(f, "Command `{program}` failed ({code}): {}", stderr.trim())
            }
            ProvisionError::Io(e) => {
                write!(f, "I/O error: {e}")
            }
            ProvisionError::ConfigRead(e) => {
                write!(f, "Failed to read configuration file: {e}")
            }
            ProvisionError::ConfigParse(e) => {
                write!(f, "Failed to parse configuration: {e}")
            }
            ProvisionError::UrlParse(e) => {
                write!(f, "Invalid endpoint URL: {e}")
            }
            ProvisionError::Template(e) => {
                write!(f, "Template rendering error: {e}")
            }
            ProvisionError::Generic(msg) => {
                write!(f, "Error: {msg}")
            }
        }
    }
}

impl std::error::Error for ProvisionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProvisionError::Io(e) | ProvisionError::ConfigRead(e) => Some(e),
            ProvisionError::ConfigParse(e) => Some(e),
            ProvisionError::UrlParse(e) => Some(e),
            ProvisionError::Template(e) => Some(e),
            ProvisionError::NotRoot
            | ProvisionError::NoPackageManager
            | ProvisionError::ServiceInactive(_)
            | ProvisionError::CommandFailed { .. }
            | ProvisionError::Generic(_) => None,
        }
    }
}

impl From<std::io::Error> for ProvisionError {
    fn from(error: std::io::Error) -> Self {
        ProvisionError::Io(error)
    }
}

impl From<json5::Error> for ProvisionError {
    fn from(error: json5::Error) -> Self {
        ProvisionError::ConfigParse(error)
    }
}

impl From<url::ParseError> for ProvisionError {
    fn from(error: url::ParseError) -> Self {
        ProvisionError::UrlParse(error)
    }
}

impl From<askama::Error> for ProvisionError {
    fn from(error: askama::Error) -> Self {
        ProvisionError::Template(error)
    }
}

impl From<&str> for ProvisionError {
    fn from(msg: &str) -> Self {
        ProvisionError::Generic(msg.to_string())
    }
}

impl From<String> for ProvisionError {
    fn from(msg: String) -> Self {
        ProvisionError::Generic(msg)
    }
}

/// Result type alias using our custom error type
pub type Result<T> = std::result::Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_command_failed_display_includes_program_and_stderr() {
        let err = ProvisionError::CommandFailed {
            program: "nginx -t".to_string(),
            code: Some(1),
            stderr: "  unknown directive \"foo\"\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Command `nginx -t` failed (1): unknown directive \"foo\""
        );
    }

    #[test]
    fn test_command_failed_without_code_reports_signal() {
        let err = ProvisionError::CommandFailed {
            program: "openssl".to_string(),
            code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("(signal)"));
    }

    #[test]
    fn test_generic_from_str() {
        let err = ProvisionError::from("boom");
        assert_eq!(err.to_string(), "Error: boom");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err = ProvisionError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert!(err.source().is_some());
    }
}
