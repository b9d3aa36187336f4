use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::fs;
use std::io;
use std::path::Path;

/// Whether an ensure operation had to touch the filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Created,
    Updated,
    Unchanged,
}

/// Format `now` in `tz` as `YYYY-MM-DD HH:MM:SS <abbrev>`
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use nginx_bootstrap::utils::format_timestamp;
///
/// let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
/// assert_eq!(format_timestamp(now, chrono_tz::UTC), "2024-01-02 03:04:05 UTC");
/// ```
#[must_use]
pub fn format_timestamp(now: DateTime<Utc>, tz: Tz) -> String {
    now.with_timezone(&tz)
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string()
}

/// Create `path` and its parents if missing
///
/// # Errors
///
/// Returns an error if the directory cannot be created
pub fn ensure_dir(path: &Path) -> io::Result<Change> {
    if path.is_dir() {
        return Ok(Change::Unchanged);
    }
    fs::create_dir_all(path)?;
    Ok(Change::Created)
}

/// Write `content` to `path` unless the file already holds exactly that content
///
/// # Errors
///
/// Returns an error if the file cannot be read or written
pub fn ensure_file_content(path: &Path, content: &str) -> io::Result<Change> {
    let change = match fs::read_to_string(path) {
        Ok(existing) if existing == content => return Ok(Change::Unchanged),
        Ok(_) => Change::Updated,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Change::Created,
        // Unreadable or non-UTF-8 content is simply replaced
        Err(_) => Change::Updated,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(change)
}

/// Point the symlink at `link` to `target`, replacing a link that points elsewhere
///
/// # Errors
///
/// Returns an error if the old link cannot be removed or the new one created
#[cfg(unix)]
pub fn ensure_symlink(target: &Path, link: &Path) -> io::Result<Change> {
    let change = match fs::read_link(link) {
        Ok(current) if current == target => return Ok(Change::Unchanged),
        Ok(_) => {
            fs::remove_file(link)?;
            Change::Updated
        }
        Err(_) if link.symlink_metadata().is_ok() => {
            // a regular file squatting on the link name
            fs::remove_file(link)?;
            Change::Updated
        }
        Err(_) => Change::Created,
    };
    std::os::unix::fs::symlink(target, link)?;
    Ok(change)
}
