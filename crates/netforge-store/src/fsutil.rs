//! Atomic write primitives and filesystem helpers
//!
//! Uses the temp→fsync→rename pattern so no destination file is ever
//! observed partially written. Temp files are removed on every error path.

use chrono::Utc;
use netforge_core::errors::{io_error, Error, Result};
use rand::Rng;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Atomically write bytes to a file
///
/// Writes to a sibling temp file, fsyncs it, then renames it over the
/// destination. The parent directory is created if missing.
pub fn atomic_write(target: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let temp_path = temp_sibling(target);
    let result = write_synced(&temp_path, content)
        .and_then(|_| fs::rename(&temp_path, target).map_err(|e| io_error(target, e)));

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

/// Atomically copy a file, preserving its mode
///
/// The copy lands as a sibling temp file in the destination directory,
/// gets the source permissions, and is renamed into place.
pub fn copy_file_atomic(src: &Path, dst: &Path) -> Result<()> {
    let metadata = fs::metadata(src).map_err(|e| io_error(src, e))?;
    let content = fs::read(src).map_err(|e| io_error(src, e))?;

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let temp_path = temp_sibling(dst);
    let result = write_synced(&temp_path, &content)
        .and_then(|_| {
            fs::set_permissions(&temp_path, metadata.permissions())
                .map_err(|e| io_error(&temp_path, e))
        })
        .and_then(|_| fs::rename(&temp_path, dst).map_err(|e| io_error(dst, e)));

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

/// Check that at least `required_bytes` of disk space is available at `path`
#[cfg(unix)]
pub fn check_disk_space(path: &Path, required_bytes: u64) -> Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io_error(path, std::io::Error::other("path contains NUL byte")))?;

    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(io_error(path, std::io::Error::last_os_error()));
    }

    let available = stat.f_bavail as u64 * stat.f_frsize as u64;
    if available < required_bytes {
        return Err(Error::NoSpace {
            available,
            required: required_bytes,
        });
    }
    Ok(())
}

/// Generate a unique timestamp-based identifier
///
/// Format: `YYYYMMDD-HHMMSS-mmm-RRRR` (UTC, millisecond field, 4 hex chars
/// of randomness). The millisecond field plus the random suffix keeps ids
/// unique well past 1000 creations per second from a single process.
pub fn unique_id() -> String {
    let now = Utc::now();
    let suffix: u16 = rand::thread_rng().gen();
    format!(
        "{}-{:03}-{:04x}",
        now.format("%Y%m%d-%H%M%S"),
        now.timestamp_subsec_millis(),
        suffix
    )
}

fn temp_sibling(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    target.with_file_name(name)
}

fn write_synced(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| io_error(path, e))?;
    file.write_all(content).map_err(|e| io_error(path, e))?;
    file.sync_all().map_err(|e| io_error(path, e))?;
    Ok(())
}
