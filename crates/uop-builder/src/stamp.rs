//! Import timestamp files
//!
//! A stamp file holds the unix time, in seconds, of the last successful
//! import as decimal text.

use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::error::{BuilderError, BuilderResult};

/// Read the time stored in `path`, or `None` if the file does not exist
pub fn read_stamp(path: &Path) -> BuilderResult<Option<SystemTime>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No stamp at {}, importing everything", path.display());
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let seconds: u64 = text
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| BuilderError::InvalidStamp {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    Ok(Some(UNIX_EPOCH + Duration::from_secs(seconds)))
}

/// Store `time` in `path`
pub fn write_stamp(path: &Path, time: SystemTime) -> BuilderResult<()> {
    let seconds = time
        .duration_since(UNIX_EPOCH)
        .map_err(|e| BuilderError::InvalidStamp {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
        .as_secs();

    fs::write(path, format!("{seconds}\n"))?;
    debug!("Stored stamp {seconds} in {}", path.display());
    Ok(())
}
