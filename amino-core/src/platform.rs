//! Platform directory resolution.

use std::path::PathBuf;

use crate::constants;
use crate::error::{AminoError, AminoResult};

/// Platform helpers for locating framework directories.
pub struct Platform;

impl Platform {
    /// Directory for persistent framework data (config, logs).
    pub fn data_dir() -> AminoResult<PathBuf> {
        dirs::data_dir()
            .map(|d| d.join(constants::APP_NAME))
            .ok_or_else(|| AminoError::Config("could not resolve platform data dir".into()))
    }

    /// Directory for log files.
    pub fn log_dir() -> AminoResult<PathBuf> {
        Ok(Self::data_dir()?.join("logs"))
    }
}
