//! Errors surfaced by the inspection library
//!
//! Only resource acquisition (enabling an inspector) and reading debug files
//! can fail. Configuration problems never show up here; see
//! [`crate::config::ConfigStatus`].

use std::io;
use std::path::PathBuf;

/// Errors from enabling an inspector or reading a debug file
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("failed to create debug directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create debug file {}: {source}", .path.display())]
    CreateFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write debug file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read debug file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl InspectError {
    /// Path of the file or directory involved
    pub fn path(&self) -> &PathBuf {
        match self {
            InspectError::CreateDir { path, .. }
            | InspectError::CreateFile { path, .. }
            | InspectError::Write { path, .. }
            | InspectError::Read { path, .. } => path,
        }
    }
}
