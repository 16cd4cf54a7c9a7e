//! File writer - renders entries and appends them durably
//!
//! Each entry is rendered into one buffer, written with a single call,
//! flushed and synced before returning, so nothing captured is lost if the
//! process dies right after a capture call.

use crate::entry::{Correlation, Entry};
use crate::error::InspectError;
use crate::format;
use chrono::NaiveDateTime;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Attempts at finding a free file name before giving up
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Render one entry block (header line through separator)
pub fn render_entry(entry: &Entry, correlation: &Correlation) -> String {
    let mut out = format::render_header_line(
        entry.timestamp,
        entry.entry_type,
        &correlation.component,
        &correlation.origin,
        &correlation.context_id,
    );
    out.push_str(&format::render_event_line(&entry.label));
    out.push_str(&format::render_call_site_line(&entry.call_site));

    if !entry.state.is_empty() {
        out.push_str(&format::render_state_header());
        for (key, value) in &entry.state {
            out.push_str(&format::render_state_line(key, value));
        }
    }

    out.push_str(&format::render_separator());
    out
}

/// Open append-only debug file owned by one enabled inspector
#[derive(Debug)]
pub struct DebugSink {
    file: File,
    path: PathBuf,
}

impl DebugSink {
    /// Create a new, uniquely named debug file in `dir`
    ///
    /// The name is `<stem><ext>`; if that already exists (two enables within
    /// the same second) a `-N` suffix is added so sessions never share a file.
    pub fn create(dir: &Path, stem: &str, ext: &str, mode: u32) -> Result<Self, InspectError> {
        let mut attempt = 0;
        loop {
            let name = if attempt == 0 {
                format!("{}{}", stem, ext)
            } else {
                format!("{}-{}{}", stem, attempt, ext)
            };
            let path = dir.join(name);

            match open_new(&path, mode) {
                Ok(file) => {
                    debug!(path = %path.display(), "created debug file");
                    return Ok(Self { file, path });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                    attempt += 1;
                }
                Err(source) => return Err(InspectError::CreateFile { path, source }),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the session banner
    pub fn write_banner(
        &mut self,
        component: &str,
        context_id: &str,
        pid: u32,
        started: NaiveDateTime,
    ) -> Result<(), InspectError> {
        let banner = format::render_banner(component, context_id, pid, started);
        self.write_durably(banner.as_bytes())
    }

    /// Append one entry block
    pub fn append(&mut self, entry: &Entry, correlation: &Correlation) -> Result<(), InspectError> {
        let block = render_entry(entry, correlation);
        self.write_durably(block.as_bytes())
    }

    fn write_durably(&mut self, bytes: &[u8]) -> Result<(), InspectError> {
        self.file
            .write_all(bytes)
            .and_then(|_| self.file.flush())
            .and_then(|_| self.file.sync_data())
            .map_err(|source| InspectError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

fn open_new(path: &Path, mode: u32) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create_new(true).append(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    options.open(path)
}
