//! File reader - parses debug files back into entries
//!
//! Line oriented and forgiving: a final entry without a separator (file
//! truncated mid-write, or never closed) is still returned, and lines that
//! fit no rule are counted and skipped rather than failing the read.

use crate::config::{file_stem_component, DebugConfig};
use crate::entry::{Correlation, Entry, InspectionEntry, State};
use crate::error::InspectError;
use crate::format;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Session banner fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionHeader {
    pub component: Option<String>,
    pub context_id: Option<String>,
    pub pid: Option<u32>,
    pub started: Option<NaiveDateTime>,
    pub format_version: Option<u32>,
}

/// A fully parsed debug file
#[derive(Debug, Clone, Default, Serialize)]
pub struct DebugFile {
    /// `None` when the file has no banner
    pub header: Option<SessionHeader>,
    pub entries: Vec<InspectionEntry>,
    /// Lines that matched no rule
    pub skipped_lines: usize,
}

/// Read the entries of a debug file, in file order
pub fn read_entries(path: &Path) -> Result<Vec<InspectionEntry>, InspectError> {
    Ok(read_debug_file(path)?.entries)
}

/// Read a debug file including its session banner
pub fn read_debug_file(path: &Path) -> Result<DebugFile, InspectError> {
    let text = fs::read_to_string(path).map_err(|source| InspectError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = parse_debug_text(&text);
    debug!(
        path = %path.display(),
        entries = parsed.entries.len(),
        skipped = parsed.skipped_lines,
        "read debug file"
    );
    Ok(parsed)
}

/// Parse debug file text
pub fn parse_debug_text(text: &str) -> DebugFile {
    let mut parser = Parser::default();
    for line in text.lines() {
        parser.feed(line);
    }
    parser.finish()
}

#[derive(Default)]
struct Parser {
    header: Option<SessionHeader>,
    entries: Vec<InspectionEntry>,
    current: Option<InspectionEntry>,
    in_state: bool,
    skipped_lines: usize,
}

impl Parser {
    fn feed(&mut self, line: &str) {
        if format::looks_like_header(line) {
            self.finalize();
            match format::parse_header_line(line) {
                Some(h) => {
                    self.current = Some(InspectionEntry {
                        correlation: Correlation {
                            component: h.component,
                            origin: h.origin,
                            context_id: h.context_id,
                        },
                        entry: Entry {
                            timestamp: h.timestamp,
                            entry_type: h.entry_type,
                            label: String::new(),
                            call_site: String::new(),
                            state: State::new(),
                        },
                    });
                }
                None => self.skipped_lines += 1,
            }
            return;
        }

        let trimmed = line.trim_start();
        if trimmed.trim_end().is_empty() {
            return;
        }

        if self.current.is_none() {
            if !self.parse_banner_line(line) {
                self.skipped_lines += 1;
            }
            return;
        }

        if format::is_separator(trimmed.trim_end()) {
            self.finalize();
            return;
        }

        let Some(current) = self.current.as_mut() else {
            return;
        };

        if !self.in_state {
            if let Some(label) = format::parse_prefixed(trimmed, format::EVENT_PREFIX) {
                current.entry.label = label;
                return;
            }
            if let Some(site) = format::parse_prefixed(trimmed, format::CALL_SITE_PREFIX) {
                current.entry.call_site = site;
                return;
            }
            if trimmed.trim_end() == format::STATE_HEADER {
                self.in_state = true;
                return;
            }
        }

        match format::parse_state_line(trimmed) {
            Some((key, value)) => {
                current.entry.state.insert(key, value);
            }
            None => self.skipped_lines += 1,
        }
    }

    /// Banner lines only appear before the first entry
    fn parse_banner_line(&mut self, line: &str) -> bool {
        if line.starts_with(format::BANNER_TOP) || line.starts_with(format::BANNER_BOTTOM) {
            self.header.get_or_insert_with(SessionHeader::default);
            return true;
        }
        let Some(field) = line.strip_prefix(format::BANNER_EDGE) else {
            return false;
        };

        let header = self.header.get_or_insert_with(SessionHeader::default);
        if let Some(v) = field.strip_prefix(format::BANNER_TITLE) {
            header.component = Some(v.trim().to_string());
        } else if let Some(v) = field.strip_prefix(format::BANNER_CONTEXT) {
            header.context_id = Some(format::unescape_text(v.trim_end()));
        } else if let Some(v) = field.strip_prefix(format::BANNER_PID) {
            header.pid = v.trim().parse().ok();
        } else if let Some(v) = field.strip_prefix(format::BANNER_STARTED) {
            header.started = format::parse_banner_timestamp(v);
        } else if let Some(v) = field.strip_prefix(format::BANNER_FORMAT) {
            header.format_version = v.trim().parse().ok();
        } else {
            return false;
        }
        true
    }

    fn finalize(&mut self) {
        if let Some(entry) = self.current.take() {
            self.entries.push(entry);
        }
        self.in_state = false;
    }

    fn finish(mut self) -> DebugFile {
        self.finalize();
        DebugFile {
            header: self.header,
            entries: self.entries,
            skipped_lines: self.skipped_lines,
        }
    }
}

// ============================================================================
// Locating debug files
// ============================================================================

/// Debug files of a component, oldest first
///
/// A component that never enabled an inspector has no directory; that is an
/// empty list, not an error.
pub fn debug_files(config: &DebugConfig, component: &str) -> Result<Vec<PathBuf>, InspectError> {
    let dir = config.component_dir(component);
    let read_dir = match fs::read_dir(&dir) {
        Ok(read_dir) => read_dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(InspectError::Read { path: dir, source }),
    };

    let stem_prefix = format!("{}-", file_stem_component(component));
    let ext = config.file_extension();

    let mut files: Vec<((u64, u32), PathBuf)> = read_dir
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            let key = session_key(name, &stem_prefix, &ext)?;
            Some((key, path))
        })
        .collect();

    files.sort();
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

/// Newest debug file of a component, if any
pub fn latest_debug_file(config: &DebugConfig, component: &str) -> Result<Option<PathBuf>, InspectError> {
    Ok(debug_files(config, component)?.pop())
}

/// `(unix_seconds, suffix)` from `<component>-<secs>[-<n>]<ext>`
fn session_key(name: &str, stem_prefix: &str, ext: &str) -> Option<(u64, u32)> {
    let rest = name.strip_prefix(stem_prefix)?.strip_suffix(ext)?;
    match rest.split_once('-') {
        Some((secs, n)) => Some((secs.parse().ok()?, n.parse().ok()?)),
        None => Some((rest.parse().ok()?, 0)),
    }
}
