//! Command handlers
//!
//! Each handler gathers its data through `debug_rails`, then hands it to
//! `display` for text or to `serde_json` for `--json`.

use crate::cli::{Cli, Commands};
use crate::display;
use crate::errors::{EXIT_SELFTEST_MISMATCH, EXIT_SUCCESS};
use crate::selftest_command;
use anyhow::{Context, Result};
use debug_rails::{
    latest_debug_file, parse_debug_text, read_debug_file, DebugConfig, DebugFile, EntryType,
    InspectionEntry, SessionHeader, StateValue,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Path that means "read standard input"
pub const STDIN_PATH: &str = "-";

/// Run a parsed command line; returns the process exit code
pub fn run(cli: Cli, out: &mut dyn Write, color: bool) -> Result<i32> {
    let config = config_for(cli.root.as_deref());
    debug!(root = %config.base_dir().display(), status = ?config.status(), "configuration");

    match cli.command {
        Commands::Show { file, entry_type, divergences, json } => {
            let parsed = load_file(&file)?;
            let filter = if divergences {
                EntryFilter::Divergences
            } else {
                entry_type.map_or(EntryFilter::All, EntryFilter::Type)
            };
            let entries = filter_entries(&parsed, filter);
            if json {
                write_json(out, &entries)?;
            } else {
                display::render_entries(out, &entries, color)?;
            }
        }

        Commands::Summary { file, json } => {
            let parsed = load_file(&file)?;
            let summary = summarize(&parsed, Some(file));
            emit_summary(out, &summary, json, color)?;
        }

        Commands::Latest { component, json } => {
            let path = latest_debug_file(&config, &component)?.with_context(|| {
                format!(
                    "no debug files for component '{}' under {}",
                    component,
                    config.base_dir().display()
                )
            })?;
            let parsed = load_file(&path)?;
            let summary = summarize(&parsed, Some(path));
            emit_summary(out, &summary, json, color)?;
        }

        Commands::Correlate { context_id, json } => {
            let report = correlate(&config, &context_id)?;
            if json {
                write_json(out, &report)?;
            } else {
                display::render_correlation(out, &report, color)?;
            }
        }

        Commands::Selftest { keep, json } => {
            let report = selftest_command::run_selftest(config, keep)?;
            if json {
                write_json(out, &report)?;
            } else {
                display::render_selftest(out, &report, color)?;
            }
            if !report.passed() {
                return Ok(EXIT_SELFTEST_MISMATCH);
            }
        }
    }

    Ok(EXIT_SUCCESS)
}

/// Configuration for this invocation; `--root` replaces the base directory
pub fn config_for(root: Option<&Path>) -> DebugConfig {
    let config = DebugConfig::shared().clone();
    match root {
        Some(root) => config.with_base_dir(root),
        None => config,
    }
}

/// Parse a debug file, or standard input for `-`
pub fn load_file(path: &Path) -> Result<DebugFile> {
    if path.as_os_str() == STDIN_PATH {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read debug text from stdin")?;
        return Ok(parse_debug_text(&text));
    }
    read_debug_file(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Which entries `show` prints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFilter {
    All,
    Type(EntryType),
    Divergences,
}

pub fn filter_entries(file: &DebugFile, filter: EntryFilter) -> Vec<&InspectionEntry> {
    file.entries
        .iter()
        .filter(|e| match filter {
            EntryFilter::All => true,
            EntryFilter::Type(t) => e.entry.entry_type == t,
            EntryFilter::Divergences => e.entry.entry_type.is_divergence(),
        })
        .collect()
}

// ============================================================================
// Summary
// ============================================================================

/// One anomaly worth a reader's attention
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DivergenceRow {
    pub timestamp: chrono::NaiveDateTime,
    pub entry_type: EntryType,
    pub label: String,
    pub call_site: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<StateValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<StateValue>,
}

/// Per-file overview
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub header: Option<SessionHeader>,
    pub total: usize,
    /// Entry count per type tag, types with no entries omitted
    pub counts: BTreeMap<String, usize>,
    pub divergences: Vec<DivergenceRow>,
    pub skipped_lines: usize,
}

pub fn summarize(file: &DebugFile, path: Option<PathBuf>) -> Summary {
    let mut counts = BTreeMap::new();
    let mut divergences = Vec::new();

    for e in &file.entries {
        *counts.entry(e.entry.entry_type.as_str().to_string()).or_insert(0) += 1;
        if e.entry.entry_type.is_divergence() {
            divergences.push(divergence_row(e));
        }
    }

    Summary {
        path,
        header: file.header.clone(),
        total: file.entries.len(),
        counts,
        divergences,
        skipped_lines: file.skipped_lines,
    }
}

/// Expected/actual pair under the names each entry type uses
fn divergence_row(e: &InspectionEntry) -> DivergenceRow {
    let state = &e.entry.state;
    let (expected_key, actual_key) = match e.entry.entry_type {
        EntryType::SlowTiming => ("expected_ms", "duration_ms"),
        EntryType::CountDivergence => ("expected", "count"),
        EntryType::UnexpectedFlow => ("expected_branch", "branch_taken"),
        _ => ("expected", "actual"),
    };

    DivergenceRow {
        timestamp: e.entry.timestamp,
        entry_type: e.entry.entry_type,
        label: e.entry.label.clone(),
        call_site: e.entry.call_site.clone(),
        expected: state.get(expected_key).cloned(),
        actual: state.get(actual_key).cloned(),
    }
}

fn emit_summary(out: &mut dyn Write, summary: &Summary, json: bool, color: bool) -> Result<()> {
    if json {
        write_json(out, summary)
    } else {
        display::render_summary(out, summary, color)?;
        Ok(())
    }
}

// ============================================================================
// Correlation
// ============================================================================

/// Entries of one context id gathered from every component
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationReport {
    pub context_id: String,
    /// Entry count per component
    pub components: BTreeMap<String, usize>,
    /// Matching entries in timestamp order
    pub entries: Vec<InspectionEntry>,
    pub files_scanned: usize,
}

/// Scan every component directory under the debug root for `context_id`
///
/// Unreadable files are logged and skipped so one bad file does not hide
/// the rest of the timeline.
pub fn correlate(config: &DebugConfig, context_id: &str) -> Result<CorrelationReport> {
    let root = config.base_dir();
    let ext = config.file_extension();

    let mut report = CorrelationReport {
        context_id: context_id.to_string(),
        components: BTreeMap::new(),
        entries: Vec::new(),
        files_scanned: 0,
    };

    let components = match fs::read_dir(&root) {
        Ok(read_dir) => read_dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(report),
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to list {}", root.display()));
        }
    };

    for dir in components.filter_map(|e| e.ok()).map(|e| e.path()).filter(|p| p.is_dir()) {
        let Ok(files) = fs::read_dir(&dir) else {
            warn!(dir = %dir.display(), "skipping unreadable component directory");
            continue;
        };
        for path in files.filter_map(|e| e.ok()).map(|e| e.path()) {
            if !has_extension(&path, &ext) {
                continue;
            }
            report.files_scanned += 1;
            match read_debug_file(&path) {
                Ok(parsed) => report.entries.extend(
                    parsed
                        .entries
                        .into_iter()
                        .filter(|e| e.correlation.context_id == context_id),
                ),
                Err(err) => warn!(error = %err, "skipping unreadable debug file"),
            }
        }
    }

    report.entries.sort_by(|a, b| {
        a.entry
            .timestamp
            .cmp(&b.entry.timestamp)
            .then_with(|| a.correlation.component.cmp(&b.correlation.component))
    });
    for e in &report.entries {
        *report.components.entry(e.correlation.component.clone()).or_insert(0) += 1;
    }

    Ok(report)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(ext))
}

fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("Failed to encode JSON")?;
    writeln!(out)?;
    Ok(())
}
