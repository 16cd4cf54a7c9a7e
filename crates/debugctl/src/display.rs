//! Text rendering for debugctl
//!
//! ASCII section markers, color only when asked for.

use crate::commands::{CorrelationReport, Summary};
use crate::selftest_command::SelftestReport;
use debug_rails::{EntryType, InspectionEntry};
use owo_colors::OwoColorize;
use std::io::{self, Write};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Entry type tag, red for divergences
fn type_tag(entry_type: EntryType, color: bool) -> String {
    let tag = entry_type.as_str();
    if !color {
        tag.to_string()
    } else if entry_type.is_divergence() {
        tag.bright_red().bold().to_string()
    } else {
        tag.cyan().to_string()
    }
}

fn dim(s: &str, color: bool) -> String {
    if color {
        s.dimmed().to_string()
    } else {
        s.to_string()
    }
}

fn section(out: &mut dyn Write, title: &str, color: bool) -> io::Result<()> {
    let title = format!("[{}]", title);
    if color {
        writeln!(out, "{}", title.bold())
    } else {
        writeln!(out, "{}", title)
    }
}

/// One block per entry: header line, call site, then state
pub fn render_entries(out: &mut dyn Write, entries: &[&InspectionEntry], color: bool) -> io::Result<()> {
    if entries.is_empty() {
        return writeln!(out, "{}", dim("(no entries)", color));
    }

    for e in entries {
        writeln!(
            out,
            "{} {:<16} {}  {}",
            dim(&e.entry.timestamp.format(TIMESTAMP_FORMAT).to_string(), color),
            type_tag(e.entry.entry_type, color),
            e.correlation.component,
            e.entry.label
        )?;
        writeln!(out, "    at {}", dim(&e.entry.call_site, color))?;
        let width = e.entry.state.keys().map(|k| k.len()).max().unwrap_or(0);
        for (key, value) in &e.entry.state {
            writeln!(out, "    {:width$} = {}", key, value, width = width)?;
        }
    }
    Ok(())
}

pub fn render_summary(out: &mut dyn Write, summary: &Summary, color: bool) -> io::Result<()> {
    section(out, "SESSION", color)?;
    if let Some(path) = &summary.path {
        writeln!(out, "  file        {}", path.display())?;
    }
    match &summary.header {
        Some(h) => {
            writeln!(out, "  component   {}", h.component.as_deref().unwrap_or("-"))?;
            writeln!(out, "  context     {}", h.context_id.as_deref().unwrap_or("-"))?;
            writeln!(out, "  pid         {}", h.pid.map_or("-".to_string(), |p| p.to_string()))?;
            if let Some(started) = h.started {
                writeln!(out, "  started     {}", started)?;
            }
        }
        None => writeln!(out, "  {}", dim("no session banner", color))?,
    }
    writeln!(out, "  entries     {}", summary.total)?;
    if summary.skipped_lines > 0 {
        writeln!(out, "  skipped     {} lines", summary.skipped_lines)?;
    }
    writeln!(out)?;

    section(out, "TYPES", color)?;
    if summary.counts.is_empty() {
        writeln!(out, "  {}", dim("(none)", color))?;
    }
    for (tag, count) in &summary.counts {
        writeln!(out, "  {:<16} {:>6}", tag, count)?;
    }
    writeln!(out)?;

    section(out, "DIVERGENCES", color)?;
    if summary.divergences.is_empty() {
        let none = "none";
        if color {
            writeln!(out, "  {}", none.green())?;
        } else {
            writeln!(out, "  {}", none)?;
        }
    }
    for d in &summary.divergences {
        writeln!(
            out,
            "  {} {}  {}",
            type_tag(d.entry_type, color),
            d.label,
            dim(&format!("({})", d.call_site), color)
        )?;
        if let (Some(expected), Some(actual)) = (&d.expected, &d.actual) {
            writeln!(out, "      expected {}, got {}", expected, actual)?;
        }
    }
    Ok(())
}

pub fn render_correlation(out: &mut dyn Write, report: &CorrelationReport, color: bool) -> io::Result<()> {
    section(out, "CONTEXT", color)?;
    writeln!(out, "  id          {}", report.context_id)?;
    writeln!(out, "  files       {}", report.files_scanned)?;
    writeln!(out, "  entries     {}", report.entries.len())?;
    writeln!(out)?;

    section(out, "COMPONENTS", color)?;
    if report.components.is_empty() {
        writeln!(out, "  {}", dim("(no matching entries)", color))?;
        return Ok(());
    }
    for (component, count) in &report.components {
        writeln!(out, "  {:<16} {:>6}", component, count)?;
    }
    writeln!(out)?;

    section(out, "TIMELINE", color)?;
    let entries: Vec<&InspectionEntry> = report.entries.iter().collect();
    render_entries(out, &entries, color)
}

pub fn render_selftest(out: &mut dyn Write, report: &SelftestReport, color: bool) -> io::Result<()> {
    section(out, "SELFTEST", color)?;
    for check in &report.checks {
        let mark = match (check.passed, color) {
            (true, true) => "[OK]  ".bright_green().to_string(),
            (false, true) => "[FAIL]".bright_red().to_string(),
            (true, false) => "[OK]  ".to_string(),
            (false, false) => "[FAIL]".to_string(),
        };
        if check.detail.is_empty() {
            writeln!(out, "  {} {}", mark, check.name)?;
        } else {
            writeln!(out, "  {} {}: {}", mark, check.name, check.detail)?;
        }
    }
    writeln!(out)?;

    let verdict = if report.passed() {
        format!("{} checks passed", report.checks.len())
    } else {
        format!("{} of {} checks failed", report.failures(), report.checks.len())
    };
    writeln!(out, "{}", verdict)?;
    if report.kept {
        writeln!(out, "file kept at {}", report.path.display())?;
    }
    Ok(())
}
