//! Self-test - write one entry of each kind, read the file back, compare
//!
//! Exercises the whole pipeline against the real configuration: directory
//! and file creation, every capture method, the writer and the reader.

use anyhow::{Context, Result};
use debug_rails::{
    read_debug_file, state, CountingAllocator, DebugConfig, DebugFile, EntryType, Inspector,
    MemorySource, State, StateValue,
};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Component name the self-test writes under
pub const SELFTEST_COMPONENT: &str = "debugctl";

/// One verified property
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

impl Check {
    fn pass(name: impl Into<String>) -> Self {
        Self { name: name.into(), passed: true, detail: String::new() }
    }

    fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { name: name.into(), passed: false, detail: detail.into() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SelftestReport {
    pub path: PathBuf,
    pub kept: bool,
    pub context_id: String,
    pub checks: Vec<Check>,
}

impl SelftestReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }
}

/// What one capture call should read back as
#[derive(Debug)]
struct Expectation {
    entry_type: EntryType,
    label: &'static str,
    /// Exact state, when the values are deterministic
    exact: Option<State>,
    /// Keys that must be present otherwise
    keys: &'static [&'static str],
}

impl Expectation {
    fn exact(entry_type: EntryType, label: &'static str, state: State) -> Self {
        Self { entry_type, label, exact: Some(state), keys: &[] }
    }

    fn keys(entry_type: EntryType, label: &'static str, keys: &'static [&'static str]) -> Self {
        Self { entry_type, label, exact: None, keys }
    }
}

/// Run the self-test; the debug file is removed afterwards unless `keep`
pub fn run_selftest(config: DebugConfig, keep: bool) -> Result<SelftestReport> {
    let inspector = Inspector::with_config(SELFTEST_COMPONENT, None, config);
    inspector
        .enable()
        .context("Failed to enable the self-test inspector")?;
    let path = inspector
        .debug_file()
        .context("Self-test inspector has no debug file")?;

    let expected = capture_all(&inspector);
    inspector.close();

    let parsed = read_debug_file(&path)
        .with_context(|| format!("Failed to read back {}", path.display()))?;
    let checks = verify(&expected, &parsed, inspector.context_id());

    let report = SelftestReport {
        path: path.clone(),
        kept: keep,
        context_id: inspector.context_id().to_string(),
        checks,
    };
    info!(passed = report.passed(), failures = report.failures(), "self-test finished");

    if !keep {
        if let Err(err) = fs::remove_file(&path) {
            warn!(path = %path.display(), error = %err, "could not remove self-test file");
        }
    }

    Ok(report)
}

fn capture_all(inspector: &Inspector) -> Vec<Expectation> {
    let ms = Duration::from_millis;
    let mut expected = Vec::new();

    let vars = state! {
        "text" => "plain",
        "quoted" => "42",
        "number" => 42,
        "flag" => true,
        "ratio" => 0.25,
        "items" => vec!["a", "b, c"],
    };
    inspector.snapshot("selftest-snapshot", vars.clone());
    expected.push(Expectation::exact(EntryType::Snapshot, "selftest-snapshot", vars));

    inspector.expected_state("selftest-expected", 7, 7, State::new());
    expected.push(Expectation::exact(
        EntryType::ExpectedState,
        "selftest-expected",
        state! { "expected" => 7, "actual" => 7, "matches" => true },
    ));

    inspector.expected_state("selftest-divergence", "left", "right", state! { "n" => 1 });
    expected.push(Expectation::exact(
        EntryType::Divergence,
        "selftest-divergence",
        state! { "expected" => "left", "actual" => "right", "matches" => false, "n" => 1 },
    ));

    inspector.conditional_snapshot("selftest-conditional-skipped", false, State::new());
    inspector.conditional_snapshot("selftest-conditional", true, state! { "n" => 2 });
    expected.push(Expectation::exact(
        EntryType::Conditional,
        "selftest-conditional",
        state! { "n" => 2, "condition_met" => true },
    ));

    inspector.timing("selftest-timing", ms(10), ms(20));
    expected.push(Expectation::exact(
        EntryType::Timing,
        "selftest-timing",
        state! { "duration_ms" => 10, "expected_ms" => 20, "variance_ms" => -10, "within_expected" => true },
    ));

    inspector.timing("selftest-slow", ms(30), ms(20));
    expected.push(Expectation::exact(
        EntryType::SlowTiming,
        "selftest-slow",
        state! { "duration_ms" => 30, "expected_ms" => 20, "variance_ms" => 10, "within_expected" => false },
    ));

    inspector.counter("selftest-counter", 3, 3);
    expected.push(Expectation::exact(
        EntryType::Counter,
        "selftest-counter",
        state! { "count" => 3, "expected" => 3, "variance" => 0, "matches" => true },
    ));

    inspector.counter("selftest-count-divergence", 4, 3);
    expected.push(Expectation::exact(
        EntryType::CountDivergence,
        "selftest-count-divergence",
        state! { "count" => 4, "expected" => 3, "variance" => 1, "matches" => false },
    ));

    inspector.call_stack("selftest-callstack", 0);
    expected.push(Expectation::keys(
        EntryType::CallStack,
        "selftest-callstack",
        &["depth", "requested_depth", "stack"],
    ));

    inspector.checkpoint("selftest-checkpoint", State::new());
    expected.push(Expectation::exact(EntryType::Checkpoint, "selftest-checkpoint", State::new()));

    inspector.flow("selftest-flow", "fast-path", Some("fast-path"));
    expected.push(Expectation::exact(
        EntryType::Flow,
        "selftest-flow",
        state! { "branch_taken" => "fast-path", "expected_branch" => "fast-path", "matches_expected" => true },
    ));

    inspector.flow("selftest-unexpected-flow", "slow-path", Some("fast-path"));
    expected.push(Expectation::exact(
        EntryType::UnexpectedFlow,
        "selftest-unexpected-flow",
        state! { "branch_taken" => "slow-path", "expected_branch" => "fast-path", "matches_expected" => false },
    ));

    inspector.memory("selftest-memory", state! { "phase" => "selftest" });
    expected.push(Expectation::keys(
        EntryType::Memory,
        "selftest-memory",
        &["alloc_mb", "total_alloc_mb", "sys_mb", "num_gc", "threads", "memory_source", "phase"],
    ));

    inspector.system_context("selftest-system");
    expected.push(Expectation::keys(
        EntryType::SystemContext,
        "selftest-system",
        &["user", "home", "rust_version", "num_cpu"],
    ));

    expected
}

fn verify(expected: &[Expectation], file: &DebugFile, context_id: &str) -> Vec<Check> {
    let mut checks = Vec::new();

    match &file.header {
        Some(h)
            if h.component.as_deref() == Some(SELFTEST_COMPONENT)
                && h.context_id.as_deref() == Some(context_id) =>
        {
            checks.push(Check::pass("session banner"))
        }
        Some(h) => checks.push(Check::fail("session banner", format!("unexpected banner {:?}", h))),
        None => checks.push(Check::fail("session banner", "banner missing")),
    }

    if file.entries.len() == expected.len() {
        checks.push(Check::pass("entry count"));
    } else {
        checks.push(Check::fail(
            "entry count",
            format!("wrote {}, read {}", expected.len(), file.entries.len()),
        ));
    }

    if file.skipped_lines > 0 {
        checks.push(Check::fail("clean parse", format!("{} lines skipped", file.skipped_lines)));
    }

    for (want, got) in expected.iter().zip(&file.entries) {
        let name = format!("{} {}", want.entry_type, want.label);
        let entry = &got.entry;

        let problem = if entry.entry_type != want.entry_type {
            Some(format!("type {}", entry.entry_type))
        } else if entry.label != want.label {
            Some(format!("label {:?}", entry.label))
        } else if got.correlation.context_id != context_id {
            Some(format!("context id {:?}", got.correlation.context_id))
        } else if entry.call_site.is_empty() || entry.call_site == "unknown" {
            Some("call site not resolved".to_string())
        } else {
            state_problem(want, &entry.state)
        };

        checks.push(match problem {
            Some(detail) => Check::fail(name, detail),
            None => Check::pass(name),
        });
    }

    checks.push(memory_source_check(file, expected_source()));
    checks
}

fn expected_source() -> MemorySource {
    if CountingAllocator::is_installed() {
        MemorySource::Allocator
    } else {
        MemorySource::Process
    }
}

/// The MEMORY entry names where its figures came from
fn memory_source_check(file: &DebugFile, want: MemorySource) -> Check {
    let name = "memory source";
    let source = file
        .entries
        .iter()
        .find(|e| e.entry.entry_type == EntryType::Memory)
        .and_then(|e| e.entry.state.get("memory_source"));

    match source {
        Some(StateValue::Text(s)) if s == want.as_str() => Check {
            name: name.to_string(),
            passed: true,
            detail: s.clone(),
        },
        Some(other) => Check::fail(name, format!("{} instead of {}", other, want.as_str())),
        None => Check::fail(name, "no MEMORY entry with a source"),
    }
}

fn state_problem(want: &Expectation, state: &State) -> Option<String> {
    if let Some(exact) = &want.exact {
        if exact != state {
            return Some(format!("state {}", describe(state)));
        }
        return None;
    }

    let missing: Vec<&str> = want.keys.iter().copied().filter(|k| !state.contains_key(*k)).collect();
    if missing.is_empty() {
        None
    } else {
        Some(format!("missing keys {}", missing.join(", ")))
    }
}

fn describe(state: &State) -> String {
    let pairs: Vec<String> = state
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    format!("{{{}}}", pairs.join(", "))
}
