//! Capture methods
//!
//! Each method writes exactly one entry, or none when the inspector is
//! disabled. The entry type tells success from anomaly without reading
//! values: a method with an expectation picks its divergence type whenever
//! the observation disagrees.
//!
//! All methods are `#[track_caller]` so the recorded call site is the line
//! that invoked them.

use crate::callsite::{render_chain, stack_frames};
use crate::entry::{EntryType, State, StateValue};
use crate::inspector::Inspector;
use crate::memory::{to_mb, MemoryStats};
use crate::system::collect_context;
use std::time::Duration;

impl Inspector {
    /// Record variable state as observed
    #[track_caller]
    pub fn snapshot(&self, label: &str, state: State) {
        if !self.is_enabled() {
            return;
        }
        self.record(EntryType::Snapshot, label, state);
    }

    /// Compare an expected value with the actual one
    ///
    /// Writes EXPECTED_STATE on match, DIVERGENCE otherwise. `expected`,
    /// `actual` and `matches` override caller keys of the same name.
    #[track_caller]
    pub fn expected_state<T>(&self, label: &str, expected: T, actual: T, mut state: State)
    where
        T: PartialEq + Into<StateValue>,
    {
        if !self.is_enabled() {
            return;
        }
        let matches = expected == actual;
        state.insert("expected".into(), expected.into());
        state.insert("actual".into(), actual.into());
        state.insert("matches".into(), matches.into());

        let entry_type = if matches {
            EntryType::ExpectedState
        } else {
            EntryType::Divergence
        };
        self.record(entry_type, label, state);
    }

    /// Snapshot only when `condition` holds; otherwise nothing is written
    #[track_caller]
    pub fn conditional_snapshot(&self, label: &str, condition: bool, mut state: State) {
        if !condition || !self.is_enabled() {
            return;
        }
        state.insert("condition_met".into(), true.into());
        self.record(EntryType::Conditional, label, state);
    }

    /// Compare a measured duration with its budget
    ///
    /// SLOW_TIMING only when `duration` strictly exceeds `expected`.
    #[track_caller]
    pub fn timing(&self, label: &str, duration: Duration, expected: Duration) {
        if !self.is_enabled() {
            return;
        }
        let within = duration <= expected;
        let mut state = State::new();
        state.insert("duration_ms".into(), whole_millis(duration).into());
        state.insert("expected_ms".into(), whole_millis(expected).into());
        state.insert("variance_ms".into(), variance_millis(duration, expected).into());
        state.insert("within_expected".into(), within.into());

        let entry_type = if within {
            EntryType::Timing
        } else {
            EntryType::SlowTiming
        };
        self.record(entry_type, label, state);
    }

    /// Compare an execution count with the expected count
    #[track_caller]
    pub fn counter(&self, label: &str, count: i64, expected: i64) {
        if !self.is_enabled() {
            return;
        }
        let matches = count == expected;
        let mut state = State::new();
        state.insert("count".into(), count.into());
        state.insert("expected".into(), expected.into());
        state.insert("variance".into(), count.saturating_sub(expected).into());
        state.insert("matches".into(), matches.into());

        let entry_type = if matches {
            EntryType::Counter
        } else {
            EntryType::CountDivergence
        };
        self.record(entry_type, label, state);
    }

    /// Record the call chain leading here, innermost frame first
    ///
    /// A depth of 0 uses the configured default. A shallower stack yields
    /// fewer frames; `depth` is the number of frames captured and
    /// `requested_depth` the limit asked for.
    #[track_caller]
    pub fn call_stack(&self, label: &str, depth: usize) {
        if !self.is_enabled() {
            return;
        }
        let requested = if depth == 0 {
            self.config().default_stack_depth()
        } else {
            depth
        };
        let frames = stack_frames(requested);

        let mut state = State::new();
        state.insert("depth".into(), frames.len().into());
        state.insert("requested_depth".into(), requested.into());
        state.insert("stack".into(), render_chain(&frames).into());
        self.record(EntryType::CallStack, label, state);
    }

    /// Mark that execution reached this point
    #[track_caller]
    pub fn checkpoint(&self, label: &str, state: State) {
        if !self.is_enabled() {
            return;
        }
        self.record(EntryType::Checkpoint, label, state);
    }

    /// Record which branch ran, optionally against the expected one
    ///
    /// An empty expected branch counts as none given.
    #[track_caller]
    pub fn flow(&self, label: &str, branch: &str, expected: Option<&str>) {
        if !self.is_enabled() {
            return;
        }
        let mut state = State::new();
        state.insert("branch_taken".into(), branch.into());

        let mut entry_type = EntryType::Flow;
        if let Some(expected) = expected.filter(|e| !e.is_empty()) {
            let matches = branch == expected;
            state.insert("expected_branch".into(), expected.into());
            state.insert("matches_expected".into(), matches.into());
            if !matches {
                entry_type = EntryType::UnexpectedFlow;
            }
        }
        self.record(entry_type, label, state);
    }

    /// Record memory figures, with caller values merged on top
    #[track_caller]
    pub fn memory(&self, label: &str, vars: State) {
        if !self.is_enabled() {
            return;
        }
        let stats = MemoryStats::read();

        let mut state = State::new();
        state.insert("alloc_mb".into(), StateValue::from_u64(to_mb(stats.alloc_bytes)));
        state.insert(
            "total_alloc_mb".into(),
            StateValue::from_u64(to_mb(stats.total_alloc_bytes)),
        );
        state.insert("sys_mb".into(), StateValue::from_u64(to_mb(stats.sys_bytes)));
        state.insert("num_gc".into(), 0i64.into());
        state.insert("threads".into(), stats.threads.into());
        state.insert("memory_source".into(), stats.source.as_str().into());
        state.extend(vars);

        self.record(EntryType::Memory, label, state);
    }

    /// Record host and process context from every source that answers
    #[track_caller]
    pub fn system_context(&self, label: &str) {
        if !self.is_enabled() {
            return;
        }
        let state = collect_context(self.identity());
        self.record(EntryType::SystemContext, label, state);
    }
}

fn whole_millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// `duration - expected` in milliseconds, truncated toward zero
fn variance_millis(duration: Duration, expected: Duration) -> i64 {
    let nanos = duration.as_nanos() as i128 - expected.as_nanos() as i128;
    let millis = nanos / 1_000_000;
    i64::try_from(millis).unwrap_or(if millis < 0 { i64::MIN } else { i64::MAX })
}
