//! Property Tests
//!
//! Invariants checked across randomized inputs. Inputs come from a small
//! xorshift generator so runs are reproducible without extra crates.
//!
//! ## Invariants Tested
//!
//! - Timing is SLOW_TIMING exactly when duration > expected
//! - Counter(n, n) is COUNTER with variance 0; otherwise COUNT_DIVERGENCE
//! - ExpectedState(x, x) is EXPECTED_STATE; ExpectedState(x, y), x != y, is DIVERGENCE
//! - ConditionalSnapshot(false) never writes
//! - Random text and numbers read back unchanged
//! - Distinct state keys, whatever their characters, read back distinct
//! - Concurrent captures on one inspector never interleave

use debug_rails::{state, DebugConfig, EntryType, Inspector, State, StateValue};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Simple pseudo-random number generator for test inputs
/// Uses xorshift64 algorithm
struct TestRng {
    state: u64,
}

impl TestRng {
    fn new(seed: u64) -> Self {
        Self { state: if seed == 0 { 1 } else { seed } }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    fn next_range(&mut self, min: u64, max: u64) -> u64 {
        if max <= min { return min; }
        min + (self.next_u64() % (max - min))
    }

    fn next_bool(&mut self) -> bool {
        self.next_u64() & 1 == 1
    }

    /// Text drawn from characters the format treats specially
    fn next_text(&mut self) -> String {
        const ALPHABET: &[char] = &[
            'a', 'Z', '7', ' ', ':', ',', '[', ']', '"', '\\', '\n', '\r', '-', '|', 'é', '.',
        ];
        let len = self.next_range(0, 12) as usize;
        (0..len)
            .map(|_| ALPHABET[self.next_range(0, ALPHABET.len() as u64) as usize])
            .collect()
    }
}

fn enabled_inspector(temp: &TempDir, component: &str) -> Inspector {
    let config = DebugConfig::default().with_base_dir(temp.path());
    let inspector = Inspector::with_config(component, None, config);
    inspector.enable().unwrap();
    inspector
}

fn read_back(inspector: &Inspector) -> Vec<debug_rails::InspectionEntry> {
    let path = inspector.debug_file().unwrap();
    debug_rails::read_entries(&path).unwrap()
}

// ============================================================================
// Outcome typing
// ============================================================================

mod outcome_properties {
    use super::*;

    #[test]
    fn test_timing_slow_iff_over_budget() {
        let temp = TempDir::new().unwrap();
        let inspector = enabled_inspector(&temp, "timing");
        let mut rng = TestRng::new(42);

        let mut cases = Vec::new();
        for _ in 0..200 {
            let expected = Duration::from_micros(rng.next_range(0, 5_000));
            // Bias toward the boundary
            let duration = match rng.next_range(0, 3) {
                0 => expected,
                1 => expected + Duration::from_nanos(1),
                _ => Duration::from_micros(rng.next_range(0, 5_000)),
            };
            inspector.timing("t", duration, expected);
            cases.push((duration, expected));
        }

        let entries = read_back(&inspector);
        assert_eq!(entries.len(), cases.len());
        for (entry, (duration, expected)) in entries.iter().zip(&cases) {
            let slow = duration > expected;
            let want = if slow { EntryType::SlowTiming } else { EntryType::Timing };
            assert_eq!(entry.entry.entry_type, want, "{:?} vs {:?}", duration, expected);
            assert_eq!(entry.entry.state["within_expected"], StateValue::Bool(!slow));
        }
    }

    #[test]
    fn test_counter_matches_iff_equal() {
        let temp = TempDir::new().unwrap();
        let inspector = enabled_inspector(&temp, "counter");
        let mut rng = TestRng::new(7);

        let mut cases = Vec::new();
        for _ in 0..200 {
            let expected = rng.next_range(0, 50) as i64 - 25;
            let count = if rng.next_bool() { expected } else { rng.next_range(0, 50) as i64 - 25 };
            inspector.counter("n", count, expected);
            cases.push((count, expected));
        }

        for (entry, (count, expected)) in read_back(&inspector).iter().zip(&cases) {
            let state = &entry.entry.state;
            assert_eq!(state["variance"], StateValue::Int(count - expected));
            if count == expected {
                assert_eq!(entry.entry.entry_type, EntryType::Counter);
                assert_eq!(state["variance"], StateValue::Int(0));
                assert_eq!(state["matches"], StateValue::Bool(true));
            } else {
                assert_eq!(entry.entry.entry_type, EntryType::CountDivergence);
                assert_eq!(state["matches"], StateValue::Bool(false));
            }
        }
    }

    #[test]
    fn test_expected_state_typing() {
        let temp = TempDir::new().unwrap();
        let inspector = enabled_inspector(&temp, "expect");
        let mut rng = TestRng::new(99);

        let mut cases = Vec::new();
        for _ in 0..100 {
            let expected = rng.next_text();
            let actual = if rng.next_bool() { expected.clone() } else { rng.next_text() };
            inspector.expected_state("x", expected.clone(), actual.clone(), State::new());
            cases.push(expected == actual);
        }

        for (entry, same) in read_back(&inspector).iter().zip(&cases) {
            let want = if *same { EntryType::ExpectedState } else { EntryType::Divergence };
            assert_eq!(entry.entry.entry_type, want);
            assert_eq!(entry.entry.state["matches"], StateValue::Bool(*same));
        }
    }

    #[test]
    fn test_conditional_false_never_writes() {
        let temp = TempDir::new().unwrap();
        let inspector = enabled_inspector(&temp, "cond");
        let mut rng = TestRng::new(5);

        let mut taken = 0;
        for _ in 0..100 {
            let condition = rng.next_bool();
            if condition {
                taken += 1;
            }
            inspector.conditional_snapshot(&rng.next_text(), condition, state! { "v" => 1 });
        }

        let entries = read_back(&inspector);
        assert_eq!(entries.len(), taken);
        assert!(entries.iter().all(|e| e.entry.entry_type == EntryType::Conditional));
    }
}

// ============================================================================
// Format fidelity
// ============================================================================

mod format_properties {
    use super::*;

    #[test]
    fn test_random_values_read_back() {
        let temp = TempDir::new().unwrap();
        let inspector = enabled_inspector(&temp, "values");
        let mut rng = TestRng::new(1234);

        let mut written = Vec::new();
        for i in 0..100 {
            let mut vars: State = BTreeMap::new();
            vars.insert("text".into(), rng.next_text().into());
            vars.insert("int".into(), (rng.next_u64() as i64).into());
            vars.insert("uint".into(), StateValue::from_u64(rng.next_u64()));
            vars.insert("flag".into(), rng.next_bool().into());
            vars.insert("float".into(), (rng.next_range(0, 1_000_000) as f64 / 7.0).into());
            vars.insert(
                "list".into(),
                // `[]` is the empty list, so a lone item must not be empty
                StateValue::List(
                    (0..rng.next_range(1, 4)).map(|_| format!("i{}", rng.next_text())).collect(),
                ),
            );
            let label = format!("case-{}-{}", i, rng.next_text());
            inspector.snapshot(&label, vars.clone());
            written.push((label, vars));
        }

        let entries = read_back(&inspector);
        assert_eq!(entries.len(), written.len());
        for (entry, (label, vars)) in entries.iter().zip(&written) {
            assert_eq!(&entry.entry.label, label);
            assert_eq!(&entry.entry.state, vars);
        }
    }

    #[test]
    fn test_random_keys_read_back() {
        let temp = TempDir::new().unwrap();
        let inspector = enabled_inspector(&temp, "keys");
        let mut rng = TestRng::new(4321);

        let mut written = Vec::new();
        for i in 0..50 {
            let mut vars: State = BTreeMap::new();
            for n in 0..rng.next_range(1, 8) {
                vars.insert(rng.next_text(), StateValue::Int(n as i64));
            }
            // keys that differ only in a delimiter, padding or a line break
            vars.insert("k:v".into(), "colon".into());
            vars.insert("k_v".into(), "underscore".into());
            vars.insert(" k".into(), "padded".into());
            vars.insert("k\nv".into(), "newline".into());
            inspector.snapshot(&format!("keys-{}", i), vars.clone());
            written.push(vars);
        }

        let entries = read_back(&inspector);
        assert_eq!(entries.len(), written.len());
        for (entry, vars) in entries.iter().zip(&written) {
            assert_eq!(&entry.entry.state, vars);
        }
    }
}

// ============================================================================
// Concurrency
// ============================================================================

mod concurrency_properties {
    use super::*;

    #[test]
    fn test_concurrent_entries_never_interleave() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 50;

        let temp = TempDir::new().unwrap();
        let inspector = Arc::new(enabled_inspector(&temp, "shared"));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let inspector = Arc::clone(&inspector);
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        inspector.snapshot(
                            &format!("t{}-{}", t, i),
                            state! { "thread" => t, "seq" => i },
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let entries = read_back(&inspector);
        assert_eq!(entries.len() as u64, THREADS * PER_THREAD);

        let mut next_seq = vec![0i64; THREADS as usize];
        for entry in &entries {
            let state = &entry.entry.state;
            assert_eq!(state.len(), 2, "Entry state mixed with another entry");
            let t = state["thread"].as_i64().unwrap();
            let seq = state["seq"].as_i64().unwrap();
            assert_eq!(entry.entry.label, format!("t{}-{}", t, seq));
            // Per-thread order is preserved
            assert_eq!(seq, next_seq[t as usize]);
            next_seq[t as usize] += 1;
        }
    }

    #[test]
    fn test_shared_config_loads_once_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| DebugConfig::shared() as *const DebugConfig as usize))
            .collect();
        let addrs: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(addrs.windows(2).all(|w| w[0] == w[1]));
    }
}
