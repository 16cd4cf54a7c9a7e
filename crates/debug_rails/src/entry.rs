//! Entry model - one inspection event
//!
//! Entries only live for the duration of a capture call; what persists is
//! their text form (see [`crate::writer`] and [`crate::reader`]).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Entry Types
// ============================================================================

/// Type tag of an entry
///
/// Paired capture methods pick one of two tags depending on whether the
/// observed value matched expectations, so consumers can filter anomalies by
/// tag alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Snapshot,
    ExpectedState,
    Divergence,
    Conditional,
    Timing,
    SlowTiming,
    Counter,
    CountDivergence,
    #[serde(rename = "CALLSTACK")]
    CallStack,
    Checkpoint,
    Flow,
    UnexpectedFlow,
    Memory,
    SystemContext,
}

impl EntryType {
    /// Every tag, in declaration order
    pub const ALL: [EntryType; 14] = [
        EntryType::Snapshot,
        EntryType::ExpectedState,
        EntryType::Divergence,
        EntryType::Conditional,
        EntryType::Timing,
        EntryType::SlowTiming,
        EntryType::Counter,
        EntryType::CountDivergence,
        EntryType::CallStack,
        EntryType::Checkpoint,
        EntryType::Flow,
        EntryType::UnexpectedFlow,
        EntryType::Memory,
        EntryType::SystemContext,
    ];

    /// Tag as written to debug files
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Snapshot => "SNAPSHOT",
            EntryType::ExpectedState => "EXPECTED_STATE",
            EntryType::Divergence => "DIVERGENCE",
            EntryType::Conditional => "CONDITIONAL",
            EntryType::Timing => "TIMING",
            EntryType::SlowTiming => "SLOW_TIMING",
            EntryType::Counter => "COUNTER",
            EntryType::CountDivergence => "COUNT_DIVERGENCE",
            EntryType::CallStack => "CALLSTACK",
            EntryType::Checkpoint => "CHECKPOINT",
            EntryType::Flow => "FLOW",
            EntryType::UnexpectedFlow => "UNEXPECTED_FLOW",
            EntryType::Memory => "MEMORY",
            EntryType::SystemContext => "SYSTEM_CONTEXT",
        }
    }

    /// True for the "diverged" half of each paired tag
    pub fn is_divergence(&self) -> bool {
        matches!(
            self,
            EntryType::Divergence
                | EntryType::SlowTiming
                | EntryType::CountDivergence
                | EntryType::UnexpectedFlow
        )
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized entry type tag
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entry type: {0}")]
pub struct UnknownEntryType(pub String);

impl FromStr for EntryType {
    type Err = UnknownEntryType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        EntryType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(tag))
            .ok_or_else(|| UnknownEntryType(tag.to_string()))
    }
}

// ============================================================================
// State Values
// ============================================================================

/// A single value in an entry's state bag
///
/// Unsigned values that fit in `i64` are stored as `Int`, which is also how
/// the reader decodes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl StateValue {
    /// Canonical form of an unsigned value
    pub fn from_u64(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => StateValue::Int(i),
            Err(_) => StateValue::UInt(v),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StateValue::Int(i) => Some(*i),
            StateValue::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }
}

/// Human display (not the on-disk encoding)
impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Bool(b) => write!(f, "{}", b),
            StateValue::Int(i) => write!(f, "{}", i),
            StateValue::UInt(u) => write!(f, "{}", u),
            StateValue::Float(x) => write!(f, "{:?}", x),
            StateValue::Text(s) => f.write_str(s),
            StateValue::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<bool> for StateValue {
    fn from(v: bool) -> Self {
        StateValue::Bool(v)
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for StateValue {
            fn from(v: $t) -> Self {
                StateValue::Int(v as i64)
            }
        })*
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for StateValue {
            fn from(v: $t) -> Self {
                StateValue::from_u64(v as u64)
            }
        })*
    };
}

impl_from_signed!(i32, i64);
impl_from_unsigned!(u32, u64, usize);

impl From<f64> for StateValue {
    fn from(v: f64) -> Self {
        StateValue::Float(v)
    }
}

impl From<&str> for StateValue {
    fn from(v: &str) -> Self {
        StateValue::Text(v.to_string())
    }
}

impl From<String> for StateValue {
    fn from(v: String) -> Self {
        StateValue::Text(v)
    }
}

impl From<Vec<String>> for StateValue {
    fn from(v: Vec<String>) -> Self {
        StateValue::List(v)
    }
}

impl From<Vec<&str>> for StateValue {
    fn from(v: Vec<&str>) -> Self {
        StateValue::List(v.into_iter().map(str::to_string).collect())
    }
}

/// Key/value bag attached to an entry, ordered by key
pub type State = BTreeMap<String, StateValue>;

/// Build a [`State`] from `key => value` pairs
///
/// ```
/// use debug_rails::state;
///
/// let vars = state! { "token" => "IDENT", "depth" => 3 };
/// assert_eq!(vars.len(), 2);
/// ```
#[macro_export]
macro_rules! state {
    () => {
        $crate::State::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut state = $crate::State::new();
        $(
            state.insert(::std::string::String::from($key), $crate::StateValue::from($value));
        )+
        state
    }};
}

// ============================================================================
// Entries
// ============================================================================

/// One inspection event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Capture moment (local wall clock)
    pub timestamp: NaiveDateTime,
    pub entry_type: EntryType,
    /// Caller-supplied label
    pub label: String,
    /// `file:line` of the capture call, or `unknown`
    pub call_site: String,
    pub state: State,
}

/// The correlation points written on every entry header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    pub component: String,
    /// `user@host:pid`
    pub origin: String,
    /// Context id shared with sibling rails (e.g. the logger)
    pub context_id: String,
}

/// An entry read back from a debug file, with its correlation block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionEntry {
    #[serde(flatten)]
    pub correlation: Correlation,
    #[serde(flatten)]
    pub entry: Entry,
}
