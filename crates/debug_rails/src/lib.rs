//! Debug Rails - state inspection for components
//!
//! Captures "what actually happened" snapshots (variable state, expected vs
//! actual, timing, call stacks, memory, system context) into an append-only
//! debug file per component, and reads those files back into structured
//! entries for analysis.
//!
//! ```no_run
//! use debug_rails::{state, Inspector};
//!
//! let inspector = Inspector::new("parser");
//! if inspector.enable().is_ok() {
//!     inspector.snapshot("token-read", state! { "token" => "IDENT" });
//!     inspector.expected_state("arity-check", 3, 2, state! { "fn" => "foo" });
//! }
//! inspector.close();
//! ```

pub mod callsite;
pub mod capture;
pub mod config;
pub mod entry;
pub mod error;
pub mod format;
pub mod inspector;
pub mod memory;
pub mod reader;
pub mod system;
pub mod writer;

pub use config::{ConfigStatus, DebugConfig};
pub use entry::{EntryType, InspectionEntry, State, StateValue};
pub use error::InspectError;
pub use inspector::Inspector;
pub use memory::{CountingAllocator, MemorySource, MemoryStats};
pub use reader::{
    debug_files, latest_debug_file, parse_debug_text, read_debug_file, read_entries, DebugFile,
    SessionHeader,
};
