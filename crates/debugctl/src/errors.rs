//! Exit status for debugctl

/// Exit code for success
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for general errors
pub const EXIT_GENERAL_ERROR: i32 = 1;

/// Exit code when the self-test read back something other than it wrote
pub const EXIT_SELFTEST_MISMATCH: i32 = 2;
