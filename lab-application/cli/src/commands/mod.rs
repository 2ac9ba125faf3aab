//! CLI command handlers

pub mod list;
pub mod output;
pub mod phase;

/// Phase completed (a grade may still contain failed checks)
pub const EXIT_OK: u8 = 0;
/// A fatal step failed
pub const EXIT_ABORTED: u8 = 4;
/// Unknown lab or unsupported phase
pub const EXIT_USAGE: u8 = 64;
