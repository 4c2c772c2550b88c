//! Stable exit codes for foreman CLI commands.

/// Command succeeded; for `run` and `status`, the checklist is complete.
pub const OK: i32 = 0;
/// Error, invalid checklist, or a run that stopped before completion.
pub const ERROR: i32 = 1;
/// `status --check`: more work remains (for scripted polling).
pub const REMAINING: i32 = 2;
