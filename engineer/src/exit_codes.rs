//! Process exit codes for the `engineer` binary.

/// Every step of the selected preset completed.
pub const OK: i32 = 0;
/// Invalid arguments or config, unknown preset, missing input, backend or
/// filesystem failure.
pub const FAILURE: i32 = 1;
