//! Constants and default values for the arbitration core

/// Arbitration defaults
pub mod policy {
    /// Utilization at or above which T-state throttling may proceed.
    /// Zero leaves throttling ungated.
    pub const DEFAULT_TSTATE_UTILIZATION_THRESHOLD: f64 = 0.0;

    /// Utilization assumed when the domain cannot report it
    pub const UNKNOWN_UTILIZATION: f64 = 1.0;

    /// Fewest logical processors a single core-control step may remove
    pub const MIN_CORE_STEP: u32 = 1;
}

/// Diagnostics output
pub mod status {
    /// Indentation used when snapshots are rendered as pretty JSON
    pub const JSON_INDENT: &[u8] = b"  ";
}
