//! Error types for the arbitration core

pub use dptf_error::{DptfError, Result};
