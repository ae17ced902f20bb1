//! Unified error handling for DPTF
//!
//! This crate provides the single error type shared by the protocol types, the
//! arbitration core and the command-line driver. It uses thiserror for the
//! Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using DptfError
pub type Result<T> = std::result::Result<T, DptfError>;

/// Unified error type for all DPTF operations
#[derive(thiserror::Error, Debug)]
pub enum DptfError {
    // ============================================================================
    // Control Errors
    // ============================================================================
    #[error("{control} controls are not supported on participant {participant} domain {domain}")]
    NotSupported {
        control: String,
        participant: u32,
        domain: u32,
    },

    #[error("{request} failed on participant {participant} domain {domain}: {reason}")]
    ActionFailed {
        request: String,
        participant: u32,
        domain: u32,
        reason: String,
    },

    #[error("No {control} capabilities reported by participant {participant} domain {domain}")]
    CapabilityMissing {
        control: String,
        participant: u32,
        domain: u32,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unexpected response to {request}: {response}")]
    UnexpectedResponse {
        request: String,
        response: String,
    },

    // ============================================================================
    // Topology Errors
    // ============================================================================
    #[error("Unknown participant: {0}")]
    UnknownParticipant(u32),

    #[error("Unknown domain {domain} on participant {participant}")]
    UnknownDomain {
        participant: u32,
        domain: u32,
    },

    // ============================================================================
    // I/O and Configuration Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),
}

impl DptfError {
    /// Create a not-supported error for one control on one domain
    pub fn not_supported(control: impl Into<String>, participant: u32, domain: u32) -> Self {
        Self::NotSupported {
            control: control.into(),
            participant,
            domain,
        }
    }

    /// Create a missing-capability error
    pub fn capability_missing(control: impl Into<String>, participant: u32, domain: u32) -> Self {
        Self::CapabilityMissing {
            control: control.into(),
            participant,
            domain,
        }
    }

    /// Create an action failure for a request type
    pub fn action_failed(
        request: impl Into<String>,
        participant: u32,
        domain: u32,
        reason: impl Into<String>,
    ) -> Self {
        Self::ActionFailed {
            request: request.into(),
            participant,
            domain,
            reason: reason.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True when the domain simply does not implement the control.
    ///
    /// Unsupported controls are a normal branch, not an anomaly: most domains
    /// implement only a few control types.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported { .. })
    }

    /// True for failures of the external action layer that a later retry may clear
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ActionFailed { .. })
    }
}

// Allow converting from String to DptfError
impl From<String> for DptfError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

// Allow converting from &str to DptfError
impl From<&str> for DptfError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}
