//! Shared types and errors for the Prospector pipeline.
//!
//! This crate provides the foundation used across the other Prospector crates:
//! - `ProspectorError` — unified error taxonomy
//! - `MonthValue` / `TenureInterval` — employment-date encoding and parsing
//! - `CandidateRecord` / `ContactHandle` — the qualifying-record data model
//! - `Progress` — the (processed, qualified) counter pair

mod record;
mod tenure;

pub use record::{CandidateRecord, ContactHandle, Verdict, PHONE_CHANNEL_MARKER};
pub use tenure::{MonthValue, TenureInterval};

use serde::{Deserialize, Serialize};

/// Unified error type for all Prospector subsystems.
#[derive(Debug, thiserror::Error)]
pub enum ProspectorError {
    // === Judge service ===
    #[error("Judge service returned HTTP {status}: {message}")]
    JudgeStatus { status: u16, message: String },

    #[error("Judge request timed out after {timeout_ms}ms")]
    JudgeTimeout { timeout_ms: u64 },

    #[error("Judge returned a malformed response: {0}")]
    JudgeMalformed(String),

    #[error("Judge transport error: {0}")]
    JudgeTransport(String),

    #[error("Judge credentials missing: {0}")]
    JudgeAuth(String),

    // === Profile source ===
    #[error("Profile field '{field}' not found")]
    FieldNotFound { field: String },

    #[error("Profile source error: {0}")]
    Source(String),

    // === Contact resolution ===
    #[error("All contact extraction strategies exhausted")]
    ContactUnresolved,

    // === Result store ===
    #[error("Snapshot write to '{path}' failed: {message}")]
    SinkWrite { path: String, message: String },

    // === Generic ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ProspectorError {
    /// Returns `true` when the error should be absorbed by the current
    /// iteration (item skipped, run continues) rather than aborting the run.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ProspectorError::Config(_) | ProspectorError::JudgeAuth(_)
        )
    }

    /// Returns `true` for errors originating at the judge boundary. The
    /// controller maps these to a no-match verdict.
    pub fn is_judge_error(&self) -> bool {
        matches!(
            self,
            ProspectorError::JudgeStatus { .. }
                | ProspectorError::JudgeTimeout { .. }
                | ProspectorError::JudgeMalformed(_)
                | ProspectorError::JudgeTransport(_)
                | ProspectorError::JudgeAuth(_)
        )
    }
}

/// A convenience alias for `Result<T, ProspectorError>`.
pub type Result<T> = std::result::Result<T, ProspectorError>;

// ---------------------------------------------------------------------------
// Progress — the (processed, qualified) counter pair
// ---------------------------------------------------------------------------

/// Run progress counters. `processed` counts every profile the controller has
/// started on; `qualified` counts records committed to the store. Both are
/// monotonically non-decreasing within one run and `processed >= qualified`
/// always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub processed: u64,
    pub qualified: u64,
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.qualified, self.processed)
    }
}
