//! The qualifying-record data model.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::TenureInterval;

/// Marker prefix tagging a contact handle as coming from the cloud-number
/// channel rather than a direct disclosure.
pub const PHONE_CHANNEL_MARKER: &str = "云 ";

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// The semantic matcher's answer for one candidate against one brief.
/// Consumed once per profile, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Match,
    NoMatch,
}

impl Verdict {
    pub fn is_match(&self) -> bool {
        matches!(self, Verdict::Match)
    }
}

// ---------------------------------------------------------------------------
// ContactHandle
// ---------------------------------------------------------------------------

/// Normalized representation of an unlocked contact: either a phone-like
/// string or a reference to a captured image artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContactHandle {
    Phone { number: String },
    Artifact { path: PathBuf },
}

impl ContactHandle {
    pub fn phone(number: impl Into<String>) -> Self {
        ContactHandle::Phone {
            number: number.into(),
        }
    }

    pub fn artifact(path: impl Into<PathBuf>) -> Self {
        ContactHandle::Artifact { path: path.into() }
    }
}

impl fmt::Display for ContactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactHandle::Phone { number } => write!(f, "{PHONE_CHANNEL_MARKER}{number}"),
            ContactHandle::Artifact { path } => write!(f, "{}", path.display()),
        }
    }
}

// ---------------------------------------------------------------------------
// CandidateRecord
// ---------------------------------------------------------------------------

/// One qualifying candidate. Created once, immutable, owned exclusively by
/// the result store after append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub name: String,
    pub title: String,
    pub company: String,
    pub tenure: TenureInterval,
    pub contact: ContactHandle,
    pub profile_url: String,
    pub raw_text: String,
}
