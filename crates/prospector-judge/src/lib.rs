//! The MatchJudge boundary — a thin client for an external semantic
//! classifier that answers whether a candidate profile satisfies a
//! natural-language brief.
//!
//! The verdict contract is deliberately loose: the response is opaque text
//! and only the presence of an affirmative token is meaningful. Every
//! transport failure surfaces as an error; the pipeline controller treats
//! judge errors as no-match so an unreachable classifier never admits
//! unverified candidates.

mod ark;

pub use ark::ArkJudge;

use async_trait::async_trait;
use prospector_types::{Result, Verdict};

/// Boundary to the external semantic classifier. One round-trip per profile.
#[async_trait]
pub trait MatchJudge: Send + Sync {
    async fn judge(&self, profile_text: &str, brief: &str) -> Result<Verdict>;
}
