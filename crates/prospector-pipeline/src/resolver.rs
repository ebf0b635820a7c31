//! Contact unlock and extraction with ordered fallback strategies.
//!
//! After the unlock flow, three extraction strategies run in a fixed order:
//! image capture, text handle, raw-content scan. The first to yield a
//! contact wins; strategy-local failures downgrade to the next strategy
//! rather than failing the profile.

use std::sync::OnceLock;

use regex::Regex;

use prospector_types::ContactHandle;

use crate::source::{FieldRole, ProfileContext};

/// Mainland mobile number as it appears in free text.
fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"1[3-9]\d{9}").unwrap())
}

/// Outcome of one resolution attempt. `Unresolved` is an expected state,
/// not an error; the controller skips the profile and moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ContactHandle),
    Unresolved,
}

pub struct ContactResolver;

impl ContactResolver {
    /// Unlock the contact on an open profile, then try each extraction
    /// strategy in order. `artifact_name` labels the captured contact image
    /// when the image strategy wins.
    pub async fn resolve(ctx: &dyn ProfileContext, artifact_name: &str) -> Resolution {
        if !Self::unlock(ctx).await {
            return Resolution::Unresolved;
        }

        if let Some(handle) = Self::try_image(ctx, artifact_name).await {
            return Resolution::Resolved(handle);
        }
        if let Some(handle) = Self::try_text(ctx).await {
            return Resolution::Resolved(handle);
        }
        if let Some(handle) = Self::try_raw_scan(ctx).await {
            return Resolution::Resolved(handle);
        }

        tracing::warn!(url = %ctx.url(), "all contact strategies exhausted");
        Resolution::Unresolved
    }

    /// Reactivate a previously purchased contact, or run the unlock flow.
    /// Returns `false` when the contact stays locked.
    async fn unlock(ctx: &dyn ProfileContext) -> bool {
        match ctx.activate_view_contact().await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => {
                tracing::debug!(url = %ctx.url(), error = %e, "view-contact probe failed");
            }
        }

        if let Err(e) = ctx.request_unlock().await {
            tracing::debug!(url = %ctx.url(), error = %e, "unlock request failed");
            return false;
        }
        // An absent payment dialog is the already-paid case, not a failure.
        match ctx.confirm_payment().await {
            Ok(paid) => {
                tracing::debug!(url = %ctx.url(), payment_confirmed = paid, "unlock flow done");
                true
            }
            Err(e) => {
                tracing::debug!(url = %ctx.url(), error = %e, "payment confirmation failed");
                false
            }
        }
    }

    async fn try_image(ctx: &dyn ProfileContext, artifact_name: &str) -> Option<ContactHandle> {
        match ctx.capture_contact_image(artifact_name).await {
            Ok(Some(path)) => Some(ContactHandle::artifact(path)),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(url = %ctx.url(), error = %e, "image capture failed");
                None
            }
        }
    }

    async fn try_text(ctx: &dyn ProfileContext) -> Option<ContactHandle> {
        let text = match ctx.read_contact_text().await {
            Ok(text) => text?,
            Err(e) => {
                tracing::debug!(url = %ctx.url(), error = %e, "contact text read failed");
                return None;
            }
        };
        // Numbers render with grouping whitespace; the stored form has none.
        let number: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        if number.is_empty() {
            return None;
        }
        Some(ContactHandle::phone(number))
    }

    async fn try_raw_scan(ctx: &dyn ProfileContext) -> Option<ContactHandle> {
        let raw = match ctx.read_field(FieldRole::RawContent).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(url = %ctx.url(), error = %e, "raw content unavailable for scan");
                return None;
            }
        };
        phone_regex()
            .find(&raw)
            .map(|m| ContactHandle::phone(m.as_str()))
    }
}

/// Strip masking characters and append the gendered honorific the site
/// displays next to full names. An unrecognized or absent gender leaves the
/// name untouched.
pub fn normalize_display_name(name: &str, gender: Option<&str>) -> String {
    let name = name.replace('*', "");
    if name.ends_with("先生") || name.ends_with("女士") {
        return name;
    }
    match gender {
        Some(g) if g.contains('男') => format!("{name}先生"),
        Some(g) if g.contains('女') => format!("{name}女士"),
        _ => name,
    }
}

/// Artifact label for a captured contact image. Falls back to a positional
/// label when the name field was unreadable.
pub fn artifact_name_for(name: Option<&str>, ordinal: usize) -> String {
    match name {
        Some(n) if !n.trim().is_empty() => n.trim().to_string(),
        _ => format!("Unknown_contact_{ordinal}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
