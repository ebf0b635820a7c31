//! The profile-source seam and a scripted in-memory implementation.
//!
//! Real enumeration and field extraction are site-specific markup traversal
//! and live behind these traits. [`ScriptedSource`] replays a fixed set of
//! profiles; it backs the integration tests and the CLI's file-driven runs.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use prospector_types::{ProspectorError, Result};

// ---------------------------------------------------------------------------
// FieldRole / ProfileHandle
// ---------------------------------------------------------------------------

/// Named semantic fields readable from an open profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    Name,
    Gender,
    Company,
    Title,
    Tenure,
    RawContent,
}

impl FieldRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldRole::Name => "name",
            FieldRole::Gender => "gender",
            FieldRole::Company => "company",
            FieldRole::Title => "title",
            FieldRole::Tenure => "tenure",
            FieldRole::RawContent => "raw_content",
        }
    }
}

/// Opaque token identifying one enumerated profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileHandle(pub String);

impl std::fmt::Display for ProfileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ProfileSource / ProfileContext
// ---------------------------------------------------------------------------

/// Enumerates candidate profiles from the remote database.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn list_handles(&self) -> Result<Vec<ProfileHandle>>;
    async fn open(&self, handle: &ProfileHandle) -> Result<Box<dyn ProfileContext>>;
}

/// One open profile. Field reads and contact affordances are all blocking
/// site interactions from the pipeline's point of view; each is bounded by
/// the implementation's own timeouts.
#[async_trait]
pub trait ProfileContext: Send + Sync {
    fn url(&self) -> String;

    /// Read the raw text of a named semantic field.
    async fn read_field(&self, role: FieldRole) -> Result<String>;

    /// Probe for a "view contact" affordance left over from a previous
    /// purchase; activate it when present. Returns `true` if found.
    async fn activate_view_contact(&self) -> Result<bool>;

    /// Trigger the unlock action for a not-yet-unlocked contact.
    async fn request_unlock(&self) -> Result<()>;

    /// Confirm a payment dialog if one appears within a short bounded wait.
    /// Returns `false` when no payment step was required.
    async fn confirm_payment(&self) -> Result<bool>;

    /// Capture an image-rendered contact to a named artifact. `Ok(None)`
    /// means the contact is not rendered as an image.
    async fn capture_contact_image(&self, artifact_name: &str) -> Result<Option<PathBuf>>;

    /// Probe the prioritized text-bearing locations and return the first
    /// non-empty string, or `Ok(None)` when all are empty.
    async fn read_contact_text(&self) -> Result<Option<String>>;

    async fn close(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ScriptedSource
// ---------------------------------------------------------------------------

/// One scripted profile, loadable from JSON. Empty fields read as not-found.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptedProfile {
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tenure: String,
    #[serde(default)]
    pub raw_content: String,
    /// Contact already purchased in an earlier session.
    #[serde(default)]
    pub unlocked: bool,
    /// A payment dialog appears after the unlock request.
    #[serde(default)]
    pub payment_required: bool,
    /// Path the image-capture strategy yields, when the contact renders as
    /// an image.
    #[serde(default)]
    pub contact_image: Option<PathBuf>,
    /// Text the text-handle strategy yields.
    #[serde(default)]
    pub contact_text: Option<String>,
    /// Opening this profile fails.
    #[serde(default)]
    pub fail_open: bool,
}

impl ScriptedProfile {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_tenure(mut self, tenure: impl Into<String>) -> Self {
        self.tenure = tenure.into();
        self
    }

    pub fn with_raw_content(mut self, content: impl Into<String>) -> Self {
        self.raw_content = content.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = gender.into();
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = company.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_contact_text(mut self, text: impl Into<String>) -> Self {
        self.contact_text = Some(text.into());
        self
    }

    pub fn with_contact_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.contact_image = Some(path.into());
        self
    }

    pub fn unlocked(mut self) -> Self {
        self.unlocked = true;
        self
    }

    pub fn payment_required(mut self) -> Self {
        self.payment_required = true;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }
}

/// In-memory source replaying scripted profiles, recording every affordance
/// interaction so tests can assert on strategy ordering.
pub struct ScriptedSource {
    profiles: Vec<ScriptedProfile>,
    actions: Arc<Mutex<Vec<String>>>,
    fail_listing: bool,
}

impl ScriptedSource {
    pub fn new(profiles: Vec<ScriptedProfile>) -> Self {
        Self {
            profiles,
            actions: Arc::new(Mutex::new(Vec::new())),
            fail_listing: false,
        }
    }

    /// A source whose enumeration itself fails (run-fatal path).
    pub fn failing_listing() -> Self {
        Self {
            profiles: Vec::new(),
            actions: Arc::new(Mutex::new(Vec::new())),
            fail_listing: true,
        }
    }

    /// Load a profile set from a JSON array file.
    pub fn from_json(json: &str) -> Result<Self> {
        let profiles: Vec<ScriptedProfile> = serde_json::from_str(json)?;
        Ok(Self::new(profiles))
    }

    /// Every affordance interaction recorded so far, in order, as
    /// `"<url>: <action>"` strings.
    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileSource for ScriptedSource {
    async fn list_handles(&self) -> Result<Vec<ProfileHandle>> {
        if self.fail_listing {
            return Err(ProspectorError::Source("search result unavailable".into()));
        }
        Ok(self
            .profiles
            .iter()
            .enumerate()
            .map(|(i, _)| ProfileHandle(format!("profile-{i}")))
            .collect())
    }

    async fn open(&self, handle: &ProfileHandle) -> Result<Box<dyn ProfileContext>> {
        let index: usize = handle
            .0
            .strip_prefix("profile-")
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ProspectorError::Source(format!("unknown handle '{handle}'")))?;
        let profile = self
            .profiles
            .get(index)
            .cloned()
            .ok_or_else(|| ProspectorError::Source(format!("unknown handle '{handle}'")))?;
        if profile.fail_open {
            return Err(ProspectorError::Source(format!(
                "could not open '{}'",
                profile.url
            )));
        }
        Ok(Box::new(ScriptedContext {
            profile,
            actions: self.actions.clone(),
        }))
    }
}

struct ScriptedContext {
    profile: ScriptedProfile,
    actions: Arc<Mutex<Vec<String>>>,
}

impl ScriptedContext {
    fn record(&self, action: &str) {
        self.actions
            .lock()
            .unwrap()
            .push(format!("{}: {}", self.profile.url, action));
    }

    fn field_value(&self, role: FieldRole) -> &str {
        match role {
            FieldRole::Name => &self.profile.name,
            FieldRole::Gender => &self.profile.gender,
            FieldRole::Company => &self.profile.company,
            FieldRole::Title => &self.profile.title,
            FieldRole::Tenure => &self.profile.tenure,
            FieldRole::RawContent => &self.profile.raw_content,
        }
    }
}

#[async_trait]
impl ProfileContext for ScriptedContext {
    fn url(&self) -> String {
        self.profile.url.clone()
    }

    async fn read_field(&self, role: FieldRole) -> Result<String> {
        let value = self.field_value(role);
        if value.trim().is_empty() {
            return Err(ProspectorError::FieldNotFound {
                field: role.as_str().to_string(),
            });
        }
        Ok(value.to_string())
    }

    async fn activate_view_contact(&self) -> Result<bool> {
        self.record("activate_view_contact");
        Ok(self.profile.unlocked)
    }

    async fn request_unlock(&self) -> Result<()> {
        self.record("request_unlock");
        Ok(())
    }

    async fn confirm_payment(&self) -> Result<bool> {
        self.record("confirm_payment");
        Ok(self.profile.payment_required)
    }

    async fn capture_contact_image(&self, artifact_name: &str) -> Result<Option<PathBuf>> {
        self.record(&format!("capture_contact_image({artifact_name})"));
        Ok(self.profile.contact_image.clone())
    }

    async fn read_contact_text(&self) -> Result<Option<String>> {
        self.record("read_contact_text");
        Ok(self
            .profile
            .contact_text
            .clone()
            .filter(|t| !t.trim().is_empty()))
    }

    async fn close(&self) -> Result<()> {
        self.record("close");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
