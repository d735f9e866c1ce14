use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CvFields = serde_json::Map<String, serde_json::Value>;

/// Local identity of a draft. Regenerated whenever the draft is reset so that
/// late results from the remote store can tell they belong to a dead draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DraftKey(Uuid);

impl DraftKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DraftKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DraftKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Large binary field kept out of the content hash (profile photo).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub media_type: String,
    /// Base64 payload as produced by the form layer.
    pub data: String,
}

/// The in-memory CV being edited.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CvDraft {
    #[serde(skip)]
    pub key: DraftKey,
    pub remote_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub fields: CvFields,
    #[serde(default)]
    pub profile_image: Option<Attachment>,
    #[serde(skip)]
    pub last_persisted_hash: Option<String>,
    #[serde(skip)]
    pub last_persisted_image: Option<String>,
}

impl CvDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn trimmed_name(&self) -> &str {
        self.name.trim()
    }

    pub fn has_name(&self) -> bool {
        !self.trimmed_name().is_empty()
    }

    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Drop everything, including the remote id, and start a fresh draft.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Forget what was persisted so the next save writes unconditionally.
    pub fn mark_dirty(&mut self) {
        self.last_persisted_hash = None;
        self.last_persisted_image = None;
    }
}

/// Display name for a duplicated CV so copies can be told apart in lists:
/// `Name` -> `Name (Copy)` -> `Name (Copy 2)` -> `Name (Copy 3)`.
pub fn duplicate_display_name(original: &str) -> String {
    let trimmed = original.trim();

    if let Some(stem) = trimmed.strip_suffix(')') {
        if let Some((base, marker)) = stem.rsplit_once('(') {
            let marker = marker.trim();
            let base = base.trim();
            if marker == "Copy" && !base.is_empty() {
                return format!("{base} (Copy 2)");
            }
            if let Some(n) = marker
                .strip_prefix("Copy")
                .map(str::trim)
                .and_then(|n| n.parse::<u32>().ok())
            {
                if !base.is_empty() {
                    return format!("{base} (Copy {})", n.saturating_add(1));
                }
            }
        }
    }

    format!("{trimmed} (Copy)")
}
