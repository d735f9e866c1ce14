use glory_core::{Attachment, CvDraft, CvFields};
use md5::Context;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("failed to encode draft fields: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Digest pair used to decide whether a draft changed since its last save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftDigest {
    pub content: String,
    pub image: Option<String>,
}

impl DraftDigest {
    pub fn of(draft: &CvDraft) -> Result<Self, HashError> {
        Ok(Self {
            content: content_digest(&draft.name, &draft.fields)?,
            image: draft.profile_image.as_ref().map(attachment_digest),
        })
    }

    /// True when both digests match what the draft last persisted.
    pub fn matches_persisted(&self, draft: &CvDraft) -> bool {
        draft.last_persisted_hash.as_deref() == Some(self.content.as_str())
            && draft.last_persisted_image == self.image
    }
}

/// MD5 over the trimmed name and the serialized form fields.
///
/// The profile image is excluded; it is tracked by [`attachment_digest`].
pub fn content_digest(name: &str, fields: &CvFields) -> Result<String, HashError> {
    let encoded = serde_json::to_vec(fields)?;
    let mut hasher = Context::new();
    hasher.consume(name.trim().as_bytes());
    // Separator so that name/field boundaries cannot collide.
    hasher.consume([0u8]);
    hasher.consume(&encoded);
    Ok(format!("{:X}", hasher.finalize()))
}

pub fn attachment_digest(attachment: &Attachment) -> String {
    let mut hasher = Context::new();
    hasher.consume(attachment.media_type.as_bytes());
    hasher.consume([0u8]);
    hasher.consume(attachment.data.as_bytes());
    format!("{:X}", hasher.finalize())
}
