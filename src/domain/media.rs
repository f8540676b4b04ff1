use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Document,
    Link,
}

impl MediaKind {
    pub const ALL: [MediaKind; 4] = [
        MediaKind::Image,
        MediaKind::Video,
        MediaKind::Document,
        MediaKind::Link,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
            MediaKind::Link => "link",
        }
    }
}

/// A distinct piece of media found while sweeping a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaItem {
    pub kind: MediaKind,
    /// URL for images, videos and links; `label@offset` for documents.
    pub identity: String,
}

impl MediaItem {
    pub fn new(kind: MediaKind, identity: impl Into<String>) -> Self {
        Self {
            kind,
            identity: identity.into(),
        }
    }

    /// Documents have no stable URL until their download is triggered, so
    /// they are fingerprinted by label and vertical offset in the pane.
    pub fn document_identity(label: &str, offset: f64) -> String {
        format!("{}@{}", label.trim(), offset.round() as i64)
    }

    /// Deterministic short file stem derived from the identity.
    pub fn file_stem(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.kind.as_str().as_bytes());
        hasher.update(self.identity.as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("{}_{}", self.kind.as_str(), &digest[..16])
    }
}
