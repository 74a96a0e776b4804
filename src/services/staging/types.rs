use bytes::Bytes;
use serde::Serialize;
use utoipa::ToSchema;

use crate::utils::validation::clean_file_name;

/// Prefix of the form field that carries the files of an entry.
pub const FIELD_NAME_PREFIX: &str = "entry_";

/// Builds the stable field identifier of an entry (`entry_42`).
pub fn field_name_for(entry_id: i32) -> String {
    format!("{}{}", FIELD_NAME_PREFIX, entry_id)
}

/// Recovers the entry id from a field identifier.
pub fn parse_field_name(field_name: &str) -> Option<i32> {
    field_name
        .strip_prefix(FIELD_NAME_PREFIX)
        .and_then(|id| id.parse().ok())
}

/// Identifies one form field within one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub session_id: String,
    pub field_name: String,
}

impl FieldKey {
    pub fn new(session_id: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            field_name: field_name.into(),
        }
    }
}

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.session_id, self.field_name)
    }
}

/// A file received from the client and held in memory until it is committed
/// or discarded. Cloning shares the underlying buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedUpload {
    name: String,
    content: Bytes,
    content_type: String,
}

impl StagedUpload {
    pub fn new(name: &str, content: impl Into<Bytes>) -> Self {
        let name = clean_file_name(name);
        let content = content.into();
        let content_type = detect_content_type(&name, &content);
        Self {
            name,
            content,
            content_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Same name and same size is how a re-upload of an already staged file is spotted.
    pub fn looks_like(&self, other: &StagedUpload) -> bool {
        self.name == other.name && self.size() == other.size()
    }
}

/// Extension first, then magic bytes, then the generic binary type.
fn detect_content_type(name: &str, content: &[u8]) -> String {
    if let Some(guess) = mime_guess::from_path(name).first() {
        return guess.essence_str().to_string();
    }
    if let Some(kind) = infer::get(content) {
        return kind.mime_type().to_string();
    }
    mime::APPLICATION_OCTET_STREAM.essence_str().to_string()
}

/// JSON view of a staged file, as returned to the upload widget.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StagedItem {
    pub index: usize,
    pub name: String,
    pub size: u64,
    pub content_type: String,
}

impl StagedItem {
    pub fn list(uploads: &[StagedUpload]) -> Vec<StagedItem> {
        uploads
            .iter()
            .enumerate()
            .map(|(index, u)| StagedItem {
                index,
                name: u.name().to_string(),
                size: u.size(),
                content_type: u.content_type().to_string(),
            })
            .collect()
    }
}
