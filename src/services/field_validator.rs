use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::staging::StagedUpload;
use crate::utils::i18n::{Locale, Message};
use crate::utils::validation::{
    ValidationError, validate_file_count, validate_file_size, validate_mime_type,
};

/// Admission rules of a field.
///
/// Implementations see the files already staged for the field together with
/// the incoming batch, so cumulative limits can be enforced.
pub trait FieldValidator: Send + Sync {
    fn can_upload_files(
        &self,
        staged: &[StagedUpload],
        incoming: &[StagedUpload],
        locale: Locale,
    ) -> Result<(), ValidationError>;
}

/// Count, size and type limits of a file field. `None` means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UploadPolicy {
    pub max_files: Option<u32>,
    pub max_file_size: Option<u64>,
    pub allowed_mime_types: Vec<String>,
}

impl UploadPolicy {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_max_files(mut self, max_files: u32) -> Self {
        self.max_files = Some(max_files);
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = Some(max_file_size);
        self
    }

    pub fn with_allowed_mime_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_mime_types = types.into_iter().map(Into::into).collect();
        self
    }
}

impl FieldValidator for UploadPolicy {
    fn can_upload_files(
        &self,
        staged: &[StagedUpload],
        incoming: &[StagedUpload],
        locale: Locale,
    ) -> Result<(), ValidationError> {
        if let Some(max_files) = self.max_files {
            validate_file_count(staged.len(), incoming.len(), max_files, locale)?;
        }

        for upload in incoming {
            if let Some(max_size) = self.max_file_size {
                validate_file_size(upload.name(), upload.size(), max_size, locale)?;
            }
            validate_mime_type(
                upload.name(),
                upload.content_type(),
                &self.allowed_mime_types,
                locale,
            )?;
        }

        Ok(())
    }
}

/// Validator of fields that never take files.
pub struct RejectAllFiles;

impl FieldValidator for RejectAllFiles {
    fn can_upload_files(
        &self,
        _staged: &[StagedUpload],
        _incoming: &[StagedUpload],
        locale: Locale,
    ) -> Result<(), ValidationError> {
        Err(ValidationError::new(
            "NOT_A_FILE_FIELD",
            &Message::NotAFileField,
            locale,
        ))
    }
}
