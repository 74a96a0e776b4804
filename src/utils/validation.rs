use std::path::Path;

use crate::utils::i18n::{Locale, Message, localize};

/// A field-policy rejection carrying a message ready to show to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(code: &'static str, message: &Message<'_>, locale: Locale) -> Self {
        Self {
            code,
            message: localize(message, locale),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Rejects a batch that would push the field over its file count limit.
pub fn validate_file_count(
    already_staged: usize,
    incoming: usize,
    max_files: u32,
    locale: Locale,
) -> Result<(), ValidationError> {
    if already_staged + incoming > max_files as usize {
        return Err(ValidationError::new(
            "TOO_MANY_FILES",
            &Message::TooManyFiles { max: max_files },
            locale,
        ));
    }
    Ok(())
}

/// Validates file size against maximum limit
pub fn validate_file_size(
    name: &str,
    size: u64,
    max_size: u64,
    locale: Locale,
) -> Result<(), ValidationError> {
    if size > max_size {
        return Err(ValidationError::new(
            "FILE_TOO_LARGE",
            &Message::FileTooLarge {
                name,
                max: max_size,
            },
            locale,
        ));
    }
    Ok(())
}

/// Validates MIME type against the field allowlist. An empty allowlist accepts anything.
pub fn validate_mime_type(
    name: &str,
    content_type: &str,
    allowed: &[String],
    locale: Locale,
) -> Result<(), ValidationError> {
    if allowed.is_empty() {
        return Ok(());
    }

    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    let accepted = allowed.iter().any(|a| {
        let a = a.trim().to_lowercase();
        match a.strip_suffix("/*") {
            Some(category) => normalized.split('/').next() == Some(category),
            None => a == normalized,
        }
    });

    if accepted {
        return Ok(());
    }

    Err(ValidationError::new(
        "INVALID_MIME_TYPE",
        &Message::MimeNotAllowed {
            name,
            mime: content_type,
        },
        locale,
    ))
}

/// Name given to uploads whose client-supplied name is empty once cleaned.
pub const DEFAULT_FILE_NAME: &str = "file";

/// Keeps only the last path component of a client-supplied name and
/// replaces characters that are unsafe across platforms.
pub fn clean_file_name(filename: &str) -> String {
    // Browsers on Windows may send the full client path
    let last = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let name = Path::new(last)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if filename.contains("..") {
        tracing::debug!("Stripped path components from uploaded name: {}", filename);
    }

    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    if cleaned.trim().is_empty() {
        return DEFAULT_FILE_NAME.to_string();
    }

    // Limit length safely for UTF-8
    if cleaned.len() > 255 {
        let mut end = 255;
        while !cleaned.is_char_boundary(end) {
            end -= 1;
        }
        cleaned[..end].to_string()
    } else {
        cleaned
    }
}
