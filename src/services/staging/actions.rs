//! Upload and delete buttons of the plain HTML form.
//!
//! Without JavaScript the form posts back to itself; the name of the button
//! that was pressed tells which entry to act on, and checkbox names carry the
//! positions of the staged files to delete.

pub const UPLOAD_SUBMIT_PREFIX: &str = "_directory_upload_submit_entry_";
pub const UPLOAD_DELETE_PREFIX: &str = "_directory_upload_delete_entry_";
pub const UPLOAD_CHECKBOX_PREFIX: &str = "_directory_upload_checkbox_entry_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadAction {
    Submit { entry_id: String },
    Delete { entry_id: String },
}

impl UploadAction {
    /// Returns the first upload or delete action among the request parameter names.
    pub fn find<'a, I>(param_names: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        param_names.into_iter().find_map(Self::parse)
    }

    pub fn parse(param_name: &str) -> Option<Self> {
        if let Some(entry_id) = param_name.strip_prefix(UPLOAD_SUBMIT_PREFIX) {
            return Some(UploadAction::Submit {
                entry_id: entry_id.to_string(),
            });
        }
        param_name
            .strip_prefix(UPLOAD_DELETE_PREFIX)
            .map(|entry_id| UploadAction::Delete {
                entry_id: entry_id.to_string(),
            })
    }

    pub fn entry_id(&self) -> &str {
        match self {
            UploadAction::Submit { entry_id } | UploadAction::Delete { entry_id } => entry_id,
        }
    }
}

/// Name of the checkbox selecting the staged file at `index` of an entry.
pub fn checkbox_name(entry_id: &str, index: usize) -> String {
    format!("{}{}_{}", UPLOAD_CHECKBOX_PREFIX, entry_id, index)
}

/// Positions ticked for deletion, highest first so earlier positions stay
/// valid while later ones are removed.
pub fn checked_indexes<'a, I>(param_names: I, entry_id: &str) -> Vec<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = format!("{}{}_", UPLOAD_CHECKBOX_PREFIX, entry_id);
    let mut indexes: Vec<usize> = param_names
        .into_iter()
        .filter_map(|name| name.strip_prefix(prefix.as_str()))
        .filter_map(|index| index.parse().ok())
        .collect();
    indexes.sort_unstable_by(|a, b| b.cmp(a));
    indexes.dedup();
    indexes
}
