pub mod actions;
pub mod error;
pub mod registry;
pub mod service;
pub mod types;

pub use error::StagingError;
pub use registry::{SessionStagingArea, StagedList, StagingRegistry};
pub use service::{UploadForm, UploadOutcome, UploadStagingService};
pub use types::{FieldKey, StagedItem, StagedUpload, field_name_for, parse_field_name};
