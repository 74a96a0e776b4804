pub mod prelude;

pub mod entries;
pub mod entry_parameters;
pub mod files;
pub mod physical_files;
pub mod record_fields;
