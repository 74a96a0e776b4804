pub use super::entries::Entity as Entries;
pub use super::entry_parameters::Entity as EntryParameters;
pub use super::files::Entity as Files;
pub use super::physical_files::Entity as PhysicalFiles;
pub use super::record_fields::Entity as RecordFields;
