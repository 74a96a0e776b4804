pub mod attachment_store;
pub mod blob_store;
pub mod entry_catalog;
pub mod entry_parameter_service;
pub mod field_validator;
pub mod file_repository;
pub mod staging;
pub mod worker;
