pub mod health;
pub mod parameters;
pub mod records;
pub mod staging;
pub mod upload;
