//! Shared records and the storage interface

pub mod traits;
pub mod types;
