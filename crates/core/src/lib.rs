//! Tradelog Core - trade models, the import pipeline, and persistence traits.
//!
//! This crate is database-agnostic: it defines [`trades::TradeRepositoryTrait`],
//! which the `storage-sqlite` crate implements.

pub mod constants;
pub mod errors;
pub mod imports;
pub mod trades;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
