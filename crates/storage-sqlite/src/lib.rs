//! SQLite storage implementation for Tradelog.
//!
//! This crate is the only place where Diesel dependencies exist. It implements
//! the repository traits defined in `tradelog-core` and contains:
//! - Database connection pooling and management
//! - Diesel migrations
//! - The single-writer actor that serializes all writes
//! - Database-specific model types (with Diesel derives)

pub mod db;
pub mod errors;
pub mod schema;

// Repository implementations
pub mod trades;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

// Re-export from tradelog-core for convenience
pub use tradelog_core::errors::{DatabaseError, Error, Result};
