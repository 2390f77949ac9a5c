pub mod config;
pub mod emit;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod registry;
pub mod schema;

// Re-export key types for convenience
pub use error::{PgSdkError, Result};
pub use schema::types::Model;
