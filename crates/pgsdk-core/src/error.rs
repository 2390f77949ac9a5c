//! # Error Types
//!
//! Defines `PgSdkError`, the unified error enum for every failure mode in
//! the generation pipeline. Every variant carries enough context (step,
//! query label, file path) to point at the failing stage without digging
//! through logs. All of these are fatal at the driver: the CLI prints the
//! failing step and exits non-zero, and no partial output is kept.

use thiserror::Error;

/// All errors that can occur while generating an API.
#[derive(Error, Debug)]
pub enum PgSdkError {
    #[error("Database connection failed: {message}\n  Connection string: {connection_hint}\n  Cause: {source}")]
    Connection {
        message: String,
        connection_hint: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Schema introspection failed on query '{query}': {source}")]
    Introspection {
        query: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Schema '{schema}' does not exist in the target database")]
    UnknownSchema { schema: String },

    #[error("No database URL provided. PGSDK looks for a connection in this order:\n  1. --db flag\n  2. DATABASE_URL environment variable\n  3. .env file with DATABASE_URL\n  4. pgsdk.toml [database] section\n\nExample: pgsdk generate --db postgres://localhost/myapp --out generated")]
    NoDatabaseUrl,

    #[error("Unsupported database scheme '{scheme}'. PGSDK targets PostgreSQL (postgres:// or postgresql://)")]
    UnsupportedDatabase { scheme: String },

    #[error("Model inconsistency: {message}")]
    Classification { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Code emission failed: {message}")]
    Emission { message: String },

    #[error("Failed to write output: {message}: {source}")]
    Output {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("SDK pull failed: {message}")]
    Pull { message: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PgSdkError>;
