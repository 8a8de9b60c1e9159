//! StackFlow SQL schema provider
//!
//! A `stackflow:schema:Schema` resource runs a creation script against an
//! existing MySQL or PostgreSQL database when created and a deletion script
//! when deleted. Changing the server, the database or the creation script
//! drops and recreates the schema (delete-before-replace); any other change
//! is adopted in place.

pub mod client;
pub mod error;
pub mod provider;
pub mod scripts;

pub use client::{CliSqlClient, SqlClient, SqlEngine, SqlTarget};
pub use error::{Result, SchemaError};
pub use provider::{CRITICAL_INPUTS, SCHEMA_TYPE, SchemaInputs, SchemaProvider};
pub use scripts::{get_sample_script, votes_postgres_create};
