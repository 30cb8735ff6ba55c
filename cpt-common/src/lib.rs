//! # CPT Common Library
//!
//! Shared code for the construction progress tracker including:
//! - Error taxonomy shared by ingestion, storage and the HTTP layer
//! - Bootstrap configuration and root folder resolution
//! - Database initialization and row models
//! - Report date helpers

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
