//! Database access layer for the progress tracker
//!
//! Writers take a `&mut SqliteConnection` so loaders can run them inside one
//! transaction; readers take the pool.

pub mod progress;
pub mod reports;
pub mod tasks;
