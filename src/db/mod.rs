//! Database module for checkhtml.
//!
//! Provides SQLite storage with an embedded schema migration, plus the
//! target/result contracts the scheduler is written against.

mod models;
mod results;
mod store;

pub use models::*;
pub use results::*;
pub use store::*;
