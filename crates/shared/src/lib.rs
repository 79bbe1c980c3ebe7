//! Shared types for the OpsPulse dashboard client and its backing API.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::*;
pub use models::*;
pub use protocol::*;
