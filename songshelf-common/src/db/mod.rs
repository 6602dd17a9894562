//! Database models and queries

pub mod attributes;
pub mod entries;
pub mod init;
pub mod models;

pub use init::*;
pub use models::*;
