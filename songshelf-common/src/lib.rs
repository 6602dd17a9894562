//! # Songshelf Common Library
//!
//! Shared code for the Songshelf catalog including:
//! - Database initialization and models
//! - Attribute reconciliation (tags, artists, usage categories)
//! - Action layer: typed requests, validation, response envelopes
//! - Configuration loading
//! - Utility functions

pub mod actions;
pub mod config;
pub mod db;
pub mod error;
pub mod reconcile;
pub mod uuid_utils;

pub use error::{Error, FieldError, Result};
