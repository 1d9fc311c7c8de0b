//! # Ordex Common Library
//!
//! Shared code for the ordex records-management backend:
//! - Shared error type
//! - Database initialization and shared tables (members, classification codes)
//! - Member and classification-code models and queries
//! - Configuration / database path resolution

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
