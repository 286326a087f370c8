//! Pantry Common Library
//!
//! Shared types, utilities, and error handling for the Pantry project.
//!
//! # Overview
//!
//! This crate provides common functionality used across the Pantry workspace:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Content Hashing**: Order-independent fingerprints for document dedup
//! - **Logging**: Centralized tracing setup

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod hash;
pub mod logging;

// Re-export commonly used types
pub use error::{PantryError, Result};
