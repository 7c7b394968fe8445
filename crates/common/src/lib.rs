//! Shared configuration and error handling for the Libris client
//!
//! This crate provides common functionality used across the Libris workspace:
//! - Client configuration following 12-factor principles
//! - Error types and handling

pub mod config;
pub mod error;

pub use config::{AuthProvider, ClientConfig};
pub use error::{Error, Result};
