//! Authenticated REST client for Libris
//!
//! Wraps `reqwest` with bearer-token injection and the refresh-on-401
//! protocol. Resource endpoints (`/books/`, `/loans/`, `/reservations/`,
//! `/reviews/`, `/dashboard/`, `/profiles/`) all go through [`ApiClient`].

mod client;
mod error;
mod navigation;
mod request;

pub use client::ApiClient;
pub use error::ApiError;
pub use navigation::{Navigator, RecordingNavigator};
pub use request::ApiRequest;

pub use reqwest::Method;
