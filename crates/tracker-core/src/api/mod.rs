//! REST API client module for the tracker backend.
//!
//! This module provides the `ApiClient` for the authentication endpoints
//! (`set-csrf-token`, `login`, `logout`, `user`, `register`).
//!
//! The backend uses cookie sessions. Every request goes through a shared
//! cookie jar, and mutating requests echo the `csrftoken` cookie back in
//! the `X-CSRFToken` header.

pub mod client;
pub mod error;

pub use client::{ApiClient, LoginResponse};
pub use error::ApiError;
