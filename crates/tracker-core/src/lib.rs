//! Core library for the tracker portfolio client.
//!
//! The centre of this crate is the [`SessionManager`]: it owns the
//! "is the user logged in" state, mirrors it to a durable key-value store,
//! and talks to the tracker API with credentialed requests that carry the
//! server's CSRF token.
//!
//! - [`api`]: HTTP client and typed API errors
//! - [`auth`]: session state, session manager, CSRF cookie access, keychain
//! - [`config`]: API base URL and persisted preferences
//! - [`navigation`]: named destinations the manager can navigate to
//! - [`storage`]: durable key-value stores for the session snapshot

pub mod api;
pub mod auth;
pub mod config;
pub mod navigation;
pub mod storage;

pub use api::{ApiClient, ApiError};
pub use auth::{
    CookieJarCredentials, CredentialProvider, Keychain, LoginOutcome, LogoutOutcome,
    SessionManager, SessionState,
};
pub use config::{Config, SessionConfig};
pub use navigation::{Destination, Navigator};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
