//! Authentication module for session state and credentials.
//!
//! This module provides:
//! - `SessionManager`: owns `SessionState`, persists it, and performs the
//!   login/logout/current-user exchanges with the API
//! - `CredentialProvider`: read access to the CSRF cookie
//! - `Keychain`: OS-level password storage via keyring
//!
//! The session snapshot is persisted under the `authState` key so a restart
//! picks up where the previous run left off.

pub mod credentials;
pub mod keychain;
pub mod session;

pub use credentials::{CookieJarCredentials, CredentialProvider};
pub use keychain::Keychain;
pub use session::{LoginOutcome, LogoutOutcome, SessionManager, SessionState};
