//! Authentication module for managing access tokens and sessions.
//!
//! This module provides:
//! - `Session`: restores, holds and tears down the signed-in session
//! - `CredentialStore`: where the current access token lives (memory, file, keychain)
//! - `TokenNotifier` / `TokenEvent`: the token-refreshed signal
//!
//! Access tokens are short-lived; the long-lived refresh credential is an
//! httpOnly cookie handled by the HTTP client.

pub mod events;
pub mod session;
pub mod store;
pub mod token;

pub use events::{TokenEvent, TokenNotifier};
pub use session::Session;
pub use store::{CredentialStore, FileStore, KeyringStore, MemoryStore};
