//! Core library for the SecondWind running community client.
//!
//! The heart of the crate is [`ApiClient::request`]: an authenticated HTTP
//! call that renews an expired access token once and retries once.
//! [`Session`] sits on top of it and keeps the stored credential current.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, ApiRequest, RefreshOutcome};
pub use auth::{CredentialStore, FileStore, KeyringStore, MemoryStore, Session, TokenEvent};
pub use config::Config;
pub use models::UserProfile;
