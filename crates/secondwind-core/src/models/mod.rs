//! Data models for SecondWind API payloads.
//!
//! - `UserProfile`: the signed-in runner as returned by `GET /my`

pub mod user;

pub use user::UserProfile;
