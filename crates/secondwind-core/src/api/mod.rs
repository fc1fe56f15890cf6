//! REST API client module for SecondWind services.
//!
//! This module provides the `ApiClient` for communicating with the
//! SecondWind backend. Requests carry a JWT bearer token; an expired token
//! is renewed through the cookie-backed `/refresh/token` endpoint.

pub mod client;
pub mod error;
pub mod request;
pub mod single_flight;

pub use client::{ApiClient, RefreshOutcome};
pub use error::ApiError;
pub use request::ApiRequest;
