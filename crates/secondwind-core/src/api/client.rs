//! API client for communicating with the SecondWind REST API.
//!
//! Every call goes through [`ApiClient::request`], which renews an expired
//! access token at most once per call and retries with the new token.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header;
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::auth::events::{TokenEvent, TokenNotifier};
use crate::auth::token::strip_bearer;
use crate::config::Config;
use crate::models::UserProfile;

use super::single_flight::SingleFlight;
use super::{ApiError, ApiRequest};

/// Path of the signed-in user's profile
const MY_PATH: &str = "my";

/// Result of one call to the refresh endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New bare access token
    Renewed(String),
    /// Refresh endpoint answered with a non-2xx status
    Rejected(StatusCode),
    /// 2xx without a usable `Authorization` header
    MissingToken,
    /// Transport failure while refreshing
    Failed(String),
}

impl RefreshOutcome {
    pub fn token(&self) -> Option<&str> {
        match self {
            RefreshOutcome::Renewed(token) => Some(token),
            _ => None,
        }
    }
}

/// API client for SecondWind.
/// Clone is cheap - reqwest::Client uses Arc internally, and clones share
/// the notifier and the in-flight refresh.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: Arc<Config>,
    notifier: TokenNotifier,
    refresh_flight: Arc<SingleFlight<RefreshOutcome>>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let jar = Arc::new(Jar::default());
        if let Some(ref cookie) = config.refresh_cookie {
            let base: Url = config.api_url.parse().map_err(|e| {
                ApiError::InvalidRequest(format!("Invalid API URL {}: {}", config.api_url, e))
            })?;
            jar.add_cookie_str(cookie, &base);
            debug!(url = %base, "Seeded refresh cookie");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .cookie_provider(jar)
            .build()?;

        Ok(Self {
            client,
            config: Arc::new(config.clone()),
            notifier: TokenNotifier::new(),
            refresh_flight: Arc::new(SingleFlight::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve a path against the API base URL
    pub fn endpoint(&self, path: &str) -> String {
        self.config.endpoint(path)
    }

    /// Subscribe to token renewals
    pub fn subscribe(&self) -> broadcast::Receiver<TokenEvent> {
        self.notifier.subscribe()
    }

    /// Send `req`; on 401 refresh the access token once and retry once.
    ///
    /// A failed refresh or a failed retry returns the original 401 response
    /// rather than an error; the caller decides what an unrecoverable 401
    /// means. Transport errors on the first send are returned unchanged.
    pub async fn request(&self, req: &ApiRequest) -> Result<Response, ApiError> {
        let response = self.send(req).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(url = %req.url(), "Unauthorized, attempting token refresh");
        let token = match self.refresh().await {
            RefreshOutcome::Renewed(token) => token,
            outcome => {
                debug!(url = %req.url(), ?outcome, "Refresh unsuccessful, returning original response");
                return Ok(response);
            }
        };

        let retry = req.with_bearer(&token)?;
        match self.send(&retry).await {
            Ok(retried) => {
                if retried.status() == StatusCode::UNAUTHORIZED {
                    warn!(url = %req.url(), "Still unauthorized after token refresh");
                }
                Ok(retried)
            }
            Err(e) => {
                warn!(url = %req.url(), error = %e, "Retry after token refresh failed, returning original response");
                Ok(response)
            }
        }
    }

    /// Exchange the session cookie for a new access token.
    ///
    /// Concurrent callers share one refresh call, and the renewal event is
    /// published once per refresh.
    pub async fn refresh(&self) -> RefreshOutcome {
        let client = self.client.clone();
        let url = self.config.refresh_url();
        let notifier = self.notifier.clone();

        let (outcome, leader) = self
            .refresh_flight
            .run(move || async move {
                let outcome = Self::perform_refresh(&client, &url).await;
                if let RefreshOutcome::Renewed(ref token) = outcome {
                    notifier.notify(TokenEvent::Refreshed(token.clone()));
                }
                outcome
            })
            .await;

        if !leader {
            debug!("Joined in-flight token refresh");
        }
        outcome
    }

    async fn perform_refresh(client: &Client, url: &str) -> RefreshOutcome {
        let response = match client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Token refresh request failed");
                return RefreshOutcome::Failed(e.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Token refresh rejected");
            return RefreshOutcome::Rejected(status);
        }

        let token = response
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(strip_bearer);

        match token {
            Some(token) => {
                info!(token_len = token.len(), "Access token refreshed");
                RefreshOutcome::Renewed(token)
            }
            None => {
                warn!(status = status.as_u16(), "Token refresh returned no access token");
                RefreshOutcome::MissingToken
            }
        }
    }

    async fn send(&self, req: &ApiRequest) -> Result<Response, ApiError> {
        let mut builder = self
            .client
            .request(req.method().clone(), req.url())
            .headers(req.headers().clone());
        if let Some(body) = req.body_bytes() {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        debug!(
            method = %req.method(),
            url = %req.url(),
            status = response.status().as_u16(),
            "Request completed"
        );
        Ok(response)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }

    // ===== Typed helpers =====

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path);
        let req = ApiRequest::get(url.as_str()).bearer(token)?;
        let response = Self::check_response(self.request(&req).await?).await?;
        Self::parse_json(response, &url).await
    }

    pub async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path);
        let req = ApiRequest::new(method, url.as_str()).bearer(token)?.json(body)?;
        let response = Self::check_response(self.request(&req).await?).await?;
        Self::parse_json(response, &url).await
    }

    /// Fetch the signed-in user's profile
    pub async fn fetch_me(&self, token: &str) -> Result<UserProfile, ApiError> {
        self.get_json(MY_PATH, token).await
    }
}
