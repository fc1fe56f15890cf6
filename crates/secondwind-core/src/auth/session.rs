use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Response;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, ApiRequest, RefreshOutcome};
use crate::models::UserProfile;

use super::events::TokenEvent;
use super::store::CredentialStore;

/// The signed-in session: the stored access token plus the user profile.
///
/// The token itself lives in the `CredentialStore`; this type only decides
/// when it is written or cleared.
pub struct Session {
    client: ApiClient,
    store: Arc<dyn CredentialStore>,
    user: Option<UserProfile>,
}

impl Session {
    pub fn new(client: ApiClient, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            client,
            store,
            user: None,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Bootstrap a session from the refresh cookie alone.
    ///
    /// Any failure leaves the session signed out with the store cleared.
    pub async fn restore(&mut self) -> Result<&UserProfile> {
        let mut events = self.client.subscribe();
        let token = match self.client.refresh().await {
            RefreshOutcome::Renewed(token) => token,
            outcome => {
                info!(?outcome, "No session to restore");
                self.discard()?;
                return Err(ApiError::SessionExpired.into());
            }
        };

        let user = match self.client.fetch_me(&token).await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Failed to fetch profile during restore");
                self.discard()?;
                return Err(e.into());
            }
        };

        // Fetching the profile may itself have renewed the token
        let token = latest_token(&mut events).unwrap_or(token);
        self.store
            .set(&token)
            .context("Failed to store access token")?;
        info!(user_id = user.id, "Session restored");
        Ok(self.user.insert(user))
    }

    /// Adopt a token obtained by an external login flow
    pub fn login(&mut self, token: &str, user: UserProfile) -> Result<()> {
        self.store
            .set(token)
            .context("Failed to store access token")?;
        info!(user_id = user.id, "Logged in");
        self.user = Some(user);
        Ok(())
    }

    pub fn logout(&mut self) -> Result<()> {
        info!("Logging out");
        self.discard()
    }

    fn discard(&mut self) -> Result<()> {
        self.user = None;
        self.store.clear().context("Failed to clear stored token")
    }

    /// Current bare access token from the store
    pub fn token(&self) -> Result<Option<String>> {
        self.store.get()
    }

    /// Attach the current token to `req`
    pub fn authorize(&self, req: ApiRequest) -> Result<ApiRequest> {
        let token = self.token()?.ok_or(ApiError::SessionExpired)?;
        Ok(req.bearer(&token)?)
    }

    /// Authorize and send `req` through the refreshing client
    pub async fn request(&self, req: ApiRequest) -> Result<Response> {
        let req = self.authorize(req)?;
        Ok(self.client.request(&req).await?)
    }

    /// Keep the store in step with token renewals from any clone of the client.
    /// The task ends once every client clone has been dropped.
    pub fn spawn_sync(&self) -> JoinHandle<()> {
        let mut rx = self.client.subscribe();
        let store = Arc::clone(&self.store);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(TokenEvent::Refreshed(token)) => match store.set(&token) {
                        Ok(()) => debug!(token_len = token.len(), "Stored refreshed token"),
                        Err(e) => warn!(error = %e, "Failed to store refreshed token"),
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Token sync fell behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Token sync stopped");
        })
    }
}

/// Drain pending events and return the newest renewed token
fn latest_token(events: &mut broadcast::Receiver<TokenEvent>) -> Option<String> {
    let mut latest = None;
    loop {
        match events.try_recv() {
            Ok(TokenEvent::Refreshed(token)) => latest = Some(token),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => return latest,
        }
    }
}
