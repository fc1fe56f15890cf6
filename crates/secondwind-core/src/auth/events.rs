use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the token event channel. Renewals are rare; a slow
/// subscriber only ever needs the latest one.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Process-wide notification that a new access token was issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEvent {
    /// Carries the bare token, without the `Bearer ` prefix
    Refreshed(String),
}

/// Publishes token events to every subscriber.
/// Clone is cheap - all clones feed the same channel.
#[derive(Debug, Clone)]
pub struct TokenNotifier {
    tx: broadcast::Sender<TokenEvent>,
}

impl TokenNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TokenEvent> {
        self.tx.subscribe()
    }

    pub fn notify(&self, event: TokenEvent) {
        match self.tx.send(event) {
            Ok(receivers) => debug!(receivers, "Token event delivered"),
            Err(_) => debug!("Token event dropped, no subscribers"),
        }
    }
}

impl Default for TokenNotifier {
    fn default() -> Self {
        Self::new()
    }
}
