//! The chat-transport seam and the reconnect policy.
//!
//! The relay only ever talks to a [`ChatTransport`]; the bundled
//! [`StdioTransport`] is a JSON-lines development implementation, and
//! production transports live outside this crate.

mod stdio;

pub use stdio::StdioTransport;

use crate::bus::{DisconnectCause, InboundMessage};
use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Narrow interface to the chat platform.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, to: &str, body: &str) -> Result<()>;

    /// Send audio, optionally as a quoted reply to `quoted`.
    async fn send_voice(
        &self,
        to: &str,
        audio: &[u8],
        mime: &str,
        filename: &str,
        quoted: Option<&InboundMessage>,
    ) -> Result<()>;

    async fn send_image(&self, to: &str, bytes: &[u8], caption: Option<&str>) -> Result<()>;

    /// Send `body` mentioning every identity in `mentions`.
    async fn send_mentions(&self, to: &str, body: &str, mentions: &[String]) -> Result<()>;

    async fn delete_message(&self, chat: &str, id: &str, participant: Option<&str>) -> Result<()>;

    async fn group_participants(&self, chat: &str) -> Result<Vec<String>>;

    fn self_identity(&self) -> String;
}

pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;
pub const RECONNECT_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Wait this long, then reconnect.
    RetryAfter(Duration),
    /// Attempt cap reached: wait out the cooldown (counter already reset),
    /// then reconnect.
    CooldownThenRetry(Duration),
    /// Credentials are gone; reconnecting cannot help.
    GiveUp,
}

/// Pure reconnect state machine: escalating per-cause delays, a capped
/// attempt counter, and a cooldown that resets the counter. The supervisor
/// loop owns the actual timers.
#[derive(Debug, Default)]
pub struct ReconnectPolicy {
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connected(&mut self) {
        self.attempts = 0;
    }

    pub fn on_disconnect(&mut self, cause: DisconnectCause) -> ReconnectDecision {
        if cause == DisconnectCause::LoggedOut {
            return ReconnectDecision::GiveUp;
        }
        self.attempts += 1;
        if self.attempts > MAX_RECONNECT_ATTEMPTS {
            self.attempts = 0;
            return ReconnectDecision::CooldownThenRetry(RECONNECT_COOLDOWN);
        }
        let delay = match cause {
            DisconnectCause::RestartRequired => Duration::from_secs(10),
            DisconnectCause::TimedOut => Duration::from_secs(15),
            DisconnectCause::StreamError => Duration::from_secs(20),
            _ => Duration::from_secs(5),
        };
        ReconnectDecision::RetryAfter(delay)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// How one transport session ended, as reported by the connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Clean, deliberate shutdown; supervision ends.
    Finished,
    /// The session was established and then dropped.
    Dropped(DisconnectCause),
    /// The connection attempt never got established.
    ConnectFailed(DisconnectCause),
}

/// Supervisor loop: run sessions produced by `connect` until one finishes
/// cleanly or the policy gives up, sleeping out the [`ReconnectPolicy`]
/// delays in between. A dropped session resets the attempt counter (it did
/// connect); a failed attempt does not, so repeated failures walk into the
/// cooldown.
pub async fn supervise_sessions<C, Fut>(mut connect: C)
where
    C: FnMut() -> Fut,
    Fut: Future<Output = SessionOutcome>,
{
    let mut policy = ReconnectPolicy::new();
    loop {
        let cause = match connect().await {
            SessionOutcome::Finished => {
                info!("transport session finished, supervisor stopping");
                return;
            }
            SessionOutcome::Dropped(cause) => {
                policy.on_connected();
                cause
            }
            SessionOutcome::ConnectFailed(cause) => cause,
        };
        match policy.on_disconnect(cause) {
            ReconnectDecision::RetryAfter(delay) => {
                warn!(?cause, ?delay, "session lost, reconnecting");
                tokio::time::sleep(delay).await;
            }
            ReconnectDecision::CooldownThenRetry(cooldown) => {
                warn!(?cause, ?cooldown, "attempt cap reached, cooling down");
                tokio::time::sleep(cooldown).await;
            }
            ReconnectDecision::GiveUp => {
                error!(?cause, "logged out, reconnecting cannot help");
                return;
            }
        }
    }
}
