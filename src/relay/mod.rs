//! The relay dispatcher: consumes transport events, keeps the conversation
//! state, and routes between the monitored group and the operator.

pub mod commands;
pub mod envelope;

use crate::bus::{InboundMessage, TransportEvent};
use crate::config::Config;
use crate::errors::RelayError;
use crate::search::ImageSearcher;
use crate::state::{ConversationState, StateBounds};
use crate::transport::ChatTransport;
use crate::tts::TtsPipeline;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const VOICE_MIME: &str = "audio/mpeg";
const VOICE_FILENAME: &str = "reply.mp3";

/// The relay service owns the five bounded stores and every routing
/// decision. One instance, constructed at startup with injected
/// configuration; state mutations are plain method calls that never straddle
/// an await.
pub struct RelayService {
    config: Config,
    state: ConversationState,
    transport: Arc<dyn ChatTransport>,
    tts: TtsPipeline,
    searcher: ImageSearcher,
}

impl RelayService {
    pub fn new(
        config: Config,
        transport: Arc<dyn ChatTransport>,
        tts: TtsPipeline,
        searcher: ImageSearcher,
    ) -> Self {
        let bounds: StateBounds = config.bounds.clone().into();
        Self {
            config,
            state: ConversationState::new(bounds),
            transport,
            tts,
            searcher,
        }
    }

    /// Consume events until the channel closes. One event at a time: the
    /// store is mutated only from this task.
    pub async fn run(&mut self, mut events: mpsc::Receiver<TransportEvent>) {
        info!(
            group = %self.config.group_id,
            operator = %self.config.operator_id,
            "relay running"
        );
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        info!("event channel closed, relay stopping");
    }

    /// Top-level error boundary: failures are logged, never propagated, so
    /// one bad event cannot take the service down.
    pub async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(msg) => {
                let id = msg.id.clone();
                if let Err(e) = self.handle_message(msg).await {
                    error!(message = %id, error = format!("{e:#}"), "message handling failed");
                }
            }
            TransportEvent::MessageDeleted { id, chat_id } => {
                if let Err(e) = self.handle_deletion(&id, &chat_id).await {
                    error!(message = %id, error = format!("{e:#}"), "deletion handling failed");
                }
            }
            TransportEvent::Connected => info!("transport connected"),
            TransportEvent::Disconnected { cause } => {
                // The transport's supervisor owns reconnection; nothing to
                // mutate here.
                warn!(?cause, "transport disconnected");
            }
        }
    }

    async fn handle_message(&mut self, msg: InboundMessage) -> Result<()> {
        if msg.from_self {
            return Ok(());
        }
        if !self.state.mark_processed(&msg.id) {
            debug!(message = %msg.id, "duplicate delivery discarded");
            return Ok(());
        }

        let now = Utc::now().timestamp_millis();
        let is_operator = identities_equal(msg.sender(), &self.config.operator_id);
        let in_monitored_group = msg.group && msg.chat_id == self.config.group_id;

        // History always; pending only for group traffic awaiting a reply
        self.state
            .record_inbound(&msg, in_monitored_group && !is_operator, now);

        if is_operator {
            if let Some(text) = msg.body_text() {
                let text = text.to_string();
                self.deliver_reply(&text, now).await;
            }
            return Ok(());
        }

        if !msg.group {
            // Private chats are not relayed
            return Ok(());
        }

        if let Some(text) = msg.text()
            && let Some(parsed) = commands::parse(text)
        {
            self.handle_command(&msg, parsed).await;
            return Ok(());
        }

        self.forward_to_operator(&msg).await;
        Ok(())
    }

    /// Operator text becomes a voice message to the group, quoted against
    /// the oldest unanswered message when one exists.
    async fn deliver_reply(&mut self, text: &str, now: i64) {
        let outcome = match self.tts.synthesize(text).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_no_audio() => {
                info!("synthesis produced no usable audio, staying silent");
                self.state.prune_stale(now);
                return;
            }
            Err(e) => {
                error!(error = %e, "synthesis failed unexpectedly, degrading to text");
                let degraded = format!("[voice failed] {text}");
                if let Err(send_err) = self
                    .transport
                    .send_text(&self.config.group_id, &degraded)
                    .await
                {
                    error!(error = format!("{send_err:#}"), "degraded text send failed");
                }
                self.state.prune_stale(now);
                return;
            }
        };

        if outcome.segments_voiced < outcome.segments_total {
            warn!(
                voiced = outcome.segments_voiced,
                total = outcome.segments_total,
                "partial synthesis, sending what we have"
            );
        }

        let target = self
            .state
            .take_oldest_unanswered()
            .map(|(id, entry)| (id.to_string(), entry.message.clone()));

        let send = match &target {
            Some((_, original)) => {
                self.transport
                    .send_voice(
                        &self.config.group_id,
                        &outcome.audio,
                        VOICE_MIME,
                        VOICE_FILENAME,
                        Some(original),
                    )
                    .await
            }
            None => {
                self.transport
                    .send_voice(
                        &self.config.group_id,
                        &outcome.audio,
                        VOICE_MIME,
                        VOICE_FILENAME,
                        None,
                    )
                    .await
            }
        };

        match send {
            Ok(()) => {
                if let Some((id, _)) = target {
                    self.state.mark_answered(&id);
                }
            }
            Err(e) => error!(error = format!("{e:#}"), "voice reply send failed"),
        }
        self.state.prune_stale(now);
    }

    /// Format the envelope and push it to the operator, chunked with the
    /// fixed inter-part delay. A failed chunk is logged; bookkeeping is never
    /// rolled back.
    async fn forward_to_operator(&self, msg: &InboundMessage) {
        let body = envelope::format_envelope(msg, self.config.preamble.as_deref());
        let chunks = envelope::split_chunks(&body, envelope::CHUNK_LIMIT);
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(envelope::CHUNK_DELAY_MS))
                    .await;
            }
            if let Err(e) = self
                .transport
                .send_text(&self.config.operator_id, chunk)
                .await
            {
                warn!(part = i + 1, error = format!("{e:#}"), "envelope chunk send failed");
            }
        }
    }

    /// Deletion events: a marker set by our own delete command suppresses
    /// the notice; anything else gets announced to the group with the
    /// history snapshot.
    async fn handle_deletion(&mut self, id: &str, chat_id: &str) -> Result<()> {
        if chat_id != self.config.group_id {
            return Ok(());
        }
        if self.state.consume_self_deletion(id) {
            debug!(message = %id, "self-initiated deletion, suppressing notice");
            self.state.remove_history(id);
            return Ok(());
        }

        let notice = match self.state.remove_history(id) {
            Some(entry) => format!(
                "🗑️ A message was deleted\nFrom: {}\nTime: {}\nContent: {}",
                envelope::display_sender(&entry.sender),
                chrono::DateTime::from_timestamp_millis(entry.timestamp)
                    .map_or_else(|| "unknown".to_string(), |dt| dt
                        .format("%Y-%m-%d %H:%M:%S UTC")
                        .to_string()),
                entry.content
            ),
            None => "🗑️ A message was deleted (content unknown)".to_string(),
        };

        match self.mention_targets().await {
            Ok(targets) if !targets.is_empty() => {
                self.transport
                    .send_mentions(&self.config.group_id, &notice, &targets)
                    .await?;
            }
            _ => {
                self.transport
                    .send_text(&self.config.group_id, &notice)
                    .await?;
            }
        }
        Ok(())
    }

    /// Group participants minus the operator and the relay itself.
    async fn mention_targets(&self) -> Result<Vec<String>> {
        let participants = self
            .transport
            .group_participants(&self.config.group_id)
            .await?;
        let self_id = self.transport.self_identity();
        Ok(participants
            .into_iter()
            .filter(|p| {
                !identities_match(p, &self.config.operator_id) && !identities_match(p, &self_id)
            })
            .collect())
    }

    async fn handle_command(&mut self, msg: &InboundMessage, parsed: commands::Parsed) {
        if !check_allowed_sender(msg.sender(), &self.config.allow_list) {
            debug!(sender = %msg.sender(), "sender not on the allow list, ignoring command");
            return;
        }
        if let Err(e) = self.dispatch_command(msg, parsed).await {
            match e {
                RelayError::Usage(usage) => {
                    if let Err(send_err) =
                        self.transport.send_text(&msg.chat_id, &usage).await
                    {
                        error!(error = format!("{send_err:#}"), "usage reply send failed");
                    }
                }
                other => error!(error = %other, "command failed"),
            }
        }
    }

    /// Read-only view of the conversation state, for integration tests.
    pub fn state(&self) -> &ConversationState {
        &self.state
    }
}

/// Strict identity equality, used for the operator decision: `+` prefixes
/// are trimmed, nothing else matches. A participant id that merely contains
/// the operator id must never be granted the operator path.
pub fn identities_equal(a: &str, b: &str) -> bool {
    a.trim_start_matches('+') == b.trim_start_matches('+')
}

/// Loose identity comparison: exact match after trimming any `+` prefix, or
/// containment either way (transports decorate ids with device suffixes).
/// Used for the allow list and mention filtering only.
pub fn identities_match(a: &str, b: &str) -> bool {
    let na = a.trim_start_matches('+');
    let nb = b.trim_start_matches('+');
    na == nb || na.contains(nb) || nb.contains(na)
}

/// Empty allow list means everyone; otherwise the sender must match an entry.
pub fn check_allowed_sender(sender: &str, allow_list: &[String]) -> bool {
    if allow_list.is_empty() {
        return true;
    }
    allow_list.iter().any(|allowed| identities_match(sender, allowed))
}
