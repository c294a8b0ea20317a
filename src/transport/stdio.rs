//! JSON-lines development transport: inbound [`TransportEvent`] objects on
//! stdin, outbound actions as JSON objects on stdout. Lets the relay run end
//! to end against a pipe or a test harness without a real chat bridge.

use crate::bus::{DisconnectCause, InboundMessage, TransportEvent};
use crate::transport::{ChatTransport, SessionOutcome};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

pub struct StdioTransport {
    self_id: String,
    out: Mutex<tokio::io::Stdout>,
}

impl StdioTransport {
    pub fn new(self_id: impl Into<String>) -> Self {
        Self {
            self_id: self_id.into(),
            out: Mutex::new(tokio::io::stdout()),
        }
    }

    /// Run one reader session: stdin lines become transport events until the
    /// pipe closes. Unparseable lines are logged and skipped. EOF (or a
    /// closed event channel) is a clean finish; an io error ends the session
    /// as a stream error so the supervisor retries it.
    pub async fn read_session(tx: mpsc::Sender<TransportEvent>) -> SessionOutcome {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<TransportEvent>(line) {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                return SessionOutcome::Finished;
                            }
                        }
                        Err(e) => warn!(error = %e, "skipping unparseable event line"),
                    }
                }
                Ok(None) => {
                    debug!("stdin closed, session over");
                    return SessionOutcome::Finished;
                }
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    return SessionOutcome::Dropped(DisconnectCause::StreamError);
                }
            }
        }
    }

    async fn emit(&self, value: serde_json::Value) -> Result<()> {
        let mut line = serde_json::to_string(&value)?;
        line.push('\n');
        let mut out = self.out.lock().await;
        out.write_all(line.as_bytes())
            .await
            .context("stdout write failed")?;
        out.flush().await.context("stdout flush failed")?;
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for StdioTransport {
    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        self.emit(json!({ "action": "sendText", "to": to, "body": body }))
            .await
    }

    async fn send_voice(
        &self,
        to: &str,
        audio: &[u8],
        mime: &str,
        filename: &str,
        quoted: Option<&InboundMessage>,
    ) -> Result<()> {
        self.emit(json!({
            "action": "sendVoice",
            "to": to,
            "mime": mime,
            "filename": filename,
            "audio": BASE64.encode(audio),
            "quotedId": quoted.map(|m| m.id.clone()),
        }))
        .await
    }

    async fn send_image(&self, to: &str, bytes: &[u8], caption: Option<&str>) -> Result<()> {
        self.emit(json!({
            "action": "sendImage",
            "to": to,
            "image": BASE64.encode(bytes),
            "caption": caption,
        }))
        .await
    }

    async fn send_mentions(&self, to: &str, body: &str, mentions: &[String]) -> Result<()> {
        self.emit(json!({
            "action": "sendMentions",
            "to": to,
            "body": body,
            "mentions": mentions,
        }))
        .await
    }

    async fn delete_message(&self, chat: &str, id: &str, participant: Option<&str>) -> Result<()> {
        self.emit(json!({
            "action": "deleteMessage",
            "chat": chat,
            "id": id,
            "participant": participant,
        }))
        .await
    }

    async fn group_participants(&self, _chat: &str) -> Result<Vec<String>> {
        // A pipe has no group roster
        Ok(Vec::new())
    }

    fn self_identity(&self) -> String {
        self.self_id.clone()
    }
}
