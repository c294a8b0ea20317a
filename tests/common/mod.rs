//! Shared mock collaborators for the integration suite.
// Each test binary uses a subset of these helpers
#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use voxrelay::bus::{InboundMessage, MessageContent};
use voxrelay::transport::ChatTransport;
use voxrelay::tts::language::Language;
use voxrelay::tts::providers::SpeechAdapter;

/// Everything a mock transport was asked to send or do.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        to: String,
        body: String,
    },
    Voice {
        to: String,
        size: usize,
        quoted_id: Option<String>,
    },
    Image {
        to: String,
        size: usize,
        caption: Option<String>,
    },
    Mentions {
        to: String,
        body: String,
        mentions: Vec<String>,
    },
    Delete {
        chat: String,
        id: String,
    },
}

pub struct MockTransport {
    pub sent: Mutex<Vec<Sent>>,
    pub participants: Vec<String>,
    pub self_id: String,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            participants: Vec::new(),
            self_id: "relay@chat".into(),
        }
    }

    pub fn with_participants(participants: Vec<String>) -> Self {
        Self {
            participants,
            ..Self::new()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Text {
            to: to.into(),
            body: body.into(),
        });
        Ok(())
    }

    async fn send_voice(
        &self,
        to: &str,
        audio: &[u8],
        _mime: &str,
        _filename: &str,
        quoted: Option<&InboundMessage>,
    ) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Voice {
            to: to.into(),
            size: audio.len(),
            quoted_id: quoted.map(|m| m.id.clone()),
        });
        Ok(())
    }

    async fn send_image(&self, to: &str, bytes: &[u8], caption: Option<&str>) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Image {
            to: to.into(),
            size: bytes.len(),
            caption: caption.map(ToOwned::to_owned),
        });
        Ok(())
    }

    async fn send_mentions(&self, to: &str, body: &str, mentions: &[String]) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Mentions {
            to: to.into(),
            body: body.into(),
            mentions: mentions.to_vec(),
        });
        Ok(())
    }

    async fn delete_message(
        &self,
        chat: &str,
        id: &str,
        _participant: Option<&str>,
    ) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Delete {
            chat: chat.into(),
            id: id.into(),
        });
        Ok(())
    }

    async fn group_participants(&self, _chat: &str) -> Result<Vec<String>> {
        Ok(self.participants.clone())
    }

    fn self_identity(&self) -> String {
        self.self_id.clone()
    }
}

/// Scripted speech adapter with a call counter.
pub struct MockAdapter {
    name: String,
    result: Result<Vec<u8>, String>,
    pub calls: AtomicUsize,
}

impl MockAdapter {
    pub fn ok(name: &str, size: usize) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            name: name.into(),
            result: Ok(vec![1u8; size]),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn err(name: &str) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            name: name.into(),
            result: Err("scripted failure".into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechAdapter for MockAdapter {
    async fn synthesize(&self, _text: &str, _language: Language) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok(bytes) => Ok(bytes.clone()),
            Err(e) => Err(anyhow!("{}", e)),
        }
    }

    fn id(&self) -> &str {
        &self.name
    }
}

pub fn group_text(id: &str, participant: &str, timestamp: i64, body: &str) -> InboundMessage {
    InboundMessage {
        id: id.into(),
        chat_id: "group@chat".into(),
        participant: Some(participant.into()),
        timestamp,
        content: MessageContent::Text { body: body.into() },
        group: true,
        from_self: false,
        quote: None,
    }
}

pub fn operator_text(id: &str, body: &str) -> InboundMessage {
    InboundMessage {
        id: id.into(),
        chat_id: "operator@chat".into(),
        participant: None,
        timestamp: 9_999_999,
        content: MessageContent::Text { body: body.into() },
        group: false,
        from_self: false,
        quote: None,
    }
}
