//! Message and event types exchanged with the chat transport.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    Sticker,
}

impl MediaKind {
    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
            MediaKind::Sticker => "sticker",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessageContent {
    Text { body: String },
    Media {
        kind: MediaKind,
        #[serde(default)]
        caption: Option<String>,
    },
    Unsupported,
}

/// Reference to a quoted (replied-to) message, as supplied by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRef {
    pub id: String,
    #[serde(default)]
    pub participant: Option<String>,
}

/// One inbound chat message. Immutable once received; timestamps are
/// sender-supplied epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub id: String,
    pub chat_id: String,
    /// Sending participant for group messages; absent in direct chats.
    #[serde(default)]
    pub participant: Option<String>,
    pub timestamp: i64,
    pub content: MessageContent,
    /// Whether the origin chat is a group. Supplied by the transport.
    #[serde(default)]
    pub group: bool,
    #[serde(default)]
    pub from_self: bool,
    #[serde(default)]
    pub quote: Option<QuoteRef>,
}

impl InboundMessage {
    /// Sender identity: the group participant when present, otherwise the
    /// chat itself (direct chats).
    pub fn sender(&self) -> &str {
        self.participant.as_deref().unwrap_or(&self.chat_id)
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text { body } => Some(body),
            _ => None,
        }
    }

    /// Readable body: the text itself, or a media caption when present.
    pub fn body_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text { body } => Some(body),
            MessageContent::Media { caption, .. } => caption.as_deref(),
            MessageContent::Unsupported => None,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match &self.content {
            MessageContent::Text { .. } => "text",
            MessageContent::Media { kind, .. } => kind.label(),
            MessageContent::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisconnectCause {
    ConnectionClosed,
    ConnectionLost,
    RestartRequired,
    TimedOut,
    StreamError,
    LoggedOut,
}

/// Events consumed from the chat transport collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum TransportEvent {
    Message(InboundMessage),
    #[serde(rename_all = "camelCase")]
    MessageDeleted { id: String, chat_id: String },
    Connected,
    Disconnected { cause: DisconnectCause },
}
