//! Fixed-prefix group commands: image search, delete-quoted, text-to-speech,
//! mass mention. Parsing is pure; the handlers run on [`RelayService`].

use super::RelayService;
use crate::bus::InboundMessage;
use crate::errors::RelayError;
use crate::search::pick_candidate;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const IMAGE_PREFIX: &str = ".صورة";
const DELETE_PREFIX_AR: &str = ".حذف";
const DELETE_PREFIX_EN: &str = ".delete";
const SPEAK_PREFIX: &str = ".صوت";
const MENTION_PREFIX: &str = ".منشن";

/// Delay before the command message itself is deleted.
const TRIGGER_DELETE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ImageSearch(String),
    DeleteQuoted,
    Speak(String),
    MentionAll(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Command(Command),
    /// Recognized prefix with unusable arguments; the string is the usage
    /// reply.
    Usage(&'static str),
}

fn arg_after<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(prefix)?;
    if rest.is_empty() {
        return Some("");
    }
    // Require a separator so ".صورةX" is not a command
    rest.strip_prefix(' ').or_else(|| rest.strip_prefix('\n'))
}

/// Match a trimmed message against the command table. `None` means the text
/// is not a command at all and flows on to normal routing.
pub fn parse(text: &str) -> Option<Parsed> {
    let text = text.trim();

    if let Some(arg) = arg_after(text, IMAGE_PREFIX) {
        let arg = arg.trim();
        return Some(if arg.is_empty() {
            Parsed::Usage("usage: .صورة <search terms>")
        } else {
            Parsed::Command(Command::ImageSearch(arg.to_string()))
        });
    }

    if text == DELETE_PREFIX_AR || text == DELETE_PREFIX_EN {
        return Some(Parsed::Command(Command::DeleteQuoted));
    }

    if let Some(arg) = arg_after(text, SPEAK_PREFIX) {
        let arg = arg.trim();
        return Some(if arg.is_empty() {
            Parsed::Usage("usage: .صوت <text to speak>")
        } else {
            Parsed::Command(Command::Speak(arg.to_string()))
        });
    }

    if let Some(arg) = arg_after(text, MENTION_PREFIX) {
        let arg = arg.trim();
        return Some(if arg.is_empty() {
            Parsed::Usage("usage: .منشن <text>")
        } else {
            Parsed::Command(Command::MentionAll(arg.to_string()))
        });
    }

    None
}

impl RelayService {
    pub(crate) async fn dispatch_command(
        &mut self,
        msg: &InboundMessage,
        parsed: Parsed,
    ) -> Result<(), RelayError> {
        let command = match parsed {
            Parsed::Usage(usage) => return Err(RelayError::Usage(usage.to_string())),
            Parsed::Command(command) => command,
        };
        match command {
            Command::ImageSearch(query) => self.command_image_search(msg, &query).await,
            Command::DeleteQuoted => self.command_delete_quoted(msg).await,
            Command::Speak(text) => self.command_speak(msg, &text).await,
            Command::MentionAll(text) => self.command_mention_all(msg, &text).await,
        }
    }

    async fn command_image_search(
        &mut self,
        msg: &InboundMessage,
        query: &str,
    ) -> Result<(), RelayError> {
        let chat = &msg.chat_id;
        let requester = msg.sender().to_string();
        self.transport
            .send_text(chat, &format!("🔍 searching for: {query}"))
            .await
            .map_err(RelayError::Internal)?;

        let sources = self.searcher.search(query).await;
        let candidate =
            pick_candidate(&sources, |url| self.state.media_already_sent(&requester, url));
        let Some(url) = candidate else {
            self.transport
                .send_text(chat, "😕 no new images found for that query")
                .await
                .map_err(RelayError::Internal)?;
            return Ok(());
        };

        match self.searcher.download(&url).await {
            Ok(bytes) => {
                self.transport
                    .send_image(chat, &bytes, Some(query))
                    .await
                    .map_err(RelayError::Internal)?;
                self.state.record_sent_media(&requester, &url);
            }
            Err(e) => {
                debug!(url = %url, error = format!("{e:#}"), "image download rejected");
                self.transport
                    .send_text(chat, "⚠️ found an image but could not download it")
                    .await
                    .map_err(RelayError::Internal)?;
            }
        }
        Ok(())
    }

    async fn command_delete_quoted(&mut self, msg: &InboundMessage) -> Result<(), RelayError> {
        let Some(quote) = &msg.quote else {
            return Err(RelayError::Usage(
                "reply to the message you want deleted, then send .حذف".to_string(),
            ));
        };

        // Markers go in before any transport call so the deletion events
        // find them already set
        self.state.note_self_deletion(&quote.id);
        self.state.note_self_deletion(&msg.id);

        self.transport
            .delete_message(&msg.chat_id, &quote.id, quote.participant.as_deref())
            .await
            .map_err(RelayError::Internal)?;

        // Best-effort cleanup of the trigger message; failure is ignored
        let transport = self.transport.clone();
        let chat = msg.chat_id.clone();
        let trigger_id = msg.id.clone();
        let participant = msg.participant.clone();
        tokio::spawn(async move {
            tokio::time::sleep(TRIGGER_DELETE_DELAY).await;
            if let Err(e) = transport
                .delete_message(&chat, &trigger_id, participant.as_deref())
                .await
            {
                debug!(error = format!("{e:#}"), "trigger message cleanup failed");
            }
        });
        Ok(())
    }

    async fn command_speak(&mut self, msg: &InboundMessage, text: &str) -> Result<(), RelayError> {
        let chat = &msg.chat_id;
        self.transport
            .send_text(chat, "🎙️ generating voice...")
            .await
            .map_err(RelayError::Internal)?;

        let started = Instant::now();
        match self.tts.synthesize(text).await {
            Ok(outcome) => {
                self.transport
                    .send_voice(chat, &outcome.audio, super::VOICE_MIME, "speech.mp3", None)
                    .await
                    .map_err(RelayError::Internal)?;
                let info = format!(
                    "✅ done\nLanguage: {}\nTime: {:.1}s\nLength: {} characters",
                    outcome.language.display_name(),
                    started.elapsed().as_secs_f32(),
                    text.chars().count()
                );
                self.transport
                    .send_text(chat, &info)
                    .await
                    .map_err(RelayError::Internal)?;
            }
            Err(e) => {
                warn!(error = %e, "speak command synthesis failed");
                self.transport
                    .send_text(
                        chat,
                        "❌ could not generate voice\nTips: use shorter text, avoid \
                         links and symbols, try again in a minute",
                    )
                    .await
                    .map_err(RelayError::Internal)?;
            }
        }
        Ok(())
    }

    async fn command_mention_all(
        &mut self,
        msg: &InboundMessage,
        text: &str,
    ) -> Result<(), RelayError> {
        let targets = self
            .mention_targets()
            .await
            .map_err(RelayError::Internal)?;
        if targets.is_empty() {
            return Err(RelayError::Usage(
                "nobody to mention in this group".to_string(),
            ));
        }
        self.transport
            .send_mentions(&msg.chat_id, text, &targets)
            .await
            .map_err(RelayError::Internal)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_command_with_query() {
        assert_eq!(
            parse(".صورة sunset over mountains"),
            Some(Parsed::Command(Command::ImageSearch(
                "sunset over mountains".into()
            )))
        );
    }

    #[test]
    fn image_command_without_query_is_usage_error() {
        assert!(matches!(parse(".صورة"), Some(Parsed::Usage(_))));
        assert!(matches!(parse(".صورة   "), Some(Parsed::Usage(_))));
    }

    #[test]
    fn delete_command_both_spellings() {
        assert_eq!(parse(".حذف"), Some(Parsed::Command(Command::DeleteQuoted)));
        assert_eq!(
            parse(".delete"),
            Some(Parsed::Command(Command::DeleteQuoted))
        );
    }

    #[test]
    fn speak_command_carries_argument() {
        assert_eq!(
            parse(".صوت hello there"),
            Some(Parsed::Command(Command::Speak("hello there".into())))
        );
    }

    #[test]
    fn mention_command() {
        assert_eq!(
            parse(".منشن meeting in five"),
            Some(Parsed::Command(Command::MentionAll("meeting in five".into())))
        );
        assert!(matches!(parse(".منشن"), Some(Parsed::Usage(_))));
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse("just chatting"), None);
        assert_eq!(parse(""), None);
        assert_eq!(parse(".unknown thing"), None);
    }

    #[test]
    fn prefix_requires_separator() {
        assert_eq!(parse(".صورةpasted"), None);
    }
}
