//! Envelope formatting for messages forwarded to the operator, and the
//! chunking rules for oversized bodies.

use crate::bus::InboundMessage;
use chrono::DateTime;

/// Outbound text bodies above this many characters are chunked.
pub const CHUNK_LIMIT: usize = 4000;

/// Delay between chunk sends, milliseconds.
pub const CHUNK_DELAY_MS: u64 = 2000;

/// Identity with the transport domain suffix stripped, for display.
pub fn display_sender(sender: &str) -> &str {
    sender.split('@').next().unwrap_or(sender)
}

fn format_timestamp(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map_or_else(|| "unknown time".to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

/// Render the forwarded-message envelope: source, sender, type, time, body,
/// plus an optional standing preamble.
pub fn format_envelope(msg: &InboundMessage, preamble: Option<&str>) -> String {
    let body = msg.body_text().unwrap_or("[no text]");
    let mut out = format!(
        "From: {}\nChat: {}\nType: {}\nTime: {}\n\n{}",
        display_sender(msg.sender()),
        msg.chat_id,
        msg.kind_label(),
        format_timestamp(msg.timestamp),
        body
    );
    if let Some(pre) = preamble {
        out.push_str("\n\n");
        out.push_str(pre);
    }
    out
}

/// Split `body` into chunks of at most `limit` characters on line
/// boundaries, hard-slicing single lines that exceed the limit on their own.
/// When more than one chunk results, each gets a `[part i/N]` header.
pub fn split_chunks(body: &str, limit: usize) -> Vec<String> {
    if body.chars().count() <= limit {
        return vec![body.to_string()];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    let mut push_current = |current: &mut String, current_chars: &mut usize, chunks: &mut Vec<String>| {
        if !current.is_empty() {
            chunks.push(std::mem::take(current));
            *current_chars = 0;
        }
    };

    for line in body.split('\n') {
        let line_chars = line.chars().count();
        if line_chars > limit {
            // Oversized single line: flush, then hard-slice on char counts
            push_current(&mut current, &mut current_chars, &mut chunks);
            let mut piece = String::new();
            let mut piece_chars = 0usize;
            for c in line.chars() {
                piece.push(c);
                piece_chars += 1;
                if piece_chars == limit {
                    chunks.push(std::mem::take(&mut piece));
                    piece_chars = 0;
                }
            }
            if !piece.is_empty() {
                current = piece;
                current_chars = piece_chars;
            }
            continue;
        }
        // +1 for the newline separator
        let needed = if current.is_empty() { line_chars } else { line_chars + 1 };
        if current_chars + needed > limit {
            push_current(&mut current, &mut current_chars, &mut chunks);
            current.push_str(line);
            current_chars = line_chars;
        } else {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
            current_chars += needed;
        }
    }
    push_current(&mut current, &mut current_chars, &mut chunks);

    let total = chunks.len();
    if total > 1 {
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| format!("[part {}/{}]\n{}", i + 1, total, chunk))
            .collect()
    } else {
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MessageContent;

    fn message() -> InboundMessage {
        InboundMessage {
            id: "m1".into(),
            chat_id: "group@chat".into(),
            participant: Some("4917612345678@chat".into()),
            timestamp: 1_700_000_000_000,
            content: MessageContent::Text {
                body: "hello operator".into(),
            },
            group: true,
            from_self: false,
            quote: None,
        }
    }

    #[test]
    fn envelope_contains_sender_without_domain() {
        let env = format_envelope(&message(), None);
        assert!(env.contains("From: 4917612345678\n"));
        assert!(!env.contains("From: 4917612345678@chat"));
        assert!(env.contains("Type: text"));
        assert!(env.ends_with("hello operator"));
    }

    #[test]
    fn envelope_appends_preamble() {
        let env = format_envelope(&message(), Some("reply in voice only"));
        assert!(env.ends_with("reply in voice only"));
    }

    #[test]
    fn short_body_is_one_chunk_without_header() {
        let chunks = split_chunks("short body", CHUNK_LIMIT);
        assert_eq!(chunks, vec!["short body"]);
    }

    #[test]
    fn multi_line_body_splits_on_line_boundaries() {
        let body = vec!["x".repeat(30); 10].join("\n");
        let chunks = split_chunks(&body, 70);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            // Header line plus whole input lines; no line is cut mid-way
            let payload = chunk.splitn(2, '\n').nth(1).unwrap();
            assert!(payload.chars().count() <= 70);
            for line in payload.split('\n') {
                assert_eq!(line.chars().count(), 30);
            }
        }
    }

    #[test]
    fn oversized_single_line_is_hard_sliced() {
        let body = "y".repeat(250);
        let chunks = split_chunks(&body, 100);
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].starts_with("[part 1/3]\n"));
        let last = chunks[2].splitn(2, '\n').nth(1).unwrap();
        assert_eq!(last.chars().count(), 50);
    }

    #[test]
    fn part_headers_number_every_chunk() {
        let body = vec!["line".to_string(); 50].join("\n");
        let chunks = split_chunks(&body, 40);
        let n = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(chunk.starts_with(&format!("[part {}/{}]", i + 1, n)));
        }
    }

    #[test]
    fn multibyte_text_splits_on_char_counts() {
        let body = "م".repeat(150);
        let chunks = split_chunks(&body, 100);
        assert_eq!(chunks.len(), 2);
    }
}
