//! Text-to-speech pipeline: detect language, sanitize, segment, synthesize
//! per segment through the fallback chain, assemble with silence spacers.

pub mod language;
pub mod providers;
pub mod sanitize;
pub mod segment;

use crate::errors::RelayError;
use language::{Language, detect_language};
use providers::FallbackChain;
use tracing::{debug, warn};

/// Silence inserted between segments, milliseconds.
pub const SEGMENT_GAP_MS: u64 = 300;

/// Spacer sizing: bytes of silence per millisecond at the 44.1 kHz byte rate.
pub const SPACER_BYTES_PER_MS: f64 = 44.1;

#[derive(Debug)]
pub struct TtsOutcome {
    pub audio: Vec<u8>,
    pub language: Language,
    pub segments_total: usize,
    pub segments_voiced: usize,
}

pub struct TtsPipeline {
    chain: FallbackChain,
}

impl TtsPipeline {
    pub fn new(chain: FallbackChain) -> Self {
        Self { chain }
    }

    /// Run the full pipeline. A partial result (some segments voiced) is a
    /// success; only a fully empty result is `NoAudio`.
    pub async fn synthesize(&self, text: &str) -> Result<TtsOutcome, RelayError> {
        let language = detect_language(text);
        let cleaned = sanitize::sanitize(text, language);
        let segments = segment::segment(&cleaned, language);
        if segments.is_empty() {
            return Err(RelayError::NoAudio);
        }
        debug!(
            language = language.code(),
            segments = segments.len(),
            "synthesizing utterance"
        );

        let mut buffers: Vec<Vec<u8>> = Vec::with_capacity(segments.len());
        for (index, seg) in segments.iter().enumerate() {
            match self.chain.synthesize(seg, language).await {
                Some(bytes) => buffers.push(bytes),
                None => warn!(segment = index, "segment produced no audio, omitting"),
            }
        }
        if buffers.is_empty() {
            return Err(RelayError::NoAudio);
        }

        Ok(TtsOutcome {
            audio: assemble(&buffers),
            language,
            segments_total: segments.len(),
            segments_voiced: buffers.len(),
        })
    }
}

pub fn silence_spacer(ms: u64) -> Vec<u8> {
    vec![0u8; (ms as f64 * SPACER_BYTES_PER_MS) as usize]
}

/// Concatenate segment buffers with a spacer between each pair, never after
/// the last.
pub fn assemble(buffers: &[Vec<u8>]) -> Vec<u8> {
    let spacer = silence_spacer(SEGMENT_GAP_MS);
    let total: usize =
        buffers.iter().map(Vec::len).sum::<usize>() + spacer.len() * buffers.len().saturating_sub(1);
    let mut out = Vec::with_capacity(total);
    for (i, buf) in buffers.iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(&spacer);
        }
        out.extend_from_slice(buf);
    }
    out
}
