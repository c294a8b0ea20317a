//! JSON configuration (camelCase keys), loaded from `config.json` by
//! default. Every section has working defaults; provider credentials fall
//! back to environment variables.

use crate::search::SearchConfig;
use crate::state::{
    DEFAULT_DELETION_MARKER_CAP, DEFAULT_HISTORY_CAP, DEFAULT_PROCESSED_CAP,
    DEFAULT_REPLY_WINDOW_MS, DEFAULT_SENT_MEDIA_CAP, StateBounds,
};
use crate::tts::providers::ProviderCredentials;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// The privileged sender whose messages become voice replies.
    pub operator_id: String,
    /// The one group whose traffic is relayed.
    pub group_id: String,
    /// Identity the transport reports for the relay itself.
    pub self_id: String,
    /// Senders allowed to use group commands. Empty means everyone.
    pub allow_list: Vec<String>,
    /// Standing instructions appended to every forwarded envelope.
    pub preamble: Option<String>,
    pub bounds: BoundsConfig,
    pub tts: TtsConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoundsConfig {
    pub history_cap: usize,
    pub processed_cap: usize,
    pub sent_media_cap: usize,
    pub deletion_marker_cap: usize,
    pub reply_window_secs: u64,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            history_cap: DEFAULT_HISTORY_CAP,
            processed_cap: DEFAULT_PROCESSED_CAP,
            sent_media_cap: DEFAULT_SENT_MEDIA_CAP,
            deletion_marker_cap: DEFAULT_DELETION_MARKER_CAP,
            reply_window_secs: (DEFAULT_REPLY_WINDOW_MS / 1000) as u64,
        }
    }
}

impl From<BoundsConfig> for StateBounds {
    fn from(cfg: BoundsConfig) -> Self {
        Self {
            history_cap: cfg.history_cap,
            processed_cap: cfg.processed_cap,
            sent_media_cap: cfg.sent_media_cap,
            deletion_marker_cap: cfg.deletion_marker_cap,
            reply_window_ms: (cfg.reply_window_secs * 1000) as i64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TtsConfig {
    pub voicerss_key: Option<String>,
    pub azure_key: Option<String>,
    pub azure_region: Option<String>,
    pub gcloud_key: Option<String>,
    pub elevenlabs_key: Option<String>,
    pub elevenlabs_voice: Option<String>,
    pub openai_key: Option<String>,
}

fn credential(explicit: &Option<String>, env: &str) -> Option<String> {
    explicit
        .clone()
        .or_else(|| std::env::var(env).ok())
        .filter(|s| !s.is_empty())
}

impl TtsConfig {
    /// Resolve credentials, falling back to `VOXRELAY_*` environment
    /// variables for anything not set in the file.
    pub fn resolve_credentials(&self) -> ProviderCredentials {
        ProviderCredentials {
            voicerss_key: credential(&self.voicerss_key, "VOXRELAY_VOICERSS_KEY"),
            azure_key: credential(&self.azure_key, "VOXRELAY_AZURE_KEY"),
            azure_region: credential(&self.azure_region, "VOXRELAY_AZURE_REGION"),
            gcloud_key: credential(&self.gcloud_key, "VOXRELAY_GCLOUD_KEY"),
            elevenlabs_key: credential(&self.elevenlabs_key, "VOXRELAY_ELEVENLABS_KEY"),
            elevenlabs_voice: credential(&self.elevenlabs_voice, "VOXRELAY_ELEVENLABS_VOICE"),
            openai_key: credential(&self.openai_key, "VOXRELAY_OPENAI_KEY"),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.operator_id.trim().is_empty() {
            bail!("operatorId must be set");
        }
        if self.group_id.trim().is_empty() {
            bail!("groupId must be set");
        }
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("config.json")
}

/// Load from `path` (or `config.json`); a missing file yields defaults so
/// `check-config` can explain what is still required.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let default_path = default_config_path();
    let path = path.unwrap_or(default_path.as_path());
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config from {}", path.display()))?;
    let config: Config = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config JSON from {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_fail_validation() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn camel_case_keys_deserialize() {
        let json = r#"{
            "operatorId": "49176@chat",
            "groupId": "group@chat",
            "allowList": ["49176"],
            "bounds": { "historyCap": 10, "replyWindowSecs": 60 },
            "tts": { "azureKey": "k", "azureRegion": "westeurope" }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.operator_id, "49176@chat");
        assert_eq!(config.bounds.history_cap, 10);
        assert_eq!(config.bounds.processed_cap, DEFAULT_PROCESSED_CAP);
        assert_eq!(config.tts.azure_region.as_deref(), Some("westeurope"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bounds_convert_to_state_bounds() {
        let bounds: StateBounds = BoundsConfig {
            reply_window_secs: 60,
            ..BoundsConfig::default()
        }
        .into();
        assert_eq!(bounds.reply_window_ms, 60_000);
        assert_eq!(bounds.history_cap, DEFAULT_HISTORY_CAP);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config(Some(Path::new("/nonexistent/config.json"))).unwrap();
        assert!(config.operator_id.is_empty());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(load_config(Some(file.path())).is_err());
    }

    #[test]
    fn load_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "operatorId": "op@chat", "groupId": "g@chat", "preamble": "voice only" }}"#
        )
        .unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.preamble.as_deref(), Some("voice only"));
    }
}
