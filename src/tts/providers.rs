//! Synthesis provider adapters and the ordered fallback chain.
//!
//! Every HTTP provider is described by a [`ProviderSpec`] (endpoint, request
//! shape, auth, response extractor, timeout) consumed by one generic
//! executor, instead of one hand-written function per provider. Chain order
//! is the retry strategy: no retries inside an adapter.

use crate::tts::language::Language;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Minimum accepted audio payload. Smaller results are placeholder/error
/// bodies from the provider and are treated as declines.
pub const MIN_AUDIO_BYTES: usize = 500;

/// Ceiling on a single provider response body.
const AUDIO_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// One interchangeable implementation of the text-to-audio contract.
#[async_trait]
pub trait SpeechAdapter: Send + Sync {
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>>;
    fn id(&self) -> &str;
}

/// Inputs handed to a request-shape builder.
pub struct SynthesisContext<'a> {
    pub text: &'a str,
    pub language: Language,
    pub credential: Option<&'a str>,
}

/// How the executor builds the outgoing request.
pub enum RequestShape {
    GetQuery(fn(&SynthesisContext) -> Vec<(&'static str, String)>),
    PostForm(fn(&SynthesisContext) -> Vec<(&'static str, String)>),
    PostJson(fn(&SynthesisContext) -> serde_json::Value),
    PostBody {
        content_type: &'static str,
        build: fn(&SynthesisContext) -> String,
    },
}

/// How the executor pulls audio bytes out of the response.
pub enum ResponseExtractor {
    RawAudio,
    /// JSON body carrying base64 audio at the given pointer (`/audioContent`).
    Base64Json { pointer: &'static str },
}

pub struct ProviderSpec {
    pub id: &'static str,
    pub endpoint: String,
    pub shape: RequestShape,
    /// Extra request headers, credentials already resolved.
    pub headers: Vec<(&'static str, String)>,
    /// Credential passed to the shape builder (query/form/body credentials).
    pub credential: Option<String>,
    pub extractor: ResponseExtractor,
    pub timeout: Duration,
    pub min_bytes: usize,
}

/// Generic executor over a [`ProviderSpec`].
pub struct HttpSpeechAdapter {
    spec: ProviderSpec,
    client: Client,
}

impl HttpSpeechAdapter {
    pub fn new(spec: ProviderSpec, client: Client) -> Self {
        Self { spec, client }
    }
}

#[async_trait]
impl SpeechAdapter for HttpSpeechAdapter {
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>> {
        let ctx = SynthesisContext {
            text,
            language,
            credential: self.spec.credential.as_deref(),
        };

        let mut req = match &self.spec.shape {
            RequestShape::GetQuery(build) => {
                self.client.get(&self.spec.endpoint).query(&build(&ctx))
            }
            RequestShape::PostForm(build) => {
                self.client.post(&self.spec.endpoint).form(&build(&ctx))
            }
            RequestShape::PostJson(build) => {
                self.client.post(&self.spec.endpoint).json(&build(&ctx))
            }
            RequestShape::PostBody {
                content_type,
                build,
            } => self
                .client
                .post(&self.spec.endpoint)
                .header("Content-Type", *content_type)
                .body(build(&ctx)),
        };
        for (name, value) in &self.spec.headers {
            req = req.header(*name, value);
        }

        let resp = req
            .timeout(self.spec.timeout)
            .send()
            .await
            .with_context(|| format!("{} request failed", self.spec.id))?
            .error_for_status()
            .with_context(|| format!("{} returned an error status", self.spec.id))?;

        let bytes = match &self.spec.extractor {
            ResponseExtractor::RawAudio => crate::utils::bounded_bytes(resp, AUDIO_BODY_LIMIT)
                .await
                .with_context(|| format!("{} body rejected", self.spec.id))?,
            ResponseExtractor::Base64Json { pointer } => {
                let body: serde_json::Value = resp
                    .json()
                    .await
                    .with_context(|| format!("{} returned malformed JSON", self.spec.id))?;
                let encoded = body
                    .pointer(pointer)
                    .and_then(serde_json::Value::as_str)
                    .ok_or_else(|| {
                        anyhow!("{} response missing audio at {}", self.spec.id, pointer)
                    })?;
                BASE64
                    .decode(encoded)
                    .with_context(|| format!("{} audio payload is not valid base64", self.spec.id))?
            }
        };

        if bytes.len() < self.spec.min_bytes {
            bail!(
                "{} audio below acceptance floor: {} < {} bytes",
                self.spec.id,
                bytes.len(),
                self.spec.min_bytes
            );
        }
        Ok(bytes)
    }

    fn id(&self) -> &str {
        self.spec.id
    }
}

/// Ordered adapter chain. The first adapter whose result clears
/// [`MIN_AUDIO_BYTES`] wins for the given segment; an adapter error is
/// treated identically to a decline.
pub struct FallbackChain {
    adapters: Vec<Arc<dyn SpeechAdapter>>,
}

impl FallbackChain {
    pub fn new(adapters: Vec<Arc<dyn SpeechAdapter>>) -> Self {
        Self { adapters }
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub async fn synthesize(&self, text: &str, language: Language) -> Option<Vec<u8>> {
        for adapter in &self.adapters {
            match adapter.synthesize(text, language).await {
                Ok(bytes) if bytes.len() >= MIN_AUDIO_BYTES => {
                    debug!(provider = adapter.id(), size = bytes.len(), "segment voiced");
                    return Some(bytes);
                }
                Ok(bytes) => {
                    warn!(
                        provider = adapter.id(),
                        size = bytes.len(),
                        "audio below acceptance threshold, trying next provider"
                    );
                }
                Err(e) => {
                    warn!(
                        provider = adapter.id(),
                        error = format!("{e:#}"),
                        "synthesis declined, trying next provider"
                    );
                }
            }
        }
        None
    }
}

// Per-language voice tables

fn voicerss_locale(lang: Language) -> &'static str {
    match lang {
        Language::Ar => "ar-sa",
        Language::Zh => "zh-cn",
        Language::Ja => "ja-jp",
        Language::Ko => "ko-kr",
        Language::Ru => "ru-ru",
        Language::Hi => "hi-in",
        Language::En => "en-us",
        Language::De => "de-de",
        Language::Fr => "fr-fr",
        Language::Es => "es-es",
        Language::It => "it-it",
        Language::Pt => "pt-br",
        Language::Tr => "tr-tr",
    }
}

fn azure_voice(lang: Language) -> (&'static str, &'static str) {
    match lang {
        Language::Ar => ("ar-SA", "ar-SA-HamedNeural"),
        Language::Zh => ("zh-CN", "zh-CN-YunxiNeural"),
        Language::Ja => ("ja-JP", "ja-JP-KeitaNeural"),
        Language::Ko => ("ko-KR", "ko-KR-InJoonNeural"),
        Language::Ru => ("ru-RU", "ru-RU-DmitryNeural"),
        Language::Hi => ("hi-IN", "hi-IN-MadhurNeural"),
        Language::En => ("en-US", "en-US-GuyNeural"),
        Language::De => ("de-DE", "de-DE-ConradNeural"),
        Language::Fr => ("fr-FR", "fr-FR-HenriNeural"),
        Language::Es => ("es-ES", "es-ES-AlvaroNeural"),
        Language::It => ("it-IT", "it-IT-DiegoNeural"),
        Language::Pt => ("pt-BR", "pt-BR-AntonioNeural"),
        Language::Tr => ("tr-TR", "tr-TR-AhmetNeural"),
    }
}

fn gcloud_voice(lang: Language) -> (&'static str, &'static str) {
    match lang {
        Language::Ar => ("ar-XA", "ar-XA-Wavenet-B"),
        Language::Zh => ("cmn-CN", "cmn-CN-Wavenet-B"),
        Language::Ja => ("ja-JP", "ja-JP-Wavenet-C"),
        Language::Ko => ("ko-KR", "ko-KR-Wavenet-C"),
        Language::Ru => ("ru-RU", "ru-RU-Wavenet-B"),
        Language::Hi => ("hi-IN", "hi-IN-Wavenet-B"),
        Language::En => ("en-US", "en-US-Wavenet-D"),
        Language::De => ("de-DE", "de-DE-Wavenet-B"),
        Language::Fr => ("fr-FR", "fr-FR-Wavenet-B"),
        Language::Es => ("es-ES", "es-ES-Wavenet-B"),
        Language::It => ("it-IT", "it-IT-Wavenet-C"),
        Language::Pt => ("pt-BR", "pt-BR-Wavenet-B"),
        Language::Tr => ("tr-TR", "tr-TR-Wavenet-B"),
    }
}

// Request-shape builders

fn gtranslate_query_fast(ctx: &SynthesisContext) -> Vec<(&'static str, String)> {
    vec![
        ("ie", "UTF-8".into()),
        ("q", ctx.text.to_string()),
        ("tl", ctx.language.code().into()),
        ("client", "tw-ob".into()),
    ]
}

fn gtranslate_query_slow(ctx: &SynthesisContext) -> Vec<(&'static str, String)> {
    vec![
        ("ie", "UTF-8".into()),
        ("q", ctx.text.to_string()),
        ("tl", ctx.language.code().into()),
        ("client", "tw-ob".into()),
        ("ttsspeed", "0.24".into()),
    ]
}

fn gtranslate_query_gtx(ctx: &SynthesisContext) -> Vec<(&'static str, String)> {
    vec![
        ("ie", "UTF-8".into()),
        ("q", ctx.text.to_string()),
        ("tl", ctx.language.code().into()),
        ("client", "gtx".into()),
    ]
}

fn voicerss_form(ctx: &SynthesisContext) -> Vec<(&'static str, String)> {
    vec![
        ("key", ctx.credential.unwrap_or_default().to_string()),
        ("src", ctx.text.to_string()),
        ("hl", voicerss_locale(ctx.language).into()),
        ("c", "MP3".into()),
        ("f", "44khz_16bit_stereo".into()),
    ]
}

fn azure_ssml(ctx: &SynthesisContext) -> String {
    let (locale, voice) = azure_voice(ctx.language);
    let escaped = ctx
        .text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(
        "<speak version='1.0' xml:lang='{locale}'><voice name='{voice}'>{escaped}</voice></speak>"
    )
}

fn gcloud_json(ctx: &SynthesisContext) -> serde_json::Value {
    let (code, name) = gcloud_voice(ctx.language);
    serde_json::json!({
        "input": { "text": ctx.text },
        "voice": { "languageCode": code, "name": name },
        "audioConfig": { "audioEncoding": "MP3" }
    })
}

fn elevenlabs_json(ctx: &SynthesisContext) -> serde_json::Value {
    serde_json::json!({
        "text": ctx.text,
        "model_id": "eleven_multilingual_v2",
        "voice_settings": { "stability": 0.5, "similarity_boost": 0.75 }
    })
}

fn openai_json(ctx: &SynthesisContext) -> serde_json::Value {
    serde_json::json!({
        "model": "tts-1",
        "input": ctx.text,
        "voice": "onyx",
        "response_format": "mp3"
    })
}

/// Credentials and endpoint overrides for the shipped provider table.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub voicerss_key: Option<String>,
    pub azure_key: Option<String>,
    pub azure_region: Option<String>,
    pub gcloud_key: Option<String>,
    pub elevenlabs_key: Option<String>,
    pub elevenlabs_voice: Option<String>,
    pub openai_key: Option<String>,
}

/// Build the shipped adapter chain in priority order. The keyless Google
/// Translate variants always participate; a keyed provider is skipped when
/// its credential is absent, keeping the default chain functional without
/// any configuration.
pub fn default_chain(creds: &ProviderCredentials, client: &Client) -> FallbackChain {
    let mut specs: Vec<ProviderSpec> = vec![
        ProviderSpec {
            id: "gtranslate",
            endpoint: "https://translate.google.com/translate_tts".into(),
            shape: RequestShape::GetQuery(gtranslate_query_fast),
            headers: vec![("User-Agent", browser_user_agent())],
            credential: None,
            extractor: ResponseExtractor::RawAudio,
            timeout: Duration::from_secs(8),
            min_bytes: MIN_AUDIO_BYTES,
        },
        ProviderSpec {
            id: "gtranslate-slow",
            endpoint: "https://translate.google.com/translate_tts".into(),
            shape: RequestShape::GetQuery(gtranslate_query_slow),
            headers: vec![("User-Agent", browser_user_agent())],
            credential: None,
            extractor: ResponseExtractor::RawAudio,
            timeout: Duration::from_secs(8),
            min_bytes: MIN_AUDIO_BYTES,
        },
        ProviderSpec {
            id: "gtranslate-gtx",
            endpoint: "https://translate.googleapis.com/translate_tts".into(),
            shape: RequestShape::GetQuery(gtranslate_query_gtx),
            headers: vec![("User-Agent", browser_user_agent())],
            credential: None,
            extractor: ResponseExtractor::RawAudio,
            timeout: Duration::from_secs(8),
            min_bytes: MIN_AUDIO_BYTES,
        },
    ];

    if let Some(key) = &creds.voicerss_key {
        specs.push(ProviderSpec {
            id: "voicerss",
            endpoint: "https://api.voicerss.org/".into(),
            shape: RequestShape::PostForm(voicerss_form),
            headers: vec![],
            credential: Some(key.clone()),
            extractor: ResponseExtractor::RawAudio,
            timeout: Duration::from_secs(15),
            min_bytes: MIN_AUDIO_BYTES,
        });
    } else {
        debug!("voicerss key absent, provider left out of the chain");
    }

    if let Some(key) = &creds.azure_key {
        let region = creds.azure_region.as_deref().unwrap_or("eastus");
        specs.push(ProviderSpec {
            id: "azure",
            endpoint: format!("https://{region}.tts.speech.microsoft.com/cognitiveservices/v1"),
            shape: RequestShape::PostBody {
                content_type: "application/ssml+xml",
                build: azure_ssml,
            },
            headers: vec![
                ("Ocp-Apim-Subscription-Key", key.clone()),
                (
                    "X-Microsoft-OutputFormat",
                    "audio-24khz-48kbitrate-mono-mp3".into(),
                ),
            ],
            credential: None,
            extractor: ResponseExtractor::RawAudio,
            timeout: Duration::from_secs(20),
            min_bytes: MIN_AUDIO_BYTES,
        });
    } else {
        debug!("azure key absent, provider left out of the chain");
    }

    if let Some(key) = &creds.gcloud_key {
        specs.push(ProviderSpec {
            id: "gcloud",
            endpoint: format!(
                "https://texttospeech.googleapis.com/v1/text:synthesize?key={key}"
            ),
            shape: RequestShape::PostJson(gcloud_json),
            headers: vec![],
            credential: None,
            extractor: ResponseExtractor::Base64Json {
                pointer: "/audioContent",
            },
            timeout: Duration::from_secs(20),
            min_bytes: MIN_AUDIO_BYTES,
        });
    } else {
        debug!("gcloud key absent, provider left out of the chain");
    }

    if let Some(key) = &creds.elevenlabs_key {
        let voice = creds
            .elevenlabs_voice
            .as_deref()
            .unwrap_or("pNInz6obpgDQGcFmaJgB");
        specs.push(ProviderSpec {
            id: "elevenlabs",
            endpoint: format!("https://api.elevenlabs.io/v1/text-to-speech/{voice}"),
            shape: RequestShape::PostJson(elevenlabs_json),
            headers: vec![("xi-api-key", key.clone())],
            credential: None,
            extractor: ResponseExtractor::RawAudio,
            timeout: Duration::from_secs(30),
            min_bytes: MIN_AUDIO_BYTES,
        });
    } else {
        debug!("elevenlabs key absent, provider left out of the chain");
    }

    if let Some(key) = &creds.openai_key {
        specs.push(ProviderSpec {
            id: "openai",
            endpoint: "https://api.openai.com/v1/audio/speech".into(),
            shape: RequestShape::PostJson(openai_json),
            headers: vec![("Authorization", format!("Bearer {key}"))],
            credential: None,
            extractor: ResponseExtractor::RawAudio,
            timeout: Duration::from_secs(30),
            min_bytes: MIN_AUDIO_BYTES,
        });
    } else {
        debug!("openai key absent, provider left out of the chain");
    }

    FallbackChain::new(
        specs
            .into_iter()
            .map(|spec| {
                Arc::new(HttpSpeechAdapter::new(spec, client.clone())) as Arc<dyn SpeechAdapter>
            })
            .collect(),
    )
}

fn browser_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// A scripted adapter that records how many times it was called.
    struct MockAdapter {
        name: String,
        result: Result<Vec<u8>, String>,
        calls: AtomicUsize,
    }

    impl MockAdapter {
        fn ok(name: &str, size: usize) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                result: Ok(vec![1u8; size]),
                calls: AtomicUsize::new(0),
            })
        }

        fn err(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                result: Err("provider down".into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
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

    #[tokio::test]
    async fn chain_stops_at_first_acceptable_result() {
        let a = MockAdapter::err("a");
        let b = MockAdapter::err("b");
        let c = MockAdapter::ok("c", 800);
        let d = MockAdapter::ok("d", 800);
        let chain = FallbackChain::new(vec![
            a.clone() as Arc<dyn SpeechAdapter>,
            b.clone(),
            c.clone(),
            d.clone(),
        ]);

        let audio = chain.synthesize("hello there", Language::En).await.unwrap();
        assert_eq!(audio.len(), 800);
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
        assert_eq!(c.calls(), 1);
        assert_eq!(d.calls(), 0, "adapters after the winner are skipped");
    }

    #[tokio::test]
    async fn undersized_result_is_a_decline() {
        let small = MockAdapter::ok("small", MIN_AUDIO_BYTES - 1);
        let big = MockAdapter::ok("big", MIN_AUDIO_BYTES);
        let chain = FallbackChain::new(vec![small.clone() as Arc<dyn SpeechAdapter>, big.clone()]);

        let audio = chain.synthesize("hello there", Language::En).await.unwrap();
        assert_eq!(audio.len(), MIN_AUDIO_BYTES);
        assert_eq!(small.calls(), 1);
    }

    #[tokio::test]
    async fn exhausted_chain_yields_none() {
        let chain = FallbackChain::new(vec![
            MockAdapter::err("a") as Arc<dyn SpeechAdapter>,
            MockAdapter::err("b"),
        ]);
        assert!(chain.synthesize("hello", Language::En).await.is_none());
    }

    #[tokio::test]
    async fn executor_sends_query_and_returns_raw_audio() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/translate_tts"))
            .and(query_param("tl", "en"))
            .and(query_param("client", "tw-ob"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 900]))
            .mount(&server)
            .await;

        let adapter = HttpSpeechAdapter::new(
            ProviderSpec {
                id: "gtranslate",
                endpoint: format!("{}/translate_tts", server.uri()),
                shape: RequestShape::GetQuery(gtranslate_query_fast),
                headers: vec![],
                credential: None,
                extractor: ResponseExtractor::RawAudio,
                timeout: Duration::from_secs(5),
                min_bytes: MIN_AUDIO_BYTES,
            },
            Client::new(),
        );
        let audio = adapter.synthesize("hello", Language::En).await.unwrap();
        assert_eq!(audio.len(), 900);
    }

    #[tokio::test]
    async fn executor_decodes_base64_json_audio() {
        let payload = vec![42u8; 700];
        let body = serde_json::json!({ "audioContent": BASE64.encode(&payload) });
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text:synthesize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let adapter = HttpSpeechAdapter::new(
            ProviderSpec {
                id: "gcloud",
                endpoint: format!("{}/v1/text:synthesize", server.uri()),
                shape: RequestShape::PostJson(gcloud_json),
                headers: vec![],
                credential: None,
                extractor: ResponseExtractor::Base64Json {
                    pointer: "/audioContent",
                },
                timeout: Duration::from_secs(5),
                min_bytes: MIN_AUDIO_BYTES,
            },
            Client::new(),
        );
        let audio = adapter.synthesize("hello", Language::En).await.unwrap();
        assert_eq!(audio, payload);
    }

    #[tokio::test]
    async fn executor_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let adapter = HttpSpeechAdapter::new(
            ProviderSpec {
                id: "gtranslate",
                endpoint: server.uri(),
                shape: RequestShape::GetQuery(gtranslate_query_fast),
                headers: vec![],
                credential: None,
                extractor: ResponseExtractor::RawAudio,
                timeout: Duration::from_secs(5),
                min_bytes: MIN_AUDIO_BYTES,
            },
            Client::new(),
        );
        assert!(adapter.synthesize("hello", Language::En).await.is_err());
    }

    #[tokio::test]
    async fn executor_rejects_undersized_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 10]))
            .mount(&server)
            .await;

        let adapter = HttpSpeechAdapter::new(
            ProviderSpec {
                id: "gtranslate",
                endpoint: server.uri(),
                shape: RequestShape::GetQuery(gtranslate_query_fast),
                headers: vec![],
                credential: None,
                extractor: ResponseExtractor::RawAudio,
                timeout: Duration::from_secs(5),
                min_bytes: MIN_AUDIO_BYTES,
            },
            Client::new(),
        );
        let err = adapter.synthesize("hello", Language::En).await.unwrap_err();
        assert!(err.to_string().contains("acceptance floor"));
    }

    #[test]
    fn default_chain_skips_keyless_providers() {
        let client = Client::new();
        let bare = default_chain(&ProviderCredentials::default(), &client);
        assert_eq!(bare.len(), 3, "only the keyless variants remain");

        let keyed = default_chain(
            &ProviderCredentials {
                voicerss_key: Some("k".into()),
                azure_key: Some("k".into()),
                gcloud_key: Some("k".into()),
                elevenlabs_key: Some("k".into()),
                openai_key: Some("k".into()),
                ..ProviderCredentials::default()
            },
            &client,
        );
        assert_eq!(keyed.len(), 8);
    }

    #[test]
    fn azure_ssml_escapes_markup() {
        let ctx = SynthesisContext {
            text: "a < b & c",
            language: Language::En,
            credential: None,
        };
        let ssml = azure_ssml(&ctx);
        assert!(ssml.contains("a &lt; b &amp; c"));
        assert!(ssml.contains("en-US-GuyNeural"));
    }
}
