use anyhow::anyhow;
use drift_core::config::SpeechSettings;
use drift_engine::traits::{NarrationClip, SpeechProvider};
use drift_media::wav_duration_secs;
use drift_providers::openai_compatible::{OpenAiSpeechConfig, build_speech_request};
use drift_providers::runtime;

/// Text-to-speech through an OpenAI-compatible `/audio/speech` endpoint.
#[derive(Clone)]
pub struct OpenAiSpeechProvider {
    api_key: String,
}

impl std::fmt::Debug for OpenAiSpeechProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSpeechProvider")
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl OpenAiSpeechProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

#[async_trait::async_trait]
impl SpeechProvider for OpenAiSpeechProvider {
    async fn synthesize(
        &self,
        text: &str,
        settings: &SpeechSettings,
    ) -> anyhow::Result<NarrationClip> {
        let cfg = OpenAiSpeechConfig {
            base_url: settings.base_url.clone(),
            api_key: self.api_key.clone(),
            model: settings.model.clone(),
            voice: settings.voice.clone(),
            response_format: settings.format.clone(),
        };

        let resp = runtime::execute(&build_speech_request(&cfg, text)).await?;
        if !resp.is_success() {
            return Err(anyhow!(
                "speech request failed: status={} body={}",
                resp.status,
                resp.body_preview()
            ));
        }
        if resp.body.is_empty() {
            return Err(anyhow!("speech response was empty"));
        }

        let duration_secs = if settings.format.eq_ignore_ascii_case("wav") {
            wav_duration_secs(&resp.body)
        } else {
            None
        };
        Ok(NarrationClip {
            format: settings.format.clone(),
            duration_secs,
            bytes: resp.body,
        })
    }
}
