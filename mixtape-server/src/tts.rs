//! Speech synthesis proxy
//!
//! Proxies announcement text to the ElevenLabs API and hands the audio
//! bytes back to the client. The credential comes from the environment;
//! without it the endpoint reports a server configuration error.

use crate::error::{Error, Result};
use serde_json::json;
use std::time::Duration;
use tracing::{error, info};

const ELEVENLABS_TTS_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";
const API_KEY_ENV: &str = "ELEVENLABS_API_KEY";
/// "Bella" multilingual voice
const VOICE_ID: &str = "EXAVITQu4vr4xnSDxMaL";
const MODEL_ID: &str = "eleven_multilingual_v2";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Outcome of a synthesis call: mpeg audio, or the upstream status to proxy
pub enum SpeechResult {
    Audio(Vec<u8>),
    UpstreamError(u16),
}

pub struct SpeechClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
}

impl SpeechClient {
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Upstream(e.to_string()))?;

        let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            info!("{} not set, speech synthesis disabled", API_KEY_ENV);
        }

        Ok(Self { http_client, api_key })
    }

    /// Synthesize `text` to mpeg audio
    pub async fn synthesize(&self, text: &str) -> Result<SpeechResult> {
        if text.trim().is_empty() {
            return Err(Error::BadRequest("Text is required".to_string()));
        }

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Internal("Speech provider credential is absent".to_string()))?;

        let response = self
            .http_client
            .post(format!("{}/{}", ELEVENLABS_TTS_URL, VOICE_ID))
            .header("xi-api-key", api_key)
            .header("Accept", "audio/mpeg")
            .json(&json!({
                "text": text,
                "model_id": MODEL_ID,
                "voice_settings": {
                    "stability": 0.5,
                    "similarity_boost": 0.5
                }
            }))
            .send()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            error!("Speech provider returned {}", status);
            return Ok(SpeechResult::UpstreamError(status));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;
        Ok(SpeechResult::Audio(audio.to_vec()))
    }
}
