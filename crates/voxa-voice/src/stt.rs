//! Transcription collaborator seam.
//!
//! An utterance is handed over by value (the collected frames are consumed
//! at this boundary), serialized as a WAV container, and turned into text.
//! "Nothing usable was heard" is `None`, not an error; the turn loop treats
//! backend errors the same way.

use crate::error::{VoiceError, VoiceResult};
use crate::frame::Utterance;
use std::time::Duration;
use tracing::debug;

/// Converts one utterance into recognized text, or `None` when there is no
/// usable result.
pub trait SpeechToText {
    fn transcribe(&self, utterance: Utterance) -> VoiceResult<Option<String>>;
}

/// Placeholder backend: hears nothing. Keeps the loop alive with no
/// transcription service configured.
#[derive(Debug, Default)]
pub struct PlaceholderStt;

impl SpeechToText for PlaceholderStt {
    fn transcribe(&self, utterance: Utterance) -> VoiceResult<Option<String>> {
        debug!(
            frames = utterance.frames.len(),
            "placeholder transcription discards utterance"
        );
        Ok(None)
    }
}

/// OpenAI-compatible `/audio/transcriptions` backend (multipart WAV upload).
#[derive(Debug, Clone)]
pub struct HttpStt {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl HttpStt {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    /// Build from environment: `VOXA_STT_API_URL`, `VOXA_STT_API_KEY` (or
    /// `VOXA_API_KEY`), `VOXA_STT_MODEL`.
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("VOXA_STT_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("VOXA_STT_API_KEY")
            .or_else(|_| std::env::var("VOXA_API_KEY"))
            .map_err(|_| {
                VoiceError::Config(
                    "transcription requires VOXA_STT_API_KEY or VOXA_API_KEY".to_string(),
                )
            })?;
        let model = std::env::var("VOXA_STT_MODEL").unwrap_or_else(|_| "whisper-1".to_string());
        Self::new(base_url, api_key, model)
    }
}

impl SpeechToText for HttpStt {
    fn transcribe(&self, utterance: Utterance) -> VoiceResult<Option<String>> {
        if utterance.is_empty() {
            return Ok(None);
        }
        let wav = utterance.to_wav();
        let url = format!(
            "{}/audio/transcriptions",
            self.base_url.trim_end_matches('/')
        );
        let part = reqwest::blocking::multipart::Part::bytes(wav)
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        let form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(VoiceError::Stt(format!(
                "transcription API error {status}: {body}"
            )));
        }
        let json: serde_json::Value = res.json().map_err(|e| VoiceError::Stt(e.to_string()))?;
        let text = json
            .get("text")
            .and_then(|t| t.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        Ok(if text.is_empty() { None } else { Some(text) })
    }
}

/// Picks the transcription backend for the current environment: HTTP when a
/// key is configured, otherwise the placeholder.
pub fn best_available() -> Box<dyn SpeechToText> {
    match HttpStt::from_env() {
        Ok(stt) => Box::new(stt),
        Err(e) => {
            debug!(error = %e, "no transcription backend configured; utterances will be dropped");
            Box::new(PlaceholderStt)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{AudioFrame, FRAME_BYTES};

    #[test]
    fn placeholder_hears_nothing() {
        let stt = PlaceholderStt;
        let utterance = Utterance::from_frames(vec![AudioFrame::new(vec![0; FRAME_BYTES])]);
        assert_eq!(stt.transcribe(utterance).unwrap(), None);
    }

    #[test]
    fn empty_utterance_is_no_result() {
        let stt = HttpStt::new("http://localhost:1", "key", "whisper-1").unwrap();
        let utterance = Utterance::from_frames(Vec::new());
        assert_eq!(stt.transcribe(utterance).unwrap(), None);
    }
}
