//! Synthesis backend seam and playback control.
//!
//! A `TextToSpeech` backend turns reply text into an encoded audio artifact
//! (WAV/MP3 bytes); the `PlaybackController` renders artifacts on the
//! default output device and exposes the barge-in kill switch.

use crate::error::{VoiceError, VoiceResult};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, info};

/// Turns reply text into a playable audio artifact. Empty output means
/// "nothing to play" and is not an error.
pub trait TextToSpeech {
    fn synthesize(&self, text: &str, voice: &str) -> VoiceResult<Vec<u8>>;
}

/// Placeholder backend: produces no audio. Lets the loop run end to end
/// without a synthesis service configured.
#[derive(Debug, Default)]
pub struct SilentTts;

impl TextToSpeech for SilentTts {
    fn synthesize(&self, _text: &str, _voice: &str) -> VoiceResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// OpenAI-compatible `/audio/speech` backend.
#[derive(Debug, Clone)]
pub struct HttpTts {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl HttpTts {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    /// Build from environment: `VOXA_TTS_API_URL`, `VOXA_TTS_API_KEY` (or
    /// `VOXA_API_KEY`), `VOXA_TTS_MODEL`.
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("VOXA_TTS_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("VOXA_TTS_API_KEY")
            .or_else(|_| std::env::var("VOXA_API_KEY"))
            .map_err(|_| {
                VoiceError::Config("synthesis requires VOXA_TTS_API_KEY or VOXA_API_KEY".to_string())
            })?;
        let model = std::env::var("VOXA_TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string());
        Self::new(base_url, api_key, model)
    }
}

impl TextToSpeech for HttpTts {
    fn synthesize(&self, text: &str, voice: &str) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": voice,
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(VoiceError::Tts(format!("synthesis API error {status}: {body}")));
        }
        let bytes = res.bytes().map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Picks the synthesis backend for the current environment: HTTP when a key
/// is configured, otherwise the silent placeholder.
pub fn best_available() -> Box<dyn TextToSpeech> {
    match HttpTts::from_env() {
        Ok(tts) => Box::new(tts),
        Err(e) => {
            debug!(error = %e, "no synthesis backend configured; replies will be silent");
            Box::new(SilentTts)
        }
    }
}

/// Renders synthesized replies and exposes completion/termination control.
pub struct PlaybackController {
    _stream: OutputStream,
    _handle: OutputStreamHandle,
    sink: Sink,
}

impl PlaybackController {
    /// Opens the default output device.
    pub fn new() -> VoiceResult<Self> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| VoiceError::Playback(e.to_string()))?;
        let sink = Sink::try_new(&handle).map_err(|e| VoiceError::Playback(e.to_string()))?;
        info!("playback controller ready");
        Ok(Self {
            _stream: stream,
            _handle: handle,
            sink,
        })
    }

    /// Begins asynchronous rendering of an encoded artifact. Empty input is
    /// a no-op.
    pub fn play(&self, artifact: &[u8]) -> VoiceResult<()> {
        if artifact.is_empty() {
            return Ok(());
        }
        let source = Decoder::new(Cursor::new(artifact.to_vec()))
            .map_err(|e| VoiceError::Playback(format!("decode failed: {e}")))?;
        self.sink.append(source);
        Ok(())
    }

    /// Non-blocking completion check.
    pub fn is_playing(&self) -> bool {
        !self.sink.empty()
    }

    /// Best-effort immediate stop; idempotent. Used on barge-in.
    pub fn terminate(&self) {
        self.sink.stop();
    }

    /// Blocks until everything queued has finished rendering.
    pub fn wait_until_done(&self) {
        self.sink.sleep_until_end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_backend_returns_empty() {
        let tts = SilentTts;
        assert!(tts.synthesize("hello", "alloy").unwrap().is_empty());
    }

    #[test]
    fn http_backend_from_env_requires_a_key() {
        // Scoped to variables this test clears; other VOXA_* vars are unset
        // in the test environment.
        std::env::remove_var("VOXA_TTS_API_KEY");
        std::env::remove_var("VOXA_API_KEY");
        assert!(HttpTts::from_env().is_err());
    }

    #[test]
    #[ignore] // Requires an output device; not available in CI.
    fn playback_terminate_is_idempotent() {
        let playback = PlaybackController::new().expect("output device");
        playback.terminate();
        playback.terminate();
        assert!(!playback.is_playing());
    }
}
