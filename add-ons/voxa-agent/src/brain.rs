//! LLM-backed reasoning: chat completion, strict tool dispatch, stop phrase.
//!
//! The reasoner is where free text ends and the closed command set begins:
//! a reply that looks like a tool invocation must survive strict decoding
//! before anything touches the sandbox; otherwise the raw reply is spoken
//! as-is.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};
use voxa_skills::{SandboxTools, ToolCommand};
use voxa_voice::{Reasoner, ShutdownHandle, VoiceError, VoiceResult};

const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "\
You are Voxa, a voice assistant. You are heard, not read.

STYLE:
- Natural, concise, conversational. One or two short sentences.
- No markdown, no lists, no emoji.

TOOLS (reply with the JSON object only, nothing else):
- Create: {\"tool\": \"create_file\", \"args\": {\"filename\": \"x\", \"content\": \"y\"}}
- Edit/Append: {\"tool\": \"edit_file\", \"args\": {\"filename\": \"x\", \"content\": \"y\", \"mode\": \"append\"}}
- Read: {\"tool\": \"read_file\", \"args\": {\"filename\": \"x\"}}
- Delete: {\"tool\": \"delete_file\", \"args\": {\"filename\": \"x\"}}
- List: {\"tool\": \"list_files\"}";

// OpenAI-compatible chat completion request/response
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

/// Production reasoner: OpenAI-compatible chat completions plus sandboxed
/// tool dispatch. Holds a shutdown handle so the stop phrase can end the
/// conversation from inside a turn.
pub struct LlmReasoner {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
    tools: SandboxTools,
    shutdown: ShutdownHandle,
    stop_phrase: String,
}

impl LlmReasoner {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        tools: SandboxTools,
        shutdown: ShutdownHandle,
    ) -> VoiceResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VoiceError::Reasoning(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
            tools,
            shutdown,
            stop_phrase: "force stop".to_string(),
        })
    }

    /// Build from environment: `VOXA_LLM_API_URL`, `VOXA_LLM_API_KEY` (or
    /// `VOXA_API_KEY`), `VOXA_LLM_MODEL`, `VOXA_STOP_PHRASE`. Returns `None`
    /// when no key is configured.
    pub fn from_env(tools: SandboxTools, shutdown: ShutdownHandle) -> Option<Self> {
        let api_key = std::env::var("VOXA_LLM_API_KEY")
            .or_else(|_| std::env::var("VOXA_API_KEY"))
            .ok()?;
        let api_key = api_key.trim().to_string();
        if api_key.is_empty() {
            return None;
        }
        let base_url = std::env::var("VOXA_LLM_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model = std::env::var("VOXA_LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let mut reasoner = Self::new(base_url, api_key, model, tools, shutdown).ok()?;
        if let Ok(phrase) = std::env::var("VOXA_STOP_PHRASE") {
            let phrase = phrase.trim().to_lowercase();
            if !phrase.is_empty() {
                reasoner.stop_phrase = phrase;
            }
        }
        Some(reasoner)
    }

    fn complete(&self, transcript: &str) -> VoiceResult<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: transcript,
                },
            ],
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| VoiceError::Reasoning(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(VoiceError::Reasoning(format!(
                "chat API error {status}: {body}"
            )));
        }
        let parsed: ChatResponse = res.json().map_err(|e| VoiceError::Reasoning(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(content.trim().to_string())
    }
}

impl Reasoner for LlmReasoner {
    fn reply(&self, transcript: &str) -> VoiceResult<Option<String>> {
        if transcript.to_lowercase().contains(&self.stop_phrase) {
            info!("stop phrase heard; requesting shutdown");
            self.shutdown.request();
            return Ok(Some("Alright, shutting down.".to_string()));
        }

        let raw = self.complete(transcript)?;
        if raw.is_empty() {
            return Ok(None);
        }

        if ToolCommand::looks_like_command(&raw) {
            match ToolCommand::parse(&raw) {
                Ok(command) => {
                    info!(?command, "dispatching tool command");
                    return Ok(Some(self.tools.execute(&command)));
                }
                Err(e) => {
                    // Malformed tool JSON: speak the raw reply rather than
                    // fault the turn.
                    warn!(error = %e, "reply resembled a tool call but failed strict decoding");
                }
            }
        }
        Ok(Some(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reasoner_with_stop(stop_phrase: &str) -> (LlmReasoner, ShutdownHandle) {
        let dir = std::env::temp_dir().join(format!("voxa_brain_test_{}", std::process::id()));
        let tools = SandboxTools::new(&dir).unwrap();
        let shutdown = ShutdownHandle::new();
        let mut reasoner = LlmReasoner::new(
            "http://localhost:1",
            "test-key",
            "test-model",
            tools,
            shutdown.clone(),
        )
        .unwrap();
        reasoner.stop_phrase = stop_phrase.to_string();
        (reasoner, shutdown)
    }

    #[test]
    fn stop_phrase_requests_shutdown_without_an_llm_call() {
        let (reasoner, shutdown) = reasoner_with_stop("force stop");
        let reply = reasoner.reply("ok Force Stop now").unwrap();
        assert_eq!(reply, Some("Alright, shutting down.".to_string()));
        assert!(shutdown.is_requested());
    }

    #[test]
    fn unreachable_llm_surfaces_as_reasoning_error() {
        let (reasoner, shutdown) = reasoner_with_stop("force stop");
        let err = reasoner.reply("hello there").unwrap_err();
        assert!(matches!(err, VoiceError::Reasoning(_)));
        assert!(!shutdown.is_requested());
    }
}
