//! # voxa-voice: Real-Time Duplex Turn-Taking
//!
//! This crate is the core of a voice-driven conversational agent: it decides
//! when to listen, when to stop listening, when to speak, and when to abort
//! its own speech because the human started talking over it (barge-in).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   Turn-Taking Controller                      │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │ Capture Ring │→ │  Dual VAD    │→ │ State Machine│       │
//! │  │ (arecord|sox)│  │ (sens/strict)│  │  (7 states)  │       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! │         ↓                                      ↓              │
//! │  ┌──────────────┐                    ┌──────────────┐       │
//! │  │   Playback   │←───────────────────│   Barge-In   │       │
//! │  │   (rodio)    │    Kill Signal     │    Watch     │       │
//! │  └──────────────┘                    └──────────────┘       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The capture pipeline runs continuously from start; a single reader thread
//! feeds a bounded frame ring; the controller drains it in a cooperative
//! polling loop and talks to the transcription/reasoning/synthesis
//! collaborators only between turns, never while time-sensitive polling is
//! active.

pub mod capture;
pub mod error;
pub mod frame;
pub mod output;
pub mod reason;
pub mod stt;
pub mod turn;
pub mod vad;

pub use capture::{CaptureConfig, CaptureEngine};
pub use error::{VoiceError, VoiceResult};
pub use frame::{AudioFrame, FrameRing, Utterance, FRAME_BYTES, FRAME_MILLIS, SAMPLE_RATE};
pub use output::{HttpTts, PlaybackController, SilentTts, TextToSpeech};
pub use reason::{EchoReasoner, Reasoner};
pub use stt::{HttpStt, PlaceholderStt, SpeechToText};
pub use turn::{
    ConversationState, RecordingTracker, ShutdownHandle, TurnConfig, TurnHooks,
    TurnTakingController, VoiceContext,
};
pub use vad::{SpeechClassifier, VadProfile};
