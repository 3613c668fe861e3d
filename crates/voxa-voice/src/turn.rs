//! The turn-taking state machine and its cooperative polling loop.
//!
//! One controller owns the conversation state and is the only thing that
//! mutates it. It polls the capture engine, classifies drained blocks, and
//! walks the transition table: wait for speech, record until silence, hand
//! the utterance to the collaborators, speak the reply, and cut playback the
//! moment the human talks over it.

use crate::capture::CaptureEngine;
use crate::error::VoiceResult;
use crate::frame::{AudioFrame, Utterance};
use crate::output::{PlaybackController, TextToSpeech};
use crate::reason::Reasoner;
use crate::stt::SpeechToText;
use crate::vad::{SpeechClassifier, VadProfile};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where the conversation currently stands. Owned and mutated exclusively
/// by the controller's own transition logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    AwaitingSpeech,
    Recording,
    ProcessingUtterance,
    Speaking,
    Interrupted,
    Terminated,
}

/// Thresholds and poll intervals for the turn loop.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Sensitive speech ratio at or above which a polled block starts
    /// recording.
    pub wake_threshold: f32,
    /// Consecutive silent blocks (after speech) that must be exceeded to
    /// end a turn. 6 blocks at the 100 ms recording poll is ~0.6 s.
    pub silence_blocks: u32,
    /// Strict speech ratio that must be strictly exceeded to count as
    /// barge-in.
    pub barge_threshold: f32,
    /// Echo-immunity window at the start of playback.
    pub grace: Duration,
    /// Poll interval while waiting for speech.
    pub wake_poll: Duration,
    /// Poll interval while recording. Coarser than the others: one block
    /// per interval is the unit the silence timeout counts in.
    pub recording_poll: Duration,
    /// Poll interval while speaking; fine-grained to bound barge-in
    /// latency.
    pub speaking_poll: Duration,
    /// Voice passed to the synthesis collaborator.
    pub voice: String,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            wake_threshold: 0.2,
            silence_blocks: 6,
            barge_threshold: 0.6,
            grace: Duration::from_millis(400),
            wake_poll: Duration::from_millis(20),
            recording_poll: Duration::from_millis(100),
            speaking_poll: Duration::from_millis(20),
            voice: "alloy".to_string(),
        }
    }
}

impl TurnConfig {
    /// AwaitingSpeech -> Recording when the sensitive ratio reaches the
    /// wake threshold (inclusive).
    pub fn wakes(&self, sensitive_ratio: f32) -> bool {
        sensitive_ratio >= self.wake_threshold
    }

    /// Speaking -> Interrupted when the grace window has elapsed and the
    /// strict ratio strictly exceeds the barge-in threshold.
    pub fn barges(&self, elapsed: Duration, strict_ratio: f32) -> bool {
        elapsed >= self.grace && strict_ratio > self.barge_threshold
    }
}

/// Collects one utterance during Recording and decides when it is complete.
///
/// The silence-timeout path only becomes eligible after at least one
/// speech-classified block, so a committed utterance is never empty.
#[derive(Debug)]
pub struct RecordingTracker {
    silence_blocks: u32,
    frames: Vec<AudioFrame>,
    blocks: u32,
    consecutive_silent: u32,
    speech_seen: bool,
}

impl RecordingTracker {
    pub fn new(silence_blocks: u32) -> Self {
        Self {
            silence_blocks,
            frames: Vec::new(),
            blocks: 0,
            consecutive_silent: 0,
            speech_seen: false,
        }
    }

    /// Feeds one non-empty polled block. Returns true when the turn is
    /// complete: speech was seen and more than `silence_blocks` consecutive
    /// silent blocks followed.
    pub fn observe(&mut self, block: Vec<AudioFrame>, has_speech: bool) -> bool {
        self.blocks += 1;
        self.frames.extend(block);
        if has_speech {
            self.speech_seen = true;
            self.consecutive_silent = 0;
        } else if self.speech_seen {
            self.consecutive_silent += 1;
        }
        self.speech_seen && self.consecutive_silent > self.silence_blocks
    }

    /// Blocks observed so far.
    pub fn blocks(&self) -> u32 {
        self.blocks
    }

    /// Consumes the tracker into the collected utterance.
    pub fn into_utterance(self) -> Utterance {
        Utterance::from_frames(self.frames)
    }
}

/// Cloneable handle for requesting termination from any state. The
/// controller observes it between polls, so reaction latency is bounded by
/// one poll interval.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Optional front-end callbacks. The core fires them and never depends on
/// them.
#[derive(Default)]
pub struct TurnHooks {
    /// Fired on entering ProcessingUtterance, before the collaborator
    /// calls. A front-end can play a short acknowledgment here.
    pub on_thinking: Option<Box<dyn Fn()>>,
    /// Fired when barge-in terminates playback.
    pub on_interrupted: Option<Box<dyn Fn()>>,
}

/// Everything the controller polls, held explicitly and passed by
/// reference. No ambient singletons.
pub struct VoiceContext {
    pub engine: CaptureEngine,
    pub classifier: SpeechClassifier,
    pub playback: PlaybackController,
}

/// The single-owner turn-taking state machine.
pub struct TurnTakingController<'a> {
    ctx: &'a mut VoiceContext,
    config: TurnConfig,
    hooks: TurnHooks,
    shutdown: ShutdownHandle,
    state: ConversationState,
    pending: Option<Utterance>,
    warned_unhealthy: bool,
}

impl<'a> TurnTakingController<'a> {
    pub fn new(ctx: &'a mut VoiceContext, config: TurnConfig) -> Self {
        Self {
            ctx,
            config,
            hooks: TurnHooks::default(),
            shutdown: ShutdownHandle::new(),
            state: ConversationState::Idle,
            pending: None,
            warned_unhealthy: false,
        }
    }

    pub fn with_hooks(mut self, hooks: TurnHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Handle for requesting termination from outside the loop (a signal
    /// handler, the reasoner's stop phrase, another thread).
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    /// Runs the conversation until termination is requested. Collaborator
    /// calls happen only from ProcessingUtterance; every collaborator
    /// fault downgrades to "skip this turn".
    pub fn run(
        &mut self,
        stt: &dyn SpeechToText,
        tts: &dyn TextToSpeech,
        reasoner: &dyn Reasoner,
    ) -> VoiceResult<()> {
        loop {
            if self.shutdown.is_requested() && self.state != ConversationState::Terminated {
                self.transition(ConversationState::Terminated);
            }
            match self.state {
                ConversationState::Idle => {
                    self.ctx.engine.start()?;
                    self.transition(ConversationState::AwaitingSpeech);
                }
                ConversationState::AwaitingSpeech => self.await_speech(),
                ConversationState::Recording => {
                    if let Some(utterance) = self.record_utterance() {
                        self.pending = Some(utterance);
                        self.transition(ConversationState::ProcessingUtterance);
                    }
                }
                ConversationState::ProcessingUtterance => {
                    if let Some(on_thinking) = &self.hooks.on_thinking {
                        on_thinking();
                    }
                    let spoke = match self.pending.take() {
                        Some(utterance) => self.process_turn(utterance, stt, tts, reasoner),
                        None => false,
                    };
                    if spoke {
                        self.transition(ConversationState::Speaking);
                    } else {
                        self.transition(ConversationState::AwaitingSpeech);
                    }
                }
                ConversationState::Speaking => self.speak_and_watch(),
                ConversationState::Interrupted => {
                    self.ctx.playback.terminate();
                    info!("barge-in: playback terminated");
                    if let Some(on_interrupted) = &self.hooks.on_interrupted {
                        on_interrupted();
                    }
                    self.transition(ConversationState::AwaitingSpeech);
                }
                ConversationState::Terminated => {
                    self.ctx.playback.terminate();
                    self.ctx.engine.stop();
                    info!("conversation terminated");
                    return Ok(());
                }
            }
        }
    }

    /// AwaitingSpeech: poll until a block's sensitive ratio reaches the
    /// wake threshold. No timeout; the system waits indefinitely.
    fn await_speech(&mut self) {
        let block = self.ctx.engine.poll_block(self.config.wake_poll);
        if !self.ctx.engine.is_healthy() && !self.warned_unhealthy {
            warn!("capture pipeline is not producing audio; listening to silence");
            self.warned_unhealthy = true;
        }
        if block.is_empty() {
            return;
        }
        let ratio = self
            .ctx
            .classifier
            .speech_ratio(&block, VadProfile::Sensitive);
        if self.config.wakes(ratio) {
            debug!(ratio, "wake threshold reached");
            self.transition(ConversationState::Recording);
        }
    }

    /// Recording: collect blocks until the silence timeout. Returns `None`
    /// only when shutdown interrupts the recording.
    fn record_utterance(&mut self) -> Option<Utterance> {
        let mut tracker = RecordingTracker::new(self.config.silence_blocks);
        loop {
            if self.shutdown.is_requested() {
                return None;
            }
            let block = self.ctx.engine.poll_block(self.config.recording_poll);
            if block.is_empty() {
                continue;
            }
            let has_speech = self.ctx.classifier.any_speech(&block, VadProfile::Sensitive);
            if tracker.observe(block, has_speech) {
                debug!(blocks = tracker.blocks(), "silence timeout; utterance complete");
                return Some(tracker.into_utterance());
            }
        }
    }

    /// ProcessingUtterance: transcribe, reason, synthesize, and start
    /// playback. Returns whether playback actually started.
    fn process_turn(
        &mut self,
        utterance: Utterance,
        stt: &dyn SpeechToText,
        tts: &dyn TextToSpeech,
        reasoner: &dyn Reasoner,
    ) -> bool {
        debug!(duration = ?utterance.duration, "handing utterance to transcription");
        let transcript = match stt.transcribe(utterance) {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!("no transcription result; skipping turn");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "transcription failed; skipping turn");
                return false;
            }
        };
        info!(transcript = %transcript, "utterance transcribed");

        let reply = match reasoner.reply(&transcript) {
            Ok(Some(text)) if !text.trim().is_empty() => text,
            Ok(_) => {
                debug!("no reply for this turn");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "reasoning failed; skipping turn");
                return false;
            }
        };
        info!(reply = %reply, "reply ready");

        let artifact = match tts.synthesize(&reply, &self.config.voice) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                debug!("synthesis produced no audio; skipping playback");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "synthesis failed; skipping turn");
                return false;
            }
        };
        if let Err(e) = self.ctx.playback.play(&artifact) {
            warn!(error = %e, "playback failed to start; skipping turn");
            return false;
        }
        true
    }

    /// Speaking: watch for natural completion and for barge-in in the same
    /// iteration. Blocks polled inside the grace window are drained and
    /// discarded so the system's own echo cannot trip the first real
    /// barge-in check.
    fn speak_and_watch(&mut self) {
        let started = Instant::now();
        loop {
            if self.shutdown.is_requested() {
                return;
            }
            let block = self.ctx.engine.poll_block(self.config.speaking_poll);
            if !self.ctx.playback.is_playing() {
                self.transition(ConversationState::AwaitingSpeech);
                return;
            }
            let elapsed = started.elapsed();
            if elapsed < self.config.grace || block.is_empty() {
                continue;
            }
            let ratio = self.ctx.classifier.speech_ratio(&block, VadProfile::Strict);
            if self.config.barges(elapsed, ratio) {
                debug!(ratio, ?elapsed, "barge-in threshold exceeded");
                self.transition(ConversationState::Interrupted);
                return;
            }
        }
    }

    fn transition(&mut self, next: ConversationState) {
        if self.state == next {
            return;
        }
        debug!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }
}
