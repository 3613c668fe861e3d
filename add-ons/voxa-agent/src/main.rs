//! Voxa agent: the duplex voice loop wired to HTTP collaborators.
//!
//! Configuration comes from `.env` / the environment (`VOXA_*` variables);
//! with no API keys configured the agent still runs, using the placeholder
//! collaborators, which is useful for exercising the audio path alone.

mod brain;

use brain::LlmReasoner;
use std::cell::Cell;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voxa_skills::SandboxTools;
use voxa_voice::{
    output, stt, CaptureConfig, CaptureEngine, EchoReasoner, PlaybackController, Reasoner,
    SpeechClassifier, TurnConfig, TurnHooks, TurnTakingController, VoiceContext, VoiceResult,
};

/// Short acknowledgments played while the collaborators are thinking.
const FILLER_TEXTS: [&str; 3] = ["Hmm.", "One second.", "Let me see."];

fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[voxa-agent] .env not loaded: {e} (using system environment)");
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run() {
        tracing::error!(error = %e, "agent exited with error");
        std::process::exit(1);
    }
}

fn run() -> VoiceResult<()> {
    let mut ctx = VoiceContext {
        engine: CaptureEngine::new(CaptureConfig::from_env()),
        classifier: SpeechClassifier::new(),
        playback: PlaybackController::new()?,
    };

    let stt_backend = stt::best_available();
    let tts_backend = output::best_available();

    let mut config = TurnConfig::default();
    if let Ok(voice) = std::env::var("VOXA_VOICE") {
        if !voice.trim().is_empty() {
            config.voice = voice.trim().to_string();
        }
    }

    // Speak the greeting before the listen loop opens the microphone, so it
    // cannot trip the wake detector as echo.
    let greeting = std::env::var("VOXA_GREETING")
        .unwrap_or_else(|_| "Hi, I'm listening.".to_string());
    match tts_backend.synthesize(&greeting, &config.voice) {
        Ok(artifact) if !artifact.is_empty() => {
            ctx.playback.play(&artifact)?;
            ctx.playback.wait_until_done();
        }
        Ok(_) => debug!("no synthesis backend; skipping greeting"),
        Err(e) => warn!(error = %e, "greeting synthesis failed"),
    }

    // Pre-synthesize thinking fillers once; they play on a dedicated sink so
    // they can overlap collaborator latency.
    let fillers: Vec<Vec<u8>> = FILLER_TEXTS
        .iter()
        .filter_map(|text| tts_backend.synthesize(text, &config.voice).ok())
        .filter(|artifact| !artifact.is_empty())
        .collect();
    let hooks = build_hooks(fillers)?;

    let sandbox_root =
        std::env::var("VOXA_SANDBOX_DIR").unwrap_or_else(|_| "sandbox".to_string());
    let tools = SandboxTools::new(&sandbox_root)?;
    info!(root = %tools.root().display(), "sandbox ready");

    let mut controller = TurnTakingController::new(&mut ctx, config).with_hooks(hooks);
    let shutdown = controller.shutdown_handle();

    let reasoner: Box<dyn Reasoner> = match LlmReasoner::from_env(tools, shutdown.clone()) {
        Some(llm) => Box::new(llm),
        None => {
            warn!("no LLM API key configured; echoing transcripts back");
            Box::new(EchoReasoner)
        }
    };

    let ctrl_c = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || ctrl_c.request()) {
        warn!(error = %e, "could not install Ctrl-C handler");
    }

    info!("voxa agent online");
    controller.run(stt_backend.as_ref(), tts_backend.as_ref(), reasoner.as_ref())
}

/// Round-robin filler playback on entering the thinking phase.
fn build_hooks(fillers: Vec<Vec<u8>>) -> VoiceResult<TurnHooks> {
    let mut hooks = TurnHooks {
        on_thinking: None,
        on_interrupted: Some(Box::new(|| info!("interrupted; listening"))),
    };
    if fillers.is_empty() {
        return Ok(hooks);
    }
    let filler_sink = PlaybackController::new()?;
    let next = Cell::new(0usize);
    hooks.on_thinking = Some(Box::new(move || {
        let index = next.get();
        next.set((index + 1) % fillers.len());
        if let Err(e) = filler_sink.play(&fillers[index]) {
            debug!(error = %e, "filler playback failed");
        }
    }));
    Ok(hooks)
}
