//! Audio capture from an external pipeline into a bounded frame ring.
//!
//! The capture side of the system is a long-lived `arecord | sox` process
//! that writes canonical PCM to stdout. One background reader thread slices
//! that stream into 30 ms frames and appends them to the ring; the
//! turn-taking loop drains the ring at its own cadence. The ring is the only
//! state shared between the two.

use crate::error::{VoiceError, VoiceResult};
use crate::frame::{AudioFrame, FrameRing, FRAME_BYTES};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default ring capacity in frames (~6 s of audio).
const DEFAULT_RING_CAPACITY: usize = 200;

/// Configuration for the capture pipeline.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Shell command that writes canonical PCM (mono, 16 kHz, s16le) to
    /// stdout for as long as it runs.
    pub pipeline: String,
    /// Ring capacity in frames.
    pub ring_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            pipeline: default_pipeline(None),
            ring_capacity: DEFAULT_RING_CAPACITY,
        }
    }
}

impl CaptureConfig {
    /// Reads `VOXA_CAPTURE_CMD` (full pipeline override) or
    /// `VOXA_CAPTURE_DEVICE` (ALSA device for the default pipeline).
    pub fn from_env() -> Self {
        let pipeline = match std::env::var("VOXA_CAPTURE_CMD") {
            Ok(cmd) if !cmd.trim().is_empty() => cmd,
            _ => default_pipeline(std::env::var("VOXA_CAPTURE_DEVICE").ok().as_deref()),
        };
        Self {
            pipeline,
            ring_capacity: DEFAULT_RING_CAPACITY,
        }
    }
}

/// Hardware capture at 48 kHz resampled down to the canonical format by sox.
fn default_pipeline(device: Option<&str>) -> String {
    let device_arg = match device {
        Some(d) if !d.trim().is_empty() => format!("-D {} ", d.trim()),
        _ => String::new(),
    };
    format!(
        "arecord {device_arg}-c 1 -r 48000 -f S32_LE -t raw -q 2>/dev/null | \
         sox -t raw -r 48000 -e signed -b 32 -c 1 - -t raw -r 16000 -e signed -b 16 -"
    )
}

/// State shared between the reader thread and the engine.
struct Shared {
    ring: Mutex<FrameRing>,
    cond: Condvar,
    stopping: AtomicBool,
    reader_alive: AtomicBool,
}

impl Shared {
    fn lock_ring(&self) -> MutexGuard<'_, FrameRing> {
        self.ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One active capture pipeline: the external process and its reader thread.
struct CaptureSession {
    child: Child,
    reader: thread::JoinHandle<()>,
}

/// Owns the capture pipeline and the bounded frame buffer.
///
/// `start` / `stop` are idempotent; `stop` additionally guarantees that the
/// whole capture process group is gone, which is the one hard cleanup
/// guarantee this engine makes.
pub struct CaptureEngine {
    config: CaptureConfig,
    shared: Arc<Shared>,
    session: Option<CaptureSession>,
}

impl CaptureEngine {
    pub fn new(config: CaptureConfig) -> Self {
        let shared = Arc::new(Shared {
            ring: Mutex::new(FrameRing::with_capacity(config.ring_capacity)),
            cond: Condvar::new(),
            stopping: AtomicBool::new(false),
            reader_alive: AtomicBool::new(false),
        });
        Self {
            config,
            shared,
            session: None,
        }
    }

    /// Spawns the capture pipeline and its reader. A second call while the
    /// session is live is a no-op.
    pub fn start(&mut self) -> VoiceResult<()> {
        if self.session.is_some() {
            return Ok(());
        }
        self.shared.stopping.store(false, Ordering::SeqCst);

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&self.config.pipeline)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        // The pipeline is a shell running `arecord | sox`; put it in its own
        // process group so teardown can take the resampler down with it.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command
            .spawn()
            .map_err(|e| VoiceError::Capture(format!("failed to spawn capture pipeline: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VoiceError::Capture("capture pipeline has no stdout".to_string()))?;

        let shared = Arc::clone(&self.shared);
        shared.reader_alive.store(true, Ordering::SeqCst);
        let reader = thread::Builder::new()
            .name("voxa-capture-reader".to_string())
            .spawn(move || read_frames(stdout, shared))
            .map_err(|e| VoiceError::Capture(format!("failed to spawn reader: {e}")))?;

        self.session = Some(CaptureSession { child, reader });
        info!(pipeline = %self.config.pipeline, "capture engine started");
        Ok(())
    }

    /// Atomically returns all buffered frames in arrival order and empties
    /// the ring. Never blocks.
    pub fn drain(&self) -> Vec<AudioFrame> {
        self.shared.lock_ring().take_all()
    }

    /// Blocking poll for the turn loop: waits out `interval` on the ring's
    /// condition variable, then drains whatever the reader buffered during
    /// it. Reader notifications are absorbed until the deadline so one block
    /// spans a full interval of audio; a concurrent `stop` wakes the wait
    /// immediately, so shutdown latency never exceeds one interval.
    pub fn poll_block(&self, interval: Duration) -> Vec<AudioFrame> {
        let deadline = Instant::now() + interval;
        let mut ring = self.shared.lock_ring();
        loop {
            if self.shared.stopping.load(Ordering::SeqCst) {
                return ring.take_all();
            }
            let now = Instant::now();
            if now >= deadline {
                return ring.take_all();
            }
            let (guard, _timed_out) = self
                .shared
                .cond
                .wait_timeout(ring, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            ring = guard;
        }
    }

    /// Number of frames currently buffered.
    pub fn buffered(&self) -> usize {
        self.shared.lock_ring().len()
    }

    /// Whether a started engine still has a live reader feeding the ring.
    /// A pipeline that died is not a fault (the buffer just stops growing),
    /// but callers can observe the condition here.
    pub fn is_healthy(&self) -> bool {
        self.session.is_some() && self.shared.reader_alive.load(Ordering::SeqCst)
    }

    /// Signals the reader, kills the whole capture process group, and reaps
    /// both. Idempotent, safe before `start`, and never fails: every
    /// teardown error is swallowed.
    pub fn stop(&mut self) {
        self.shared.stopping.store(true, Ordering::SeqCst);
        self.shared.cond.notify_all();
        let Some(mut session) = self.session.take() else {
            return;
        };
        terminate_process_group(&mut session.child);
        let _ = session.child.wait();
        let _ = session.reader.join();
        info!("capture engine stopped");
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(unix)]
fn terminate_process_group(child: &mut Child) {
    // Killing only the shell would leak the resampler; take the group down.
    let pgid = child.id() as libc::pid_t;
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn terminate_process_group(child: &mut Child) {
    let _ = child.kill();
}

/// Reader loop: slice stdout into exact-length frames. Short blocks
/// (partial read at end-of-stream) are discarded, never padded. Any read
/// error ends the reader quietly; the ring simply stops growing.
fn read_frames(mut stdout: impl Read, shared: Arc<Shared>) {
    let mut block = [0u8; FRAME_BYTES];
    loop {
        if shared.stopping.load(Ordering::SeqCst) {
            break;
        }
        match stdout.read_exact(&mut block) {
            Ok(()) => {
                let mut ring = shared.lock_ring();
                ring.push(AudioFrame::new(block.to_vec()));
                drop(ring);
                shared.cond.notify_all();
            }
            Err(e) => {
                debug!(error = %e, "capture stream ended");
                break;
            }
        }
    }
    shared.reader_alive.store(false, Ordering::SeqCst);
    shared.cond.notify_all();
    warn!("capture reader exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(pipeline: &str, ring_capacity: usize) -> CaptureEngine {
        CaptureEngine::new(CaptureConfig {
            pipeline: pipeline.to_string(),
            ring_capacity,
        })
    }

    fn wait_for_reader_exit(engine: &CaptureEngine) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while engine.is_healthy() {
            assert!(Instant::now() < deadline, "reader did not exit in time");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn stop_before_start_is_safe() {
        let mut engine = engine_with("true", 8);
        engine.stop();
        engine.stop();
    }

    #[test]
    fn start_is_idempotent_and_stop_is_repeatable() {
        let mut engine = engine_with("sleep 5", 8);
        engine.start().unwrap();
        engine.start().unwrap();
        engine.stop();
        engine.stop();
    }

    #[test]
    fn reader_slices_stream_into_exact_frames() {
        // 4800 bytes = exactly 5 canonical frames.
        let mut engine = engine_with("head -c 4800 /dev/zero", 16);
        engine.start().unwrap();
        wait_for_reader_exit(&engine);
        let frames = engine.drain();
        assert_eq!(frames.len(), 5);
        assert!(frames.iter().all(|f| f.is_canonical()));
        engine.stop();
    }

    #[test]
    fn short_tail_is_discarded_not_padded() {
        // 1000 bytes = one full frame plus a 40-byte tail.
        let mut engine = engine_with("head -c 1000 /dev/zero", 16);
        engine.start().unwrap();
        wait_for_reader_exit(&engine);
        let frames = engine.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), FRAME_BYTES);
        engine.stop();
    }

    #[test]
    fn ring_overwrites_oldest_when_pipeline_outruns_drain() {
        // 10 frames pushed into a 4-frame ring: only the newest 4 survive.
        let mut engine = engine_with("head -c 9600 /dev/zero", 4);
        engine.start().unwrap();
        wait_for_reader_exit(&engine);
        assert_eq!(engine.drain().len(), 4);
        assert!(engine.drain().is_empty());
        engine.stop();
    }

    #[test]
    fn poll_block_times_out_empty_without_capture() {
        let engine = engine_with("true", 8);
        let started = Instant::now();
        let block = engine.poll_block(Duration::from_millis(50));
        assert!(block.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn stop_wakes_a_pending_poll() {
        let mut engine = engine_with("sleep 5", 8);
        engine.start().unwrap();
        engine.stop();
        let started = Instant::now();
        let block = engine.poll_block(Duration::from_secs(2));
        assert!(block.is_empty());
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
