//! Canonical PCM frames, the bounded frame ring, and utterances.
//!
//! All captured audio is normalized to mono 16 kHz 16-bit signed PCM before
//! it enters the system. A frame is 30 ms of that stream (960 bytes), the
//! unit the VAD classifier operates on.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::Duration;

/// Canonical sample rate in Hz.
pub const SAMPLE_RATE: u32 = 16_000;

/// Bytes per sample (16-bit signed little-endian).
pub const BYTES_PER_SAMPLE: usize = 2;

/// Frame duration in milliseconds.
pub const FRAME_MILLIS: u64 = 30;

/// Exact byte length of one frame: 16000 Hz x 2 bytes x 0.03 s.
pub const FRAME_BYTES: usize =
    SAMPLE_RATE as usize * BYTES_PER_SAMPLE * FRAME_MILLIS as usize / 1000;

/// One 30 ms block of canonical PCM. Immutable once captured; ownership
/// moves between buffers, it is never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    bytes: Vec<u8>,
}

impl AudioFrame {
    /// Wraps a raw byte block. The capture reader only constructs frames of
    /// exact length; anything else is rejected by the classifier, not here.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether this frame matches the canonical format.
    pub fn is_canonical(&self) -> bool {
        self.bytes.len() == FRAME_BYTES
    }

    /// Decodes the little-endian 16-bit payload.
    pub fn samples(&self) -> Vec<i16> {
        self.bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }
}

/// Bounded FIFO of frames. When full, an append evicts the oldest frame:
/// overwrite, never duplicate, never reorder.
#[derive(Debug)]
pub struct FrameRing {
    frames: VecDeque<AudioFrame>,
    capacity: usize,
}

impl FrameRing {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, frame: AudioFrame) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    /// Removes and returns all buffered frames in arrival order.
    pub fn take_all(&mut self) -> Vec<AudioFrame> {
        self.frames.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// A contiguous spoken turn: the frames collected during recording.
/// Consumed (moved) when handed to the transcription collaborator.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub frames: Vec<AudioFrame>,
    /// When the turn was committed.
    pub captured_at: DateTime<Utc>,
    /// Approximate duration derived from the frame count.
    pub duration: Duration,
}

impl Utterance {
    pub fn from_frames(frames: Vec<AudioFrame>) -> Self {
        let duration = Duration::from_millis(frames.len() as u64 * FRAME_MILLIS);
        Self {
            frames,
            captured_at: Utc::now(),
            duration,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Serializes the utterance as a 16 kHz mono 16-bit WAV container for
    /// transport to the transcription collaborator.
    pub fn to_wav(&self) -> Vec<u8> {
        let data_len: usize = self.frames.iter().map(AudioFrame::len).sum();
        let mut buf = Vec::with_capacity(44 + data_len);
        // RIFF header
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&((36 + data_len) as u32).to_le_bytes());
        buf.extend_from_slice(b"WAVE");
        // fmt subchunk
        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&1u16.to_le_bytes()); // mono
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&(SAMPLE_RATE * BYTES_PER_SAMPLE as u32).to_le_bytes()); // byte rate
        buf.extend_from_slice(&(BYTES_PER_SAMPLE as u16).to_le_bytes()); // block align
        buf.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
        // data subchunk
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&(data_len as u32).to_le_bytes());
        for frame in &self.frames {
            buf.extend_from_slice(frame.as_bytes());
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: u8) -> AudioFrame {
        AudioFrame::new(vec![tag; FRAME_BYTES])
    }

    #[test]
    fn frame_byte_length_matches_canonical_format() {
        assert_eq!(FRAME_BYTES, 960);
        assert!(frame(0).is_canonical());
        assert!(!AudioFrame::new(vec![0; 100]).is_canonical());
    }

    #[test]
    fn samples_decode_little_endian() {
        let f = AudioFrame::new(vec![0x01, 0x02, 0xFF, 0xFF]);
        assert_eq!(f.samples(), vec![0x0201, -1]);
    }

    #[test]
    fn ring_keeps_most_recent_frames_in_order() {
        let mut ring = FrameRing::with_capacity(3);
        for tag in 0..10u8 {
            ring.push(frame(tag));
        }
        let drained = ring.take_all();
        assert_eq!(drained.len(), 3);
        let tags: Vec<u8> = drained.iter().map(|f| f.as_bytes()[0]).collect();
        assert_eq!(tags, vec![7, 8, 9]);
    }

    #[test]
    fn second_drain_without_append_is_empty() {
        let mut ring = FrameRing::with_capacity(8);
        ring.push(frame(1));
        ring.push(frame(2));
        assert_eq!(ring.take_all().len(), 2);
        assert!(ring.take_all().is_empty());
    }

    #[test]
    fn ring_never_exceeds_capacity() {
        let mut ring = FrameRing::with_capacity(4);
        for tag in 0..100u8 {
            ring.push(frame(tag));
            assert!(ring.len() <= 4);
        }
    }

    #[test]
    fn wav_header_describes_canonical_pcm() {
        let utterance = Utterance::from_frames(vec![frame(0), frame(1)]);
        let wav = utterance.to_wav();
        assert_eq!(wav.len(), 44 + 2 * FRAME_BYTES);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // sample rate field at offset 24
        assert_eq!(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]), SAMPLE_RATE);
        // data length field at offset 40
        let data_len = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]);
        assert_eq!(data_len as usize, 2 * FRAME_BYTES);
    }

    #[test]
    fn utterance_duration_tracks_frame_count() {
        let utterance = Utterance::from_frames(vec![frame(0); 10]);
        assert_eq!(utterance.duration, Duration::from_millis(300));
    }
}
