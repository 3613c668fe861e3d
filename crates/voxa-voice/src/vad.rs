//! Frame-level voice activity classification at two operating points.
//!
//! WebRTC VAD backs both profiles at different operating points: the
//! sensitive profile catches soft speech and drives wake/recording; the
//! strict profile only fires on confident loud speech and drives barge-in,
//! so background noise cannot interrupt playback.

use crate::error::{VoiceError, VoiceResult};
use crate::frame::{AudioFrame, FRAME_BYTES};
use webrtc_vad::{SampleRate, Vad, VadMode};

/// Named VAD operating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadProfile {
    /// Catches soft/quiet speech; detects utterance start and ongoing
    /// speech while recording.
    Sensitive,
    /// Requires confident, loud speech; used only for barge-in during
    /// playback.
    Strict,
}

/// Dual-profile frame classifier.
///
/// Mode is per-instance state in WebRTC VAD, so each profile owns its own
/// instance. The detector is stateful across frames, which is another reason
/// not to share one between profiles.
pub struct SpeechClassifier {
    sensitive: Vad,
    strict: Vad,
}

impl SpeechClassifier {
    pub fn new() -> Self {
        Self {
            sensitive: build_vad(VadMode::LowBitrate),
            strict: build_vad(VadMode::VeryAggressive),
        }
    }

    /// Classifies one frame under the given profile.
    ///
    /// Fails explicitly when the frame does not match the canonical format;
    /// callers inside the polling loop must treat that as "not speech"
    /// rather than propagating (see `speech_ratio`).
    pub fn classify(&mut self, frame: &AudioFrame, profile: VadProfile) -> VoiceResult<bool> {
        if !frame.is_canonical() {
            return Err(VoiceError::MalformedFrame {
                expected: FRAME_BYTES,
                got: frame.len(),
            });
        }
        let samples = frame.samples();
        let vad = match profile {
            VadProfile::Sensitive => &mut self.sensitive,
            VadProfile::Strict => &mut self.strict,
        };
        vad.is_voice_segment(&samples)
            .map_err(|_| VoiceError::Vad("classifier rejected frame".to_string()))
    }

    /// Fraction of frames in `block` classified as speech. Malformed frames
    /// count as non-speech so a bad frame can never stall the loop.
    pub fn speech_ratio(&mut self, block: &[AudioFrame], profile: VadProfile) -> f32 {
        if block.is_empty() {
            return 0.0;
        }
        let speech = block
            .iter()
            .filter(|frame| self.classify(frame, profile).unwrap_or(false))
            .count();
        speech as f32 / block.len() as f32
    }

    /// Whether any frame in `block` is classified as speech.
    pub fn any_speech(&mut self, block: &[AudioFrame], profile: VadProfile) -> bool {
        block
            .iter()
            .any(|frame| self.classify(frame, profile).unwrap_or(false))
    }
}

impl Default for SpeechClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn build_vad(mode: VadMode) -> Vad {
    let mut vad = Vad::new();
    vad.set_mode(mode);
    vad.set_sample_rate(SampleRate::Rate16kHz);
    vad
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silence() -> AudioFrame {
        AudioFrame::new(vec![0u8; FRAME_BYTES])
    }

    #[test]
    fn silence_is_not_speech_under_either_profile() {
        let mut classifier = SpeechClassifier::new();
        assert!(!classifier.classify(&silence(), VadProfile::Sensitive).unwrap());
        assert!(!classifier.classify(&silence(), VadProfile::Strict).unwrap());
    }

    #[test]
    fn malformed_frame_fails_explicitly() {
        let mut classifier = SpeechClassifier::new();
        let short = AudioFrame::new(vec![0u8; 100]);
        let err = classifier.classify(&short, VadProfile::Sensitive).unwrap_err();
        assert!(matches!(err, VoiceError::MalformedFrame { got: 100, .. }));
    }

    #[test]
    fn malformed_frames_count_as_non_speech_in_aggregates() {
        let mut classifier = SpeechClassifier::new();
        let block = vec![silence(), AudioFrame::new(vec![0u8; 10]), silence()];
        assert_eq!(classifier.speech_ratio(&block, VadProfile::Sensitive), 0.0);
        assert!(!classifier.any_speech(&block, VadProfile::Strict));
    }

    #[test]
    fn empty_block_has_zero_ratio() {
        let mut classifier = SpeechClassifier::new();
        assert_eq!(classifier.speech_ratio(&[], VadProfile::Sensitive), 0.0);
    }
}
