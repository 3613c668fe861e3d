//! Reasoning collaborator seam.
//!
//! The turn loop hands the transcript to a `Reasoner` and speaks whatever
//! comes back. What happens inside (an LLM call, tool dispatch, a canned
//! response) is the implementation's business.

use crate::error::VoiceResult;

/// Produces the reply for one transcribed utterance. `None` means there is
/// nothing useful to say this turn; errors are downgraded to the same by the
/// turn loop.
pub trait Reasoner {
    fn reply(&self, transcript: &str) -> VoiceResult<Option<String>>;
}

/// Placeholder reasoner: repeats the transcript back. Lets the duplex loop
/// run end to end without an LLM configured.
#[derive(Debug, Default)]
pub struct EchoReasoner;

impl Reasoner for EchoReasoner {
    fn reply(&self, transcript: &str) -> VoiceResult<Option<String>> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!("You said: {transcript}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_repeats_the_transcript() {
        let reasoner = EchoReasoner;
        assert_eq!(
            reasoner.reply("open the pod bay doors").unwrap(),
            Some("You said: open the pod bay doors".to_string())
        );
    }

    #[test]
    fn echo_skips_blank_transcripts() {
        let reasoner = EchoReasoner;
        assert_eq!(reasoner.reply("   ").unwrap(), None);
    }
}
