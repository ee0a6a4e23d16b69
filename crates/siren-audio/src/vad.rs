//! Two-stage voice activity gate

use crate::frame::Frame;
use earshot::{VoiceActivityDetector, VoiceActivityProfile};
use tracing::debug;

/// Per-frame speech classification used by the capturer and the wake
/// detector. Implementations must never fail; degraded verdicts are fine.
pub trait SpeechGate {
    /// Packet-level verdict for one frame, `None` when the packet stage
    /// failed on this frame.
    fn packet_speech(&mut self, frame: &Frame) -> Option<bool>;

    /// Full gate decision against the given RMS threshold.
    fn is_speech(&mut self, frame: &Frame, threshold: f32) -> bool;

    /// Reset internal state between utterances.
    fn reset(&mut self) {}
}

/// Per-frame speech decision: packet VAD AND RMS above the dynamic
/// threshold. A packet-VAD failure degrades to the pure RMS comparison and
/// never reaches callers as an error.
pub struct VadGate {
    detector: VoiceActivityDetector,
}

impl Default for VadGate {
    fn default() -> Self {
        Self::new()
    }
}

impl VadGate {
    /// Create a gate with the most aggressive packet-VAD profile.
    #[must_use]
    pub fn new() -> Self {
        Self {
            detector: VoiceActivityDetector::new(VoiceActivityProfile::VERY_AGGRESSIVE),
        }
    }
}

impl SpeechGate for VadGate {
    fn packet_speech(&mut self, frame: &Frame) -> Option<bool> {
        match self.detector.predict_16khz(frame.samples()) {
            Ok(speech) => Some(speech),
            Err(e) => {
                debug!("packet VAD failed, falling back to RMS: {:?}", e);
                None
            }
        }
    }

    fn is_speech(&mut self, frame: &Frame, threshold: f32) -> bool {
        let above_floor = frame.rms() > threshold;
        match self.packet_speech(frame) {
            Some(packet) => packet && above_floor,
            None => above_floor,
        }
    }

    fn reset(&mut self) {
        self.detector.reset();
    }
}
