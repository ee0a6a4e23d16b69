//! Post-trigger utterance capture

use crate::error::{Error, Result};
use crate::frame::FrameRead;
use crate::noise_floor::NoiseFloor;
use crate::vad::SpeechGate;
use crate::FRAME_MS;
use tracing::{debug, warn};

/// Record from `source` until `silence_timeout_ms` of trailing silence.
///
/// Every frame's raw bytes are appended while recording; silence
/// accumulates 30 ms per non-speech frame and resets on speech. The noise
/// floor is locked when speech first appears and reset before returning,
/// so a loud utterance cannot inflate the floor.
///
/// Returns the captured little-endian PCM, or an empty buffer when the
/// user never spoke.
pub async fn capture_utterance(
    source: &mut dyn FrameRead,
    gate: &mut dyn SpeechGate,
    floor: &NoiseFloor,
    silence_timeout_ms: u64,
) -> Result<Vec<u8>> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut silence_ms: u64 = 0;
    let mut saw_speech = false;

    debug!(
        "capturing utterance (trailing silence {} ms)",
        silence_timeout_ms
    );

    let outcome = loop {
        match source.read().await {
            Ok(frame) => {
                let speech = gate.is_speech(&frame, floor.threshold());
                buffer.extend_from_slice(&frame.to_le_bytes());

                if speech {
                    if !saw_speech {
                        saw_speech = true;
                        floor.lock();
                    }
                    silence_ms = 0;
                } else {
                    silence_ms += FRAME_MS;
                    if silence_ms >= silence_timeout_ms {
                        debug!("trailing silence reached, finishing capture");
                        break Ok(());
                    }
                }
            }
            Err(Error::AudioUnavailable(e)) => {
                // A stalled device still burns silence time so capture
                // always terminates.
                warn!("frame read stalled during capture: {}", e);
                silence_ms += FRAME_MS;
                if silence_ms >= silence_timeout_ms {
                    break Ok(());
                }
            }
            Err(e) => break Err(e),
        }
    };

    floor.reset();
    gate.reset();
    outcome?;

    if saw_speech {
        Ok(buffer)
    } else {
        debug!("no speech during capture window");
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::FRAME_SAMPLES;
    use async_trait::async_trait;

    /// Replays a fixed frame script, then reports the device as stalled.
    struct ScriptedSource {
        frames: std::vec::IntoIter<Frame>,
    }

    impl ScriptedSource {
        fn new(frames: Vec<Frame>) -> Self {
            Self {
                frames: frames.into_iter(),
            }
        }
    }

    #[async_trait(?Send)]
    impl FrameRead for ScriptedSource {
        async fn read(&mut self) -> Result<Frame> {
            self.frames
                .next()
                .ok_or_else(|| Error::AudioUnavailable("script exhausted".to_string()))
        }
    }

    /// Deterministic gate: RMS comparison only, no packet stage.
    struct RmsOnlyGate;

    impl SpeechGate for RmsOnlyGate {
        fn packet_speech(&mut self, _frame: &Frame) -> Option<bool> {
            None
        }

        fn is_speech(&mut self, frame: &Frame, threshold: f32) -> bool {
            frame.rms() > threshold
        }
    }

    fn speech_frame() -> Frame {
        Frame::from_samples(vec![i16::MAX / 2; FRAME_SAMPLES]).unwrap()
    }

    #[tokio::test]
    async fn pure_silence_yields_empty_buffer() {
        let mut source = ScriptedSource::new(vec![Frame::silence(); 10]);
        let floor = NoiseFloor::default();

        let pcm = capture_utterance(&mut source, &mut RmsOnlyGate, &floor, 120)
            .await
            .unwrap();
        assert!(pcm.is_empty());
    }

    #[tokio::test]
    async fn capture_ends_on_trailing_silence() {
        let mut frames = vec![speech_frame(); 20];
        frames.extend(vec![Frame::silence(); 50]);
        let mut source = ScriptedSource::new(frames);
        let floor = NoiseFloor::default();

        let pcm = capture_utterance(&mut source, &mut RmsOnlyGate, &floor, 90)
            .await
            .unwrap();

        // 20 speech frames plus exactly 3 silence frames (90 ms).
        assert_eq!(pcm.len(), 23 * FRAME_SAMPLES * 2);
    }

    #[tokio::test]
    async fn speech_resets_the_silence_counter() {
        let mut frames = vec![speech_frame(); 2];
        frames.extend(vec![Frame::silence(); 2]);
        frames.push(speech_frame());
        frames.extend(vec![Frame::silence(); 40]);
        let mut source = ScriptedSource::new(frames);
        let floor = NoiseFloor::default();

        let pcm = capture_utterance(&mut source, &mut RmsOnlyGate, &floor, 90)
            .await
            .unwrap();

        // 2 speech + 2 silence + 1 speech + 3 trailing silence frames.
        assert_eq!(pcm.len(), 8 * FRAME_SAMPLES * 2);
    }

    #[tokio::test]
    async fn floor_is_locked_on_speech_and_reset_after() {
        let mut frames = vec![speech_frame()];
        frames.extend(vec![Frame::silence(); 10]);
        let mut source = ScriptedSource::new(frames);
        let floor = NoiseFloor::default();
        floor.update(&Frame::silence(), false);
        assert_eq!(floor.window_len(), 1);

        capture_utterance(&mut source, &mut RmsOnlyGate, &floor, 60)
            .await
            .unwrap();
        // reset() cleared the window and unlocked the floor.
        assert_eq!(floor.window_len(), 0);
        floor.update(&Frame::silence(), false);
        assert_eq!(floor.window_len(), 1);
    }

    #[tokio::test]
    async fn stalled_device_still_terminates() {
        let mut source = ScriptedSource::new(Vec::new());
        let floor = NoiseFloor::default();

        let pcm = capture_utterance(&mut source, &mut RmsOnlyGate, &floor, 60)
            .await
            .unwrap();
        assert!(pcm.is_empty());
    }
}
