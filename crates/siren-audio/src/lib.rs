//! Siren Audio - Microphone pipeline
//!
//! This crate owns the always-on audio path of the assistant:
//! - fixed-size frame capture from the default input device
//! - adaptive noise flooring over non-speech frames
//! - two-stage voice activity gating (packet VAD + RMS)
//! - sliding-window wake-word detection with cooldown
//! - post-wake utterance capture terminated by trailing silence
//! - chime playback for audible feedback
//!
//! All mutation happens on a single audio loop; the noise floor threshold
//! may be read concurrently from other tasks.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod capture;
pub mod chime;
pub mod error;
pub mod frame;
pub mod noise_floor;
pub mod vad;
pub mod wake;

pub use capture::capture_utterance;
pub use chime::Chime;
pub use error::{Error, Result};
pub use frame::{Frame, FrameRead, FrameSource};
pub use noise_floor::NoiseFloor;
pub use vad::{SpeechGate, VadGate};
pub use wake::{OnnxWakeModel, WakeDetector, WakeEvent, WakeInference};

/// Capture sample rate in Hz.
pub const SAMPLE_RATE: u32 = 16_000;

/// Frame duration in milliseconds.
pub const FRAME_MS: u64 = 30;

/// Samples per frame (30 ms at 16 kHz).
pub const FRAME_SAMPLES: usize = (SAMPLE_RATE as usize * FRAME_MS as usize) / 1000;

/// Samples in the wake detector's sliding window (1 s).
pub const WAKE_WINDOW_SAMPLES: usize = SAMPLE_RATE as usize;

/// RMS amplitude of a sample slice after normalization to [-1, 1].
#[must_use]
pub fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples
        .iter()
        .map(|&s| {
            let x = f32::from(s) / f32::from(i16::MAX);
            x * x
        })
        .sum();
    (sum / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(rms(&[0i16; 480]), 0.0);
    }

    #[test]
    fn rms_of_full_scale_is_one() {
        let loud = vec![i16::MAX; 480];
        assert!((rms(&loud) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn rms_of_empty_slice_is_zero() {
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn frame_constants_line_up() {
        assert_eq!(FRAME_SAMPLES, 480);
        assert_eq!(WAKE_WINDOW_SAMPLES, 16_000);
    }
}
