//! Adaptive noise floor over non-speech frames

use crate::frame::Frame;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

/// Threshold reported before the window has collected any value.
const FALLBACK_THRESHOLD: f32 = 0.15;

/// Default window length in values (100 frames ≈ 3 s).
const DEFAULT_WINDOW: usize = 100;

/// Default multiplier applied to the window mean.
const DEFAULT_MULTIPLIER: f32 = 2.0;

struct Inner {
    values: VecDeque<f32>,
    threshold: f32,
    locked: bool,
}

/// Rolling RMS baseline of the room, sampled from frames the packet VAD
/// classifies as non-speech.
///
/// Written only from the audio loop; the threshold may be read from any
/// task. The lock-held sections are a handful of arithmetic operations.
pub struct NoiseFloor {
    inner: Mutex<Inner>,
    capacity: usize,
    multiplier: f32,
}

impl Default for NoiseFloor {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MULTIPLIER)
    }
}

impl NoiseFloor {
    /// Create a noise floor with the given window capacity and multiplier.
    #[must_use]
    pub fn new(capacity: usize, multiplier: f32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                values: VecDeque::with_capacity(capacity),
                threshold: FALLBACK_THRESHOLD,
                locked: false,
            }),
            capacity,
            multiplier,
        }
    }

    /// Feed one frame. Only non-speech frames (per the packet VAD) move the
    /// floor, and a locked floor ignores everything.
    pub fn update(&self, frame: &Frame, packet_speech: bool) {
        if packet_speech {
            return;
        }
        let rms = frame.rms();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.locked {
            return;
        }
        inner.values.push_back(rms);
        if inner.values.len() > self.capacity {
            inner.values.pop_front();
        }
        let mean: f32 = inner.values.iter().sum::<f32>() / inner.values.len() as f32;
        inner.threshold = mean * self.multiplier;
    }

    /// The live speech threshold: `mean(window) × multiplier`, or the
    /// fallback while the window is empty.
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .threshold
    }

    /// Freeze the threshold. Invoked when speech capture begins so a loud
    /// utterance does not inflate the floor.
    pub fn lock(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.locked = true;
        debug!("noise floor locked at {:.3}", inner.threshold);
    }

    /// Resume updates and clear the window. Invoked on capture completion.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.locked = false;
        inner.values.clear();
        debug!("noise floor reset");
    }

    /// Number of values currently in the window.
    #[must_use]
    pub fn window_len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values
            .len()
    }
}
