//! Sliding-window wake-word detection

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::WAKE_WINDOW_SAMPLES;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tract_onnx::prelude::*;

/// Confidence above which a wake event fires.
pub const WAKE_THRESHOLD: f32 = 0.77;

/// Suppression interval after a wake event.
pub const WAKE_COOLDOWN: Duration = Duration::from_secs(2);

/// A wake-word hit: per-model confidences plus the 1 s window that
/// triggered them.
#[derive(Debug, Clone)]
pub struct WakeEvent {
    /// Confidence in [0, 1] per model name.
    pub scores: HashMap<String, f32>,
    /// The 16 000-sample window submitted to the models.
    pub window: Vec<i16>,
}

/// One wake-word model scoring a full 1 s window.
pub trait WakeInference: Send {
    /// Model name used as the score key.
    fn name(&self) -> &str;

    /// Confidence in [0, 1] that the wake word ends in this window.
    fn score(&self, window: &[i16]) -> Result<f32>;
}

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Wake-word model loaded from an ONNX file via tract.
///
/// The model contract is fixed: input `[1, 16000]` f32 samples normalized
/// to [-1, 1], first output a single confidence value.
#[derive(Debug)]
pub struct OnnxWakeModel {
    name: String,
    plan: OnnxPlan,
}

impl OnnxWakeModel {
    /// Load a wake model from disk. A missing file is fatal.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ModelMissing(path.display().to_string()));
        }

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "wakeword".to_string());

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| Error::Model(format!("failed to load wake model: {e}")))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec![1, WAKE_WINDOW_SAMPLES as i64]),
            )
            .map_err(|e| Error::Model(format!("input fact error: {e}")))?
            .into_optimized()
            .map_err(|e| Error::Model(format!("model optimize error: {e}")))?
            .into_runnable()
            .map_err(|e| Error::Model(format!("model runnable error: {e}")))?;

        info!("Wake model '{}' loaded from {}", name, path.display());
        Ok(Self { name, plan })
    }
}

impl WakeInference for OnnxWakeModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, window: &[i16]) -> Result<f32> {
        let normalized: Vec<f32> = window
            .iter()
            .map(|&s| f32::from(s) / f32::from(i16::MAX))
            .collect();

        let input: Tensor = tract_ndarray::Array2::from_shape_vec((1, window.len()), normalized)
            .map_err(|e| Error::Model(format!("input tensor error: {e}")))?
            .into();

        let outputs = self
            .plan
            .run(tvec![input.into()])
            .map_err(|e| Error::Model(format!("wake inference error: {e}")))?;

        let scores = outputs[0]
            .to_array_view::<f32>()
            .map_err(|e| Error::Model(format!("output parse error: {e}")))?;
        Ok(scores.iter().next().copied().unwrap_or(0.0).clamp(0.0, 1.0))
    }
}

/// Wake-word detector over a fixed 1 s ring of samples.
///
/// The ring always holds exactly 16 000 samples, zero-padded at startup;
/// every frame displaces its own length from the front. Detection starts
/// disabled and is enabled once the downstream services are ready.
pub struct WakeDetector {
    ring: VecDeque<i16>,
    models: Vec<Box<dyn WakeInference>>,
    threshold: f32,
    cooldown: Duration,
    cooldown_until: Option<Instant>,
    enabled: bool,
}

impl WakeDetector {
    /// Create a detector over the given models with default threshold and
    /// cooldown.
    #[must_use]
    pub fn new(models: Vec<Box<dyn WakeInference>>) -> Self {
        Self::with_tuning(models, WAKE_THRESHOLD, WAKE_COOLDOWN)
    }

    /// Create a detector with explicit threshold and cooldown.
    #[must_use]
    pub fn with_tuning(
        models: Vec<Box<dyn WakeInference>>,
        threshold: f32,
        cooldown: Duration,
    ) -> Self {
        Self {
            ring: VecDeque::from(vec![0i16; WAKE_WINDOW_SAMPLES]),
            models,
            threshold,
            cooldown,
            cooldown_until: None,
            enabled: false,
        }
    }

    /// Allow detections.
    pub fn enable(&mut self) {
        self.enabled = true;
        debug!("wake detection enabled");
    }

    /// Suppress detections (the ring keeps filling).
    pub fn disable(&mut self) {
        self.enabled = false;
        debug!("wake detection disabled");
    }

    /// Whether detections are currently allowed.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the post-detection cooldown is active.
    #[must_use]
    pub fn in_cooldown(&self) -> bool {
        self.cooldown_until.is_some_and(|t| Instant::now() < t)
    }

    /// Current ring length; always [`WAKE_WINDOW_SAMPLES`].
    #[must_use]
    pub fn ring_len(&self) -> usize {
        self.ring.len()
    }

    /// Feed one gated frame.
    ///
    /// `packet_speech` is the packet-VAD verdict for the frame and
    /// `floor_threshold` the live noise-floor threshold. Returns a wake
    /// event when any model scores above the detection threshold.
    pub fn process(
        &mut self,
        frame: &Frame,
        packet_speech: bool,
        floor_threshold: f32,
    ) -> Option<WakeEvent> {
        for &s in frame.samples() {
            self.ring.pop_front();
            self.ring.push_back(s);
        }

        if !self.enabled || self.in_cooldown() {
            return None;
        }
        if frame.rms() <= floor_threshold {
            return None;
        }
        if !packet_speech {
            return None;
        }

        let window: Vec<i16> = self.ring.iter().copied().collect();
        let mut scores = HashMap::with_capacity(self.models.len());
        for model in &self.models {
            match model.score(&window) {
                Ok(score) => {
                    scores.insert(model.name().to_string(), score);
                }
                Err(e) => {
                    warn!("wake model '{}' failed: {}", model.name(), e);
                }
            }
        }

        if scores.values().any(|&s| s > self.threshold) {
            self.cooldown_until = Some(Instant::now() + self.cooldown);
            info!(
                "Wake word detected: {:?}",
                scores
                    .iter()
                    .map(|(k, v)| format!("{k}={v:.2}"))
                    .collect::<Vec<_>>()
            );
            return Some(WakeEvent { scores, window });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FRAME_SAMPLES;

    struct FixedScore {
        name: &'static str,
        score: f32,
    }

    impl WakeInference for FixedScore {
        fn name(&self) -> &str {
            self.name
        }

        fn score(&self, window: &[i16]) -> Result<f32> {
            assert_eq!(window.len(), WAKE_WINDOW_SAMPLES);
            Ok(self.score)
        }
    }

    fn loud_frame() -> Frame {
        Frame::from_samples(vec![i16::MAX / 2; FRAME_SAMPLES]).unwrap()
    }

    fn detector(score: f32) -> WakeDetector {
        WakeDetector::with_tuning(
            vec![Box::new(FixedScore {
                name: "alexa",
                score,
            })],
            WAKE_THRESHOLD,
            WAKE_COOLDOWN,
        )
    }

    #[test]
    fn ring_always_holds_one_second() {
        let mut det = detector(0.0);
        assert_eq!(det.ring_len(), WAKE_WINDOW_SAMPLES);
        for _ in 0..100 {
            det.process(&loud_frame(), true, 0.0);
            assert_eq!(det.ring_len(), WAKE_WINDOW_SAMPLES);
        }
    }

    #[test]
    fn detection_is_initially_disabled() {
        let mut det = detector(0.99);
        assert!(!det.is_enabled());
        assert!(det.process(&loud_frame(), true, 0.0).is_none());

        det.enable();
        assert!(det.is_enabled());
        assert!(det.process(&loud_frame(), true, 0.0).is_some());
    }

    #[test]
    fn cooldown_suppresses_a_second_hit() {
        let mut det = detector(0.99);
        det.enable();

        assert!(det.process(&loud_frame(), true, 0.0).is_some());
        assert!(det.in_cooldown());
        assert!(det.process(&loud_frame(), true, 0.0).is_none());
    }

    #[test]
    fn quiet_or_non_speech_frames_skip_inference() {
        let mut det = detector(0.99);
        det.enable();

        // RMS below the floor threshold.
        assert!(det.process(&loud_frame(), true, 1.0).is_none());
        // Packet VAD says non-speech.
        assert!(det.process(&loud_frame(), false, 0.0).is_none());
        // Silence never clears the floor.
        assert!(det.process(&Frame::silence(), true, 0.0).is_none());
    }

    #[test]
    fn score_at_threshold_does_not_fire() {
        let mut det = detector(WAKE_THRESHOLD);
        det.enable();
        assert!(det.process(&loud_frame(), true, 0.0).is_none());
    }

    #[test]
    fn event_carries_scores_and_window() {
        let mut det = detector(0.82);
        det.enable();
        let event = det.process(&loud_frame(), true, 0.0).unwrap();
        assert_eq!(event.window.len(), WAKE_WINDOW_SAMPLES);
        assert!((event.scores["alexa"] - 0.82).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_model_file_is_fatal() {
        let err = OnnxWakeModel::load("models/definitely-not-here.onnx").unwrap_err();
        assert!(matches!(err, Error::ModelMissing(_)));
    }
}
