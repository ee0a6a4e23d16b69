//! Audio frame capture (microphone input)

use crate::error::{Error, Result};
use crate::{FRAME_SAMPLES, SAMPLE_RATE};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info};

/// Frames queued between the device callback and the audio loop (~2 s).
const QUEUE_CAPACITY: usize = 64;

/// How long a read waits for the next frame before reporting the device
/// as momentarily unavailable.
const READ_TIMEOUT: Duration = Duration::from_millis(200);

/// One 30 ms frame of 16 kHz mono 16-bit PCM. Never partial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    samples: Vec<i16>,
}

impl Frame {
    /// Build a frame from exactly [`FRAME_SAMPLES`] samples.
    pub fn from_samples(samples: Vec<i16>) -> Result<Self> {
        if samples.len() != FRAME_SAMPLES {
            return Err(Error::Stream(format!(
                "frame must hold {} samples, got {}",
                FRAME_SAMPLES,
                samples.len()
            )));
        }
        Ok(Self { samples })
    }

    /// An all-zero frame.
    #[must_use]
    pub fn silence() -> Self {
        Self {
            samples: vec![0; FRAME_SAMPLES],
        }
    }

    /// The frame's samples.
    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// RMS amplitude of this frame, normalized to [-1, 1].
    #[must_use]
    pub fn rms(&self) -> f32 {
        crate::rms(&self.samples)
    }

    /// Raw little-endian PCM bytes of this frame.
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * 2);
        for &s in &self.samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        bytes
    }
}

/// Blocking-style frame delivery. The capture device is exclusively owned
/// by whichever loop currently holds the reader.
#[async_trait(?Send)]
pub trait FrameRead {
    /// Wait for the next complete frame.
    ///
    /// Returns [`Error::AudioUnavailable`] when no frame arrived in time
    /// (recoverable) and [`Error::DeviceLost`] when the device is gone.
    async fn read(&mut self) -> Result<Frame>;
}

struct Shared {
    queue: Mutex<VecDeque<Frame>>,
    notify: Notify,
    failed: AtomicBool,
}

/// Microphone frame source.
///
/// Owns the cpal input stream for its whole lifetime; dropping the source
/// closes the device on every exit path. The device callback re-chunks
/// whatever buffer sizes the driver delivers into exact 480-sample frames.
pub struct FrameSource {
    _stream: cpal::Stream,
    shared: Arc<Shared>,
}

impl FrameSource {
    /// Open the default input device at 16 kHz.
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::DeviceLost("no input device found".to_string()))?;

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        info!("Using input device: {}", device_name);

        let supported_configs = device
            .supported_input_configs()
            .map_err(|e| Error::DeviceLost(format!("failed to query input configs: {e}")))?;

        let mut selected = None;
        for config in supported_configs {
            if config.min_sample_rate().0 <= SAMPLE_RATE
                && config.max_sample_rate().0 >= SAMPLE_RATE
                && config.sample_format() == SampleFormat::F32
            {
                selected = Some(config.with_sample_rate(cpal::SampleRate(SAMPLE_RATE)));
                break;
            }
        }

        let supported = selected.ok_or_else(|| {
            Error::DeviceLost(format!("no input config supports {SAMPLE_RATE}Hz F32"))
        })?;
        let config: StreamConfig = supported.into();
        let channels = config.channels as usize;

        debug!(
            "Audio config: {} channels, {}Hz",
            config.channels, config.sample_rate.0
        );

        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::with_capacity(QUEUE_CAPACITY)),
            notify: Notify::new(),
            failed: AtomicBool::new(false),
        });

        let cb_shared = Arc::clone(&shared);
        let err_shared = Arc::clone(&shared);
        let mut pending: Vec<i16> = Vec::with_capacity(FRAME_SAMPLES * 2);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Downmix to mono and widen into the pending buffer.
                    if channels > 1 {
                        for chunk in data.chunks(channels) {
                            let mono = chunk.iter().sum::<f32>() / channels as f32;
                            pending.push((mono.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16);
                        }
                    } else {
                        for &s in data {
                            pending.push((s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16);
                        }
                    }

                    while pending.len() >= FRAME_SAMPLES {
                        let samples: Vec<i16> = pending.drain(..FRAME_SAMPLES).collect();
                        let frame = Frame { samples };
                        if let Ok(mut queue) = cb_shared.queue.lock() {
                            // Overflow never raises: discard the oldest frame.
                            if queue.len() == QUEUE_CAPACITY {
                                queue.pop_front();
                            }
                            queue.push_back(frame);
                        }
                        cb_shared.notify.notify_one();
                    }
                },
                move |err| {
                    error!("Audio input stream error: {}", err);
                    err_shared.failed.store(true, Ordering::SeqCst);
                    err_shared.notify.notify_one();
                },
                None,
            )
            .map_err(|e| Error::DeviceLost(format!("failed to build input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| Error::DeviceLost(format!("failed to start input stream: {e}")))?;

        info!("Frame source started ({} samples / frame)", FRAME_SAMPLES);

        Ok(Self {
            _stream: stream,
            shared,
        })
    }
}

#[async_trait(?Send)]
impl FrameRead for FrameSource {
    async fn read(&mut self) -> Result<Frame> {
        loop {
            {
                let mut queue = self
                    .shared
                    .queue
                    .lock()
                    .map_err(|_| Error::DeviceLost("frame queue poisoned".to_string()))?;
                if let Some(frame) = queue.pop_front() {
                    return Ok(frame);
                }
            }

            if self.shared.failed.load(Ordering::SeqCst) {
                return Err(Error::DeviceLost("input stream reported an error".to_string()));
            }

            if tokio::time::timeout(READ_TIMEOUT, self.shared.notify.notified())
                .await
                .is_err()
            {
                return Err(Error::AudioUnavailable(
                    "no frame delivered within the read timeout".to_string(),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_partial_sample_counts() {
        assert!(Frame::from_samples(vec![0; 100]).is_err());
        assert!(Frame::from_samples(vec![0; FRAME_SAMPLES]).is_ok());
    }

    #[test]
    fn silence_frame_has_exact_length_and_zero_rms() {
        let frame = Frame::silence();
        assert_eq!(frame.samples().len(), FRAME_SAMPLES);
        assert_eq!(frame.rms(), 0.0);
    }

    #[test]
    fn le_bytes_round_trip() {
        let mut samples = vec![0i16; FRAME_SAMPLES];
        samples[0] = -1;
        samples[1] = 258;
        let frame = Frame::from_samples(samples.clone()).unwrap();
        let bytes = frame.to_le_bytes();
        assert_eq!(bytes.len(), FRAME_SAMPLES * 2);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), -1);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), 258);
    }

    // Requires a microphone; run locally with `cargo test -- --ignored`.
    #[tokio::test]
    #[ignore = "requires audio hardware"]
    async fn open_default_device() {
        let mut source = FrameSource::open().unwrap();
        let frame = source.read().await.unwrap();
        assert_eq!(frame.samples().len(), FRAME_SAMPLES);
    }
}
