//! Audible feedback chimes

use crate::error::{Error, Result};
use rodio::{Decoder, OutputStream, Sink};
use std::io::Cursor;
use std::path::PathBuf;
use tracing::debug;

/// Short feedback sound played on wake detection and readiness.
///
/// Plays a WAV file when one is configured and present, otherwise a
/// generated two-tone beep. Playback failures are reported but callers
/// treat them as non-fatal.
pub struct Chime {
    path: Option<PathBuf>,
}

impl Chime {
    /// Chime backed by a sound file; falls back to the generated beep when
    /// the file is missing.
    #[must_use]
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Chime that always uses the generated beep.
    #[must_use]
    pub fn generated() -> Self {
        Self { path: None }
    }

    /// Play the chime, blocking until playback completes (~0.2 s).
    pub fn play(&self) -> Result<()> {
        let data = match &self.path {
            Some(path) if path.exists() => std::fs::read(path)?,
            Some(path) => {
                debug!("chime file missing, using generated beep: {}", path.display());
                beep_wav()?
            }
            None => beep_wav()?,
        };

        let (_stream, handle) = OutputStream::try_default()
            .map_err(|e| Error::Stream(format!("no output device: {e}")))?;
        let sink = Sink::try_new(&handle)
            .map_err(|e| Error::Stream(format!("failed to create sink: {e}")))?;
        let source = Decoder::new(Cursor::new(data))
            .map_err(|e| Error::Stream(format!("failed to decode chime: {e}")))?;
        sink.append(source);
        sink.sleep_until_end();
        Ok(())
    }

    /// Play on a background thread so the audio loop never waits.
    pub fn play_detached(&self) {
        let chime = Self {
            path: self.path.clone(),
        };
        std::thread::spawn(move || {
            if let Err(e) = chime.play() {
                debug!("chime playback failed: {}", e);
            }
        });
    }
}

/// Render a short rising two-tone beep as an in-memory WAV.
fn beep_wav() -> Result<Vec<u8>> {
    const SAMPLE_RATE: u32 = 44_100;
    const TONE_SAMPLES: u32 = SAMPLE_RATE / 10; // 100 ms per tone
    const FADE: u32 = 800;

    let mut samples = Vec::with_capacity(2 * TONE_SAMPLES as usize);
    for freq in [660.0f32, 880.0f32] {
        for i in 0..TONE_SAMPLES {
            let t = i as f32 / SAMPLE_RATE as f32;
            let value = (2.0 * std::f32::consts::PI * freq * t).sin();
            // Ramp the edges to avoid clicks between tones.
            let envelope = if i < FADE {
                i as f32 / FADE as f32
            } else if i > TONE_SAMPLES - FADE {
                (TONE_SAMPLES - i) as f32 / FADE as f32
            } else {
                1.0
            };
            samples.push((value * envelope * 0.3 * f32::from(i16::MAX)) as i16);
        }
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| Error::Stream(format!("failed to create WAV: {e}")))?;
        for sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| Error::Stream(format!("failed to write sample: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| Error::Stream(format!("failed to finalize WAV: {e}")))?;
    }

    Ok(cursor.into_inner())
}
