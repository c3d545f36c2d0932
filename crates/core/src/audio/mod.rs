use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};

use crate::{AnalysisError, Result};

/// Decoded PCM audio held in memory as interleaved 32-bit floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Wraps interleaved samples, checking that they fill whole frames.
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(AnalysisError::invalid("audio needs at least one channel"));
        }
        if sample_rate == 0 {
            return Err(AnalysisError::invalid("audio sample rate must be positive"));
        }
        if samples.len() % usize::from(channels) != 0 {
            return Err(AnalysisError::invalid(format!(
                "{} samples do not divide into {channels} channels",
                samples.len()
            )));
        }

        Ok(Self {
            samples,
            channels,
            sample_rate,
        })
    }

    /// Wraps a mono signal.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::new(samples, 1, sample_rate)
    }

    /// Decodes the WAV file at `path`.
    pub fn from_wav(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "decoding wav");
        Self::from_wav_reader(BufReader::new(File::open(path)?))
    }

    /// Decodes a WAV stream. Integer PCM is scaled into `[-1, 1]`.
    pub fn from_wav_reader<R: Read>(reader: R) -> Result<Self> {
        let reader = WavReader::new(reader)?;
        let spec = reader.spec();

        let samples = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()?,
            SampleFormat::Int => {
                let scale = 1.0 / (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 * scale))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        Self::new(samples, spec.channels, spec.sample_rate)
    }

    /// Writes the buffer as 32-bit float WAV.
    pub fn write_wav(&self, path: impl AsRef<Path>) -> Result<()> {
        let spec = WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };

        let mut writer = WavWriter::create(path, spec)?;
        for sample in &self.samples {
            writer.write_sample(*sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Returns the interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Returns the number of interleaved channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Returns the sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of multi-channel frames.
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    /// Returns the length in seconds.
    pub fn duration(&self) -> f32 {
        self.frames() as f32 / self.sample_rate as f32
    }

    /// Channel average of every frame.
    pub fn to_mono(&self) -> Vec<f32> {
        downmix(&self.samples, self.channels)
    }

    /// Mono samples between `start` and `end` seconds.
    pub fn frame_between(&self, start: f32, end: f32) -> Result<Vec<f32>> {
        if !(start >= 0.0 && end > start) {
            return Err(AnalysisError::invalid(format!(
                "time range {start}s..{end}s must start at or after zero and end after it starts"
            )));
        }

        let duration = self.duration();
        if end > duration {
            return Err(AnalysisError::invalid(format!(
                "end time {end}s is past the audio duration of {duration}s"
            )));
        }

        let channels = usize::from(self.channels);
        let first = (start * self.sample_rate as f32) as usize;
        let last = ((end * self.sample_rate as f32) as usize).min(self.frames());
        if last <= first {
            return Err(AnalysisError::invalid(format!(
                "time range {start}s..{end}s contains no samples"
            )));
        }

        Ok(downmix(
            &self.samples[first * channels..last * channels],
            self.channels,
        ))
    }
}

fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = usize::from(channels.max(1));
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Playback position used when analysing "the next N seconds" of a buffer.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PlaybackCursor {
    pub time_seconds: f32,
}

impl PlaybackCursor {
    /// Moves the cursor back to the start.
    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    /// Moves the cursor by `delta` seconds, stopping at zero.
    pub fn advance(&mut self, delta: f32) {
        self.time_seconds = (self.time_seconds + delta).max(0.0);
    }

    /// Jumps to `time_seconds`, clamped to zero.
    pub fn seek(&mut self, time_seconds: f32) {
        self.time_seconds = time_seconds.max(0.0);
    }
}
