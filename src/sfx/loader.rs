// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Sound loading.
//!
//! Sounds are decoded entirely into memory and converted into the device format up
//! front, so the mixer never has to convert while playing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hound::WavReader;
use tracing::info;

use crate::audio::{DeviceSpec, OutputMode, SampleFormat};

/// File extension of the sounds resolved by [`WavLoader`].
pub const WAV_EXTENSION: &str = "wav";

/// Error types for sound loading
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Sound file {0} does not exist")]
    NotFound(PathBuf),

    #[error("WAV decode error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),

    #[error("Sound contains no samples")]
    Empty,
}

/// Raw PCM plus the format it is encoded in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pcm {
    /// Interleaved little endian samples.
    pub data: Vec<u8>,
    pub sample_rate: u32,
    pub format: SampleFormat,
    pub mode: OutputMode,
}

impl Pcm {
    /// Wraps data that is already encoded for the given spec.
    pub fn for_spec(data: Vec<u8>, spec: &DeviceSpec) -> Pcm {
        Pcm {
            data,
            sample_rate: spec.sample_rate,
            format: spec.format,
            mode: spec.mode,
        }
    }

    /// True if the data can be handed to a device opened with `spec` as is.
    pub fn matches(&self, spec: &DeviceSpec) -> bool {
        self.sample_rate == spec.sample_rate && self.format == spec.format && self.mode == spec.mode
    }
}

/// Turns a logical sound name into PCM for the device.
pub trait Loader: Send {
    fn load(&self, name: &str, spec: &DeviceSpec) -> Result<Pcm, LoadError>;
}

/// Loads `<sounds_path>/<name>.wav` and converts it into the device format.
#[derive(Debug, Clone)]
pub struct WavLoader {
    sounds_path: PathBuf,
}

impl WavLoader {
    /// Creates a new loader rooted at the given directory.
    pub fn new(sounds_path: &Path) -> Self {
        Self {
            sounds_path: sounds_path.to_path_buf(),
        }
    }

    /// The file a sound name resolves to.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.sounds_path.join(name).with_extension(WAV_EXTENSION)
    }
}

impl Loader for WavLoader {
    fn load(&self, name: &str, spec: &DeviceSpec) -> Result<Pcm, LoadError> {
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(LoadError::NotFound(path));
        }

        let mut reader = WavReader::open(&path)?;
        let wav = reader.spec();
        if wav.channels == 0 {
            return Err(LoadError::UnsupportedFormat(format!(
                "{} has no channels",
                path.display()
            )));
        }
        if wav.sample_rate == 0 {
            return Err(LoadError::UnsupportedFormat(format!(
                "{} has a sample rate of 0",
                path.display()
            )));
        }

        let samples: Vec<f32> = match wav.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
            hound::SampleFormat::Int => {
                if wav.bits_per_sample == 0 || wav.bits_per_sample > 32 {
                    return Err(LoadError::UnsupportedFormat(format!(
                        "{}-bit integer samples",
                        wav.bits_per_sample
                    )));
                }
                let scale = (1i64 << (wav.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|s| s as f32 / scale))
                    .collect::<Result<_, _>>()?
            }
        };
        if samples.is_empty() {
            return Err(LoadError::Empty);
        }

        let target_channels = spec.mode.channel_count();
        let remixed = remix(&samples, wav.channels, target_channels);
        let resampled = if wav.sample_rate != spec.sample_rate {
            info!(
                source_rate = wav.sample_rate,
                target_rate = spec.sample_rate,
                "Transcoding sound"
            );
            transcode_samples(&remixed, target_channels, wav.sample_rate, spec.sample_rate)
        } else {
            remixed
        };

        let mut data = Vec::with_capacity(resampled.len() * spec.format.bytes_per_sample());
        for sample in resampled.iter() {
            spec.format.encode(*sample, &mut data);
        }

        let frames = resampled.len() / target_channels as usize;
        let duration = Duration::from_secs_f64(frames as f64 / f64::from(spec.sample_rate));
        info!(
            path = ?path,
            channels = wav.channels,
            sample_rate = wav.sample_rate,
            duration_ms = duration.as_millis(),
            memory_kb = data.len() / 1024,
            "Sound decoded"
        );

        Ok(Pcm::for_spec(data, spec))
    }
}

/// Converts interleaved samples between channel counts. Downmixing to mono averages the
/// source channels; upmixing from mono duplicates it; anything else keeps the leading
/// channels.
fn remix(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    if from == to {
        return samples.to_vec();
    }
    let from = from as usize;
    let to = to as usize;

    let mut output = Vec::with_capacity(samples.len() / from * to);
    for frame in samples.chunks_exact(from) {
        if to == 1 {
            output.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            for channel in 0..to {
                output.push(frame[channel.min(from - 1)]);
            }
        }
    }
    output
}

/// Transcodes samples from one sample rate to another using linear interpolation.
/// Short effects don't benefit enough from a windowed resampler to justify it.
fn transcode_samples(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let channels = channel_count as usize;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);

    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let idx0 = source_frame * channels + channel;
            let idx1 = (source_frame + 1) * channels + channel;

            let s0 = samples.get(idx0).copied().unwrap_or(0.0);
            let s1 = samples.get(idx1).copied().unwrap_or(s0);

            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}
