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
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use config::{Config, File};
use serde::Deserialize;

use super::error::ConfigError;
use crate::audio::{DeviceSpec, OutputMode, SampleFormat};

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHUNK_SIZE: usize = 1024;
const DEFAULT_CHANNELS: usize = 8;
const DEFAULT_SOUNDS_PATH: &str = "sounds";

fn default_device() -> String {
    DEFAULT_DEVICE.to_string()
}

/// A YAML representation of the sound system configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct SfxConfig {
    /// The output device: "default", a device name, or a name starting with "mock".
    #[serde(default = "default_device")]
    device: String,

    /// Sampling frequency in Hz (default: 44100)
    sample_rate: Option<u32>,

    /// Sample representation: u8, s8, u16, s16 or s32 (default: s16)
    sample_format: Option<String>,

    /// Output channel layout: mono or stereo (default: stereo)
    output_mode: Option<String>,

    /// Mixing buffer size in frames (default: 1024)
    chunk_size: Option<usize>,

    /// Number of concurrent playback channels (default: 8)
    channels: Option<usize>,

    /// Directory sounds are loaded from (default: "sounds")
    sounds_path: Option<PathBuf>,
}

impl SfxConfig {
    /// New will create a new configuration with default settings for the given device.
    pub fn new(device: &str) -> SfxConfig {
        SfxConfig {
            device: device.to_string(),
            sample_rate: None,
            sample_format: None,
            output_mode: None,
            chunk_size: None,
            channels: None,
            sounds_path: None,
        }
    }

    /// Parse a configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<SfxConfig, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<SfxConfig>()?)
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    pub fn with_sample_format(mut self, format: SampleFormat) -> Self {
        self.sample_format = Some(format.to_string());
        self
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = Some(mode.to_string());
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn with_sounds_path(mut self, path: &Path) -> Self {
        self.sounds_path = Some(path.to_path_buf());
        self
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn sample_format(&self) -> Result<SampleFormat, ConfigError> {
        match self.sample_format.as_deref() {
            Some(format) => Ok(SampleFormat::from_str(format)?),
            None => Ok(SampleFormat::S16),
        }
    }

    pub fn output_mode(&self) -> Result<OutputMode, ConfigError> {
        match self.output_mode.as_deref() {
            Some(mode) => Ok(OutputMode::from_str(mode)?),
            None => Ok(OutputMode::Stereo),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE)
    }

    pub fn channels(&self) -> usize {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    pub fn sounds_path(&self) -> &Path {
        self.sounds_path
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_SOUNDS_PATH))
    }

    /// Validates the audio settings and returns the spec to open the device with.
    pub fn device_spec(&self) -> Result<DeviceSpec, ConfigError> {
        Ok(DeviceSpec::new(
            self.sample_rate(),
            self.sample_format()?,
            self.output_mode()?,
            self.chunk_size(),
            self.channels(),
        )?)
    }
}
