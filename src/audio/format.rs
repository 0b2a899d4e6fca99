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

use std::{fmt, str::FromStr, time::Duration};

use super::BackendError;

/// Integer sample representations supported by the mixing device. All multi-byte
/// formats are little endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    U8,
    S8,
    U16,
    S16,
    S32,
}

impl FromStr for SampleFormat {
    type Err = BackendError;

    /// Convert from string representation
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "u8" => Ok(SampleFormat::U8),
            "s8" => Ok(SampleFormat::S8),
            "u16" | "u16lsb" => Ok(SampleFormat::U16),
            "s16" | "s16lsb" => Ok(SampleFormat::S16),
            "s32" | "s32lsb" => Ok(SampleFormat::S32),
            _ => Err(BackendError::InvalidSpec(format!(
                "unsupported sample format: {}",
                s
            ))),
        }
    }
}

impl SampleFormat {
    /// Convert to string representation
    pub fn as_str(self) -> &'static str {
        match self {
            SampleFormat::U8 => "u8",
            SampleFormat::S8 => "s8",
            SampleFormat::U16 => "u16",
            SampleFormat::S16 => "s16",
            SampleFormat::S32 => "s32",
        }
    }

    /// Width of a single sample in bytes.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U8 | SampleFormat::S8 => 1,
            SampleFormat::U16 | SampleFormat::S16 => 2,
            SampleFormat::S32 => 4,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, SampleFormat::S8 | SampleFormat::S16 | SampleFormat::S32)
    }

    /// Maps a unit value in [-1.0, 1.0] onto this representation and appends the
    /// little endian bytes to `out`.
    ///
    /// Signed formats scale negative values by the magnitude of the type minimum and
    /// non-negative values by the type maximum, so both extremes are reachable.
    /// Unsigned formats are offset so that silence sits at half of the type maximum.
    pub fn encode(self, value: f32, out: &mut Vec<u8>) {
        let v = value.clamp(-1.0, 1.0);
        match self {
            SampleFormat::U8 => out.push(((v + 1.0) * f32::from(u8::MAX / 2)) as u8),
            SampleFormat::S8 => {
                let s = signed(v, -f32::from(i8::MIN), f32::from(i8::MAX)) as i8;
                out.extend_from_slice(&s.to_le_bytes());
            }
            SampleFormat::U16 => {
                let s = ((v + 1.0) * f32::from(u16::MAX / 2)) as u16;
                out.extend_from_slice(&s.to_le_bytes());
            }
            SampleFormat::S16 => {
                let s = signed(v, -f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
                out.extend_from_slice(&s.to_le_bytes());
            }
            SampleFormat::S32 => {
                let s = signed(v, -(i32::MIN as f32), i32::MAX as f32) as i32;
                out.extend_from_slice(&s.to_le_bytes());
            }
        }
    }

    /// Decodes one sample from the front of `bytes` back into a unit value.
    /// Returns silence when fewer than `bytes_per_sample()` bytes are given.
    pub fn decode(self, bytes: &[u8]) -> f32 {
        if bytes.len() < self.bytes_per_sample() {
            return 0.0;
        }
        match self {
            SampleFormat::U8 => f32::from(bytes[0]) / f32::from(u8::MAX / 2) - 1.0,
            SampleFormat::S8 => normalize_signed(
                f32::from(bytes[0] as i8),
                -f32::from(i8::MIN),
                f32::from(i8::MAX),
            ),
            SampleFormat::U16 => {
                let s = u16::from_le_bytes([bytes[0], bytes[1]]);
                f32::from(s) / f32::from(u16::MAX / 2) - 1.0
            }
            SampleFormat::S16 => {
                let s = i16::from_le_bytes([bytes[0], bytes[1]]);
                normalize_signed(f32::from(s), -f32::from(i16::MIN), f32::from(i16::MAX))
            }
            SampleFormat::S32 => {
                let s = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                normalize_signed(s as f32, -(i32::MIN as f32), i32::MAX as f32)
            }
        }
        .clamp(-1.0, 1.0)
    }
}

fn signed(v: f32, min_magnitude: f32, max: f32) -> f32 {
    if v < 0.0 {
        v * min_magnitude
    } else {
        v * max
    }
}

fn normalize_signed(s: f32, min_magnitude: f32, max: f32) -> f32 {
    if s < 0.0 {
        s / min_magnitude
    } else {
        s / max
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output channel layout of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Mono,
    Stereo,
}

impl OutputMode {
    /// Number of interleaved samples per frame.
    pub fn channel_count(self) -> u16 {
        match self {
            OutputMode::Mono => 1,
            OutputMode::Stereo => 2,
        }
    }
}

impl FromStr for OutputMode {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mono" => Ok(OutputMode::Mono),
            "stereo" => Ok(OutputMode::Stereo),
            _ => Err(BackendError::InvalidSpec(format!(
                "unsupported output mode: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Mono => write!(f, "mono"),
            OutputMode::Stereo => write!(f, "stereo"),
        }
    }
}

/// The device configuration requested from, and reported by, a mixing backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSpec {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Sample representation of every buffer handed to the device
    pub format: SampleFormat,
    /// Output channel layout
    pub mode: OutputMode,
    /// Mixing buffer size in frames
    pub chunk_size: usize,
    /// Size of the playback channel pool
    pub channels: usize,
}

impl DeviceSpec {
    /// Creates a new DeviceSpec
    pub fn new(
        sample_rate: u32,
        format: SampleFormat,
        mode: OutputMode,
        chunk_size: usize,
        channels: usize,
    ) -> Result<Self, BackendError> {
        if sample_rate == 0 {
            return Err(BackendError::InvalidSpec(
                "sample rate must be greater than 0".into(),
            ));
        }
        if chunk_size == 0 {
            return Err(BackendError::InvalidSpec(
                "chunk size must be greater than 0".into(),
            ));
        }
        if channels == 0 {
            return Err(BackendError::InvalidSpec(
                "at least one playback channel is required".into(),
            ));
        }

        Ok(DeviceSpec {
            sample_rate,
            format,
            mode,
            chunk_size,
            channels,
        })
    }

    /// Size in bytes of one interleaved frame.
    pub fn frame_bytes(&self) -> usize {
        self.format.bytes_per_sample() * self.mode.channel_count() as usize
    }

    /// Converts a duration into a whole number of frames at this sample rate.
    pub fn frames_for(&self, duration: Duration) -> u64 {
        (duration.as_secs_f64() * f64::from(self.sample_rate)).round() as u64
    }
}

impl Default for DeviceSpec {
    /// 44.1kHz, signed 16-bit stereo, 1024 frame chunks, 8 channels
    fn default() -> Self {
        DeviceSpec {
            sample_rate: 44100,
            format: SampleFormat::S16,
            mode: OutputMode::Stereo,
            chunk_size: 1024,
            channels: 8,
        }
    }
}
