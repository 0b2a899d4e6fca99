// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
use std::{fmt, sync::Arc, time::Duration};

pub mod cpal;
pub mod format;
pub mod mixer;
pub mod mock;
mod thread_priority;

pub use format::{DeviceSpec, OutputMode, SampleFormat};

/// Silent channel volume.
pub const MIN_VOLUME: i32 = 0;

/// Full channel volume.
pub const MAX_VOLUME: i32 = 128;

/// Invoked by a backend with the index of a channel whose playback has ended, either
/// naturally or because it was halted. May be called from any thread.
pub type FinishedCallback = Arc<dyn Fn(usize) + Send + Sync>;

/// Error types for mixing backend operations
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Invalid device spec: {0}")]
    InvalidSpec(String),

    #[error("No free channels available")]
    NoFreeChannel,

    #[error("No output device found with name {0}")]
    DeviceUnavailable(String),

    #[error("Audio device has been closed")]
    Closed,

    #[error("Unable to build output stream: {0}")]
    BuildStream(#[from] ::cpal::BuildStreamError),

    #[error("Unable to start output stream: {0}")]
    PlayStream(#[from] ::cpal::PlayStreamError),

    #[error("Output thread failed: {0}")]
    OutputThread(String),
}

/// A buffer of PCM audio already in the device's sample format and channel layout.
/// Cloning is cheap; the sample data is shared.
#[derive(Clone)]
pub struct Chunk {
    data: Arc<[u8]>,
    volume: i32,
}

impl Chunk {
    /// Creates a new chunk at full volume.
    pub fn new(data: Vec<u8>) -> Chunk {
        Chunk {
            data: data.into(),
            volume: MAX_VOLUME,
        }
    }

    /// Sets the chunk's own volume, which scales every channel it plays on.
    pub fn with_volume(mut self, volume: i32) -> Chunk {
        self.volume = volume.clamp(MIN_VOLUME, MAX_VOLUME);
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Length of the chunk in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn volume(&self) -> i32 {
        self.volume
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("bytes", &self.data.len())
            .field("volume", &self.volume)
            .finish()
    }
}

/// How many times a chunk repeats after its first play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loops {
    /// Repeat until halted.
    Forever,
    /// Repeat the given number of extra times. `Repeat(0)` plays once.
    Repeat(u32),
}

impl From<i32> for Loops {
    /// Negative counts loop forever.
    fn from(loops: i32) -> Self {
        if loops < 0 {
            Loops::Forever
        } else {
            Loops::Repeat(loops as u32)
        }
    }
}

/// Parameters for starting playback on a free channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayRequest {
    pub loops: Loops,
    /// Ramp the volume up from silence over this long.
    pub fade_in: Option<Duration>,
    /// Halt the channel after this long regardless of loops.
    pub limit: Option<Duration>,
}

impl PlayRequest {
    pub fn new(loops: Loops) -> Self {
        Self {
            loops,
            fade_in: None,
            limit: None,
        }
    }

    pub fn fade_in(mut self, fade_in: Duration) -> Self {
        self.fade_in = Some(fade_in);
        self
    }

    pub fn limit(mut self, limit: Duration) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// The channels a control operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    All,
    One(usize),
}

/// A mixing backend multiplexes a fixed pool of playback channels onto chunks.
pub trait Backend: fmt::Display + Send + Sync {
    /// Returns the spec the device actually opened with.
    fn spec(&self) -> Option<DeviceSpec>;

    /// Resizes the channel pool. Channels beyond the new size are halted.
    fn allocate_channels(&self, count: usize);

    /// Registers the callback fired whenever a channel stops playing.
    fn on_channel_finished(&self, callback: FinishedCallback);

    /// Starts the chunk on the lowest free channel and returns its index.
    fn play(&self, chunk: &Chunk, request: PlayRequest) -> Result<usize, BackendError>;

    /// Stops playback immediately.
    fn halt(&self, target: Target);

    /// Stops playback after the given delay. A zero delay cancels a pending expiry.
    fn expire(&self, target: Target, after: Duration);

    /// Fades playback out over the given duration and then stops it.
    fn fade_out(&self, target: Target, over: Duration);

    fn pause(&self, target: Target);

    fn resume(&self, target: Target);

    /// True if the channel has a chunk assigned, including while paused.
    fn is_playing(&self, channel: usize) -> bool;

    fn is_paused(&self, channel: usize) -> bool;

    /// Sets the channel volume and returns the previous one (the average for `All`).
    fn set_volume(&self, target: Target, volume: i32) -> i32;

    /// Stops all playback and releases the device.
    fn close(&self);
}

/// Opens the device with the given name. Names starting with "mock" open a headless
/// device that never produces output.
pub fn open(device: &str, spec: DeviceSpec) -> Result<Arc<dyn Backend>, BackendError> {
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::open(device, spec)?));
    }

    Ok(Arc::new(cpal::Device::open(device, spec)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loops_from_i32() {
        assert_eq!(Loops::from(-1), Loops::Forever);
        assert_eq!(Loops::from(0), Loops::Repeat(0));
        assert_eq!(Loops::from(3), Loops::Repeat(3));
    }

    #[test]
    fn test_chunk_volume_clamped() {
        let chunk = Chunk::new(vec![0; 4]).with_volume(500);
        assert_eq!(chunk.volume(), MAX_VOLUME);
        assert_eq!(chunk.len(), 4);
    }

    #[test]
    fn test_open_mock() {
        let device = open("mock-device", DeviceSpec::default()).unwrap();
        assert_eq!(device.spec(), Some(DeviceSpec::default()));
    }
}
