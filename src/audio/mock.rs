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
use std::{fmt, time::Duration};

use tracing::info;

use crate::audio::{
    mixer::SoftwareMixer, Backend, BackendError, Chunk, DeviceSpec, FinishedCallback,
    PlayRequest, Target,
};

/// A mock device. Runs the channel pool without producing any output; time only moves
/// forward when `advance` is called.
pub struct Device {
    name: String,
    mixer: SoftwareMixer,
}

impl Device {
    /// Opens the given mock device.
    pub fn open(name: &str, spec: DeviceSpec) -> Result<Device, BackendError> {
        let spec = DeviceSpec::new(
            spec.sample_rate,
            spec.format,
            spec.mode,
            spec.chunk_size,
            spec.channels,
        )?;
        info!(device = name, "Opened mock audio device");
        Ok(Device {
            name: name.to_string(),
            mixer: SoftwareMixer::new(spec),
        })
    }

    /// Renders and discards the given number of frames.
    pub fn advance(&self, frames: usize) {
        let width = self.mixer.spec().map_or(1, |spec| spec.mode.channel_count()) as usize;
        let mut scratch = vec![0.0f32; frames * width];
        self.mixer.render(&mut scratch);
    }

    /// Renders and discards the given amount of time.
    pub fn advance_by(&self, duration: Duration) {
        if let Some(spec) = self.mixer.spec() {
            self.advance(spec.frames_for(duration) as usize);
        }
    }

    /// Ends playback on the channel as if the sound had run out.
    pub fn finish(&self, channel: usize) {
        self.mixer.halt(Target::One(channel));
    }

    /// Number of channels currently holding a chunk.
    pub fn active_channels(&self) -> usize {
        self.mixer.active_channels()
    }
}

impl Backend for Device {
    fn spec(&self) -> Option<DeviceSpec> {
        self.mixer.spec()
    }

    fn allocate_channels(&self, count: usize) {
        self.mixer.allocate_channels(count)
    }

    fn on_channel_finished(&self, callback: FinishedCallback) {
        self.mixer.on_channel_finished(callback)
    }

    fn play(&self, chunk: &Chunk, request: PlayRequest) -> Result<usize, BackendError> {
        self.mixer.play(chunk, request)
    }

    fn halt(&self, target: Target) {
        self.mixer.halt(target)
    }

    fn expire(&self, target: Target, after: Duration) {
        self.mixer.expire(target, after)
    }

    fn fade_out(&self, target: Target, over: Duration) {
        self.mixer.fade_out(target, over)
    }

    fn pause(&self, target: Target) {
        self.mixer.pause(target)
    }

    fn resume(&self, target: Target) {
        self.mixer.resume(target)
    }

    fn is_playing(&self, channel: usize) -> bool {
        self.mixer.is_playing(channel)
    }

    fn is_paused(&self, channel: usize) -> bool {
        self.mixer.is_paused(channel)
    }

    fn set_volume(&self, target: Target, volume: i32) -> i32 {
        self.mixer.set_volume(target, volume)
    }

    fn close(&self) {
        info!(device = self.name, "Closing mock audio device");
        self.mixer.close()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
