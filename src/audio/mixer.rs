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
// Channel pool logic that can be used by both CPAL and headless implementations
use std::fmt;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::audio::{
    Backend, BackendError, Chunk, DeviceSpec, FinishedCallback, Loops, PlayRequest, Target,
    MAX_VOLUME, MIN_VOLUME,
};

/// Volume ramp applied on top of the channel volume.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Fade {
    None,
    In { elapsed: u64, total: u64 },
    Out { elapsed: u64, total: u64 },
}

impl Fade {
    /// Returns the gain for the next frame, or None once a fade out has completed.
    fn step(&mut self) -> Option<f32> {
        match self {
            Fade::None => Some(1.0),
            Fade::In { elapsed, total } => {
                let gain = *elapsed as f32 / *total as f32;
                *elapsed += 1;
                if *elapsed >= *total {
                    *self = Fade::None;
                }
                Some(gain)
            }
            Fade::Out { elapsed, total } => {
                if *elapsed >= *total {
                    return None;
                }
                let gain = 1.0 - *elapsed as f32 / *total as f32;
                *elapsed += 1;
                Some(gain)
            }
        }
    }
}

/// A chunk playing on a channel.
struct Voice {
    chunk: Chunk,
    /// Next frame to read from the chunk.
    frame: usize,
    /// Remaining repeats.
    loops: Loops,
    paused: bool,
    /// Mixer clock value at which the voice is halted.
    expire_at: Option<u64>,
    fade: Fade,
}

struct ChannelState {
    voice: Option<Voice>,
    volume: i32,
}

impl ChannelState {
    fn new() -> Self {
        Self {
            voice: None,
            volume: MAX_VOLUME,
        }
    }
}

struct MixerState {
    channels: Vec<ChannelState>,
    /// Frames rendered since the mixer was created.
    clock: u64,
    closed: bool,
}

impl MixerState {
    fn selected(&mut self, target: Target) -> impl Iterator<Item = (usize, &mut ChannelState)> {
        self.channels
            .iter_mut()
            .enumerate()
            .filter(move |(index, _)| match target {
                Target::All => true,
                Target::One(channel) => *index == channel,
            })
    }

    /// Removes the voices of the selected channels, returning the channels that were playing.
    fn halt(&mut self, target: Target) -> Vec<usize> {
        self.selected(target)
            .filter_map(|(index, channel)| channel.voice.take().map(|_| index))
            .collect()
    }

    /// Mixes every active voice into `out` and returns the channels that finished.
    fn render(&mut self, spec: &DeviceSpec, out: &mut [f32]) -> Vec<usize> {
        let width = spec.mode.channel_count() as usize;
        let frame_bytes = spec.frame_bytes();
        let sample_bytes = spec.format.bytes_per_sample();
        let frames = out.len() / width;
        let clock = self.clock;
        let mut finished = Vec::new();

        for (index, channel) in self.channels.iter_mut().enumerate() {
            let Some(voice) = channel.voice.as_mut() else {
                continue;
            };
            if voice.paused {
                continue;
            }

            let chunk = voice.chunk.clone();
            let data = chunk.data();
            let total_frames = data.len() / frame_bytes;
            let gain = volume_gain(channel.volume) * volume_gain(chunk.volume());
            let mut done = false;

            for frame in 0..frames {
                if total_frames == 0 || voice.expire_at.is_some_and(|at| clock + frame as u64 >= at) {
                    done = true;
                    break;
                }
                let Some(fade_gain) = voice.fade.step() else {
                    done = true;
                    break;
                };

                let offset = voice.frame * frame_bytes;
                for sample in 0..width {
                    let start = offset + sample * sample_bytes;
                    out[frame * width + sample] +=
                        spec.format.decode(&data[start..start + sample_bytes]) * gain * fade_gain;
                }

                voice.frame += 1;
                if voice.frame >= total_frames {
                    match voice.loops {
                        Loops::Forever => voice.frame = 0,
                        Loops::Repeat(0) => {
                            done = true;
                            break;
                        }
                        Loops::Repeat(remaining) => {
                            voice.loops = Loops::Repeat(remaining - 1);
                            voice.frame = 0;
                        }
                    }
                }
            }

            if done {
                channel.voice = None;
                finished.push(index);
            }
        }

        self.clock += frames as u64;
        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
        finished
    }
}

fn volume_gain(volume: i32) -> f32 {
    volume as f32 / MAX_VOLUME as f32
}

/// Core channel pool that's independent of any audio output. Owns the playback state of
/// every channel and produces interleaved f32 frames on demand.
pub struct SoftwareMixer {
    spec: DeviceSpec,
    state: Mutex<MixerState>,
    callback: RwLock<Option<FinishedCallback>>,
}

impl SoftwareMixer {
    /// Creates a new mixer with `spec.channels` idle channels.
    pub fn new(spec: DeviceSpec) -> Self {
        Self {
            spec,
            state: Mutex::new(MixerState {
                channels: (0..spec.channels).map(|_| ChannelState::new()).collect(),
                clock: 0,
                closed: false,
            }),
            callback: RwLock::new(None),
        }
    }

    /// Renders `out.len() / channel_count` frames. Completion callbacks for channels that
    /// finish during this block are fired on the calling thread after the mixer lock has
    /// been released.
    pub fn render(&self, out: &mut [f32]) {
        out.fill(0.0);
        let finished = {
            let mut state = self.state.lock();
            state.render(&self.spec, out)
        };
        self.notify(finished);
    }

    /// Number of channels currently holding a chunk.
    pub fn active_channels(&self) -> usize {
        self.state
            .lock()
            .channels
            .iter()
            .filter(|channel| channel.voice.is_some())
            .count()
    }

    /// Frames rendered so far.
    pub fn clock(&self) -> u64 {
        self.state.lock().clock
    }

    fn notify(&self, finished: Vec<usize>) {
        if finished.is_empty() {
            return;
        }
        let callback = self.callback.read().clone();
        if let Some(callback) = callback {
            for channel in finished {
                debug!(channel, "Channel finished");
                callback(channel);
            }
        }
    }
}

impl Backend for SoftwareMixer {
    fn spec(&self) -> Option<DeviceSpec> {
        Some(self.spec)
    }

    fn allocate_channels(&self, count: usize) {
        let halted = {
            let mut state = self.state.lock();
            let halted: Vec<usize> = state
                .channels
                .iter_mut()
                .enumerate()
                .skip(count)
                .filter_map(|(index, channel)| channel.voice.take().map(|_| index))
                .collect();
            state.channels.truncate(count);
            while state.channels.len() < count {
                state.channels.push(ChannelState::new());
            }
            halted
        };
        self.notify(halted);
    }

    fn on_channel_finished(&self, callback: FinishedCallback) {
        *self.callback.write() = Some(callback);
    }

    fn play(&self, chunk: &Chunk, request: PlayRequest) -> Result<usize, BackendError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(BackendError::Closed);
        }
        let clock = state.clock;
        let index = state
            .channels
            .iter()
            .position(|channel| channel.voice.is_none())
            .ok_or(BackendError::NoFreeChannel)?;

        let fade = match request.fade_in.map(|d| self.spec.frames_for(d)) {
            Some(total) if total > 0 => Fade::In { elapsed: 0, total },
            _ => Fade::None,
        };
        state.channels[index].voice = Some(Voice {
            chunk: chunk.clone(),
            frame: 0,
            loops: request.loops,
            paused: false,
            expire_at: request.limit.map(|d| clock + self.spec.frames_for(d)),
            fade,
        });
        Ok(index)
    }

    fn halt(&self, target: Target) {
        let halted = self.state.lock().halt(target);
        self.notify(halted);
    }

    fn expire(&self, target: Target, after: Duration) {
        let frames = self.spec.frames_for(after);
        let mut state = self.state.lock();
        let clock = state.clock;
        for (_, channel) in state.selected(target) {
            if let Some(voice) = channel.voice.as_mut() {
                voice.expire_at = (!after.is_zero()).then_some(clock + frames);
            }
        }
    }

    fn fade_out(&self, target: Target, over: Duration) {
        let total = self.spec.frames_for(over);
        if total == 0 {
            self.halt(target);
            return;
        }
        let mut state = self.state.lock();
        for (_, channel) in state.selected(target) {
            if let Some(voice) = channel.voice.as_mut() {
                voice.fade = Fade::Out { elapsed: 0, total };
            }
        }
    }

    fn pause(&self, target: Target) {
        let mut state = self.state.lock();
        for (_, channel) in state.selected(target) {
            if let Some(voice) = channel.voice.as_mut() {
                voice.paused = true;
            }
        }
    }

    fn resume(&self, target: Target) {
        let mut state = self.state.lock();
        for (_, channel) in state.selected(target) {
            if let Some(voice) = channel.voice.as_mut() {
                voice.paused = false;
            }
        }
    }

    fn is_playing(&self, channel: usize) -> bool {
        self.state
            .lock()
            .channels
            .get(channel)
            .is_some_and(|c| c.voice.is_some())
    }

    fn is_paused(&self, channel: usize) -> bool {
        self.state
            .lock()
            .channels
            .get(channel)
            .and_then(|c| c.voice.as_ref())
            .is_some_and(|voice| voice.paused)
    }

    fn set_volume(&self, target: Target, volume: i32) -> i32 {
        let volume = volume.clamp(MIN_VOLUME, MAX_VOLUME);
        let mut state = self.state.lock();
        let previous: Vec<i32> = state
            .selected(target)
            .map(|(_, channel)| std::mem::replace(&mut channel.volume, volume))
            .collect();
        if previous.is_empty() {
            return MIN_VOLUME;
        }
        previous.iter().sum::<i32>() / previous.len() as i32
    }

    fn close(&self) {
        let halted = {
            let mut state = self.state.lock();
            state.closed = true;
            state.halt(Target::All)
        };
        self.notify(halted);
    }
}

impl fmt::Display for SoftwareMixer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Software mixer ({}Hz, {}, {}, {} channels)",
            self.spec.sample_rate, self.spec.format, self.spec.mode, self.spec.channels
        )
    }
}

impl fmt::Debug for SoftwareMixer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareMixer")
            .field("spec", &self.spec)
            .field("active_channels", &self.active_channels())
            .finish()
    }
}
