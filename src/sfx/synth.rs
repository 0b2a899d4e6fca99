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

//! Synthetic waveforms rendered directly into the device sample format.

use std::f32::consts::PI;
use std::time::Duration;

use crate::audio::DeviceSpec;

/// Generates a full scale sine beep as interleaved PCM in the spec's sample format and
/// channel layout. Every output channel carries the same signal.
///
/// Keep `frequency_hz` below half the sample rate or the tone aliases.
pub fn sine_beep(spec: &DeviceSpec, frequency_hz: f32, duration: Duration) -> Vec<u8> {
    let frames = spec.frames_for(duration) as usize;
    let width = spec.mode.channel_count() as usize;
    let angular_frequency = 2.0 * PI * frequency_hz;
    let sample_period = 1.0 / spec.sample_rate as f32;

    let mut pcm = Vec::with_capacity(frames * spec.frame_bytes());
    for frame in 0..frames {
        let value = (angular_frequency * frame as f32 * sample_period).sin();
        for _ in 0..width {
            spec.format.encode(value, &mut pcm);
        }
    }
    pcm
}
