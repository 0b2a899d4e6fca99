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
    any::TypeId,
    collections::HashMap,
    error::Error,
    fs::File,
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::audio::DeviceSpec;
use crate::sfx::{LoadError, Loader, Pcm};

/// Wait for the given predicate to return true or fail.
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        if start.elapsed() > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Writes a 32-bit WAV file. `samples` holds one vector per channel.
pub fn write_wav<S: hound::Sample + Copy + 'static>(
    path: PathBuf,
    samples: Vec<Vec<S>>,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    let sample_format = if TypeId::of::<S>() == TypeId::of::<f32>() {
        SampleFormat::Float
    } else if TypeId::of::<S>() == TypeId::of::<i32>() {
        SampleFormat::Int
    } else {
        return Err("Unsupported sample format".into());
    };

    let num_channels = samples.len();
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let mut writer = WavWriter::new(
        File::create(path)?,
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format,
        },
    )?;

    let frames = samples.iter().map(Vec::len).max().unwrap_or(0);
    for frame in 0..frames {
        for channel in samples.iter() {
            writer.write_sample(channel[frame])?;
        }
    }
    writer.finalize()?;

    Ok(())
}

/// Serves sounds from memory and counts how often it was asked for one. Clones share
/// the counter.
#[derive(Clone)]
pub struct StaticLoader {
    spec: DeviceSpec,
    sounds: HashMap<String, Vec<u8>>,
    calls: Arc<AtomicUsize>,
}

impl StaticLoader {
    /// Sounds are reported as encoded for `spec`.
    pub fn new(spec: &DeviceSpec) -> Self {
        Self {
            spec: *spec,
            sounds: HashMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_sound(mut self, name: &str, data: Vec<u8>) -> Self {
        self.sounds.insert(name.to_string(), data);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Loader for StaticLoader {
    fn load(&self, name: &str, _: &DeviceSpec) -> Result<Pcm, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sounds
            .get(name)
            .map(|data| Pcm::for_spec(data.clone(), &self.spec))
            .ok_or_else(|| LoadError::NotFound(PathBuf::from(name)))
    }
}
