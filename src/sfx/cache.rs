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
use std::{collections::HashMap, fmt, time::Duration};

use tracing::{debug, error, info};

use crate::audio::{Chunk, DeviceSpec, MAX_VOLUME};

use super::{
    loader::{LoadError, Loader},
    synth,
};

/// Name the fallback sound is registered under.
pub const FALLBACK_NAME: &str = "sfxerror";

/// Frequency of the fallback beep.
pub const FALLBACK_FREQUENCY_HZ: f32 = 200.0;

/// Length of the fallback beep.
pub const FALLBACK_DURATION: Duration = Duration::from_millis(500);

/// Identifies a cached sound. Handles are handed out in increasing order and are never
/// reused, so a stale handle can't refer to a sound loaded later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(u64);

impl ResourceHandle {
    /// Reserved for the fallback sound.
    pub const FALLBACK: ResourceHandle = ResourceHandle(0);

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A decoded sound and the number of times it has been requested.
#[derive(Debug)]
pub struct SoundResource {
    name: String,
    chunk: Chunk,
    usage: u32,
}

impl SoundResource {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub fn usage(&self) -> u32 {
        self.usage
    }
}

/// Owns every loaded sound, deduplicated by name.
#[derive(Debug)]
pub struct ResourceCache {
    sounds: HashMap<ResourceHandle, SoundResource>,
    by_name: HashMap<String, ResourceHandle>,
    next_handle: u64,
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceCache {
    pub fn new() -> Self {
        Self {
            sounds: HashMap::new(),
            by_name: HashMap::new(),
            next_handle: ResourceHandle::FALLBACK.0 + 1,
        }
    }

    /// Synthesizes the fallback beep in the device format and stores it under the
    /// reserved handle. Replaces any previous fallback.
    pub fn initialize_fallback(&mut self, spec: &DeviceSpec) {
        let data = synth::sine_beep(spec, FALLBACK_FREQUENCY_HZ, FALLBACK_DURATION);
        let chunk = Chunk::new(data).with_volume(MAX_VOLUME);
        info!(
            name = FALLBACK_NAME,
            bytes = chunk.len(),
            "Fallback sound synthesized"
        );
        self.sounds.insert(
            ResourceHandle::FALLBACK,
            SoundResource {
                name: FALLBACK_NAME.to_string(),
                chunk,
                usage: 0,
            },
        );
        self.by_name
            .insert(FALLBACK_NAME.to_string(), ResourceHandle::FALLBACK);
    }

    /// Returns the handle for the named sound, loading it if it isn't cached yet. A sound
    /// that fails to load resolves to the fallback handle.
    pub fn load(&mut self, name: &str, loader: &dyn Loader, spec: &DeviceSpec) -> ResourceHandle {
        info!(name, "Loading sound");

        if let Some(handle) = self.by_name.get(name).copied() {
            if let Some(sound) = self.sounds.get_mut(&handle) {
                sound.usage = sound.usage.saturating_add(1);
                info!(name, handle = %handle, usage = sound.usage, "Sound already loaded");
                return handle;
            }
        }

        let result = loader.load(name, spec).and_then(|pcm| {
            if pcm.matches(spec) {
                Ok(pcm)
            } else {
                Err(LoadError::UnsupportedFormat(format!(
                    "{}Hz {} {} does not match the device",
                    pcm.sample_rate, pcm.format, pcm.mode
                )))
            }
        });

        match result {
            Ok(pcm) => {
                let handle = ResourceHandle(self.next_handle);
                self.next_handle += 1;
                self.sounds.insert(
                    handle,
                    SoundResource {
                        name: name.to_string(),
                        chunk: Chunk::new(pcm.data),
                        usage: 1,
                    },
                );
                self.by_name.insert(name.to_string(), handle);
                info!("Sound loaded [{}:{}]", name, handle);
                handle
            }
            Err(e) => {
                error!(name, err = %e, "Unable to load sound");
                let usage = match self.sounds.get_mut(&ResourceHandle::FALLBACK) {
                    Some(fallback) => {
                        fallback.usage = fallback.usage.saturating_add(1);
                        fallback.usage
                    }
                    None => 0,
                };
                info!(name, usage, "Using fallback sound");
                ResourceHandle::FALLBACK
            }
        }
    }

    /// Removes a sound and releases its buffer. The fallback can't be freed.
    pub fn free(&mut self, handle: ResourceHandle) {
        debug_assert_ne!(handle, ResourceHandle::FALLBACK, "fallback sound freed");
        if handle == ResourceHandle::FALLBACK {
            error!("Refusing to free the fallback sound");
            return;
        }

        match self.sounds.remove(&handle) {
            Some(sound) => {
                if self.by_name.get(&sound.name) == Some(&handle) {
                    self.by_name.remove(&sound.name);
                }
                debug!(name = sound.name, handle = %handle, "Sound freed");
            }
            None => {
                debug_assert!(false, "freed unknown sound {}", handle);
                error!(handle = %handle, "Attempted to free an unknown sound");
            }
        }
    }

    /// Drops every sound, the fallback included.
    pub fn clear(&mut self) {
        self.sounds.clear();
        self.by_name.clear();
    }

    pub fn get(&self, handle: ResourceHandle) -> Option<&SoundResource> {
        self.sounds.get(&handle)
    }

    pub fn contains(&self, handle: ResourceHandle) -> bool {
        self.sounds.contains_key(&handle)
    }

    pub fn usage_count(&self, handle: ResourceHandle) -> Option<u32> {
        self.sounds.get(&handle).map(SoundResource::usage)
    }

    /// Number of cached sounds, the fallback included.
    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }
}
