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
use tracing::error;

use crate::audio::{MAX_VOLUME, MIN_VOLUME};

use super::cache::ResourceHandle;

#[derive(Debug, Clone, Copy)]
struct ChannelSlot {
    assigned: Option<ResourceHandle>,
    /// Last volume set on the channel. Backends can't report it back.
    volume: i32,
}

/// Tracks which sound every playback channel is playing.
///
/// Not synchronized itself; the sound system keeps it behind the same lock on the
/// application and completion paths.
#[derive(Debug)]
pub struct ChannelTable {
    slots: Vec<ChannelSlot>,
}

impl ChannelTable {
    /// Creates a table with every channel unassigned and at full volume.
    pub fn new(channels: usize) -> Self {
        Self {
            slots: vec![
                ChannelSlot {
                    assigned: None,
                    volume: MAX_VOLUME,
                };
                channels
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Records that the channel started playing the given sound. The channel must be
    /// unassigned; the backend only grants free channels.
    pub fn assign(&mut self, channel: usize, handle: ResourceHandle) {
        let Some(slot) = self.slots.get_mut(channel) else {
            debug_assert!(false, "channel {} out of range", channel);
            error!(channel, "Assigned a channel out of range");
            return;
        };
        debug_assert!(
            slot.assigned.is_none(),
            "channel {} is already assigned",
            channel
        );
        if let Some(previous) = slot.assigned {
            error!(channel, previous = %previous, handle = %handle, "Channel was already assigned");
        }
        slot.assigned = Some(handle);
    }

    /// Marks the channel as no longer playing anything.
    pub fn clear(&mut self, channel: usize) {
        if let Some(slot) = self.slots.get_mut(channel) {
            slot.assigned = None;
        }
    }

    pub fn clear_all(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.assigned = None;
        }
    }

    pub fn get(&self, channel: usize) -> Option<ResourceHandle> {
        self.slots.get(channel).and_then(|slot| slot.assigned)
    }

    /// True if any channel is playing the sound.
    pub fn references(&self, handle: ResourceHandle) -> bool {
        self.slots.iter().any(|slot| slot.assigned == Some(handle))
    }

    /// Stores the clamped volume and returns it.
    pub fn set_volume(&mut self, channel: usize, volume: i32) -> i32 {
        let volume = volume.clamp(MIN_VOLUME, MAX_VOLUME);
        if let Some(slot) = self.slots.get_mut(channel) {
            slot.volume = volume;
        }
        volume
    }

    pub fn set_volume_all(&mut self, volume: i32) -> i32 {
        let volume = volume.clamp(MIN_VOLUME, MAX_VOLUME);
        for slot in self.slots.iter_mut() {
            slot.volume = volume;
        }
        volume
    }

    pub fn volume(&self, channel: usize) -> i32 {
        self.slots.get(channel).map_or(MIN_VOLUME, |slot| slot.volume)
    }

    /// Average volume across all channels.
    pub fn average_volume(&self) -> i32 {
        if self.slots.is_empty() {
            return MIN_VOLUME;
        }
        self.slots.iter().map(|slot| slot.volume).sum::<i32>() / self.slots.len() as i32
    }
}
