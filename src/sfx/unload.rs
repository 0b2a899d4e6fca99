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
use tracing::{debug, warn};

use super::{
    cache::{ResourceCache, ResourceHandle},
    channels::ChannelTable,
};

/// Sounds waiting to be freed once no channel is playing them.
#[derive(Debug, Default)]
pub struct UnloadQueue {
    pending: Vec<ResourceHandle>,
}

impl UnloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the sound for removal. Returns false if the handle is the fallback, isn't
    /// cached or is already queued.
    pub fn request(&mut self, handle: ResourceHandle, cache: &ResourceCache) -> bool {
        if handle == ResourceHandle::FALLBACK {
            warn!("Ignoring request to unload the fallback sound");
            return false;
        }
        if !cache.contains(handle) {
            warn!(handle = %handle, "Ignoring request to unload a nonexistent sound");
            return false;
        }
        if self.pending.contains(&handle) {
            warn!(handle = %handle, "Sound is already queued for unloading");
            return false;
        }

        debug!(handle = %handle, "Sound queued for unloading");
        self.pending.push(handle);
        true
    }

    /// Frees every queued sound that no channel references and returns the freed handles.
    /// Sounds still playing stay queued.
    pub fn reconcile(
        &mut self,
        channels: &ChannelTable,
        cache: &mut ResourceCache,
    ) -> Vec<ResourceHandle> {
        let mut freed = Vec::new();
        self.pending.retain(|handle| {
            if channels.references(*handle) {
                return true;
            }
            if cache.contains(*handle) {
                cache.free(*handle);
            }
            freed.push(*handle);
            false
        });
        freed
    }

    pub fn contains(&self, handle: ResourceHandle) -> bool {
        self.pending.contains(&handle)
    }

    pub fn pending(&self) -> &[ResourceHandle] {
        &self.pending
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::DeviceSpec;
    use crate::testutil::StaticLoader;

    fn setup() -> (ResourceCache, ResourceHandle, ResourceHandle) {
        let spec = DeviceSpec::default();
        let loader = StaticLoader::new(&spec)
            .with_sound("explosion", vec![0; 64])
            .with_sound("laser", vec![0; 32]);
        let mut cache = ResourceCache::new();
        cache.initialize_fallback(&spec);
        let explosion = cache.load("explosion", &loader, &spec);
        let laser = cache.load("laser", &loader, &spec);
        (cache, explosion, laser)
    }

    #[test]
    fn test_request_rejections() {
        let (mut cache, explosion, _) = setup();
        let mut queue = UnloadQueue::new();

        assert!(!queue.request(ResourceHandle::FALLBACK, &cache));
        assert!(queue.request(explosion, &cache));
        assert!(!queue.request(explosion, &cache));
        assert_eq!(queue.pending(), &[explosion]);

        let table = ChannelTable::new(4);
        queue.reconcile(&table, &mut cache);
        // Gone from the cache, so a second request is rejected.
        assert!(!queue.request(explosion, &cache));
        assert!(cache.contains(ResourceHandle::FALLBACK));
    }

    #[test]
    fn test_reconcile_waits_for_channels() {
        let (mut cache, explosion, laser) = setup();
        let mut queue = UnloadQueue::new();
        let mut table = ChannelTable::new(4);
        table.assign(1, explosion);

        queue.request(explosion, &cache);
        queue.request(laser, &cache);

        assert_eq!(queue.reconcile(&table, &mut cache), vec![laser]);
        assert!(cache.contains(explosion));
        assert!(!cache.contains(laser));
        assert!(queue.contains(explosion));

        // Still playing, still queued.
        assert!(queue.reconcile(&table, &mut cache).is_empty());
        assert!(cache.contains(explosion));

        table.clear(1);
        assert_eq!(queue.reconcile(&table, &mut cache), vec![explosion]);
        assert!(!cache.contains(explosion));
        assert!(queue.pending().is_empty());

        assert!(queue.reconcile(&table, &mut cache).is_empty());
    }
}
