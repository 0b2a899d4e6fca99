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
use std::{fmt, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tracing::{debug, error, info, span, warn, Level};

use crate::{
    audio::{self, Backend, DeviceSpec, Loops, PlayRequest, Target, MIN_VOLUME},
    config::SfxConfig,
};

use super::{
    cache::{ResourceCache, ResourceHandle},
    channels::ChannelTable,
    loader::Loader,
    unload::UnloadQueue,
    Channel, SfxError,
};

/// Owns the sound cache and the playback channels of one output device.
///
/// Completion notifications may arrive on the device's render thread. They only touch the
/// channel table, which is locked by every accessor on both sides. The table lock is
/// always taken before any lock inside the backend, and is never held while calling a
/// backend operation that can report a channel as finished.
pub struct SoundSystem {
    backend: Arc<dyn Backend>,
    spec: DeviceSpec,
    loader: Box<dyn Loader>,
    cache: ResourceCache,
    channels: Arc<Mutex<ChannelTable>>,
    unloads: UnloadQueue,
    closed: bool,
}

impl SoundSystem {
    /// Opens the configured device and prepares it for playback.
    pub fn init(config: &SfxConfig, loader: Box<dyn Loader>) -> Result<SoundSystem, SfxError> {
        let span = span!(Level::INFO, "sound system init");
        let _enter = span.enter();

        info!(device = config.device(), "Initializing sound system");
        let requested = config.device_spec()?;
        let backend = audio::open(config.device(), requested).inspect_err(|e| {
            error!(err = %e, "Unable to open audio device");
        })?;
        SoundSystem::with_backend(backend, loader)
    }

    /// Sets up the sound system on an already opened backend.
    pub fn with_backend(
        backend: Arc<dyn Backend>,
        loader: Box<dyn Loader>,
    ) -> Result<SoundSystem, SfxError> {
        let Some(spec) = backend.spec() else {
            error!(device = %backend, "Unable to query the audio device spec");
            backend.close();
            return Err(SfxError::SpecUnavailable);
        };
        info!(
            device = %backend,
            sample_rate = spec.sample_rate,
            format = %spec.format,
            mode = %spec.mode,
            channels = spec.channels,
            chunk_size = spec.chunk_size,
            "Audio device ready"
        );

        backend.allocate_channels(spec.channels);
        let channels = Arc::new(Mutex::new(ChannelTable::new(spec.channels)));

        let notifier = {
            let channels = channels.clone();
            let device = Arc::downgrade(&backend);
            Arc::new(move |channel: usize| {
                let mut table = channels.lock();
                // A late notification for a channel that has already been granted again
                // must not clear the new assignment.
                if device
                    .upgrade()
                    .is_some_and(|device| device.is_playing(channel))
                {
                    debug!(channel, "Ignoring stale completion");
                    return;
                }
                table.clear(channel);
            })
        };
        backend.on_channel_finished(notifier);

        let mut cache = ResourceCache::new();
        cache.initialize_fallback(&spec);

        Ok(SoundSystem {
            backend,
            spec,
            loader,
            cache,
            channels,
            unloads: UnloadQueue::new(),
            closed: false,
        })
    }

    /// Returns the handle for the named sound, loading it on first use. Sounds that fail
    /// to load resolve to the fallback sound.
    pub fn load(&mut self, name: &str) -> ResourceHandle {
        self.cache.load(name, self.loader.as_ref(), &self.spec)
    }

    /// Asks for the sound to be freed once no channel is playing it. Returns false if the
    /// request was rejected.
    pub fn queue_unload(&mut self, handle: ResourceHandle) -> bool {
        self.unloads.request(handle, &self.cache)
    }

    /// Periodic tick. Frees queued sounds that are no longer playing and returns them.
    pub fn service(&mut self) -> Vec<ResourceHandle> {
        let table = self.channels.lock();
        self.unloads.reconcile(&table, &mut self.cache)
    }

    /// Plays the sound on a free channel.
    pub fn play(&self, handle: ResourceHandle, loops: Loops) -> Channel {
        self.start(handle, PlayRequest::new(loops))
    }

    /// Plays the sound, halting it after `limit` at the latest.
    pub fn play_timed(&self, handle: ResourceHandle, loops: Loops, limit: Duration) -> Channel {
        self.start(handle, PlayRequest::new(loops).limit(limit))
    }

    /// Plays the sound, ramping up from silence over `fade_in`.
    pub fn play_fade_in(&self, handle: ResourceHandle, loops: Loops, fade_in: Duration) -> Channel {
        self.start(handle, PlayRequest::new(loops).fade_in(fade_in))
    }

    pub fn play_fade_in_timed(
        &self,
        handle: ResourceHandle,
        loops: Loops,
        fade_in: Duration,
        limit: Duration,
    ) -> Channel {
        self.start(handle, PlayRequest::new(loops).fade_in(fade_in).limit(limit))
    }

    fn start(&self, handle: ResourceHandle, request: PlayRequest) -> Channel {
        let Some(sound) = self.cache.get(handle) else {
            warn!(handle = %handle, "Attempted to play a nonexistent sound");
            return Channel::Null;
        };

        // Held across the grant so a completion for this channel can't run until the
        // assignment is recorded.
        let mut table = self.channels.lock();
        match self.backend.play(sound.chunk(), request) {
            Ok(channel) => {
                if let Some(stale) = table.get(channel) {
                    debug!(channel, handle = %stale, "Channel granted before its completion arrived");
                    table.clear(channel);
                }
                table.assign(channel, handle);
                debug!(name = sound.name(), handle = %handle, channel, "Playing sound");
                Channel::Index(channel)
            }
            Err(e) => {
                warn!(name = sound.name(), handle = %handle, err = %e, "Unable to play sound");
                Channel::Null
            }
        }
    }

    /// Halts the channel immediately.
    pub fn stop(&self, channel: Channel) {
        if let Some(target) = self.target(channel) {
            self.backend.halt(target);
            let mut table = self.channels.lock();
            match target {
                Target::All => table.clear_all(),
                Target::One(index) => table.clear(index),
            }
        }
    }

    /// Halts the channel after the given delay. A zero delay cancels an earlier request.
    pub fn stop_timed(&self, channel: Channel, after: Duration) {
        if let Some(target) = self.target(channel) {
            self.backend.expire(target, after);
        }
    }

    /// Fades the channel out over the given duration and then halts it.
    pub fn stop_fade_out(&self, channel: Channel, over: Duration) {
        if let Some(target) = self.target(channel) {
            self.backend.fade_out(target, over);
        }
    }

    pub fn pause(&self, channel: Channel) {
        if let Some(target) = self.target(channel) {
            self.backend.pause(target);
        }
    }

    pub fn resume(&self, channel: Channel) {
        if let Some(target) = self.target(channel) {
            self.backend.resume(target);
        }
    }

    /// True while the channel has a sound, including while it is paused. Always false for
    /// `Null` and `All`.
    pub fn is_playing(&self, channel: Channel) -> bool {
        match self.target(channel) {
            Some(Target::One(index)) => self.backend.is_playing(index),
            _ => false,
        }
    }

    pub fn is_paused(&self, channel: Channel) -> bool {
        match self.target(channel) {
            Some(Target::One(index)) => self.backend.is_paused(index),
            _ => false,
        }
    }

    /// Sets the channel volume, clamped to the supported range.
    pub fn set_volume(&self, channel: Channel, volume: i32) {
        let Some(target) = self.target(channel) else {
            return;
        };
        let mut table = self.channels.lock();
        let volume = match target {
            Target::All => table.set_volume_all(volume),
            Target::One(index) => table.set_volume(index, volume),
        };
        self.backend.set_volume(target, volume);
    }

    /// The last volume set on the channel. `All` reports the average over every channel.
    pub fn volume(&self, channel: Channel) -> i32 {
        let table = self.channels.lock();
        match self.target(channel) {
            Some(Target::All) => table.average_volume(),
            Some(Target::One(index)) => table.volume(index),
            None => MIN_VOLUME,
        }
    }

    /// Resolves a channel argument to a backend target. `Null` resolves to nothing.
    fn target(&self, channel: Channel) -> Option<Target> {
        match channel {
            Channel::Null => None,
            Channel::All => Some(Target::All),
            Channel::Index(index) => {
                debug_assert!(
                    index < self.spec.channels,
                    "channel {} out of range",
                    index
                );
                if index < self.spec.channels {
                    Some(Target::One(index))
                } else {
                    error!(channel = index, channels = self.spec.channels, "Channel out of range");
                    None
                }
            }
        }
    }

    pub fn fallback_handle(&self) -> ResourceHandle {
        ResourceHandle::FALLBACK
    }

    /// How often the sound has been requested through `load`.
    pub fn usage_count(&self, handle: ResourceHandle) -> Option<u32> {
        self.cache.usage_count(handle)
    }

    pub fn is_loaded(&self, handle: ResourceHandle) -> bool {
        self.cache.contains(handle)
    }

    /// Name the sound was loaded under.
    pub fn name(&self, handle: ResourceHandle) -> Option<&str> {
        self.cache.get(handle).map(|sound| sound.name())
    }

    /// The sound the channel is currently playing, if any.
    pub fn assigned(&self, channel: usize) -> Option<ResourceHandle> {
        self.channels.lock().get(channel)
    }

    pub fn pending_unloads(&self) -> &[ResourceHandle] {
        self.unloads.pending()
    }

    pub fn spec(&self) -> DeviceSpec {
        self.spec
    }

    /// Halts every channel, frees every sound and closes the device.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        info!(device = %self.backend, "Shutting down sound system");
        self.backend.halt(Target::All);
        self.channels.lock().clear_all();
        self.unloads.clear();
        self.cache.clear();
        self.backend.close();
    }
}

impl Drop for SoundSystem {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for SoundSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundSystem")
            .field("device", &self.backend.to_string())
            .field("spec", &self.spec)
            .field("sounds", &self.cache.len())
            .field("pending_unloads", &self.unloads.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use tempfile::tempdir;

    use super::*;
    use crate::audio::{
        mock, BackendError, Chunk, FinishedCallback, OutputMode, SampleFormat, MAX_VOLUME,
    };
    use crate::sfx::WavLoader;
    use crate::testutil::{eventually, write_wav, StaticLoader};

    fn spec(channels: usize) -> DeviceSpec {
        DeviceSpec::new(44100, SampleFormat::S16, OutputMode::Mono, 1024, channels).unwrap()
    }

    fn setup(channels: usize, loader: StaticLoader) -> (SoundSystem, Arc<mock::Device>) {
        let device = Arc::new(mock::Device::open("mock", spec(channels)).unwrap());
        let system = SoundSystem::with_backend(device.clone(), Box::new(loader)).unwrap();
        (system, device)
    }

    /// Wraps the mock device and holds completion notifications until `deliver` is called,
    /// like a render thread that hasn't reached the callback yet.
    struct DelayedCompletions {
        device: Arc<mock::Device>,
        held: Arc<Mutex<Vec<usize>>>,
        callback: Mutex<Option<FinishedCallback>>,
    }

    impl DelayedCompletions {
        fn new(device: Arc<mock::Device>) -> Self {
            Self {
                device,
                held: Arc::new(Mutex::new(Vec::new())),
                callback: Mutex::new(None),
            }
        }

        fn deliver(&self) {
            let callback = self.callback.lock().clone();
            let held: Vec<usize> = self.held.lock().drain(..).collect();
            if let Some(callback) = callback {
                for channel in held {
                    callback(channel);
                }
            }
        }
    }

    impl Backend for DelayedCompletions {
        fn spec(&self) -> Option<DeviceSpec> {
            self.device.spec()
        }

        fn allocate_channels(&self, count: usize) {
            self.device.allocate_channels(count)
        }

        fn on_channel_finished(&self, callback: FinishedCallback) {
            *self.callback.lock() = Some(callback);
            let held = self.held.clone();
            self.device
                .on_channel_finished(Arc::new(move |channel| held.lock().push(channel)));
        }

        fn play(&self, chunk: &Chunk, request: PlayRequest) -> Result<usize, BackendError> {
            self.device.play(chunk, request)
        }

        fn halt(&self, target: Target) {
            self.device.halt(target)
        }

        fn expire(&self, target: Target, after: Duration) {
            self.device.expire(target, after)
        }

        fn fade_out(&self, target: Target, over: Duration) {
            self.device.fade_out(target, over)
        }

        fn pause(&self, target: Target) {
            self.device.pause(target)
        }

        fn resume(&self, target: Target) {
            self.device.resume(target)
        }

        fn is_playing(&self, channel: usize) -> bool {
            self.device.is_playing(channel)
        }

        fn is_paused(&self, channel: usize) -> bool {
            self.device.is_paused(channel)
        }

        fn set_volume(&self, target: Target, volume: i32) -> i32 {
            self.device.set_volume(target, volume)
        }

        fn close(&self) {
            self.device.close()
        }
    }

    impl fmt::Display for DelayedCompletions {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{} (delayed)", self.device)
        }
    }

    fn loader() -> StaticLoader {
        StaticLoader::new(&spec(8))
            .with_sound("explosion", vec![0; 2048])
            .with_sound("blip", vec![0; 32])
    }

    fn index(channel: Channel) -> usize {
        match channel {
            Channel::Index(index) => index,
            other => panic!("expected a channel, got {:?}", other),
        }
    }

    #[test]
    fn test_lifecycle_scenario() {
        let loader = loader();
        let (mut system, device) = setup(8, loader.clone());
        assert!(system.is_loaded(system.fallback_handle()));

        let h1 = system.load("explosion");
        assert_eq!(system.usage_count(h1), Some(1));
        assert_eq!(system.load("explosion"), h1);
        assert_eq!(system.usage_count(h1), Some(2));
        assert_eq!(loader.calls(), 1);

        let fallback_usage = system.usage_count(system.fallback_handle()).unwrap();
        assert_eq!(system.load("missing_file"), system.fallback_handle());
        assert_eq!(
            system.usage_count(system.fallback_handle()),
            Some(fallback_usage + 1)
        );

        let channel = index(system.play(h1, Loops::Repeat(0)));
        assert!(channel < 8);
        assert_eq!(system.assigned(channel), Some(h1));

        device.finish(channel);
        assert_eq!(system.assigned(channel), None);

        assert!(system.queue_unload(h1));
        assert_eq!(system.service(), vec![h1]);
        assert!(!system.is_loaded(h1));
        assert!(system.pending_unloads().is_empty());

        let calls = loader.calls();
        let h2 = system.load("explosion");
        assert_ne!(h2, h1);
        assert_eq!(loader.calls(), calls + 1);
    }

    #[test]
    fn test_late_completion_keeps_new_assignment() {
        let device = Arc::new(mock::Device::open("mock", spec(1)).unwrap());
        let delayed = Arc::new(DelayedCompletions::new(device.clone()));
        let mut system = SoundSystem::with_backend(delayed.clone(), Box::new(loader())).unwrap();
        let explosion = system.load("explosion");
        let blip = system.load("blip");

        let first = index(system.play(explosion, Loops::Repeat(0)));
        device.finish(first);
        // The backend is done with the channel but the table hasn't heard yet.
        assert_eq!(system.assigned(first), Some(explosion));

        let second = index(system.play(blip, Loops::Forever));
        assert_eq!(second, first);
        assert_eq!(system.assigned(second), Some(blip));

        delayed.deliver();
        assert_eq!(system.assigned(second), Some(blip));
        assert!(system.is_playing(Channel::Index(second)));

        // Once blip is gone too, its own completion clears the slot.
        device.finish(second);
        delayed.deliver();
        assert_eq!(system.assigned(second), None);

        system.queue_unload(explosion);
        system.queue_unload(blip);
        assert_eq!(system.service().len(), 2);
    }

    #[test]
    fn test_unload_waits_for_playback() {
        let (mut system, device) = setup(4, loader());
        let handle = system.load("explosion");
        let channel = system.play(handle, Loops::Forever);

        assert!(system.queue_unload(handle));
        assert!(system.service().is_empty());
        device.advance(4096);
        assert!(system.service().is_empty());
        assert!(system.is_loaded(handle));

        system.stop(channel);
        assert!(!system.is_playing(channel));
        assert_eq!(system.service(), vec![handle]);
        assert!(!system.is_loaded(handle));
    }

    #[test]
    fn test_unload_fallback_rejected() {
        let (mut system, _) = setup(4, loader());
        let fallback = system.fallback_handle();
        assert!(!system.queue_unload(fallback));
        system.service();
        assert!(system.is_loaded(fallback));
    }

    #[test]
    fn test_play_nonexistent_handle() {
        let (mut system, device) = setup(4, loader());
        let handle = system.load("blip");
        system.queue_unload(handle);
        system.service();

        assert_eq!(system.play(handle, Loops::Repeat(0)), Channel::Null);
        assert_eq!(
            system.play_fade_in_timed(
                handle,
                Loops::Repeat(0),
                Duration::from_millis(10),
                Duration::from_millis(10)
            ),
            Channel::Null
        );
        assert_eq!(device.active_channels(), 0);
        for channel in 0..4 {
            assert_eq!(system.assigned(channel), None);
        }
    }

    #[test]
    fn test_channel_exhaustion() {
        let (mut system, _) = setup(2, loader());
        let handle = system.load("explosion");
        let first = system.play(handle, Loops::Forever);
        let second = system.play(handle, Loops::Forever);
        assert_ne!(first, second);
        assert_eq!(system.play(handle, Loops::Forever), Channel::Null);

        system.stop(first);
        assert_eq!(system.play(handle, Loops::Forever), first);
    }

    #[test]
    fn test_null_channel_is_noop() {
        let (mut system, device) = setup(4, loader());
        let handle = system.load("explosion");
        let channel = index(system.play(handle, Loops::Forever));
        system.set_volume(Channel::Index(channel), 50);

        system.stop(Channel::Null);
        system.stop_timed(Channel::Null, Duration::from_millis(1));
        system.stop_fade_out(Channel::Null, Duration::from_millis(1));
        system.pause(Channel::Null);
        system.resume(Channel::Null);
        system.set_volume(Channel::Null, 10);

        assert!(!system.is_playing(Channel::Null));
        assert!(!system.is_paused(Channel::Null));
        assert_eq!(system.volume(Channel::Null), MIN_VOLUME);
        assert_eq!(system.volume(Channel::Index(channel)), 50);
        assert_eq!(system.assigned(channel), Some(handle));
        assert_eq!(device.active_channels(), 1);
        device.advance(1024);
        assert!(system.is_playing(Channel::Index(channel)));
    }

    #[test]
    fn test_volume_shadowed_and_clamped() {
        let (system, _) = setup(4, loader());
        system.set_volume(Channel::Index(1), 500);
        assert_eq!(system.volume(Channel::Index(1)), MAX_VOLUME);
        system.set_volume(Channel::Index(1), -20);
        assert_eq!(system.volume(Channel::Index(1)), MIN_VOLUME);
        system.set_volume(Channel::Index(2), 64);
        assert_eq!(system.volume(Channel::Index(2)), 64);

        // 128 + 0 + 64 + 128
        assert_eq!(system.volume(Channel::All), 80);
        system.set_volume(Channel::All, 32);
        for channel in 0..4 {
            assert_eq!(system.volume(Channel::Index(channel)), 32);
        }
    }

    #[test]
    #[should_panic(expected = "out of range")]
    #[cfg(debug_assertions)]
    fn test_out_of_range_channel_panics_in_debug() {
        let (system, _) = setup(4, loader());
        system.pause(Channel::Index(4));
    }

    #[test]
    fn test_sentinels_report_not_playing() {
        let (mut system, _) = setup(4, loader());
        let handle = system.load("explosion");
        system.play(handle, Loops::Forever);
        assert!(!system.is_playing(Channel::All));
        assert!(!system.is_paused(Channel::All));
    }

    #[test]
    fn test_pause_resume() {
        let (mut system, device) = setup(4, loader());
        let handle = system.load("blip");
        let channel = system.play(handle, Loops::Repeat(0));

        system.pause(channel);
        assert!(system.is_paused(channel));
        device.advance(1024);
        assert!(system.is_playing(channel));

        system.resume(Channel::All);
        assert!(!system.is_paused(channel));
        device.advance(1024);
        assert!(!system.is_playing(channel));
        assert_eq!(system.assigned(index(channel)), None);
    }

    #[test]
    fn test_play_timed() {
        let (mut system, device) = setup(4, loader());
        let handle = system.load("explosion");
        let channel = system.play_timed(handle, Loops::Forever, Duration::from_millis(100));
        device.advance_by(Duration::from_millis(50));
        assert!(system.is_playing(channel));
        device.advance_by(Duration::from_millis(60));
        assert!(!system.is_playing(channel));
        assert_eq!(system.assigned(index(channel)), None);
    }

    #[test]
    fn test_stop_timed_and_fade_out() {
        let (mut system, device) = setup(4, loader());
        let handle = system.load("explosion");
        let timed = system.play_fade_in(handle, Loops::Forever, Duration::from_millis(20));
        let faded = system.play(handle, Loops::Forever);

        system.stop_timed(timed, Duration::from_millis(30));
        system.stop_fade_out(faded, Duration::from_millis(30));
        device.advance_by(Duration::from_millis(20));
        assert!(system.is_playing(timed));
        assert!(system.is_playing(faded));

        device.advance_by(Duration::from_millis(20));
        assert!(!system.is_playing(timed));
        assert!(!system.is_playing(faded));
        assert_eq!(device.active_channels(), 0);
        assert_eq!(system.assigned(index(timed)), None);
        assert_eq!(system.assigned(index(faded)), None);
    }

    #[test]
    fn test_stop_all() {
        let (mut system, device) = setup(4, loader());
        let handle = system.load("explosion");
        for _ in 0..3 {
            system.play(handle, Loops::Forever);
        }
        system.stop(Channel::All);
        assert_eq!(device.active_channels(), 0);
        for channel in 0..4 {
            assert_eq!(system.assigned(channel), None);
        }
    }

    #[test]
    fn test_play_fallback() {
        let (mut system, device) = setup(4, loader());
        let handle = system.load("does_not_exist");
        assert_eq!(handle, system.fallback_handle());
        let channel = system.play(handle, Loops::Repeat(0));
        assert_eq!(system.assigned(index(channel)), Some(handle));

        // The beep lasts half a second.
        device.advance_by(Duration::from_millis(400));
        assert!(system.is_playing(channel));
        device.advance_by(Duration::from_millis(200));
        assert!(!system.is_playing(channel));
    }

    #[test]
    fn test_completion_from_another_thread() {
        let (mut system, device) = setup(8, loader());
        let handle = system.load("explosion");
        let channel = index(system.play(handle, Loops::Repeat(0)));
        assert_eq!(system.assigned(channel), Some(handle));

        let render = {
            let device = device.clone();
            thread::spawn(move || device.advance(2048))
        };
        eventually(
            || system.assigned(channel).is_none(),
            "Channel was never released",
        );
        render.join().unwrap();

        system.queue_unload(handle);
        assert_eq!(system.service(), vec![handle]);
    }

    #[test]
    fn test_concurrent_render_keeps_table_consistent() {
        let (mut system, device) = setup(4, loader());
        let handle = system.load("blip");

        let running = Arc::new(AtomicBool::new(true));
        let render = {
            let device = device.clone();
            let running = running.clone();
            thread::spawn(move || {
                while running.load(Ordering::Relaxed) {
                    device.advance(8);
                }
            })
        };

        for _ in 0..500 {
            system.play(handle, Loops::Repeat(0));
        }
        running.store(false, Ordering::Relaxed);
        render.join().unwrap();

        device.advance(64);
        for channel in 0..4 {
            assert_eq!(system.assigned(channel), None);
        }
        assert!(system.queue_unload(handle));
        assert_eq!(system.service(), vec![handle]);
    }

    #[test]
    fn test_shutdown() {
        let (mut system, device) = setup(4, loader());
        let handle = system.load("explosion");
        system.play(handle, Loops::Forever);
        system.shutdown();
        assert_eq!(device.active_channels(), 0);
        assert!(device
            .play(&Chunk::new(vec![0; 4]), PlayRequest::new(Loops::Repeat(0)))
            .is_err());
    }

    #[test]
    fn test_init_from_config() {
        let dir = tempdir().unwrap();
        write_wav(
            dir.path().join("explosion.wav"),
            vec![vec![0.25f32; 441]],
            44100,
        )
        .unwrap();

        let config = SfxConfig::new("mock-device")
            .with_sample_rate(44100)
            .with_sample_format(SampleFormat::S16)
            .with_output_mode(OutputMode::Stereo)
            .with_channels(4)
            .with_sounds_path(dir.path());
        let mut system =
            SoundSystem::init(&config, Box::new(WavLoader::new(config.sounds_path()))).unwrap();
        assert_eq!(system.spec().channels, 4);
        assert_eq!(system.spec().mode, OutputMode::Stereo);

        let handle = system.load("explosion");
        assert_ne!(handle, system.fallback_handle());
        assert_eq!(system.name(handle), Some("explosion"));
        assert_eq!(system.load("missing"), system.fallback_handle());

        let channel = system.play(handle, Loops::Repeat(0));
        assert!(system.is_playing(channel));
        system.shutdown();
    }

    #[test]
    fn test_init_invalid_config() {
        let config = SfxConfig::new("mock").with_channels(0);
        let loader = StaticLoader::new(&DeviceSpec::default());
        assert!(matches!(
            SoundSystem::init(&config, Box::new(loader)),
            Err(SfxError::Config(_))
        ));
    }
}
