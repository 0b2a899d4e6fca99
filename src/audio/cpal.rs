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
    fmt,
    sync::Arc,
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{error, info, span, Level};

use crate::audio::{
    mixer::SoftwareMixer, thread_priority::CallbackPriority, Backend, BackendError, Chunk,
    DeviceSpec, FinishedCallback, PlayRequest, SampleFormat, Target,
};

/// An output device driven by cpal. The cpal stream lives on a dedicated output thread
/// and pulls frames from the software mixer in its data callback.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The channel pool shared with the stream callback.
    mixer: Arc<SoftwareMixer>,
    /// Dropping or signalling this stops the stream.
    stop_tx: crossbeam_channel::Sender<()>,
    /// Handle to the output thread.
    output_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Device {
    /// Opens the named output device ("default" for the host default) with the given
    /// spec. Returns once the stream is running, or with the reason it could not start.
    pub fn open(name: &str, spec: DeviceSpec) -> Result<Device, BackendError> {
        let span = span!(Level::INFO, "open device (cpal)");
        let _enter = span.enter();

        let spec = DeviceSpec::new(
            spec.sample_rate,
            spec.format,
            spec.mode,
            spec.chunk_size,
            spec.channels,
        )?;
        let mixer = Arc::new(SoftwareMixer::new(spec));

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<String, BackendError>>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        let output_thread = {
            let mixer = mixer.clone();
            let name = name.to_string();
            thread::Builder::new()
                .name("sfxmix-output".to_string())
                .spawn(move || {
                    // The stream is created inside the thread as it may not be Send.
                    let stream = match build_stream(&name, spec, mixer) {
                        Ok((stream, device_name)) => match stream.play() {
                            Ok(()) => {
                                let _ = ready_tx.send(Ok(device_name));
                                stream
                            }
                            Err(e) => {
                                let _ = ready_tx.send(Err(e.into()));
                                return;
                            }
                        },
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };

                    // Keep the stream alive until asked to stop or the device is dropped.
                    let _ = stop_rx.recv();
                    drop(stream);
                })
                .map_err(|e| BackendError::OutputThread(e.to_string()))?
        };

        let device_name = match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(device_name)) => device_name,
            Ok(Err(e)) => {
                let _ = output_thread.join();
                return Err(e);
            }
            Err(e) => {
                return Err(BackendError::OutputThread(format!(
                    "output stream did not start: {}",
                    e
                )))
            }
        };

        info!(
            device = device_name,
            sample_rate = spec.sample_rate,
            format = %spec.format,
            mode = %spec.mode,
            chunk_size = spec.chunk_size,
            "Output stream started"
        );

        Ok(Device {
            name: device_name,
            mixer,
            stop_tx,
            output_thread: Mutex::new(Some(output_thread)),
        })
    }

    fn stop_stream(&self) {
        let _ = self.stop_tx.try_send(());
        if let Some(thread) = self.output_thread.lock().take() {
            if thread.join().is_err() {
                error!(device = self.name, "Output thread panicked");
            }
        }
    }
}

/// Finds the output device by name.
fn find_device(host: &cpal::Host, name: &str) -> Result<cpal::Device, BackendError> {
    if name == "default" {
        return host
            .default_output_device()
            .ok_or_else(|| BackendError::DeviceUnavailable(name.to_string()));
    }

    let devices = host
        .output_devices()
        .map_err(|e| BackendError::DeviceUnavailable(format!("{}: {}", name, e)))?;
    for device in devices {
        if device
            .description()
            .is_ok_and(|description| description.name().trim() == name)
        {
            return Ok(device);
        }
    }
    Err(BackendError::DeviceUnavailable(name.to_string()))
}

/// Builds the output stream in the sample type matching the spec.
fn build_stream(
    name: &str,
    spec: DeviceSpec,
    mixer: Arc<SoftwareMixer>,
) -> Result<(cpal::Stream, String), BackendError> {
    let host = cpal::default_host();
    let device = find_device(&host, name)?;
    let device_name = device
        .description()
        .map(|description| description.name().to_string())
        .unwrap_or_else(|_| name.to_string());

    let config = cpal::StreamConfig {
        channels: spec.mode.channel_count(),
        sample_rate: spec.sample_rate,
        buffer_size: cpal::BufferSize::Fixed(spec.chunk_size as u32),
    };

    let stream = match spec.format {
        SampleFormat::U8 => build_typed_stream::<u8>(&device, &config, mixer)?,
        SampleFormat::S8 => build_typed_stream::<i8>(&device, &config, mixer)?,
        SampleFormat::U16 => build_typed_stream::<u16>(&device, &config, mixer)?,
        SampleFormat::S16 => build_typed_stream::<i16>(&device, &config, mixer)?,
        SampleFormat::S32 => build_typed_stream::<i32>(&device, &config, mixer)?,
    };
    Ok((stream, device_name))
}

/// Mixes into an f32 scratch buffer and converts into the device sample type.
fn build_typed_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Arc<SoftwareMixer>,
) -> Result<cpal::Stream, BackendError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut priority = CallbackPriority::from_env();
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            priority.apply();
            if scratch.len() < data.len() {
                scratch.resize(data.len(), 0.0);
            }
            let block = &mut scratch[..data.len()];
            mixer.render(block);
            for (dst, &src) in data.iter_mut().zip(block.iter()) {
                *dst = T::from_sample(src);
            }
        },
        |err| error!("CPAL output stream error: {}", err),
        None,
    )?;
    Ok(stream)
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
        info!(device = self.name, "Closing output device");
        self.mixer.close();
        self.stop_stream();
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.stop_stream();
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.mixer)
    }
}
