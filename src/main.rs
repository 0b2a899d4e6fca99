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
use std::error::Error;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use sfxmix::audio::Loops;
use sfxmix::config::SfxConfig;
use sfxmix::sfx::{Channel, SoundSystem, WavLoader};
use tracing_subscriber::EnvFilter;

/// How often the playback loop services the sound system.
const SERVICE_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A sound effect mixer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plays a sound and waits for it to finish.
    Play {
        /// The path to the sound system config.
        config_path: PathBuf,
        /// The name of the sound to play.
        sound: String,
        /// Extra repetitions after the first play. Negative loops forever.
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        loops: i32,
        /// Fade in over this long, e.g. 250ms.
        #[arg(long)]
        fade_in: Option<String>,
        /// Stop after this long, e.g. 2s.
        #[arg(long)]
        limit: Option<String>,
        /// Channel volume from 0 to 128.
        #[arg(short, long)]
        volume: Option<i32>,
    },
    /// Plays the fallback sound.
    Beep {
        /// The path to the sound system config.
        config_path: PathBuf,
    },
    /// Loads sounds and reports which ones fall back to the error sound.
    Check {
        /// The path to the sound system config.
        config_path: PathBuf,
        /// The names of the sounds to check.
        sounds: Vec<String>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            config_path,
            sound,
            loops,
            fade_in,
            limit,
            volume,
        } => {
            let mut system = init(&config_path)?;
            let handle = system.load(&sound);
            if handle == system.fallback_handle() {
                println!("Unable to load {}, playing the fallback sound.", sound);
            }

            let loops = Loops::from(loops);
            let channel = match (parse_duration(fade_in)?, parse_duration(limit)?) {
                (None, None) => system.play(handle, loops),
                (None, Some(limit)) => system.play_timed(handle, loops, limit),
                (Some(fade_in), None) => system.play_fade_in(handle, loops, fade_in),
                (Some(fade_in), Some(limit)) => {
                    system.play_fade_in_timed(handle, loops, fade_in, limit)
                }
            };
            if let Some(volume) = volume {
                system.set_volume(channel, volume);
            }

            wait_for(&mut system, channel)?;
            system.shutdown();
        }
        Commands::Beep { config_path } => {
            let mut system = init(&config_path)?;
            let channel = system.play(system.fallback_handle(), Loops::Repeat(0));
            wait_for(&mut system, channel)?;
            system.shutdown();
        }
        Commands::Check {
            config_path,
            sounds,
        } => {
            let mut system = init(&config_path)?;
            let mut missing = 0;
            for sound in sounds.iter() {
                let handle = system.load(sound);
                if handle == system.fallback_handle() {
                    missing += 1;
                    println!("- {}: not loadable, falls back to the error sound", sound);
                } else {
                    println!("- {}: ok (handle {})", sound, handle);
                }
            }
            println!(
                "\n{} of {} sounds loaded.",
                sounds.len() - missing,
                sounds.len()
            );
            system.shutdown();
        }
    }

    Ok(())
}

fn init(config_path: &Path) -> Result<SoundSystem, Box<dyn Error>> {
    let config = SfxConfig::deserialize(config_path)?;
    let loader = WavLoader::new(config.sounds_path());
    Ok(SoundSystem::init(&config, Box::new(loader))?)
}

fn parse_duration(value: Option<String>) -> Result<Option<Duration>, Box<dyn Error>> {
    match value {
        Some(value) => {
            let duration = DurationString::from_string(value.clone())
                .map_err(|e| format!("invalid duration {}: {}", value, e))?;
            Ok(Some(duration.into()))
        }
        None => Ok(None),
    }
}

/// Services the sound system until playback on the channel ends.
fn wait_for(system: &mut SoundSystem, channel: Channel) -> Result<(), Box<dyn Error>> {
    if channel.is_null() {
        return Err("no channel available to play on".into());
    }
    println!("Playing on channel {}.", channel);
    while system.is_playing(channel) {
        thread::sleep(SERVICE_INTERVAL);
        system.service();
    }
    Ok(())
}
