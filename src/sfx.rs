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

//! Sound effect management: a cache of decoded sounds, the channels playing them and
//! the bookkeeping that keeps the two consistent.

use std::fmt;

use crate::{audio::BackendError, config::ConfigError};

mod cache;
mod channels;
mod loader;
pub mod synth;
mod system;
mod unload;

pub use cache::{ResourceCache, ResourceHandle, SoundResource, FALLBACK_NAME};
pub use channels::ChannelTable;
pub use loader::{LoadError, Loader, Pcm, WavLoader};
pub use system::SoundSystem;
pub use unload::UnloadQueue;

/// Error types for setting up the sound system
#[derive(Debug, thiserror::Error)]
pub enum SfxError {
    #[error("Audio device error: {0}")]
    Backend(#[from] BackendError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Audio device did not report its spec")]
    SpecUnavailable,
}

/// The channel a playback operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// No channel. Returned when playback couldn't start; operations on it do nothing.
    Null,
    /// Every channel.
    All,
    Index(usize),
}

impl Channel {
    pub fn index(&self) -> Option<usize> {
        match self {
            Channel::Index(index) => Some(*index),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        *self == Channel::Null
    }
}

impl From<usize> for Channel {
    fn from(index: usize) -> Self {
        Channel::Index(index)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Null => write!(f, "none"),
            Channel::All => write!(f, "all"),
            Channel::Index(index) => write!(f, "{}", index),
        }
    }
}
