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

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Priority for the mixing callback thread when SFXMIX_THREAD_PRIORITY is unset.
const DEFAULT_CALLBACK_THREAD_PRIORITY: u8 = 70;

/// Priority settings resolved once, before the stream is built, so the callback never
/// touches the environment.
#[derive(Debug, Clone, Copy)]
pub struct CallbackPriority {
    priority: ThreadPriorityValue,
    realtime: bool,
    applied: bool,
}

impl CallbackPriority {
    /// Reads SFXMIX_THREAD_PRIORITY (0-99) and SFXMIX_DISABLE_RT_AUDIO.
    pub fn from_env() -> Self {
        Self {
            priority: parse_priority(std::env::var("SFXMIX_THREAD_PRIORITY").ok().as_deref()),
            realtime: !env_flag("SFXMIX_DISABLE_RT_AUDIO"),
            applied: false,
        }
    }

    /// Raises the priority of the calling thread. Only the first call has any effect.
    pub fn apply(&mut self) {
        if self.applied {
            return;
        }
        self.applied = true;

        let tp = ThreadPriority::Crossplatform(self.priority);
        if let Err(e) = set_current_thread_priority(tp) {
            warn!(error = ?e, "Failed to raise mixing thread priority");
        }

        #[cfg(unix)]
        if self.realtime {
            use thread_priority::unix::{
                set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
                ThreadSchedulePolicy,
            };
            match set_thread_priority_and_policy(
                thread_native_id(),
                tp,
                ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
            ) {
                Ok(()) => info!("Enabled RT SCHED_FIFO for mixing thread"),
                Err(e) => warn!(error = %e, "Failed to set RT SCHED_FIFO for mixing thread"),
            }
        }
    }
}

fn parse_priority(value: Option<&str>) -> ThreadPriorityValue {
    value
        .and_then(|v| v.parse::<u8>().ok())
        .filter(|n| *n < 100)
        .and_then(|n| ThreadPriorityValue::try_from(n).ok())
        .unwrap_or_else(default_priority)
}

fn default_priority() -> ThreadPriorityValue {
    ThreadPriorityValue::try_from(DEFAULT_CALLBACK_THREAD_PRIORITY)
        .expect("default priority is within 0-99")
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}
