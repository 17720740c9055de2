use embassy_time::Instant;
use embedded_io::{Read, ReadReady, Write};

use crate::command::mobile_control::types::SlowClock;
use crate::command::mobile_control::SetSlowClock;
use crate::dispatcher::{Dispatcher, Expect, Failure, Owner, Response};
use crate::error::Error;
use crate::module_timing::wake_timeout;

/// Wake handshakes sent before assuming the module is awake anyway
const MAX_WAKE_ATTEMPTS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum SleepState {
    Awake,
    Entering,
    Asleep,
    Waking,
}

/// Puts the module in slow clock mode after a run of idle ticks, and wakes
/// it before the next command.
pub struct IdleSleep {
    enabled: bool,
    threshold: u32,
    idle_ticks: u32,
    state: SleepState,
    wake_attempts: u8,
}

impl IdleSleep {
    pub fn new(enabled: bool, threshold: u32) -> Self {
        Self {
            enabled,
            threshold,
            idle_ticks: 0,
            state: SleepState::Awake,
            wake_attempts: 0,
        }
    }

    pub fn is_asleep(&self) -> bool {
        matches!(self.state, SleepState::Asleep | SleepState::Waking)
    }

    /// Count an idle tick, returns true once the module should be put to
    /// sleep.
    pub fn idle_tick(&mut self) -> bool {
        if !self.enabled || self.state != SleepState::Awake {
            return false;
        }
        self.idle_ticks = self.idle_ticks.saturating_add(1);
        self.idle_ticks >= self.threshold
    }

    pub fn reset_idle(&mut self) {
        self.idle_ticks = 0;
    }

    pub fn enter<T>(&mut self, at: &mut Dispatcher<T>, now: Instant) -> Result<(), Error>
    where
        T: Read + Write + ReadReady,
    {
        at.send(
            &SetSlowClock {
                mode: SlowClock::Automatic,
            },
            Expect::ok(),
            Owner::Sleep,
            now,
        )?;
        debug!("Entering slow clock after {} idle ticks", self.idle_ticks);
        self.state = SleepState::Entering;
        Ok(())
    }

    pub fn wake<T>(&mut self, at: &mut Dispatcher<T>, now: Instant) -> Result<(), Error>
    where
        T: Read + Write + ReadReady,
    {
        at.send(
            &SetSlowClock {
                mode: SlowClock::Disabled,
            },
            Expect::ok().with_timeout(wake_timeout()),
            Owner::Sleep,
            now,
        )?;
        self.wake_attempts += 1;
        self.state = SleepState::Waking;
        Ok(())
    }

    pub fn on_complete(&mut self, result: Result<Response, Failure>) {
        self.reset_idle();
        self.state = match (self.state, result) {
            (SleepState::Entering, Ok(_)) => {
                info!("Module asleep");
                SleepState::Asleep
            }
            (SleepState::Entering, Err(f)) => {
                warn!("Failed to enter slow clock: {:?}", f.error);
                SleepState::Awake
            }
            (SleepState::Waking, Ok(_)) => {
                info!("Module awake");
                self.wake_attempts = 0;
                SleepState::Awake
            }
            (SleepState::Waking, Err(_)) if self.wake_attempts < MAX_WAKE_ATTEMPTS => {
                debug!("[RETRY] Wake attempt {}", self.wake_attempts);
                SleepState::Asleep
            }
            (SleepState::Waking, Err(f)) => {
                warn!(
                    "No wake acknowledgement after {} attempts: {:?}",
                    self.wake_attempts, f.error
                );
                self.wake_attempts = 0;
                SleepState::Awake
            }
            (state, _) => state,
        };
    }
}
