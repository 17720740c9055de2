use embassy_time::{Duration, Instant};
use embedded_io::{Read, ReadReady, Write};

use crate::command::mobile_control::{GetBatteryCharge, GetSignalQuality};
use crate::command::network_service::GetNetworkRegistrationStatus;
use crate::dispatcher::{Dispatcher, Expect, Failure, Owner, Response};
use crate::error::Error;
use crate::parser;
use crate::registration::Status;

/// Last known telemetry values, `None` until the module reported them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetrySnapshot {
    /// dBm
    pub signal_strength: Option<i16>,
    /// Percent
    pub battery_level: Option<u8>,
    /// Volts
    pub battery_voltage: Option<f32>,
}

/// A value that was just refreshed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Signal(i16),
    Battery { level: u8, voltage: f32 },
    /// Not published, but a lost network must drop the connection
    Registration(Status),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Query {
    Signal,
    Battery,
    Registration,
}

/// Polls `+CSQ`, `+CBC` and `+CREG?` once per interval.
pub struct Telemetry {
    interval: Duration,
    next_due: Option<Instant>,
    next: Query,
    snapshot: TelemetrySnapshot,
}

impl Telemetry {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
            next: Query::Signal,
            snapshot: TelemetrySnapshot::default(),
        }
    }

    pub fn snapshot(&self) -> &TelemetrySnapshot {
        &self.snapshot
    }

    /// A poll is due, or the rest of a started poll is still owed.
    pub fn wants_command(&self, now: Instant) -> bool {
        self.next != Query::Signal || self.next_due.map_or(true, |due| now >= due)
    }

    /// Drop a due poll instead of queueing it behind other traffic.
    pub fn skip(&mut self, now: Instant) {
        if self.wants_command(now) {
            debug!("Skipping telemetry poll");
            self.schedule(now);
        }
    }

    pub fn issue<T>(&mut self, at: &mut Dispatcher<T>, now: Instant) -> Result<(), Error>
    where
        T: Read + Write + ReadReady,
    {
        match self.next {
            Query::Signal => at.send(&GetSignalQuality, Expect::ok(), Owner::Telemetry, now),
            Query::Battery => at.send(&GetBatteryCharge, Expect::ok(), Owner::Telemetry, now),
            Query::Registration => at.send(
                &GetNetworkRegistrationStatus,
                Expect::ok(),
                Owner::Telemetry,
                now,
            ),
        }
    }

    /// Fold the outcome of the last query into the snapshot. A failed or
    /// unknown reading keeps the previous value.
    pub fn on_complete(&mut self, result: Result<Response, Failure>, now: Instant) -> Option<Sample> {
        let query = self.next;
        let lines = match result {
            Ok(resp) => Some(resp.lines),
            Err(f) => {
                warn!("Telemetry query {:?} failed: {:?}", query, f.error);
                None
            }
        };

        match query {
            Query::Signal => {
                self.next = Query::Battery;
                match lines.map(|l| parser::signal_strength(&l)) {
                    Some(Ok(Some(dbm))) => {
                        debug!("Signal strength {} dBm", dbm);
                        self.snapshot.signal_strength = Some(dbm);
                        Some(Sample::Signal(dbm))
                    }
                    Some(Ok(None)) => {
                        debug!("Signal strength unknown");
                        None
                    }
                    _ => None,
                }
            }
            Query::Battery => {
                self.next = Query::Registration;
                match lines.map(|l| parser::battery(&l)) {
                    Some(Ok(battery)) => {
                        debug!(
                            "Battery {}% {} V",
                            battery.level, battery.voltage
                        );
                        self.snapshot.battery_level = Some(battery.level);
                        self.snapshot.battery_voltage = Some(battery.voltage);
                        Some(Sample::Battery {
                            level: battery.level,
                            voltage: battery.voltage,
                        })
                    }
                    _ => None,
                }
            }
            Query::Registration => {
                self.schedule(now);
                match lines.map(|l| parser::registration(&l)) {
                    Some(Ok(status)) => Some(Sample::Registration(status)),
                    _ => None,
                }
            }
        }
    }

    fn schedule(&mut self, now: Instant) {
        self.next = Query::Signal;
        self.next_due = Some(now + self.interval);
    }
}
