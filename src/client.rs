use embassy_time::Instant;
use embedded_io::{Read, ReadReady, Write};

use crate::command::bearer::BEARER_DEACTIVATED;
use crate::config::Config;
use crate::connection::{Connection, ConnectionState};
use crate::dispatcher::{Completion, Dispatcher, Event, Owner};
use crate::error::Error;
use crate::http::{Finished, HttpEngine, HttpState};
use crate::line_reader::Line;
use crate::registration::Status;
use crate::sleep::IdleSleep;
use crate::telemetry::{Sample, Telemetry, TelemetrySnapshot};
use crate::traits::{Clock, Sensor};

/// SIM800L driver.
///
/// Owns the transport and advances one step per [`Sim800l::tick`]: connection
/// bring-up first, then a pending HTTP request, then telemetry. Exactly one AT
/// command is in flight at any time. Outcomes are reported through the
/// callbacks handed to [`Sim800l::new`], invoked from within `tick` or
/// [`Sim800l::http_get`].
pub struct Sim800l<'a, T, C>
where
    T: Read + Write + ReadReady,
    C: Clock,
{
    at: Dispatcher<T>,
    clock: C,
    config: Config,
    connection: Connection,
    http: HttpEngine,
    telemetry: Telemetry,
    sleep: IdleSleep,
    on_done: &'a mut dyn FnMut(u16, &str),
    on_failed: &'a mut dyn FnMut(Error),
    signal_strength: Option<&'a mut dyn Sensor>,
    battery_level: Option<&'a mut dyn Sensor>,
    battery_voltage: Option<&'a mut dyn Sensor>,
}

impl<'a, T, C> Sim800l<'a, T, C>
where
    T: Read + Write + ReadReady,
    C: Clock,
{
    /// `on_done` receives the status code and body of every completed
    /// request, whatever the status. `on_failed` fires for requests that did
    /// not produce a response.
    pub fn new(
        io: T,
        clock: C,
        config: Config,
        on_done: &'a mut dyn FnMut(u16, &str),
        on_failed: &'a mut dyn FnMut(Error),
    ) -> Self {
        Self {
            at: Dispatcher::new(io),
            clock,
            connection: Connection::new(),
            http: HttpEngine::new(config.http_timeout),
            telemetry: Telemetry::new(config.update_interval),
            sleep: IdleSleep::new(config.idle_sleep, config.idle_ticks),
            config,
            on_done,
            on_failed,
            signal_strength: None,
            battery_level: None,
            battery_voltage: None,
        }
    }

    /// Publish the signal strength in dBm
    pub fn with_signal_strength_sensor(mut self, sensor: &'a mut dyn Sensor) -> Self {
        self.signal_strength = Some(sensor);
        self
    }

    /// Publish the battery level in percent
    pub fn with_battery_level_sensor(mut self, sensor: &'a mut dyn Sensor) -> Self {
        self.battery_level = Some(sensor);
        self
    }

    /// Publish the battery voltage in volts
    pub fn with_battery_voltage_sensor(mut self, sensor: &'a mut dyn Sensor) -> Self {
        self.battery_voltage = Some(sensor);
        self
    }

    pub fn dump_config(&self) {
        let credentials = self.config.credentials();
        info!("SIM800L:");
        info!("  APN: {}", credentials.apn().unwrap_or("<module default>"));
        info!("  APN user: {}", credentials.user().unwrap_or("<none>"));
        info!("  APN password set: {}", credentials.password().is_some());
        info!("  SIM PIN set: {}", self.config.pin.is_some());
        info!(
            "  Idle sleep: {} after {} ticks",
            self.config.idle_sleep, self.config.idle_ticks
        );
        info!(
            "  Update interval: {} ms",
            self.config.update_interval.as_millis()
        );
        info!("  Signal strength sensor: {}", self.signal_strength.is_some());
        info!("  Battery level sensor: {}", self.battery_level.is_some());
        info!("  Battery voltage sensor: {}", self.battery_voltage.is_some());
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Why the connection last went to `Failed`, cleared once it is ready
    pub fn last_error(&self) -> Option<Error> {
        self.connection.last_error()
    }

    /// Network registration as last reported by the module
    pub fn registration(&self) -> Status {
        self.connection.registration().status()
    }

    /// Sub-state of the request in flight
    pub fn http_state(&self) -> Option<HttpState> {
        self.http.request().map(|r| r.state())
    }

    pub fn telemetry(&self) -> &TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    pub fn is_asleep(&self) -> bool {
        self.sleep.is_asleep()
    }

    /// Start a GET request. Nothing is sent before the next tick.
    ///
    /// A rejected request fires the failed callback before returning the
    /// error.
    pub fn http_get(&mut self, url: &str) -> Result<(), Error> {
        let res = if self.http.is_active() {
            Err(Error::Busy)
        } else if !self.connection.is_ready() {
            Err(Error::NotReady)
        } else {
            self.http.start(url)
        };

        if let Err(e) = res {
            warn!("HTTP request rejected: {:?}", e);
            (self.on_failed)(e);
        }
        res
    }

    /// Advance the driver. Never blocks.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        self.connection.poll(now);

        loop {
            match self.at.poll(now) {
                Ok(Some(Event::Unsolicited(line))) => self.handle_urc(&line, now),
                Ok(Some(Event::Completed(completion))) => {
                    self.route(completion, now);
                    break;
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Transport error: {:?}", e);
                    break;
                }
            }
        }

        if self.at.is_idle() {
            self.schedule(now);
        }
    }

    fn handle_urc(&mut self, line: &Line, now: Instant) {
        if line.starts_with(BEARER_DEACTIVATED) {
            self.connection.bearer_lost(now);
            // No +HTTPACTION: will follow without a bearer
            if self.at.cancel_listen() {
                debug!("Abandoned HTTP notification wait");
            }
        } else {
            trace!("Ignoring unsolicited {}", line.as_str());
        }
    }

    fn route(&mut self, completion: Completion, now: Instant) {
        let Completion { owner, result } = completion;
        match owner {
            Owner::Connection => self.connection.on_complete(result, &self.config, now),
            Owner::Http => {
                if let Some(finished) = self.http.on_complete(result, self.at.data()) {
                    self.finish_http(finished, now);
                }
            }
            Owner::Telemetry => match self.telemetry.on_complete(result, now) {
                Some(Sample::Signal(dbm)) => {
                    if let Some(sensor) = self.signal_strength.as_mut() {
                        sensor.publish(dbm as f32);
                    }
                }
                Some(Sample::Battery { level, voltage }) => {
                    if let Some(sensor) = self.battery_level.as_mut() {
                        sensor.publish(level as f32);
                    }
                    if let Some(sensor) = self.battery_voltage.as_mut() {
                        sensor.publish(voltage);
                    }
                }
                Some(Sample::Registration(status)) => {
                    self.connection.registration_report(status, now)
                }
                None => {}
            },
            Owner::Sleep => self.sleep.on_complete(result),
        }
    }

    /// Pick the next command. Only called with the dispatcher idle.
    fn schedule(&mut self, now: Instant) {
        if self.http.is_active() && !self.connection.is_ready() {
            if let Some(finished) = self.http.abort(Error::BearerLost) {
                self.finish_http(finished, now);
            }
        }

        let http = self.http.is_active();
        if http {
            self.telemetry.skip(now);
        }
        let connection = self.connection.wants_command(now);
        let telemetry = self.connection.is_ready() && self.telemetry.wants_command(now);

        if !(http || connection || telemetry) {
            if self.connection.is_ready() && self.sleep.idle_tick() {
                if let Err(e) = self.sleep.enter(&mut self.at, now) {
                    warn!("Failed to enter slow clock: {:?}", e);
                }
            }
            return;
        }

        self.sleep.reset_idle();
        if self.sleep.is_asleep() {
            if let Err(e) = self.sleep.wake(&mut self.at, now) {
                warn!("Failed to wake module: {:?}", e);
            }
            return;
        }

        if http {
            if let Some(finished) = self.http.issue(&mut self.at, now) {
                self.finish_http(finished, now);
            }
        } else if connection {
            // Failures are folded into the connection state
            let _ = self.connection.issue(&mut self.at, &self.config, now);
        } else if let Err(e) = self.telemetry.issue(&mut self.at, now) {
            warn!("Telemetry poll not sent: {:?}", e);
            self.telemetry.skip(now);
        }
    }

    fn finish_http(&mut self, finished: Finished, now: Instant) {
        match finished {
            Finished::Done { status, body_len } => {
                let body = self
                    .at
                    .data()
                    .get(..body_len)
                    .and_then(|b| core::str::from_utf8(b).ok())
                    .unwrap_or_default();
                info!("HTTP request done: {} ({} bytes)", status, body.len());
                (self.on_done)(status, body);
            }
            Finished::Failed(e) => {
                if e == Error::BearerLost {
                    self.connection.bearer_lost(now);
                }
                (self.on_failed)(e);
            }
        }
    }
}
