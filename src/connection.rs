use embassy_time::{Duration, Instant};
use embedded_io::{Read, ReadReady, Write};

use crate::command::bearer::types::{BearerParameter, BearerState};
use crate::command::bearer::{GetBearerStatus, OpenBearer, SetBearerParameter, BEARER_PROFILE};
use crate::command::control::{types::Echo, SetEcho};
use crate::command::device_lock::{types::PinStatusCode, GetPinStatus, SetPin};
use crate::command::general::AT;
use crate::command::mobile_control::{types::SlowClock, SetSlowClock};
use crate::command::network_service::GetNetworkRegistrationStatus;
use crate::config::Config;
use crate::dispatcher::{Dispatcher, Expect, Failure, Owner, Response};
use crate::error::Error;
use crate::module_timing;
use crate::parser;
use crate::registration::{RegistrationStatus, Status};

/// `AT` attempts before giving up on the module answering at all
const ATTENTION_ATTEMPTS: u8 = 10;
/// `AT+CPIN?` polls while the SIM initializes
const SIM_ATTEMPTS: u8 = 10;
/// `AT+CREG?` polls while the module searches for a network
const REGISTRATION_ATTEMPTS: u8 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    Uninitialized,
    CheckingModem,
    WaitingSimReady,
    RegisteringNetwork,
    AttachingBearer,
    Ready,
    Failed,
}

impl ConnectionState {
    /// States only move forward. `Failed` can be entered from anywhere and is
    /// left only by restarting at `CheckingModem`.
    pub fn can_advance_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Failed, Self::CheckingModem) => true,
            (Self::Failed, _) => false,
            (_, Self::Failed) => true,
            (current, next) => next > current,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Step {
    Attention,
    DisableEcho,
    DisableSlowClock,
    QueryPin,
    EnterPin,
    QueryRegistration,
    SetContentType,
    SetApn,
    SetUser,
    SetPassword,
    OpenBearer,
    QueryBearer,
}

/// Brings the module from power up to an attached GPRS bearer.
///
/// Every step is a single command round trip through the [`Dispatcher`]. The
/// machine only decides which command comes next; the driver calls
/// [`Connection::issue`] when the dispatcher is free and feeds the outcome
/// back through [`Connection::on_complete`].
pub struct Connection {
    state: ConnectionState,
    step: Step,
    max_retry_attempts: u8,
    retry_count: u8,
    resume_at: Instant,
    failures: u8,
    fatal: bool,
    pin_entered: bool,
    last_error: Option<Error>,
    registration: RegistrationStatus,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Uninitialized,
            step: Step::Attention,
            max_retry_attempts: ATTENTION_ATTEMPTS,
            retry_count: 0,
            resume_at: Instant::from_ticks(0),
            failures: 0,
            fatal: false,
            pin_entered: false,
            last_error: None,
            registration: RegistrationStatus::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// Error that sent the machine to `Failed` most recently
    pub fn last_error(&self) -> Option<Error> {
        self.last_error
    }

    pub fn registration(&self) -> &RegistrationStatus {
        &self.registration
    }

    /// Registration state polled after bring-up. Losing the network drops an
    /// established connection.
    pub fn registration_report(&mut self, status: Status, now: Instant) {
        self.registration.set_status(status, now);
        if self.is_ready() && !status.registered() {
            warn!("Network registration lost: {:?}", status);
            self.fail(Error::NotReady, now);
        }
    }

    /// Leave `Uninitialized`, and `Failed` once its cooldown has passed.
    pub fn poll(&mut self, now: Instant) {
        match self.state {
            ConnectionState::Uninitialized => {
                self.set_state(ConnectionState::CheckingModem, Step::Attention);
                self.resume_at = now + module_timing::boot_time();
            }
            ConnectionState::Failed if !self.fatal && now >= self.resume_at => {
                info!("Restarting modem bring-up");
                self.pin_entered = false;
                self.registration.reset();
                self.set_state(ConnectionState::CheckingModem, Step::Attention);
                self.resume_at = now;
            }
            _ => {}
        }
    }

    /// A bring-up command is due
    pub fn wants_command(&self, now: Instant) -> bool {
        matches!(
            self.state,
            ConnectionState::CheckingModem
                | ConnectionState::WaitingSimReady
                | ConnectionState::RegisteringNetwork
                | ConnectionState::AttachingBearer
        ) && now >= self.resume_at
    }

    /// The bearer went away underneath an established connection.
    pub fn bearer_lost(&mut self, now: Instant) {
        if self.is_ready() {
            warn!("GPRS bearer lost");
            self.fail(Error::BearerLost, now);
        }
    }

    /// Send the command for the current step.
    pub fn issue<T>(
        &mut self,
        at: &mut Dispatcher<T>,
        config: &Config,
        now: Instant,
    ) -> Result<(), Error>
    where
        T: Read + Write + ReadReady,
    {
        let res = self.send(at, config, now);
        if let Err(e) = res {
            self.fail(e, now);
        }
        res
    }

    fn send<T>(&mut self, at: &mut Dispatcher<T>, config: &Config, now: Instant) -> Result<(), Error>
    where
        T: Read + Write + ReadReady,
    {
        let credentials = config.credentials();
        let owner = Owner::Connection;
        let expect = Expect::ok();

        match self.step {
            Step::Attention => at.send(&AT, expect, owner, now),
            Step::DisableEcho => at.send(
                &SetEcho {
                    enabled: Echo::Off,
                },
                expect,
                owner,
                now,
            ),
            Step::DisableSlowClock => at.send(
                &SetSlowClock {
                    mode: SlowClock::Disabled,
                },
                expect,
                owner,
                now,
            ),
            Step::QueryPin => at.send(&GetPinStatus, expect, owner, now),
            Step::EnterPin => {
                let pin = config.pin.as_ref().ok_or(Error::SimLocked)?;
                at.send(&SetPin { pin: pin.as_str() }, expect, owner, now)
            }
            Step::QueryRegistration => at.send(&GetNetworkRegistrationStatus, expect, owner, now),
            Step::SetContentType => at.send(
                &SetBearerParameter {
                    cid: BEARER_PROFILE,
                    tag: BearerParameter::ContentType.as_str(),
                    value: "GPRS",
                },
                expect,
                owner,
                now,
            ),
            Step::SetApn | Step::SetUser | Step::SetPassword => {
                let (tag, value) = match self.step {
                    Step::SetApn => (BearerParameter::Apn, credentials.apn()),
                    Step::SetUser => (BearerParameter::User, credentials.user()),
                    _ => (BearerParameter::Password, credentials.password()),
                };
                at.send(
                    &SetBearerParameter {
                        cid: BEARER_PROFILE,
                        tag: tag.as_str(),
                        value: value.unwrap_or_default(),
                    },
                    expect,
                    owner,
                    now,
                )
            }
            Step::OpenBearer => at.send(
                &OpenBearer {
                    cid: BEARER_PROFILE,
                },
                expect,
                owner,
                now,
            ),
            Step::QueryBearer => at.send(
                &GetBearerStatus {
                    cid: BEARER_PROFILE,
                },
                expect,
                owner,
                now,
            ),
        }
    }

    /// Advance on the outcome of the command sent by [`Connection::issue`].
    pub fn on_complete(&mut self, result: Result<Response, Failure>, config: &Config, now: Instant) {
        match (self.step, result) {
            (Step::Attention, Ok(_)) => self.next_step(Step::DisableEcho, now),
            (Step::Attention, Err(f)) => {
                self.retry_or_fail(f.error, module_timing::error_wait(), now)
            }

            (Step::DisableEcho, Ok(_)) if config.idle_sleep() => {
                // A previous run may have left the module in slow clock mode
                self.next_step(Step::DisableSlowClock, now)
            }
            (Step::DisableEcho | Step::DisableSlowClock, Ok(_)) => {
                self.set_state(ConnectionState::WaitingSimReady, Step::QueryPin);
                self.max_retry_attempts = SIM_ATTEMPTS;
            }

            (Step::QueryPin, Ok(resp)) => match parser::pin_status(&resp.lines) {
                Ok(PinStatusCode::Ready) => {
                    self.set_state(ConnectionState::RegisteringNetwork, Step::QueryRegistration);
                    self.max_retry_attempts = REGISTRATION_ATTEMPTS;
                }
                Ok(PinStatusCode::SimPin) if config.pin.is_some() && !self.pin_entered => {
                    self.next_step(Step::EnterPin, now)
                }
                Ok(PinStatusCode::SimPin) if self.pin_entered => {
                    // The SIM takes a moment to accept the PIN
                    self.retry_or_fail(Error::SimLocked, module_timing::sim_poll_interval(), now)
                }
                Ok(PinStatusCode::SimPuk | PinStatusCode::SimPuk2 | PinStatusCode::PhSimPuk) => {
                    error!("SIM is PUK locked");
                    self.fail_permanently(Error::SimLocked);
                }
                Ok(code) if code.is_transient() => {
                    self.retry_or_fail(Error::NotReady, module_timing::sim_poll_interval(), now)
                }
                Ok(code) => {
                    error!("SIM requires {:?}", code);
                    self.fail(Error::SimLocked, now);
                }
                Err(e) => self.retry_or_fail(e, module_timing::sim_poll_interval(), now),
            },
            // No SIM or SIM still busy is reported as +CME ERROR
            (Step::QueryPin, Err(f)) => {
                self.retry_or_fail(f.error, module_timing::sim_poll_interval(), now)
            }

            (Step::EnterPin, Ok(_)) => {
                info!("SIM PIN accepted");
                self.pin_entered = true;
                self.step = Step::QueryPin;
                self.resume_at = now + module_timing::sim_poll_interval();
            }
            (Step::EnterPin, Err(f)) => {
                error!("SIM PIN rejected, not retrying");
                self.fail_permanently(f.error);
            }

            (Step::QueryRegistration, Ok(resp)) => match parser::registration(&resp.lines) {
                Ok(status) => {
                    self.registration.set_status(status, now);
                    if status.registered() {
                        info!("Registered on network ({:?})", status);
                        self.set_state(ConnectionState::AttachingBearer, Step::SetContentType);
                    } else if status == Status::Denied {
                        error!("Network registration denied");
                        self.fail(Error::ModemRejected, now);
                    } else {
                        debug!(
                            "Registration {:?} for {} s",
                            status,
                            self.registration.elapsed(now).as_secs()
                        );
                        self.retry_or_fail(
                            Error::NotReady,
                            module_timing::registration_poll_interval(),
                            now,
                        )
                    }
                }
                Err(e) => self.retry_or_fail(e, module_timing::registration_poll_interval(), now),
            },
            (Step::QueryRegistration, Err(f)) => {
                self.retry_or_fail(f.error, module_timing::registration_poll_interval(), now)
            }

            (
                step @ (Step::SetContentType | Step::SetApn | Step::SetUser | Step::SetPassword),
                Ok(_),
            ) => {
                let next = next_bearer_step(step, config);
                self.next_step(next, now);
            }

            (Step::OpenBearer, Ok(_)) => self.ready(),
            // Opening an already open bearer is rejected, check before failing
            (Step::OpenBearer, Err(Failure {
                error: Error::ModemRejected,
                ..
            })) => self.next_step(Step::QueryBearer, now),

            (Step::QueryBearer, Ok(resp)) => match parser::bearer_state(&resp.lines) {
                Ok(BearerState::Connected) => self.ready(),
                Ok(state) => {
                    error!("Bearer did not open: {:?}", state);
                    self.fail(Error::BearerLost, now);
                }
                Err(e) => self.fail(e, now),
            },

            (_, Err(f)) => self.fail(f.error, now),
        }
    }

    fn set_state(&mut self, state: ConnectionState, step: Step) {
        debug!("Connection state: {:?} -> {:?}", self.state, state);
        debug_assert!(self.state.can_advance_to(state));

        // Reset the retry budget on any state transition
        self.max_retry_attempts = ATTENTION_ATTEMPTS;
        self.retry_count = 0;
        self.state = state;
        self.step = step;
    }

    fn next_step(&mut self, step: Step, now: Instant) {
        trace!("Connection step: {:?} -> {:?}", self.step, step);
        self.step = step;
        self.retry_count = 0;
        self.resume_at = now;
    }

    fn retry_or_fail(&mut self, error: Error, delay: Duration, now: Instant) {
        self.retry_count += 1;
        if self.retry_count >= self.max_retry_attempts {
            error!(
                "{:?} gave up after {} attempts: {:?}",
                self.step, self.retry_count, error
            );
            self.fail(error, now);
            return;
        }

        warn!(
            "[RETRY] {:?} attempt {}, retrying in {} ms",
            self.step,
            self.retry_count,
            delay.as_millis()
        );
        self.resume_at = now + delay;
    }

    fn ready(&mut self) {
        self.set_state(ConnectionState::Ready, self.step);
        self.failures = 0;
        self.last_error = None;
        info!("GPRS bearer attached");
    }

    fn fail(&mut self, error: Error, now: Instant) {
        let cooldown = module_timing::backoff(self.failures);
        warn!(
            "Connection failed in {:?}: {:?}, restarting in {} s",
            self.state,
            error,
            cooldown.as_secs()
        );
        self.set_state(ConnectionState::Failed, self.step);
        self.failures = self.failures.saturating_add(1);
        self.last_error = Some(error);
        self.resume_at = now + cooldown;
    }

    fn fail_permanently(&mut self, error: Error) {
        self.set_state(ConnectionState::Failed, self.step);
        self.fatal = true;
        self.last_error = Some(error);
    }
}

/// Bearer parameter following `after`, skipping credentials that are not
/// configured.
fn next_bearer_step(after: Step, config: &Config) -> Step {
    let credentials = config.credentials();
    let order = [
        (Step::SetApn, credentials.apn().is_some()),
        (Step::SetUser, credentials.user().is_some()),
        (Step::SetPassword, credentials.password().is_some()),
    ];
    let start = match after {
        Step::SetContentType => 0,
        Step::SetApn => 1,
        Step::SetUser => 2,
        _ => 3,
    };
    order[start..]
        .iter()
        .find(|(_, configured)| *configured)
        .map(|(step, _)| *step)
        .unwrap_or(Step::OpenBearer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{init_logger, MockModem};
    use crate::dispatcher::Event;

    const OK: &str = "\r\nOK\r\n";

    struct Harness {
        modem: MockModem,
        at: Dispatcher<MockModem>,
        connection: Connection,
        config: Config,
        now: u64,
        states: std::vec::Vec<ConnectionState>,
    }

    impl Harness {
        fn new(config: Config) -> Self {
            init_logger();
            let modem = MockModem::new();
            Self {
                at: Dispatcher::new(modem.clone()),
                modem,
                connection: Connection::new(),
                config,
                now: 0,
                states: std::vec::Vec::new(),
            }
        }

        fn tick(&mut self) {
            let now = Instant::from_millis(self.now);
            self.connection.poll(now);
            if let Ok(Some(Event::Completed(c))) = self.at.poll(now) {
                self.connection.on_complete(c.result, &self.config, now);
            }
            if self.at.is_idle() && self.connection.wants_command(now) {
                let _ = self.connection.issue(&mut self.at, &self.config, now);
            }
            let state = self.connection.state();
            if self.states.last() != Some(&state) {
                self.states.push(state);
            }
        }

        fn run(&mut self, ticks: usize, step_ms: u64) {
            for _ in 0..ticks {
                self.tick();
                self.now += step_ms;
            }
        }
    }

    fn script_bring_up(modem: &MockModem) {
        modem
            .reply("AT", OK)
            .reply("ATE0", OK)
            .reply("AT+CPIN?", "\r\n+CPIN: READY\r\n\r\nOK\r\n")
            .reply("AT+CREG?", "\r\n+CREG: 0,1\r\n\r\nOK\r\n")
            .reply("AT+SAPBR=3,1,\"CONTYPE\",\"GPRS\"", OK)
            .reply("AT+SAPBR=3,1,\"APN\",\"internet\"", OK)
            .reply("AT+SAPBR=1,1", OK);
    }

    #[test]
    fn brings_up_in_order() {
        let mut h = Harness::new(Config::new().with_apn("internet").unwrap());
        script_bring_up(&h.modem);
        h.run(20, 1_000);

        assert_eq!(
            h.states,
            [
                ConnectionState::CheckingModem,
                ConnectionState::WaitingSimReady,
                ConnectionState::RegisteringNetwork,
                ConnectionState::AttachingBearer,
                ConnectionState::Ready,
            ]
        );
        assert_eq!(
            h.modem.written(),
            [
                "AT",
                "ATE0",
                "AT+CPIN?",
                "AT+CREG?",
                "AT+SAPBR=3,1,\"CONTYPE\",\"GPRS\"",
                "AT+SAPBR=3,1,\"APN\",\"internet\"",
                "AT+SAPBR=1,1",
            ]
        );
        assert!(h.connection.registration().status().registered());
    }

    #[test]
    fn no_commands_before_boot_time() {
        let mut h = Harness::new(Config::new());
        h.tick();
        assert!(h.modem.written().is_empty());
        h.now = module_timing::boot_time().as_millis();
        h.tick();
        assert_eq!(h.modem.written(), ["AT"]);
    }

    #[test]
    fn sim_not_ready_blocks_registration() {
        let mut h = Harness::new(Config::new());
        h.modem.reply("AT", OK).reply("ATE0", OK);
        for _ in 0..SIM_ATTEMPTS {
            h.modem.reply("AT+CPIN?", "\r\n+CPIN: NOT READY\r\n\r\nOK\r\n");
        }
        h.run(40, 1_000);

        assert!(!h.states.contains(&ConnectionState::RegisteringNetwork));
        assert!(h.states.contains(&ConnectionState::Failed));
        assert_eq!(h.connection.last_error(), Some(Error::NotReady));
        assert!(!h.modem.written().iter().any(|c| c.starts_with("AT+CREG")));
    }

    #[test]
    fn searching_network_blocks_bearer() {
        let mut h = Harness::new(Config::new());
        h.modem
            .reply("AT", OK)
            .reply("ATE0", OK)
            .reply("AT+CPIN?", "\r\n+CPIN: READY\r\n\r\nOK\r\n")
            .reply("AT+CREG?", "\r\n+CREG: 0,2\r\n\r\nOK\r\n")
            .reply("AT+CREG?", "\r\n+CREG: 0,3\r\n\r\nOK\r\n");
        h.run(20, 1_000);

        assert!(!h.states.contains(&ConnectionState::AttachingBearer));
        assert!(h.states.contains(&ConnectionState::Failed));
        assert_eq!(h.connection.last_error(), Some(Error::ModemRejected));
        assert!(!h.modem.written().iter().any(|c| c.starts_with("AT+SAPBR")));
    }

    #[test]
    fn empty_credentials_are_not_sent() {
        let mut h = Harness::new(Config::new());
        h.modem
            .reply("AT", OK)
            .reply("ATE0", OK)
            .reply("AT+CPIN?", "\r\n+CPIN: READY\r\n\r\nOK\r\n")
            .reply("AT+CREG?", "\r\n+CREG: 0,5\r\n\r\nOK\r\n")
            .reply("AT+SAPBR=3,1,\"CONTYPE\"", OK)
            .reply("AT+SAPBR=1,1", OK);
        h.run(20, 1_000);

        assert!(h.connection.is_ready());
        assert!(!h.modem.written().iter().any(|c| c.contains("\"APN\"")));
    }

    #[test]
    fn open_error_with_connected_bearer_is_ready() {
        let mut h = Harness::new(Config::new());
        h.modem
            .reply("AT", OK)
            .reply("ATE0", OK)
            .reply("AT+CPIN?", "\r\n+CPIN: READY\r\n\r\nOK\r\n")
            .reply("AT+CREG?", "\r\n+CREG: 0,1\r\n\r\nOK\r\n")
            .reply("AT+SAPBR=3,1,\"CONTYPE\"", OK)
            .reply("AT+SAPBR=1,1", "\r\nERROR\r\n")
            .reply("AT+SAPBR=2,1", "\r\n+SAPBR: 1,1,\"10.0.0.7\"\r\n\r\nOK\r\n");
        h.run(20, 1_000);

        assert!(h.connection.is_ready());
        assert_eq!(h.modem.last_written().as_deref(), Some("AT+SAPBR=2,1"));
    }

    #[test]
    fn failed_backs_off_then_restarts() {
        let mut h = Harness::new(Config::new());
        h.modem.reply("AT", OK).reply("ATE0", "\r\nERROR\r\n");
        h.run(5, 1_000);
        assert_eq!(h.connection.state(), ConnectionState::Failed);
        assert_eq!(h.connection.last_error(), Some(Error::ModemRejected));

        // Nothing is sent during the cooldown
        let sent = h.modem.written().len();
        h.run(3, 1_000);
        assert_eq!(h.modem.written().len(), sent);

        h.modem.reply("AT", OK);
        h.run(3, 1_000);
        assert_eq!(h.modem.written().last().map(|s| s.as_str()), Some("ATE0"));
        assert!(h.states.ends_with(&[
            ConnectionState::Failed,
            ConnectionState::CheckingModem
        ]));
    }

    #[test]
    fn wrong_pin_is_not_retried() {
        let config = Config::new().with_pin("1234").unwrap();
        let mut h = Harness::new(config);
        h.modem
            .reply("AT", OK)
            .reply("ATE0", OK)
            .reply("AT+CPIN?", "\r\n+CPIN: SIM PIN\r\n\r\nOK\r\n")
            .reply("AT+CPIN=\"1234\"", "\r\n+CME ERROR: 16\r\n");
        h.run(400, 1_000);

        assert_eq!(h.connection.state(), ConnectionState::Failed);
        let pin_attempts = h
            .modem
            .written()
            .iter()
            .filter(|c| c.starts_with("AT+CPIN=\""))
            .count();
        assert_eq!(pin_attempts, 1);
    }

    #[test]
    fn pin_is_entered_once() {
        let config = Config::new().with_pin("1234").unwrap();
        let mut h = Harness::new(config);
        h.modem
            .reply("AT", OK)
            .reply("ATE0", OK)
            .reply("AT+CPIN?", "\r\n+CPIN: SIM PIN\r\n\r\nOK\r\n")
            .reply("AT+CPIN=\"1234\"", OK)
            .reply("AT+CPIN?", "\r\n+CPIN: READY\r\n\r\nOK\r\n");
        h.run(8, 1_000);
        assert_eq!(h.connection.state(), ConnectionState::RegisteringNetwork);
    }

    #[test]
    fn idle_sleep_disables_slow_clock_at_start() {
        let mut h = Harness::new(Config::new().with_idle_sleep(5));
        h.modem
            .reply("AT", OK)
            .reply("ATE0", OK)
            .reply("AT+CSCLK=0", OK);
        h.run(5, 1_000);
        assert_eq!(h.modem.written()[..3], ["AT", "ATE0", "AT+CSCLK=0"]);
        assert_eq!(h.connection.state(), ConnectionState::WaitingSimReady);
    }

    #[test]
    fn autobaud_retries_until_answer() {
        let mut h = Harness::new(Config::new());
        // First attempts go unanswered
        h.run(6, 500);
        h.modem.reply("AT", OK).reply("ATE0", OK);
        h.run(6, 500);
        let attempts = h.modem.written().iter().filter(|c| *c == "AT").count();
        assert!(attempts >= 2);
        assert_eq!(h.connection.state(), ConnectionState::WaitingSimReady);
    }

    #[test]
    fn rejected_attention_waits_before_retry() {
        let mut h = Harness::new(Config::new());
        h.modem.reply("AT", "\r\nERROR\r\n").reply("AT", OK);
        h.run(21, 100);
        assert_eq!(h.modem.written(), ["AT"]);

        h.run(2, 100);
        assert_eq!(h.modem.written()[..2], ["AT", "AT"]);
        assert_eq!(h.connection.state(), ConnectionState::CheckingModem);
    }

    #[test]
    fn puk_locked_sim_is_not_retried() {
        let mut h = Harness::new(Config::new().with_pin("1234").unwrap());
        h.modem
            .reply("AT", OK)
            .reply("ATE0", OK)
            .reply("AT+CPIN?", "\r\n+CPIN: SIM PUK\r\n\r\nOK\r\n");
        h.run(400, 1_000);

        assert_eq!(h.connection.state(), ConnectionState::Failed);
        assert_eq!(h.connection.last_error(), Some(Error::SimLocked));
        // Neither a PIN nor a restart
        assert_eq!(h.modem.written(), ["AT", "ATE0", "AT+CPIN?"]);
    }

    #[test]
    fn sim_pin_without_configured_pin_fails() {
        let mut h = Harness::new(Config::new());
        h.modem
            .reply("AT", OK)
            .reply("ATE0", OK)
            .reply("AT+CPIN?", "\r\n+CPIN: SIM PIN\r\n\r\nOK\r\n");
        h.run(5, 1_000);

        assert_eq!(h.connection.state(), ConnectionState::Failed);
        assert_eq!(h.connection.last_error(), Some(Error::SimLocked));
        assert!(!h.modem.written().iter().any(|c| c.starts_with("AT+CPIN=")));
    }

    #[test]
    fn missing_sim_is_polled_again() {
        let mut h = Harness::new(Config::new());
        h.modem
            .reply("AT", OK)
            .reply("ATE0", OK)
            .reply("AT+CPIN?", "\r\n+CPIN: NOT INSERTED\r\n\r\nOK\r\n")
            .reply("AT+CPIN?", "\r\n+CPIN: READY\r\n\r\nOK\r\n");
        h.run(8, 1_000);

        assert_eq!(h.connection.state(), ConnectionState::RegisteringNetwork);
        assert!(h.connection.last_error().is_none());
    }

    #[test]
    fn lost_registration_drops_ready() {
        let mut h = Harness::new(Config::new().with_apn("internet").unwrap());
        script_bring_up(&h.modem);
        h.run(20, 1_000);
        assert!(h.connection.is_ready());

        let now = Instant::from_millis(h.now);
        h.connection.registration_report(Status::Roaming, now);
        assert!(h.connection.is_ready());

        h.connection.registration_report(Status::Searching, now);
        assert_eq!(h.connection.state(), ConnectionState::Failed);
        assert_eq!(h.connection.last_error(), Some(Error::NotReady));
        assert_eq!(h.connection.registration().status(), Status::Searching);
    }

    #[test]
    fn states_only_move_forward() {
        use ConnectionState::*;
        assert!(CheckingModem.can_advance_to(WaitingSimReady));
        assert!(WaitingSimReady.can_advance_to(Failed));
        assert!(Failed.can_advance_to(CheckingModem));
        assert!(!Failed.can_advance_to(Ready));
        assert!(!RegisteringNetwork.can_advance_to(WaitingSimReady));
        assert!(!Ready.can_advance_to(AttachingBearer));
    }

    #[test]
    fn bearer_loss_only_matters_when_ready() {
        let mut connection = Connection::new();
        connection.bearer_lost(Instant::from_millis(0));
        assert_eq!(connection.state(), ConnectionState::Uninitialized);
    }
}
