use embassy_time::Duration;
use heapless::String;

use crate::error::Error;

/// Longest access point name the bearer setup accepts
pub const MAX_APN_LEN: usize = 64;
/// Longest APN user name or password
pub const MAX_CREDENTIAL_LEN: usize = 32;
pub const MAX_PIN_LEN: usize = 8;

/// GPRS bearer credentials. Empty fields are not sent to the module, which
/// then uses its own defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub(crate) apn: String<MAX_APN_LEN>,
    pub(crate) user: String<MAX_CREDENTIAL_LEN>,
    pub(crate) password: String<MAX_CREDENTIAL_LEN>,
}

impl Credentials {
    pub fn apn(&self) -> Option<&str> {
        non_empty(&self.apn)
    }

    pub fn user(&self) -> Option<&str> {
        non_empty(&self.user)
    }

    pub fn password(&self) -> Option<&str> {
        non_empty(&self.password)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn bounded<const N: usize>(value: &str) -> Result<String<N>, Error> {
    String::try_from(value).map_err(|_| Error::Overflow)
}

/// Bearer parameters are sent inside double quotes
fn quotable<const N: usize>(value: &str) -> Result<String<N>, Error> {
    if value.contains('"') {
        return Err(Error::InvalidArgument);
    }
    bounded(value)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) credentials: Credentials,
    pub(crate) pin: Option<String<MAX_PIN_LEN>>,
    pub(crate) idle_sleep: bool,
    pub(crate) idle_ticks: u32,
    pub(crate) update_interval: Duration,
    pub(crate) http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            pin: None,
            idle_sleep: false,
            idle_ticks: 10,
            update_interval: Duration::from_secs(10),
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_apn(mut self, apn: &str) -> Result<Self, Error> {
        self.credentials.apn = quotable(apn)?;
        Ok(self)
    }

    pub fn with_apn_user(mut self, user: &str) -> Result<Self, Error> {
        self.credentials.user = quotable(user)?;
        Ok(self)
    }

    pub fn with_apn_password(mut self, password: &str) -> Result<Self, Error> {
        self.credentials.password = quotable(password)?;
        Ok(self)
    }

    /// SIM PIN entered when the SIM reports `SIM PIN`. A rejected PIN is never
    /// retried.
    pub fn with_pin(mut self, pin: &str) -> Result<Self, Error> {
        if pin.is_empty() || !pin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidArgument);
        }
        self.pin = Some(bounded(pin)?);
        Ok(self)
    }

    /// Put the module in slow clock mode after `idle_ticks` ticks without
    /// work.
    pub fn with_idle_sleep(mut self, idle_ticks: u32) -> Self {
        self.idle_sleep = true;
        self.idle_ticks = idle_ticks.max(1);
        self
    }

    /// Interval between signal and battery samples
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    /// How long to wait for the `+HTTPACTION:` notification
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn idle_sleep(&self) -> bool {
        self.idle_sleep
    }
}
