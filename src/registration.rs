use crate::command::network_service::types::NetworkRegistrationStat;
use embassy_time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    #[default]
    None,
    NotRegistering,
    Home,
    Searching,
    Denied,
    Unknown,
    Roaming,
}

impl From<NetworkRegistrationStat> for Status {
    fn from(v: NetworkRegistrationStat) -> Self {
        match v {
            NetworkRegistrationStat::NotRegistered => Self::NotRegistering,
            NetworkRegistrationStat::Registered => Self::Home,
            NetworkRegistrationStat::Searching => Self::Searching,
            NetworkRegistrationStat::RegistrationDenied => Self::Denied,
            NetworkRegistrationStat::Unknown => Self::Unknown,
            NetworkRegistrationStat::RegisteredRoaming => Self::Roaming,
        }
    }
}

impl Status {
    pub fn registered(self) -> bool {
        matches!(self, Self::Home | Self::Roaming)
    }
}

/// Last circuit switched registration state reported by `+CREG`, with the
/// time it was first seen.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistrationStatus {
    status: Status,
    /// First report of the current status
    since: Option<Instant>,
}

impl RegistrationStatus {
    pub const fn new() -> Self {
        Self {
            status: Status::None,
            since: None,
        }
    }

    /// How long the module has been reporting the current status
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.since
            .map_or(Duration::from_ticks(0), |since| now.saturating_duration_since(since))
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn set_status(&mut self, status: Status, now: Instant) {
        if self.status != status {
            debug!("Registration: {:?} -> {:?}", self.status, status);
            self.status = status;
            self.since = Some(now);
        }
    }
}
