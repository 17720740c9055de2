//! Argument and parameter types used by Bearer Commands and Responses

use atat::atat_derive::AtatEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, AtatEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BearerState {
    Connecting = 0,
    Connected = 1,
    Closing = 2,
    Closed = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BearerParameter {
    /// Type of internet connection, always `GPRS` here
    ContentType,
    Apn,
    User,
    Password,
}

impl BearerParameter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContentType => "CONTYPE",
            Self::Apn => "APN",
            Self::User => "USER",
            Self::Password => "PWD",
        }
    }
}
