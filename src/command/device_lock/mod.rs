//! ### Device lock

mod impl_;
pub mod responses;
pub mod types;

use atat::atat_derive::AtatCmd;
use responses::*;

use super::NoResponse;

/// Read PIN status +CPIN?
///
/// Reports whether the SIM is ready or waiting for a password.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CPIN?", PinStatus, timeout_ms = 5000)]
pub struct GetPinStatus;

/// Enter PIN +CPIN
///
/// Enter PIN. If no PIN request is pending, the corresponding error code is
/// returned. After three wrong attempts the SIM requires the PUK, so a rejected
/// PIN must not be retried automatically.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CPIN", NoResponse, timeout_ms = 5000)]
pub struct SetPin<'a> {
    #[at_arg(position = 0, len = 8)]
    pub pin: &'a str,
}
