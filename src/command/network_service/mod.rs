//! ### Network service

pub mod responses;
pub mod types;

use atat::atat_derive::AtatCmd;
use responses::*;

/// Network registration +CREG
///
/// The read command returns the current `<n>` URC setting together with the
/// circuit switched registration state `<stat>`.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CREG?", NetworkRegistrationStatus)]
pub struct GetNetworkRegistrationStatus;
