//! ### General Commands

use super::NoResponse;
use atat::atat_derive::AtatCmd;

/// Attention
///
/// Checks the communication between the host and the module. After power up
/// the first `AT` also lets the module detect the host baud rate, so it is
/// sent repeatedly until the module answers `OK`.
#[derive(Clone, AtatCmd)]
#[at_cmd("", NoResponse, timeout_ms = 1000)]
pub struct AT;
