//! ### Mobile equipment control and status

pub mod responses;
pub mod types;

use atat::atat_derive::AtatCmd;
use responses::*;
use types::*;

use super::NoResponse;

/// Signal quality +CSQ
///
/// Returns the received signal strength indication `<rssi>` and the channel
/// bit error rate `<ber>`.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CSQ", SignalQuality)]
pub struct GetSignalQuality;

/// Battery charge +CBC
///
/// Returns the battery connection and charging status `<bcs>`, the battery
/// charge level `<bcl>` and the supply voltage in millivolts.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CBC", BatteryCharge)]
pub struct GetBatteryCharge;

/// Configure slow clock +CSCLK
///
/// With [`SlowClock::Automatic`] the module enters sleep mode once the UART has
/// been quiet for a while. It wakes on incoming data but drops the first
/// bytes, so the next command must be preceded by a throwaway exchange.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CSCLK", NoResponse)]
pub struct SetSlowClock {
    #[at_arg(position = 0)]
    pub mode: SlowClock,
}
