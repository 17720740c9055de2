//! Responses for Mobile equipment control and status Commands
use super::types::*;
use atat::atat_derive::AtatResp;

/// Signal quality +CSQ
#[derive(Clone, Debug, PartialEq, Eq, AtatResp)]
pub struct SignalQuality {
    /// 0..=31 on the 27.007 scale, 99 when not known or not detectable
    #[at_arg(position = 0)]
    pub rssi: u8,
    #[at_arg(position = 1)]
    pub ber: u8,
}

/// Battery charge +CBC
#[derive(Clone, Debug, PartialEq, Eq, AtatResp)]
pub struct BatteryCharge {
    #[at_arg(position = 0)]
    pub status: ChargeStatus,
    /// Battery level in percent
    #[at_arg(position = 1)]
    pub level: u8,
    /// Battery voltage in mV
    #[at_arg(position = 2)]
    pub voltage: u16,
}
