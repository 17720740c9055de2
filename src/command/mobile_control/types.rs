//! Argument and parameter types used by Mobile equipment control and status
//! Commands and Responses

use atat::atat_derive::AtatEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, AtatEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlowClock {
    /// Slow clock disabled
    Disabled = 0,
    /// Slow clock controlled by the DTR pin
    DtrControlled = 1,
    /// Module enters sleep once the serial port has been idle for a while
    Automatic = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AtatEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargeStatus {
    NotCharging = 0,
    Charging = 1,
    ChargingFinished = 2,
}
