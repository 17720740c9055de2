//! Argument and parameter types used by Network service Commands and Responses

use atat::atat_derive::AtatEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, AtatEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetworkRegistrationUrc {
    /// Network registration URC disabled
    Disabled = 0,
    /// `+CREG: <stat>` on every registration change
    Enabled = 1,
    /// `+CREG: <stat>[,<lac>,<ci>]` on every registration or cell change
    EnabledWithLocation = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AtatEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetworkRegistrationStat {
    /// Not registered, the MT is not currently searching a new operator
    NotRegistered = 0,
    /// Registered, home network
    Registered = 1,
    /// Not registered, but the MT is currently searching a new operator
    Searching = 2,
    /// Registration denied
    RegistrationDenied = 3,
    Unknown = 4,
    /// Registered, roaming
    RegisteredRoaming = 5,
}
