//! Argument and parameter types used by Device lock Commands and Responses

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinStatusCode {
    /// MT is not pending for any password
    Ready,
    /// MT is waiting SIM PIN to be given
    SimPin,
    /// MT is waiting SIM PUK to be given
    SimPuk,
    /// MT is waiting phone-to-SIM card password to be given
    PhSimPin,
    /// MT is waiting phone-to-very first SIM card unblocking password
    PhSimPuk,
    /// MT is waiting SIM PIN2 to be given
    SimPin2,
    /// MT is waiting SIM PUK2 to be given
    SimPuk2,
    /// SIM is still initializing
    NotReady,
    /// No SIM detected, possibly still seating
    NotInserted,
}

impl PinStatusCode {
    /// The SIM is still starting up and polling again may yield `Ready`.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::NotReady | Self::NotInserted)
    }
}
