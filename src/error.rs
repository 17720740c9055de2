#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// No terminal reply arrived before the command deadline
    TransportTimeout,
    /// The modem answered with `ERROR`, `+CME ERROR` or `+CMS ERROR`
    ModemRejected,
    /// A reply did not have the expected shape
    MalformedReply,
    /// The GPRS bearer is not attached
    NotReady,
    /// A request or command is already in flight
    Busy,
    /// The modem reports the bearer as closed
    BearerLost,
    /// URL is empty, too long or contains a `"`
    InvalidUrl,
    /// A configuration value contains characters the module cannot take
    InvalidArgument,
    /// A value does not fit its fixed-size buffer
    Overflow,
    /// SIM requires a PIN or PUK the driver cannot provide
    SimLocked,
    /// Reading from or writing to the transport failed
    Io,
}
