use embassy_time::Duration;

/// Time the module needs after power up before it answers `AT`
pub fn boot_time() -> Duration {
    Duration::from_secs(1)
}

/// Pause before the next command after a failed exchange
pub fn error_wait() -> Duration {
    Duration::from_secs(1)
}

/// Interval between `AT+CPIN?` polls while the SIM is initializing
pub fn sim_poll_interval() -> Duration {
    Duration::from_secs(1)
}

/// Interval between `AT+CREG?` polls while searching for a network
pub fn registration_poll_interval() -> Duration {
    Duration::from_secs(2)
}

/// Deadline for the `AT+CSCLK=0` wake handshake. The first bytes after
/// slow clock only wake the UART, so this is kept short and retried.
pub fn wake_timeout() -> Duration {
    Duration::from_millis(300)
}

/// Cooldown spent in `Failed` after the given number of consecutive failed
/// bring-up cycles, doubling from 5s up to 5 minutes.
pub fn backoff(failures: u8) -> Duration {
    let secs = 5u64 << failures.min(6);
    Duration::from_secs(secs.min(300))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff(0), Duration::from_secs(5));
        assert_eq!(backoff(1), Duration::from_secs(10));
        assert_eq!(backoff(3), Duration::from_secs(40));
        assert_eq!(backoff(6), Duration::from_secs(300));
        assert_eq!(backoff(u8::MAX), Duration::from_secs(300));
    }
}
