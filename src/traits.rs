use embassy_time::Instant;

/// Monotonic time source consulted once per tick.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// [`Clock`] backed by the `embassy-time` driver of the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Externally owned handle that telemetry values are published to.
pub trait Sensor {
    fn publish(&mut self, value: f32);
}

impl<F: FnMut(f32)> Sensor for F {
    fn publish(&mut self, value: f32) {
        self(value)
    }
}
