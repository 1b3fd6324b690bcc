use std::time::{Duration, Instant};

/// # Timer clock
/// Decides when the delay and sound timers are due a tick.
///
/// The timers run off the wall clock rather than the instruction count, so they count down at the
/// same rate however fast the CPU loop spins. The loop polls the clock once per iteration.
#[derive(Debug)]
pub struct TimerClock {
    period: Duration,
    last_tick: Instant,
}

impl TimerClock {
    pub fn new(hz: u32, now: Instant) -> Self {
        TimerClock {
            period: Duration::from_secs(1) / hz.max(1),
            last_tick: now,
        }
    }

    /// Returns true, and restarts the period, if at least one period has passed since the last tick
    pub fn poll(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_tick) >= self.period {
            self.last_tick = now;
            true
        } else {
            false
        }
    }
}

/// # Throttle
/// Optionally paces the loop to a fixed number of instructions per second by sleeping off
/// whatever is left of each cycle.
#[derive(Debug)]
pub struct Throttle {
    cycle_time: Duration,
    last_cycle: Instant,
}

impl Throttle {
    pub fn new(instructions_per_second: u32, now: Instant) -> Self {
        Throttle {
            cycle_time: Duration::from_secs(1) / instructions_per_second.max(1),
            last_cycle: now,
        }
    }

    /// How long to sleep so that one cycle takes at least `cycle_time`
    pub fn remaining(&mut self, now: Instant) -> Option<Duration> {
        let elapsed_cycle_time = now.saturating_duration_since(self.last_cycle);
        self.last_cycle = now;
        if self.cycle_time > elapsed_cycle_time {
            Some(self.cycle_time - elapsed_cycle_time)
        } else {
            None
        }
    }

    pub fn wait(&mut self) {
        if let Some(remaining) = self.remaining(Instant::now()) {
            std::thread::sleep(remaining);
            self.last_cycle = Instant::now();
        }
    }
}
