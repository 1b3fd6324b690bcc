use crate::constants::{DEFAULT_SCALE, TIMER_HZ};

/// What `RET` does when there is nothing on the call stack
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Underflow {
    /// Stop the run with a StackUnderflow error
    Fault,
    /// Treat the return as a no-op and carry on with the next instruction
    Ignore,
}

/// Dialect toggles for behavior that differs between interpreters.
/// The defaults keep this interpreter's own dialect.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Quirks {
    /// `SHL` stores 0/1 in VF instead of the raw masked high bit (0x00/0x80)
    pub normalize_shift_carry: bool,
    pub underflow: Underflow,
}

impl Default for Quirks {
    fn default() -> Self {
        Quirks {
            normalize_shift_carry: false,
            underflow: Underflow::Fault,
        }
    }
}

/// Machine settings, fixed for the lifetime of a machine
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Physical pixels per logical pixel along each axis
    pub scale: usize,
    /// Rate at which the delay and sound timers count down
    pub timer_hz: u32,
    /// Upper bound on instructions executed per second; None runs as fast as possible
    pub instructions_per_second: Option<u32>,
    pub quirks: Quirks,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scale: DEFAULT_SCALE,
            timer_hz: TIMER_HZ,
            instructions_per_second: None,
            quirks: Quirks::default(),
        }
    }
}
