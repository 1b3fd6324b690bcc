use std::sync::atomic::{AtomicU8, Ordering};

/// Where the machine loop is in its lifecycle
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    /// Nothing loaded yet, or a load is in progress
    Stopped = 0,
    /// Fetching, decoding and executing
    Running = 1,
    /// The last run hit a fatal error; waiting for a new program
    Faulted = 2,
    /// The loop should end. Terminal.
    Exit = 3,
}

impl From<u8> for RunState {
    fn from(value: u8) -> Self {
        match value {
            0 => RunState::Stopped,
            1 => RunState::Running,
            2 => RunState::Faulted,
            _ => RunState::Exit,
        }
    }
}

/// A RunState that can be read and written from any thread without a lock
#[derive(Debug)]
pub struct RunFlag(AtomicU8);

impl RunFlag {
    pub fn new() -> Self {
        RunFlag(AtomicU8::new(RunState::Stopped as u8))
    }

    pub fn get(&self) -> RunState {
        RunState::from(self.0.load(Ordering::Acquire))
    }

    /// Moves to `next` unless the flag has already reached Exit.
    /// Returns whether the transition happened.
    pub fn set(&self, next: RunState) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                match RunState::from(current) {
                    RunState::Exit => None,
                    _ => Some(next as u8),
                }
            })
            .is_ok()
    }

    /// Moves from `from` to `to` only if the flag still reads `from`.
    /// Returns whether the transition happened.
    pub fn transition(&self, from: RunState, to: RunState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Moves to Exit from any state
    pub fn exit(&self) {
        self.0.store(RunState::Exit as u8, Ordering::Release);
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}
