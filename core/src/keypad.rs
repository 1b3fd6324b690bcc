use std::sync::atomic::{AtomicBool, Ordering};

use crate::constants::KEY_COUNT;
use crate::error::{Result, VmError};

/// # Keypad
/// Pressed status of the 16 hex keys (0..F).
///
/// Every slot is an independent atomic so the input thread never waits on the CPU and the CPU
/// never takes a lock to read or consume a key.
#[derive(Debug, Default)]
pub struct Keypad {
    keys: [AtomicBool; KEY_COUNT],
}

impl Keypad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as pressed. Returns false if there is no such key.
    pub fn press(&self, key: u8) -> bool {
        self.set(key, true)
    }

    /// Marks `key` as released. Returns false if there is no such key.
    pub fn release(&self, key: u8) -> bool {
        self.set(key, false)
    }

    pub fn is_pressed(&self, key: u8) -> Result<bool> {
        self.keys
            .get(key as usize)
            .map(|slot| slot.load(Ordering::Acquire))
            .ok_or(VmError::InvalidKey(key))
    }

    /// Consumes the lowest numbered pressed key, clearing its slot
    pub fn take_any(&self) -> Option<u8> {
        self.keys
            .iter()
            .position(|slot| {
                slot.compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            })
            .map(|key| key as u8)
    }

    /// Releases every key
    pub fn clear(&self) {
        for slot in &self.keys {
            slot.store(false, Ordering::Release);
        }
    }

    fn set(&self, key: u8, pressed: bool) -> bool {
        match self.keys.get(key as usize) {
            Some(slot) => {
                slot.store(pressed, Ordering::Release);
                true
            }
            None => false,
        }
    }
}
