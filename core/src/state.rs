use crate::constants::{
    FLAG, MAX_PROGRAM_SIZE, MEMORY_SIZE, PROGRAM_START, REGISTER_COUNT, SPRITE_SHEET, STACK_SIZE,
};
use crate::error::{Result, VmError};

/// A snapshot of the CPU-visible machine state
///
/// ## CPU
/// Registers
/// - (v) 16 primary 8-bit registers (V0..VF)
///     - VF doubles as the carry/borrow/collision flag
/// - (i) a 16-bit memory address register
///
/// Counter
/// - (pc) a 16-bit program counter
///
/// Pointer
/// - (sp) the number of return addresses on the stack
///
/// Timers
/// - 2 8-bit timers (delay & sound), counted down at 60Hz by the machine loop
///
/// ## Memory
/// - 16 entry stack of return addresses
/// - 4096 bytes of addressable memory
///     - 0x000..0x200 is reserved for the interpreter; only the sprite sheet lives there
///     - programs are loaded at 0x200
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct State {
    pub v: [u8; REGISTER_COUNT],
    pub i: u16,
    pub pc: u16,
    pub sp: u8,
    pub delay_timer: u8,
    pub sound_timer: u8,
    pub stack: [u16; STACK_SIZE],
    pub memory: [u8; MEMORY_SIZE],
}

impl State {
    pub fn new() -> Self {
        let mut memory = [0; MEMORY_SIZE];
        memory[..SPRITE_SHEET.len()].copy_from_slice(&SPRITE_SHEET);

        State {
            v: [0; REGISTER_COUNT],
            i: 0,
            pc: PROGRAM_START,
            sp: 0,
            delay_timer: 0,
            sound_timer: 0,
            stack: [0; STACK_SIZE],
            memory,
        }
    }

    /// Resets everything to power-on values and copies `program` in at PROGRAM_START.
    ///
    /// Oversized programs are rejected before anything is touched.
    pub fn load(&mut self, program: &[u8]) -> Result<()> {
        if program.len() > MAX_PROGRAM_SIZE {
            return Err(VmError::ProgramTooLarge {
                len: program.len(),
                max: MAX_PROGRAM_SIZE,
            });
        }
        *self = State::new();
        let start = PROGRAM_START as usize;
        self.memory[start..start + program.len()].copy_from_slice(program);
        Ok(())
    }

    /// Gets the opcode currently pointed at by the pc.
    /// Memory is stored as bytes, but opcodes are 16 bits so we combine two subsequent bytes.
    pub fn fetch(&self) -> Result<u16> {
        let bytes = self.read(self.pc as usize, 2)?;
        Ok(u16::from(bytes[0]) << 8 | u16::from(bytes[1]))
    }

    /// Borrows `len` bytes of memory starting at `addr`
    pub fn read(&self, addr: usize, len: usize) -> Result<&[u8]> {
        match addr.checked_add(len) {
            Some(end) if end <= MEMORY_SIZE => Ok(&self.memory[addr..end]),
            _ => Err(VmError::AddressOutOfRange { addr, len }),
        }
    }

    /// Mutably borrows `len` bytes of memory starting at `addr`.
    /// The interpreter area below PROGRAM_START is never writable.
    pub fn write(&mut self, addr: usize, len: usize) -> Result<&mut [u8]> {
        match addr.checked_add(len) {
            Some(end) if addr >= PROGRAM_START as usize && end <= MEMORY_SIZE => {
                Ok(&mut self.memory[addr..end])
            }
            _ => Err(VmError::AddressOutOfRange { addr, len }),
        }
    }

    /// Moves the pc on to the next instruction
    pub fn advance(&mut self) {
        self.pc = self.pc.wrapping_add(2);
    }

    /// Skips the next instruction if `condition` holds, otherwise just advances
    pub fn skip_if(&mut self, condition: bool) {
        self.pc = self.pc.wrapping_add(if condition { 4 } else { 2 });
    }

    pub fn set_flag(&mut self, value: u8) {
        self.v[FLAG] = value;
    }

    /// Pushes a return address.
    /// The stack pointer must stay below STACK_SIZE after the push.
    pub fn push(&mut self, addr: u16) -> Result<()> {
        let sp = self.sp as usize;
        if sp + 1 >= STACK_SIZE {
            return Err(VmError::StackOverflow { pc: self.pc });
        }
        self.stack[sp] = addr;
        self.sp += 1;
        Ok(())
    }

    /// Pops a return address, or None if the stack is empty
    pub fn pop(&mut self) -> Option<u16> {
        self.sp = self.sp.checked_sub(1)?;
        Some(self.stack[self.sp as usize])
    }

    /// Counts both timers down by one, stopping at zero
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// Whether the sound timer is still running (i.e. a beep should be playing)
    pub fn sound_active(&self) -> bool {
        self.sound_timer > 0
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}
