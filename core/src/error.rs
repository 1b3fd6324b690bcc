use thiserror::Error;

pub type Result<T> = std::result::Result<T, VmError>;

/// Fatal conditions raised while loading or running a program.
///
/// Every variant ends the current run; the machine can always be reloaded afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    #[error("unrecognized opcode {0:#06X}")]
    UnrecognizedOpcode(u16),
    #[error("call stack overflow at pc {pc:#05X}")]
    StackOverflow { pc: u16 },
    #[error("return with empty call stack at pc {pc:#05X}")]
    StackUnderflow { pc: u16 },
    #[error("memory access out of range: {addr:#06X} (+{len} bytes)")]
    AddressOutOfRange { addr: usize, len: usize },
    #[error("key {0:#04X} is not on the keypad")]
    InvalidKey(u8),
    #[error("program is {len} bytes but at most {max} fit in memory")]
    ProgramTooLarge { len: usize, max: usize },
}
