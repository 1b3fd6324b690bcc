pub use chip8::{Chip8, Step};
pub use config::{Config, Quirks, Underflow};
pub use error::{Result, VmError};
pub use framebuffer::{FrameBuffer, FrameSink, LatestFrame, NullSink};
pub use instruction::{decode, descriptor, Descriptor, Instruction, OPCODE_TABLE};
pub use keypad::Keypad;
pub use run_state::RunState;
pub use state::State;

mod chip8;
pub mod config;
pub mod constants;
pub mod error;
pub mod framebuffer;
mod instruction;
mod keypad;
pub mod opcode;
mod operations;
mod run_state;
pub mod state;
mod timer;
