use std::cell::Cell;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info, trace, warn};

use crate::config::Config;
use crate::constants::MAX_PROGRAM_SIZE;
use crate::error::{Result, VmError};
use crate::framebuffer::{FrameBuffer, FrameSink};
use crate::instruction::{decode, Instruction};
use crate::keypad::Keypad;
use crate::operations::{lock, Flow, Peripherals};
use crate::run_state::{RunFlag, RunState};
use crate::state::State;
use crate::timer::{Throttle, TimerClock};

/// How long the loop sleeps between checks while there is nothing to run
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// The outcome of a single `step`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// An instruction ran to completion
    Executed(Instruction),
    /// A key wait found no key; the same instruction runs again next step
    Waiting,
    /// The machine isn't Running so nothing was executed
    Idle,
}

/// # Chip-8
/// Chip-8 is a virtual machine and corresponding interpreted language.
///
/// One thread drives `run`; any other thread may load programs, press and release keys, resize
/// the display or ask the machine to exit.
///
/// Tracks:
///  - the CPU `state`, locked for a whole fetch-decode-execute step or a whole load
///  - the `frame` buffer, locked only while it is cleared, drawn to or resized
///  - the pressed `keypad` keys, one atomic per key
///  - the `run_state` and the `fault` that ended the last run, if any
///
/// Whenever both locks are needed the CPU state is always locked first. Frames reach the sink
/// only after both locks are released, so a sink may call back into the machine.
pub struct Chip8 {
    state: Mutex<State>,
    frame: Mutex<FrameBuffer>,
    keypad: Keypad,
    run_state: RunFlag,
    fault: Mutex<Option<VmError>>,
    config: Config,
    sink: Box<dyn FrameSink>,
}

impl Chip8 {
    pub fn new(config: Config, sink: impl FrameSink + 'static) -> Self {
        Chip8 {
            state: Mutex::new(State::new()),
            frame: Mutex::new(FrameBuffer::with_scale(config.scale)),
            keypad: Keypad::new(),
            run_state: RunFlag::new(),
            fault: Mutex::new(None),
            config,
            sink: Box::new(sink),
        }
    }

    /// Resets the machine and starts running `program` from 0x200.
    ///
    /// The run state reads Stopped for the whole reset, so the loop never sees a half loaded
    /// machine. Has no effect once the machine has been asked to exit.
    pub fn load_program(&self, program: &[u8]) -> Result<()> {
        if program.len() > MAX_PROGRAM_SIZE {
            let err = VmError::ProgramTooLarge {
                len: program.len(),
                max: MAX_PROGRAM_SIZE,
            };
            warn!("rejected program: {}", err);
            return Err(err);
        }
        if !self.run_state.set(RunState::Stopped) {
            warn!("ignoring program load after exit");
            return Ok(());
        }

        let pending = Cell::new(None);
        {
            let mut state = lock(&self.state);
            state.load(program)?;
            self.keypad.clear();
            *lock(&self.fault) = None;
            self.peripherals(&pending).with_frame(FrameBuffer::clear);
        }
        // still Stopped, so the loop can't step until Running is set below
        self.publish(pending);
        self.run_state.set(RunState::Running);

        info!("loaded {} byte program", program.len());
        Ok(())
    }

    pub fn key_pressed(&self, key: u8) {
        if !self.keypad.press(key) {
            warn!("ignoring press of unknown key {:#X}", key);
        }
    }

    pub fn key_released(&self, key: u8) {
        if !self.keypad.release(key) {
            warn!("ignoring release of unknown key {:#X}", key);
        }
    }

    /// Reallocates the presentation surface and clears the display
    pub fn resize(&self, width: usize, height: usize) {
        let pending = Cell::new(None);
        self.peripherals(&pending).with_frame(|frame| frame.resize(width, height));
        self.publish(pending);
        info!("display resized to {}x{}", width, height);
    }

    /// Stops the loop for good
    pub fn request_exit(&self) {
        self.run_state.exit();
        info!("exit requested");
    }

    pub fn run_state(&self) -> RunState {
        self.run_state.get()
    }

    /// The error that ended the current run, if it ended in a fault
    pub fn fault(&self) -> Option<VmError> {
        lock(&self.fault).clone()
    }

    /// A copy of the current frame buffer
    pub fn frame(&self) -> FrameBuffer {
        lock(&self.frame).clone()
    }

    /// A copy of the current CPU state
    pub fn state(&self) -> State {
        lock(&self.state).clone()
    }

    /// Whether the sound timer is counting down
    pub fn sound_active(&self) -> bool {
        lock(&self.state).sound_active()
    }

    /// Advances the CPU by a single instruction
    /// - does nothing unless Running
    /// - gets, decodes and executes the opcode at the pc
    /// - a failure faults the machine until the next load
    pub fn step(&self) -> Result<Step> {
        if self.run_state.get() != RunState::Running {
            return Ok(Step::Idle);
        }
        let pending = Cell::new(None);
        let result = {
            let mut state = lock(&self.state);
            // a load may have begun while we waited on the lock
            if self.run_state.get() != RunState::Running {
                return Ok(Step::Idle);
            }

            let pc = state.pc;
            self.execute_next(&mut state, &pending).map_err(|err| {
                error!("fault at {:#05X}: {}", pc, err);
                *lock(&self.fault) = Some(err.clone());
                // a load waiting on the lock has already moved to Stopped; leave it there
                self.run_state.transition(RunState::Running, RunState::Faulted);
                err
            })
        };
        self.publish(pending);
        result
    }

    /// Runs the machine loop on the calling thread until `request_exit`
    pub fn run(&self) {
        let now = Instant::now();
        let mut clock = TimerClock::new(self.config.timer_hz, now);
        let mut throttle = self
            .config
            .instructions_per_second
            .map(|ips| Throttle::new(ips, now));
        info!("machine loop started");

        while self.run_state.get() != RunState::Exit {
            if clock.poll(Instant::now()) && self.run_state.get() == RunState::Running {
                lock(&self.state).tick_timers();
            }

            match self.step() {
                Ok(Step::Executed(_)) => {
                    if let Some(throttle) = throttle.as_mut() {
                        throttle.wait();
                    }
                }
                Ok(Step::Waiting) => thread::yield_now(),
                // faults are recorded by step; idle until the next load
                Ok(Step::Idle) | Err(_) => thread::sleep(IDLE_SLEEP),
            }
        }

        info!("machine loop exited");
    }

    fn execute_next(
        &self,
        state: &mut State,
        pending: &Cell<Option<FrameBuffer>>,
    ) -> Result<Step> {
        let op = state.fetch()?;
        let instruction = decode(op)?;
        trace!(
            "{:04X} {:04X} {:<16} v{:02X?} i{:04X}",
            state.pc,
            op,
            instruction.to_string(),
            state.v,
            state.i
        );
        match instruction.execute(state, &self.peripherals(pending))? {
            Flow::Next => Ok(Step::Executed(instruction)),
            Flow::AwaitKey => Ok(Step::Waiting),
        }
    }

    fn peripherals<'a>(&'a self, pending: &'a Cell<Option<FrameBuffer>>) -> Peripherals<'a> {
        Peripherals {
            frame: &self.frame,
            pending,
            keypad: &self.keypad,
            quirks: self.config.quirks,
        }
    }

    fn publish(&self, pending: Cell<Option<FrameBuffer>>) {
        if let Some(frame) = pending.into_inner() {
            self.sink.frame_ready(frame);
        }
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new(Config::default(), crate::framebuffer::NullSink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Quirks, Underflow};
    use crate::constants::PROGRAM_START;

    fn loaded(program: &[u8]) -> Chip8 {
        let chip8 = Chip8::default();
        chip8.load_program(program).unwrap();
        chip8
    }

    #[test]
    fn test_idle_until_loaded() {
        let chip8 = Chip8::default();
        assert_eq!(chip8.run_state(), RunState::Stopped);
        assert_eq!(chip8.step(), Ok(Step::Idle));
        assert_eq!(chip8.state().pc, PROGRAM_START);
    }

    #[test]
    fn test_steps_once_loaded() {
        let chip8 = loaded(&[0x00, 0xE0]);
        assert_eq!(chip8.run_state(), RunState::Running);
        assert_eq!(chip8.step(), Ok(Step::Executed(Instruction::Cls)));
        assert_eq!(chip8.state().pc, PROGRAM_START + 0x2);
    }

    #[test]
    fn test_rejects_oversized_program() {
        let chip8 = Chip8::default();
        let program = vec![0; MAX_PROGRAM_SIZE + 1];
        assert_eq!(
            chip8.load_program(&program),
            Err(VmError::ProgramTooLarge {
                len: MAX_PROGRAM_SIZE + 1,
                max: MAX_PROGRAM_SIZE
            })
        );
        assert_eq!(chip8.run_state(), RunState::Stopped);
    }

    #[test]
    fn test_accepts_program_filling_memory() {
        let program = vec![0; MAX_PROGRAM_SIZE];
        let chip8 = loaded(&program);
        assert_eq!(chip8.run_state(), RunState::Running);
    }

    #[test]
    fn test_unrecognized_opcode_faults() {
        let chip8 = loaded(&[0xFF, 0xFF]);
        assert_eq!(chip8.step(), Err(VmError::UnrecognizedOpcode(0xFFFF)));
        assert_eq!(chip8.run_state(), RunState::Faulted);
        assert_eq!(chip8.fault(), Some(VmError::UnrecognizedOpcode(0xFFFF)));
        // the pc stays on the bad opcode
        assert_eq!(chip8.state().pc, PROGRAM_START);
        assert_eq!(chip8.step(), Ok(Step::Idle));
    }

    #[test]
    fn test_reload_clears_fault() {
        let chip8 = loaded(&[0x00, 0xEE]);
        assert!(chip8.step().is_err());
        chip8.load_program(&[0x00, 0xE0]).unwrap();
        assert_eq!(chip8.run_state(), RunState::Running);
        assert_eq!(chip8.fault(), None);
    }

    #[test]
    fn test_ignored_underflow_keeps_running() {
        let config = Config {
            quirks: Quirks {
                underflow: Underflow::Ignore,
                ..Quirks::default()
            },
            ..Config::default()
        };
        let chip8 = Chip8::new(config, crate::framebuffer::NullSink);
        chip8.load_program(&[0x00, 0xEE]).unwrap();
        assert_eq!(chip8.step(), Ok(Step::Executed(Instruction::Ret)));
        assert_eq!(chip8.state().pc, PROGRAM_START + 0x2);
    }

    #[test]
    fn test_fetch_past_memory_faults() {
        let chip8 = loaded(&[0x1F, 0xFF]);
        chip8.step().unwrap();
        assert_eq!(
            chip8.step(),
            Err(VmError::AddressOutOfRange {
                addr: 0xFFF,
                len: 2
            })
        );
    }

    #[test]
    fn test_waits_for_key() {
        let chip8 = loaded(&[0xF1, 0x0A]);
        assert_eq!(chip8.step(), Ok(Step::Waiting));
        assert_eq!(chip8.step(), Ok(Step::Waiting));
        assert_eq!(chip8.state().pc, PROGRAM_START);

        chip8.key_pressed(0xE);
        assert_eq!(
            chip8.step(),
            Ok(Step::Executed(Instruction::WaitKey { x: 0x1 }))
        );
        let state = chip8.state();
        assert_eq!(state.v[0x1], 0xE);
        assert_eq!(state.pc, PROGRAM_START + 0x2);
    }

    #[test]
    fn test_ignores_unknown_keys() {
        let chip8 = loaded(&[0xF1, 0x0A]);
        chip8.key_pressed(0x10);
        assert_eq!(chip8.step(), Ok(Step::Waiting));
    }

    #[test]
    fn test_load_releases_keys() {
        let chip8 = Chip8::default();
        chip8.key_pressed(0x3);
        chip8.load_program(&[0xF1, 0x0A]).unwrap();
        assert_eq!(chip8.step(), Ok(Step::Waiting));
    }

    #[test]
    fn test_exit_is_sticky() {
        let chip8 = loaded(&[0x12, 0x00]);
        chip8.request_exit();
        assert_eq!(chip8.load_program(&[0x12, 0x00]), Ok(()));
        assert_eq!(chip8.run_state(), RunState::Exit);
        assert_eq!(chip8.step(), Ok(Step::Idle));
    }

    #[test]
    fn test_resize_clears_display() {
        // draw the 0 glyph, then resize
        let chip8 = loaded(&[0xD0, 0x05]);
        chip8.step().unwrap();
        assert!(chip8.frame().pixel(0, 0));

        chip8.resize(128, 64);
        let frame = chip8.frame();
        assert!(!frame.pixel(0, 0));
        assert_eq!((frame.width(), frame.height()), (128, 64));
    }

    #[test]
    fn test_sound_active() {
        // V0 = 2; ST = V0
        let chip8 = loaded(&[0x60, 0x02, 0xF0, 0x18]);
        assert!(!chip8.sound_active());
        chip8.step().unwrap();
        chip8.step().unwrap();
        assert!(chip8.sound_active());
    }
}
