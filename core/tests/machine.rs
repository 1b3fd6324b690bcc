use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

use vm8_core::{Chip8, Config, FrameBuffer, FrameSink, LatestFrame, NullSink, RunState, VmError};

const TIMEOUT: Duration = Duration::from_secs(5);

/// JP 0x200
const SPIN: [u8; 2] = [0x12, 0x00];

/// Polls `condition` until it holds or TIMEOUT passes
fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

fn spawn(chip8: &Arc<Chip8>) -> thread::JoinHandle<()> {
    let chip8 = Arc::clone(chip8);
    thread::spawn(move || chip8.run())
}

/// Reads the machine back every time a frame is published: its run state and pc
#[derive(Default)]
struct MachineRecorder {
    machine: OnceLock<Weak<Chip8>>,
    seen: Mutex<Vec<(RunState, u16)>>,
}

impl MachineRecorder {
    fn attach(config: Config) -> (Arc<Chip8>, Arc<MachineRecorder>) {
        let recorder = Arc::new(MachineRecorder::default());
        let chip8 = Arc::new(Chip8::new(config, Arc::clone(&recorder)));
        recorder.machine.set(Arc::downgrade(&chip8)).unwrap();
        (chip8, recorder)
    }

    fn seen(&self) -> Vec<(RunState, u16)> {
        self.seen.lock().unwrap().clone()
    }
}

impl FrameSink for MachineRecorder {
    fn frame_ready(&self, _frame: FrameBuffer) {
        if let Some(machine) = self.machine.get().and_then(Weak::upgrade) {
            let entry = (machine.run_state(), machine.state().pc);
            self.seen.lock().unwrap().push(entry);
        }
    }
}

#[test]
fn load_is_stopped_until_reset_completes() {
    let (chip8, recorder) = MachineRecorder::attach(Config::default());

    chip8.load_program(&SPIN).unwrap();

    // the load clears the display while still Stopped
    assert_eq!(recorder.seen(), vec![(RunState::Stopped, 0x200)]);
    assert_eq!(chip8.run_state(), RunState::Running);
}

#[test]
fn sinks_may_read_the_machine_back() {
    let (chip8, recorder) = MachineRecorder::attach(Config::default());
    // DRW V0, V0, 5; CLS
    chip8.load_program(&[0xD0, 0x05, 0x00, 0xE0]).unwrap();

    chip8.step().unwrap();
    chip8.step().unwrap();
    chip8.resize(64, 32);

    assert_eq!(
        recorder.seen(),
        vec![
            (RunState::Stopped, 0x200),
            (RunState::Running, 0x202),
            (RunState::Running, 0x204),
            (RunState::Running, 0x204),
        ]
    );
}

#[test]
fn concurrent_loads_never_run_a_half_reset_machine() {
    let chip8 = Arc::new(Chip8::default());
    chip8.load_program(&SPIN).unwrap();
    let runner = spawn(&chip8);

    // a step against zeroed program memory would fault on opcode 0x0000
    for _ in 0..500 {
        chip8.load_program(&SPIN).unwrap();
        assert_ne!(chip8.run_state(), RunState::Faulted);
    }
    assert_eq!(chip8.fault(), None);

    chip8.request_exit();
    runner.join().unwrap();
    assert_eq!(chip8.run_state(), RunState::Exit);
}

#[test]
fn key_wait_is_cancelled_by_exit() {
    let chip8 = Arc::new(Chip8::default());
    // LD V1, K
    chip8.load_program(&[0xF1, 0x0A]).unwrap();
    let runner = spawn(&chip8);

    thread::sleep(Duration::from_millis(20));
    assert_eq!(chip8.state().pc, 0x200);

    chip8.request_exit();
    runner.join().unwrap();
    assert_eq!(chip8.run_state(), RunState::Exit);
}

#[test]
fn key_wait_is_satisfied_from_another_thread() {
    let chip8 = Arc::new(Chip8::default());
    // LD V1, K; JP 0x202
    chip8.load_program(&[0xF1, 0x0A, 0x12, 0x02]).unwrap();
    let runner = spawn(&chip8);

    chip8.key_pressed(0x7);
    assert!(wait_until(|| chip8.state().pc == 0x202));
    assert_eq!(chip8.state().v[0x1], 0x7);

    chip8.request_exit();
    runner.join().unwrap();
}

#[test]
fn key_wait_does_not_block_loads() {
    let chip8 = Arc::new(Chip8::default());
    chip8.load_program(&[0xF1, 0x0A]).unwrap();
    let runner = spawn(&chip8);
    thread::sleep(Duration::from_millis(10));

    // V2 = 0x42; JP 0x202
    chip8.load_program(&[0x62, 0x42, 0x12, 0x02]).unwrap();
    assert!(wait_until(|| chip8.state().v[0x2] == 0x42));

    chip8.request_exit();
    runner.join().unwrap();
}

#[test]
fn fault_is_recovered_by_reload() {
    let chip8 = Arc::new(Chip8::default());
    chip8.load_program(&[0xFF, 0xFF]).unwrap();
    let runner = spawn(&chip8);

    assert!(wait_until(|| chip8.run_state() == RunState::Faulted));
    assert_eq!(chip8.fault(), Some(VmError::UnrecognizedOpcode(0xFFFF)));

    chip8.load_program(&SPIN).unwrap();
    assert_eq!(chip8.fault(), None);
    thread::sleep(Duration::from_millis(10));
    assert_eq!(chip8.run_state(), RunState::Running);

    chip8.request_exit();
    runner.join().unwrap();
}

#[test]
fn stack_overflow_faults_the_run() {
    let chip8 = Arc::new(Chip8::default());
    // CALL 0x200
    chip8.load_program(&[0x22, 0x00]).unwrap();
    let runner = spawn(&chip8);

    assert!(wait_until(|| chip8.run_state() == RunState::Faulted));
    assert_eq!(chip8.fault(), Some(VmError::StackOverflow { pc: 0x200 }));
    assert_eq!(chip8.state().sp, 15);

    chip8.request_exit();
    runner.join().unwrap();
}

#[test]
fn timers_count_down_on_the_wall_clock() {
    let chip8 = Arc::new(Chip8::default());
    // V0 = 6; DT = V0; JP 0x204
    chip8.load_program(&[0x60, 0x06, 0xF0, 0x15, 0x12, 0x04]).unwrap();
    let started = Instant::now();
    let runner = spawn(&chip8);

    assert!(wait_until(|| chip8.state().pc == 0x204));
    assert!(wait_until(|| chip8.state().delay_timer == 0));
    // six ticks at 60Hz take at least 1/12 of a second
    assert!(started.elapsed() >= Duration::from_millis(80));

    chip8.request_exit();
    runner.join().unwrap();
}

#[test]
fn frames_reach_another_thread() {
    let frames = Arc::new(LatestFrame::new());
    let chip8 = Arc::new(Chip8::new(Config::default(), Arc::clone(&frames)));
    // V0 = 0xA; LD F, V0; DRW V1, V1, 5; JP 0x206
    chip8
        .load_program(&[0x60, 0x0A, 0xF0, 0x29, 0xD1, 0x15, 0x12, 0x06])
        .unwrap();

    let cleared = frames.take().unwrap();
    assert!(cleared.grid().iter().flatten().all(|&pixel| pixel == 0));

    let runner = spawn(&chip8);
    let mut drawn = None;
    assert!(wait_until(|| {
        drawn = frames.take();
        drawn.is_some()
    }));
    let drawn = drawn.unwrap();
    // top row of the A glyph is 0xF0
    assert!((0..4).all(|x| drawn.pixel(x, 0)));
    assert!(!drawn.pixel(4, 0));

    chip8.request_exit();
    runner.join().unwrap();
}

#[test]
fn undrained_frames_do_not_pile_up() {
    let frames = Arc::new(LatestFrame::new());
    let chip8 = Arc::new(Chip8::new(Config::default(), Arc::clone(&frames)));
    // DRW V0, V0, 5; JP 0x200
    chip8.load_program(&[0xD0, 0x05, 0x12, 0x00]).unwrap();
    let runner = spawn(&chip8);

    assert!(wait_until(|| chip8.state().v[0xF] == 1));
    thread::sleep(Duration::from_millis(50));
    chip8.request_exit();
    runner.join().unwrap();

    // hundreds of draws ran but only the last one is held
    let last = frames.take().unwrap();
    assert_eq!(last, chip8.frame());
    assert_eq!(frames.take(), None);
}

#[test]
fn exit_before_run_returns_immediately() {
    let chip8 = Chip8::new(Config::default(), NullSink);
    chip8.request_exit();
    chip8.run();
    assert_eq!(chip8.run_state(), RunState::Exit);
}
