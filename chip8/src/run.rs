use std::error::Error;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, info, warn};
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Keycode;

use vm8_core::{Chip8, Config, LatestFrame};
use vm8_display::Display;

use crate::keymap::keymap;

/// How long the event loop sleeps when there is nothing to render or handle
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Runs `program` until the window is closed.
///
/// The machine runs on its own thread; this thread pumps SDL events into it and renders the
/// frames it publishes.
pub fn run(program: &[u8], config: Config) -> Result<(), Box<dyn Error>> {
    let frames = Arc::new(LatestFrame::new());
    let chip8 = Arc::new(Chip8::new(config, Arc::clone(&frames)));

    // Get SDL2 context
    let sdl: sdl2::Sdl = sdl2::init()?;
    let initial = chip8.frame();
    let mut display = Display::new(&sdl, initial.width() as u32, initial.height() as u32)?;
    let mut events = sdl.event_pump()?;

    chip8.load_program(program)?;

    let emulation = {
        let chip8 = Arc::clone(&chip8);
        thread::Builder::new()
            .name("vm8-cpu".into())
            .spawn(move || chip8.run())?
    };

    'event: loop {
        // Handle input
        for event in events.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'event,
                Event::KeyDown {
                    keycode: Some(key),
                    repeat: false,
                    ..
                } => {
                    if let Some(kc) = keymap(key) {
                        chip8.key_pressed(kc)
                    }
                }
                Event::KeyUp {
                    keycode: Some(key), ..
                } => {
                    if let Some(kc) = keymap(key) {
                        chip8.key_released(kc)
                    }
                }
                Event::Window {
                    win_event: WindowEvent::SizeChanged(width, height),
                    ..
                } => chip8.resize(width.max(0) as usize, height.max(0) as usize),
                Event::DropFile { filename, .. } => match std::fs::read(&filename) {
                    Ok(program) => {
                        if let Err(e) = chip8.load_program(&program) {
                            warn!("unable to load {}: {}", filename, e);
                        }
                    }
                    Err(e) => warn!("unable to read {}: {}", filename, e),
                },
                _ => continue,
            };
        }

        // Render the newest frame, if one arrived since the last pass
        match frames.take() {
            Some(frame) => {
                if let Err(e) = display.render(&frame) {
                    error!("render failed: {}", e);
                }
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    }

    chip8.request_exit();
    if emulation.join().is_err() {
        error!("emulation thread panicked");
    }
    info!("shut down");
    Ok(())
}
