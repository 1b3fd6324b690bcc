use std::error::Error;
use std::path::PathBuf;

use clap::builder::RangedU64ValueParser;
use clap::Parser;
use log::{error, info, LevelFilter};

use vm8_core::constants::{DEFAULT_SCALE, TIMER_HZ};
use vm8_core::{Config, Quirks, Underflow};

mod keymap;
mod run;

/// Largest accepted --scale; the window grows with its square
const MAX_SCALE: u64 = 32;

#[derive(Parser, Debug)]
#[command(name = "vm8", about = "Runs a Chip-8 program in an SDL2 window.")]
struct Args {
    /// Program image to load at 0x200
    #[arg(value_name = "ROM")]
    rom: PathBuf,

    /// Physical pixels per logical pixel along each axis
    #[arg(
        long,
        default_value_t = DEFAULT_SCALE,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_SCALE)
    )]
    scale: usize,

    /// Cap on instructions executed per second; unthrottled when omitted
    #[arg(long, value_name = "N")]
    ips: Option<u32>,

    /// Store 0/1 in VF for SHL rather than the raw high bit
    #[arg(long, default_value_t = false)]
    normalize_shift_carry: bool,

    /// Treat RET with an empty call stack as a no-op instead of a fault
    #[arg(long, default_value_t = false)]
    ignore_stack_underflow: bool,

    /// Default log level; RUST_LOG takes precedence
    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            scale: self.scale,
            timer_hz: TIMER_HZ,
            instructions_per_second: self.ips,
            quirks: Quirks {
                normalize_shift_carry: self.normalize_shift_carry,
                underflow: if self.ignore_stack_underflow {
                    Underflow::Ignore
                } else {
                    Underflow::Fault
                },
            },
        }
    }
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .parse_default_env()
        .init();

    if let Err(e) = start(&args) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn start(args: &Args) -> Result<(), Box<dyn Error>> {
    let program = std::fs::read(&args.rom)
        .map_err(|e| format!("unable to read {}: {}", args.rom.display(), e))?;
    info!("read {} ({} bytes)", args.rom.display(), program.len());

    run::run(&program, args.config())
}
