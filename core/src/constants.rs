/// Bytes of addressable memory
pub const MEMORY_SIZE: usize = 4096;

/// Where programs are loaded and where the pc starts
pub const PROGRAM_START: u16 = 0x200;

/// The largest program that fits between PROGRAM_START and the end of memory
pub const MAX_PROGRAM_SIZE: usize = MEMORY_SIZE - PROGRAM_START as usize;

/// Number of general purpose registers (V0..VF)
pub const REGISTER_COUNT: usize = 16;

/// Index of the register doubling as the carry/borrow/collision flag
pub const FLAG: usize = 0xF;

/// Depth of the call stack
pub const STACK_SIZE: usize = 16;

/// Number of keys on the hex keypad
pub const KEY_COUNT: usize = 16;

/// Logical display size in pixels.
/// Both must stay powers of two since sprite origins are wrapped with a mask.
pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;

/// Default number of physical pixels per logical pixel along each axis
pub const DEFAULT_SCALE: usize = 8;

/// Bytes per pixel of the presentation surface (RGB24)
pub const PIXEL_SIZE: usize = 3;

/// Rate at which the delay and sound timers count down
pub const TIMER_HZ: u32 = 60;

/// Height in bytes of each glyph in the SPRITE_SHEET
pub const GLYPH_SIZE: u16 = 5;

/// # Sprite sheet
/// The built-in font, installed at address 0x000 on every load.
///
/// Each hex digit 0..F is a 4x5 glyph stored as five bytes, one per row, using the high nibble.
/// ```text
/// 0xF0 ****
/// 0x90 *  *
/// 0x90 *  *
/// 0x90 *  *
/// 0xF0 ****
/// ```
/// `LD F, Vx` relies on this layout: the glyph for digit `d` starts at `d * GLYPH_SIZE`.
pub const SPRITE_SHEET: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
