use std::sync::{Arc, Mutex};

use crate::constants::{DISPLAY_HEIGHT, DISPLAY_WIDTH, PIXEL_SIZE};
use crate::operations::lock;

/// The logical screen, indexed as [y][x], one byte per pixel holding 0 (off) or 1 (on)
pub type Grid = [[u8; DISPLAY_WIDTH]; DISPLAY_HEIGHT];

const ON: [u8; PIXEL_SIZE] = [0xFF, 0xFF, 0xFF];
const OFF: [u8; PIXEL_SIZE] = [0x00, 0x00, 0x00];

/// # FrameBuffer
/// The 64x32 monochrome screen plus the scaled RGB24 surface it is presented through.
///
/// The grid is the source of truth for drawing and collision detection. Every change to a
/// logical pixel is mirrored into a `scale x scale` block of the surface, clipped to the
/// surface's current size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    grid: Grid,
    width: usize,
    height: usize,
    scale: usize,
    surface: Vec<u8>,
}

impl FrameBuffer {
    /// Creates a blank frame buffer with a `width` x `height` pixel surface
    pub fn new(width: usize, height: usize, scale: usize) -> Self {
        FrameBuffer {
            grid: [[0; DISPLAY_WIDTH]; DISPLAY_HEIGHT],
            width,
            height,
            scale,
            surface: vec![0; width * height * PIXEL_SIZE],
        }
    }

    /// Creates a frame buffer whose surface exactly fits the scaled screen
    pub fn with_scale(scale: usize) -> Self {
        Self::new(DISPLAY_WIDTH * scale, DISPLAY_HEIGHT * scale, scale)
    }

    /// Reallocates the surface and blanks the screen
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.surface = vec![0; width * height * PIXEL_SIZE];
        self.grid = [[0; DISPLAY_WIDTH]; DISPLAY_HEIGHT];
    }

    pub fn clear(&mut self) {
        self.grid = [[0; DISPLAY_WIDTH]; DISPLAY_HEIGHT];
        self.surface.iter_mut().for_each(|b| *b = 0);
    }

    /// XORs a sprite onto the screen with its top left corner at (x, y).
    ///
    /// Each byte of `rows` is one 8 pixel row, most significant bit leftmost.
    /// The origin wraps around the screen; anything past the right or bottom edge is clipped.
    /// Returns whether any pixel was switched off.
    pub fn draw_sprite(&mut self, x: u8, y: u8, rows: &[u8]) -> bool {
        let x0 = x as usize & (DISPLAY_WIDTH - 1);
        let y0 = y as usize & (DISPLAY_HEIGHT - 1);
        let mut collision = false;

        for (row, byte) in rows.iter().enumerate() {
            let y = y0 + row;
            if y >= DISPLAY_HEIGHT {
                break;
            }
            for bit in 0..8 {
                let x = x0 + bit;
                if x >= DISPLAY_WIDTH {
                    break;
                }
                if (byte >> (7 - bit)) & 1 == 0 {
                    continue;
                }
                let pixel = &mut self.grid[y][x];
                collision |= *pixel == 1;
                *pixel ^= 1;
                let on = *pixel == 1;
                self.paint(x, y, on);
            }
        }

        collision
    }

    /// Whether the logical pixel at (x, y) is lit
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.grid[y][x] == 1
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// The RGB24 surface, `height` rows of `pitch` bytes
    pub fn surface(&self) -> &[u8] {
        &self.surface
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn scale(&self) -> usize {
        self.scale
    }

    /// Bytes per surface row
    pub fn pitch(&self) -> usize {
        self.width * PIXEL_SIZE
    }

    /// Fills the surface block backing logical pixel (x, y)
    fn paint(&mut self, x: usize, y: usize, on: bool) {
        let color = if on { ON } else { OFF };
        let pitch = self.pitch();
        let left = (x * self.scale).min(self.width);
        let right = ((x + 1) * self.scale).min(self.width);
        let top = (y * self.scale).min(self.height);
        let bottom = ((y + 1) * self.scale).min(self.height);

        for row in top..bottom {
            let start = row * pitch + left * PIXEL_SIZE;
            let end = row * pitch + right * PIXEL_SIZE;
            for pixel in self.surface[start..end].chunks_exact_mut(PIXEL_SIZE) {
                pixel.copy_from_slice(&color);
            }
        }
    }
}

/// Receives a snapshot of the frame buffer after every clear, draw and resize
pub trait FrameSink: Send + Sync {
    fn frame_ready(&self, frame: FrameBuffer);
}

/// Discards every frame
pub struct NullSink;

impl FrameSink for NullSink {
    fn frame_ready(&self, _frame: FrameBuffer) {}
}

/// # Latest frame
/// Hands frames to another thread through a single slot.
///
/// A new frame replaces whatever the reader hasn't taken yet, so at most one frame is ever held
/// however far the reader falls behind.
#[derive(Debug, Default)]
pub struct LatestFrame {
    slot: Mutex<Option<FrameBuffer>>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the newest frame published since the last take, if any
    pub fn take(&self) -> Option<FrameBuffer> {
        lock(&self.slot).take()
    }
}

impl FrameSink for LatestFrame {
    fn frame_ready(&self, frame: FrameBuffer) {
        *lock(&self.slot) = Some(frame);
    }
}

impl<T: FrameSink + ?Sized> FrameSink for Arc<T> {
    fn frame_ready(&self, frame: FrameBuffer) {
        (**self).frame_ready(frame)
    }
}
