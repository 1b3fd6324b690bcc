use log::debug;
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{TextureCreator, WindowCanvas};
use sdl2::video::WindowContext;

use vm8_core::FrameBuffer;

/// # Display
/// An SDL2 window presenting the machine's RGB24 surface.
///
/// The surface is already scaled and coloured by the core, so rendering is a straight copy into a
/// streaming texture of the same size, which SDL then stretches over the window.
/// The display only gets a call to `render` when the machine publishes a new frame.
pub struct Display {
    canvas: WindowCanvas,
    texture_creator: TextureCreator<WindowContext>,
}

impl Display {
    /// Creates a resizable window bound to an sdl2 context.
    ///
    /// # Arguments
    /// * `sdl` an sdl2 context with which to draw
    /// * `width` the initial horizontal size of the window in pixels
    /// * `height` the initial vertical size of the window in pixels
    pub fn new(sdl: &sdl2::Sdl, width: u32, height: u32) -> Result<Self, String> {
        let video_subsystem = sdl.video()?;
        let window = video_subsystem
            .window("vm8", width, height)
            .position_centered()
            .resizable()
            .build()
            .map_err(|e| e.to_string())?;
        let canvas = window.into_canvas().build().map_err(|e| e.to_string())?;
        let texture_creator = canvas.texture_creator();

        Ok(Display {
            canvas,
            texture_creator,
        })
    }

    /// Streams the frame's surface into a texture and presents it.
    ///
    /// # Arguments
    /// * `frame` a published FrameBuffer
    pub fn render(&mut self, frame: &FrameBuffer) -> Result<(), String> {
        if frame.width() == 0 || frame.height() == 0 {
            debug!("skipping empty {}x{} frame", frame.width(), frame.height());
            return Ok(());
        }

        let mut texture = self
            .texture_creator
            .create_texture_streaming(
                PixelFormatEnum::RGB24,
                frame.width() as u32,
                frame.height() as u32,
            )
            .map_err(|e| e.to_string())?;

        texture.with_lock(None, |buffer: &mut [u8], pitch: usize| {
            copy_rows(frame, buffer, pitch)
        })?;

        self.canvas.clear();
        self.canvas.copy(&texture, None, None)?;
        self.canvas.present();
        Ok(())
    }
}

/// Copies the surface row by row, since SDL may pad each texture row out past the frame's pitch
fn copy_rows(frame: &FrameBuffer, buffer: &mut [u8], pitch: usize) {
    let row_len = frame.pitch();
    let rows = frame.surface().chunks_exact(row_len);
    for (src, dst) in rows.zip(buffer.chunks_mut(pitch)) {
        dst[..row_len].copy_from_slice(src);
    }
}
