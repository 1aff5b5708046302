//! Chart rasterization: draw with plotters, feed the pixels to the writer.

use ndarray::Array3;
use plotters::coord::Shift;
use plotters::drawing::{DrawingArea, IntoDrawingArea};
use plotters::prelude::BitMapBackend;

use crate::{Error, Frame, Result};

/// Return type for drawing closures passed to [`Figure::draw`].
pub type DrawResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// An owned RGB8 canvas that plotters draws into.
///
/// [`Mp4Writer::write_figure`] sends the canvas as an `(H, W, 3)`
/// frame, so figures go out in the four-channel wire format with a
/// zeroed alpha. Dropping the figure releases the canvas; there is no
/// separate close step.
///
/// [`Mp4Writer::write_figure`]: crate::Mp4Writer::write_figure
pub struct Figure {
    width: u32,
    height: u32,
    buf: Vec<u8>,
}

impl Figure {
    /// A blank (black) canvas of the given pixel size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            buf: vec![0; width as usize * height as usize * 3],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Hand a plotters drawing area over this canvas to `draw_fn`, then
    /// flush the result into the pixel buffer.
    ///
    /// The canvas is not cleared between draws; fill it inside the
    /// closure when frames should not accumulate.
    pub fn draw<F>(&mut self, draw_fn: F) -> Result<()>
    where
        F: for<'a> FnOnce(&DrawingArea<BitMapBackend<'a>, Shift>) -> DrawResult,
    {
        let (w, h) = (self.width, self.height);
        let area = BitMapBackend::with_buffer(&mut self.buf, (w, h)).into_drawing_area();
        draw_fn(&area).map_err(|e| Error::Render(e.to_string()))?;
        area.present().map_err(|e| Error::Render(e.to_string()))?;
        Ok(())
    }

    /// Current canvas contents as an `(H, W, 3)` frame
    pub fn to_frame(&self) -> Frame {
        let (h, w) = (self.height as usize, self.width as usize);
        Array3::from_shape_vec((h, w, 3), self.buf.clone())
            .expect("canvas length must match dimensions")
            .into()
    }
}
