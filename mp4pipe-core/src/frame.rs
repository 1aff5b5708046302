//! Frame model: pixel-format resolution and sample normalization.

use std::fmt;

use ndarray::{Array2, Array3, ArrayD, Axis};

use crate::{Error, Result};

/// Pixel format declared to the encoder process.
///
/// Three-channel frames are declared `Rgba`: [`Mp4Writer`] pads them
/// with a zero alpha channel before transmission, and the declared
/// format has to match the bytes actually sent.
///
/// [`Mp4Writer`]: crate::Mp4Writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Gray,
    Rgba,
}

impl PixelFormat {
    /// Name understood by ffmpeg's `-pix_fmt`
    pub fn as_str(self) -> &'static str {
        match self {
            PixelFormat::Gray => "gray",
            PixelFormat::Rgba => "rgba",
        }
    }

    /// Bytes per pixel on the wire
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray => 1,
            PixelFormat::Rgba => 4,
        }
    }
}

/// Resolved frame geometry: height-major, with an optional channel axis.
///
/// Once a stream resolves its shape, every later frame must match the
/// height, width, and gray-vs-color choice. The channel count itself may
/// still vary where normalization covers it (1 vs none, 3 vs 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameShape {
    pub height: usize,
    pub width: usize,
    pub channels: Option<usize>,
}

impl FrameShape {
    /// Resolve a raw dimension list into a shape and pixel format.
    ///
    /// `(H, W)` and `(H, W, 1)` are single-channel; `(H, W, 3)` and
    /// `(H, W, 4)` are four-channel on the wire. Anything else is
    /// [`Error::InvalidShape`].
    pub fn resolve(dims: &[usize]) -> Result<(FrameShape, PixelFormat)> {
        match *dims {
            [height, width] => Ok((
                FrameShape { height, width, channels: None },
                PixelFormat::Gray,
            )),
            [height, width, 1] => Ok((
                FrameShape { height, width, channels: Some(1) },
                PixelFormat::Gray,
            )),
            [height, width, c @ (3 | 4)] => Ok((
                FrameShape { height, width, channels: Some(c) },
                PixelFormat::Rgba,
            )),
            _ => Err(Error::InvalidShape(dims.to_vec())),
        }
    }
}

impl fmt::Display for FrameShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.channels {
            Some(c) => write!(f, "({}, {}, {})", self.height, self.width, c),
            None => write!(f, "({}, {})", self.height, self.width),
        }
    }
}

/// A frame of pixel samples in one of the supported sample types.
///
/// Shape is height-major: `(H, W)` for single-channel, or `(H, W, C)`
/// with `C` in {1, 3, 4}. Constructed from typed ndarray arrays via
/// `From`, or from a decoded [`image::DynamicImage`] via `TryFrom`.
#[derive(Debug, Clone)]
pub enum Frame {
    U8(ArrayD<u8>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

impl Frame {
    /// Raw dimension list, height-major
    pub fn dims(&self) -> &[usize] {
        match self {
            Frame::U8(a) => a.shape(),
            Frame::I32(a) => a.shape(),
            Frame::I64(a) => a.shape(),
            Frame::F32(a) => a.shape(),
            Frame::F64(a) => a.shape(),
        }
    }
}

macro_rules! impl_from_array {
    ($($t:ty => $variant:ident),* $(,)?) => {$(
        impl From<Array2<$t>> for Frame {
            fn from(a: Array2<$t>) -> Frame {
                Frame::$variant(a.into_dyn())
            }
        }

        impl From<Array3<$t>> for Frame {
            fn from(a: Array3<$t>) -> Frame {
                Frame::$variant(a.into_dyn())
            }
        }

        impl From<ArrayD<$t>> for Frame {
            fn from(a: ArrayD<$t>) -> Frame {
                Frame::$variant(a)
            }
        }
    )*};
}

impl_from_array!(
    u8 => U8,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
);

impl TryFrom<image::DynamicImage> for Frame {
    type Error = Error;

    /// Convert decoded pixels into a frame.
    ///
    /// 8-bit luma maps to `(H, W)`, 8-bit and 32-bit-float color to
    /// `(H, W, 3|4)`. Sample types with no counterpart here (16-bit
    /// channels, luma with alpha) are [`Error::UnsupportedSample`].
    fn try_from(img: image::DynamicImage) -> Result<Frame> {
        use image::DynamicImage::*;

        let (w, h) = (img.width() as usize, img.height() as usize);
        let color = img.color();
        match img {
            ImageLuma8(buf) => Ok(from_raw2(h, w, buf.into_raw())),
            ImageRgb8(buf) => Ok(from_raw3(h, w, 3, buf.into_raw())),
            ImageRgba8(buf) => Ok(from_raw3(h, w, 4, buf.into_raw())),
            ImageRgb32F(buf) => Ok(from_raw3(h, w, 3, buf.into_raw())),
            ImageRgba32F(buf) => Ok(from_raw3(h, w, 4, buf.into_raw())),
            _ => Err(Error::UnsupportedSample(format!("{color:?}"))),
        }
    }
}

fn from_raw2<T>(h: usize, w: usize, raw: Vec<T>) -> Frame
where
    Frame: From<Array2<T>>,
{
    Array2::from_shape_vec((h, w), raw)
        .expect("pixel buffer length must match dimensions")
        .into()
}

fn from_raw3<T>(h: usize, w: usize, c: usize, raw: Vec<T>) -> Frame
where
    Frame: From<Array3<T>>,
{
    Array3::from_shape_vec((h, w, c), raw)
        .expect("pixel buffer length must match dimensions")
        .into()
}

/// Normalize any supported frame to 8-bit unsigned samples.
///
/// `U8` passes through untouched. Floats are assumed to be in [0, 1]:
/// values are clipped to that range, scaled by 255, and truncated.
/// Signed integers are clipped to [0, 255].
pub fn as_uint(frame: Frame) -> ArrayD<u8> {
    match frame {
        Frame::U8(a) => a,
        Frame::F32(a) => a.mapv(|v| (255.0 * v.clamp(0.0, 1.0)) as u8),
        Frame::F64(a) => a.mapv(|v| (255.0 * v.clamp(0.0, 1.0)) as u8),
        Frame::I32(a) => a.mapv(|v| v.clamp(0, 255) as u8),
        Frame::I64(a) => a.mapv(|v| v.clamp(0, 255) as u8),
    }
}

/// Row-major wire bytes for a normalized frame.
///
/// Frames with exactly three channels gain a zeroed fourth byte per
/// pixel, because three-channel shapes are declared rgba to the encoder.
pub(crate) fn wire_bytes(pixels: &ArrayD<u8>) -> Vec<u8> {
    if pixels.ndim() == 3 && pixels.shape()[2] == 3 {
        let mut bytes = Vec::with_capacity(pixels.len() / 3 * 4);
        for px in pixels.lanes(Axis(2)) {
            bytes.extend_from_slice(&[px[0], px[1], px[2], 0]);
        }
        bytes
    } else {
        pixels.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::{arr2, Array2, Array3};

    #[test]
    fn as_uint_passes_u8_through_untouched() {
        let a = Array2::<u8>::from_elem((3, 4), 7).into_dyn();
        let ptr = a.as_ptr();
        let out = as_uint(Frame::U8(a));
        // Same allocation, not a copy
        assert_eq!(out.as_ptr(), ptr);
        assert!(out.iter().all(|&v| v == 7));
    }

    #[test]
    fn as_uint_clips_and_scales_floats() {
        let a = arr2(&[[-0.5f64, 0.0, 0.5, 1.0, 1.5]]);
        let out = as_uint(Frame::from(a));
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![0, 0, 127, 255, 255]);
    }

    #[test]
    fn as_uint_truncates_rather_than_rounds() {
        let a = arr2(&[[0.999f32]]);
        let out = as_uint(Frame::from(a));
        // 0.999 * 255 = 254.745 -> 254
        assert_eq!(out[[0, 0]], 254);
    }

    #[test]
    fn as_uint_clips_signed_integers() {
        let a = arr2(&[[-10i32, 0, 128, 255, 300]]);
        let out = as_uint(Frame::from(a));
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![0, 0, 128, 255, 255]);

        let a = arr2(&[[-1i64, 1000]]);
        let out = as_uint(Frame::from(a));
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![0, 255]);
    }

    #[test]
    fn resolves_two_dim_shapes_as_gray() {
        let (shape, format) = FrameShape::resolve(&[100, 200]).unwrap();
        assert_eq!(format, PixelFormat::Gray);
        assert_eq!(shape.height, 100);
        assert_eq!(shape.width, 200);
        assert_eq!(shape.channels, None);

        let (shape, format) = FrameShape::resolve(&[100, 200, 1]).unwrap();
        assert_eq!(format, PixelFormat::Gray);
        assert_eq!(shape.channels, Some(1));
    }

    #[test]
    fn resolves_color_shapes_as_rgba() {
        for c in [3, 4] {
            let (shape, format) = FrameShape::resolve(&[100, 200, c]).unwrap();
            assert_eq!(format, PixelFormat::Rgba);
            assert_eq!(shape.channels, Some(c));
        }
    }

    #[test]
    fn rejects_unrecognized_shapes() {
        for dims in [
            &[100usize][..],
            &[100, 200, 2][..],
            &[100, 200, 5][..],
            &[1, 2, 3, 4][..],
        ] {
            match FrameShape::resolve(dims) {
                Err(Error::InvalidShape(got)) => assert_eq!(got, dims.to_vec()),
                other => panic!("expected InvalidShape for {dims:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn wire_bytes_pads_three_channel_frames() {
        let a = Array3::from_shape_fn((2, 3, 3), |(y, x, c)| (y * 100 + x * 10 + c) as u8);
        let bytes = wire_bytes(&a.into_dyn());
        assert_eq!(bytes.len(), 2 * 3 * 4);
        // Every 4th byte is the synthesized alpha, always zero
        for px in bytes.chunks_exact(4) {
            assert_eq!(px[3], 0);
        }
        // First pixel survives in order
        assert_eq!(&bytes[..4], &[0, 1, 2, 0]);
        // Row-major: second row starts at pixel index 3
        assert_eq!(&bytes[3 * 4..3 * 4 + 4], &[100, 101, 102, 0]);
    }

    #[test]
    fn wire_bytes_leaves_four_channel_frames_alone() {
        let a = Array3::from_shape_fn((2, 2, 4), |(y, x, c)| (y * 8 + x * 4 + c) as u8);
        let bytes = wire_bytes(&a.clone().into_dyn());
        assert_eq!(bytes, a.iter().copied().collect::<Vec<_>>());
        assert_eq!(bytes.len(), 2 * 2 * 4);
    }

    #[test]
    fn wire_bytes_passes_gray_frames_through() {
        let a = arr2(&[[1u8, 2], [3, 4]]);
        let bytes = wire_bytes(&a.into_dyn());
        assert_eq!(bytes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn converts_dynamic_images() {
        let luma = image::DynamicImage::ImageLuma8(image::GrayImage::new(4, 2));
        let frame = Frame::try_from(luma).unwrap();
        assert_eq!(frame.dims(), &[2, 4]);

        let rgb = image::DynamicImage::ImageRgb8(image::RgbImage::new(4, 2));
        let frame = Frame::try_from(rgb).unwrap();
        assert_eq!(frame.dims(), &[2, 4, 3]);

        let rgba = image::DynamicImage::ImageRgba8(image::RgbaImage::new(4, 2));
        let frame = Frame::try_from(rgba).unwrap();
        assert_eq!(frame.dims(), &[2, 4, 4]);
    }

    #[test]
    fn rejects_unsupported_sample_types() {
        let luma16 = image::DynamicImage::ImageLuma16(image::ImageBuffer::new(2, 2));
        match Frame::try_from(luma16) {
            Err(Error::UnsupportedSample(_)) => {}
            other => panic!("expected UnsupportedSample, got {other:?}"),
        }

        let luma_a = image::DynamicImage::ImageLumaA8(image::ImageBuffer::new(2, 2));
        assert!(matches!(
            Frame::try_from(luma_a),
            Err(Error::UnsupportedSample(_))
        ));
    }

    #[test]
    fn shape_display_matches_tuple_form() {
        let (shape, _) = FrameShape::resolve(&[100, 200, 3]).unwrap();
        assert_eq!(shape.to_string(), "(100, 200, 3)");
        let (shape, _) = FrameShape::resolve(&[100, 200]).unwrap();
        assert_eq!(shape.to_string(), "(100, 200)");
    }
}
