//! Stream in-memory pixel frames into an `ffmpeg` child process.
//!
//! No encoding happens here: frames are normalized to 8-bit gray or
//! rgba buffers and piped, row-major, into ffmpeg's stdin. ffmpeg does
//! the compression and muxing, this crate does the format resolution,
//! sample normalization, and child-process lifecycle.
//!
//! ```no_run
//! use mp4pipe_core::Mp4Writer;
//! use ndarray::Array3;
//!
//! let mut writer = Mp4Writer::new("out.mp4").fps(24);
//! for i in 0..24u8 {
//!     let frame = Array3::<u8>::from_elem((120, 160, 3), i * 10);
//!     writer.write(frame)?;
//! }
//! writer.finish()?;
//! # Ok::<(), mp4pipe_core::Error>(())
//! ```
//!
//! The stream opens lazily on the first `write`, or eagerly via
//! [`Mp4Writer::open`] when the frame shape is known up front.

mod frame;
mod writer;

#[cfg(feature = "figure")]
mod figure;

pub use frame::{as_uint, Frame, FrameShape, PixelFormat};
pub use writer::Mp4Writer;

#[cfg(feature = "figure")]
pub use figure::{DrawResult, Figure};

/// Re-exported so callers of the `figure` API can name plotters types
/// without a separate dependency.
#[cfg(feature = "figure")]
pub use plotters;

/// Error type for frame encoding operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unrecognized frame shape: {0:?}")]
    InvalidShape(Vec<usize>),

    #[error("unsupported sample type: {0}")]
    UnsupportedSample(String),

    #[error("frame is {got}, but the stream was opened as {expected}")]
    ShapeMismatch { expected: FrameShape, got: FrameShape },

    #[error("stream is already open")]
    AlreadyOpen,

    #[error("failed to launch `{cmd}`: {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    #[error("encoder closed its input: {0}")]
    BrokenPipe(#[source] std::io::Error),

    #[error("encoder exited with {status} (see {})", .log.display())]
    Encoder {
        status: std::process::ExitStatus,
        log: std::path::PathBuf,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "figure")]
    #[error("render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, Error>;
