//! The MP4 writer: spawns ffmpeg and feeds it raw frames over stdin.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::frame::{as_uint, wire_bytes, Frame, FrameShape, PixelFormat};
use crate::{Error, Result};

/// Streams raw frames into an `ffmpeg` child process that encodes them
/// to an MP4 at the given path.
///
/// The child is spawned lazily on the first [`write`](Self::write), or
/// eagerly via [`open`](Self::open) when the frame shape is known up
/// front. ffmpeg's diagnostics go to a sibling log file (output path
/// with a `.log` extension), truncated per stream.
///
/// Call [`finish`](Self::finish) to close the stream and wait for the
/// encoder. Dropping an unfinished writer closes it best-effort, but
/// swallows encoder failures; prefer `finish`.
///
/// Writes are blocking and single-threaded: if ffmpeg stops draining
/// its input, `write` blocks on the pipe.
pub struct Mp4Writer {
    path: PathBuf,
    fps: u32,
    bitrate_kbps: u32,
    stream: Option<Stream>,
}

/// Open-stream state: resolved geometry plus the running child.
struct Stream {
    shape: FrameShape,
    format: PixelFormat,
    child: Child,
    stdin: Option<ChildStdin>,
    log_path: PathBuf,
}

impl Mp4Writer {
    /// Create a writer with the default 30 fps and 40000k bitrate.
    ///
    /// No process is spawned until the frame shape is known.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fps: 30,
            bitrate_kbps: 40_000,
            stream: None,
        }
    }

    /// Create a writer and open the stream for `dims` right away.
    pub fn with_shape(path: impl Into<PathBuf>, dims: &[usize]) -> Result<Self> {
        let mut writer = Self::new(path);
        writer.open(dims)?;
        Ok(writer)
    }

    /// Set frames per second (must be positive). Applies to streams
    /// opened after this call.
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Set the target bitrate in kilobits. Higher means less compression.
    pub fn bitrate_kbps(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = kbps;
        self
    }

    /// Resolved shape of the open stream, if any
    pub fn shape(&self) -> Option<FrameShape> {
        self.stream.as_ref().map(|s| s.shape)
    }

    /// Pixel format declared to the encoder, if the stream is open
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        self.stream.as_ref().map(|s| s.format)
    }

    /// Resolve `dims` and spawn the encoder process immediately.
    ///
    /// Errors with [`Error::AlreadyOpen`] if a stream is running, and
    /// [`Error::Spawn`] if the ffmpeg binary cannot be launched — fatal,
    /// never retried.
    pub fn open(&mut self, dims: &[usize]) -> Result<()> {
        if self.stream.is_some() {
            return Err(Error::AlreadyOpen);
        }
        let (shape, format) = FrameShape::resolve(dims)?;
        self.stream = Some(self.spawn(shape, format)?);
        Ok(())
    }

    /// Write one frame.
    ///
    /// Opens the stream from this frame's shape if it is not open yet.
    /// The frame is normalized to 8-bit samples and, when it has exactly
    /// three channels, padded with a zero alpha channel to match the
    /// declared rgba format. Bytes go out row-major with no padding
    /// between rows.
    pub fn write(&mut self, frame: impl Into<Frame>) -> Result<()> {
        let frame = frame.into();
        let (got_shape, got_format) = FrameShape::resolve(frame.dims())?;

        if self.stream.is_none() {
            self.stream = Some(self.spawn(got_shape, got_format)?);
        }
        let stream = self.stream.as_mut().expect("stream just opened");

        if got_shape.height != stream.shape.height
            || got_shape.width != stream.shape.width
            || got_format != stream.format
        {
            return Err(Error::ShapeMismatch {
                expected: stream.shape,
                got: got_shape,
            });
        }

        let pixels = as_uint(frame);
        let bytes = wire_bytes(&pixels);

        let stdin = stream.stdin.as_mut().ok_or_else(closed_pipe)?;
        stdin.write_all(&bytes).map_err(|e| {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                Error::BrokenPipe(e)
            } else {
                Error::Io(e)
            }
        })
    }

    /// Rasterize `figure` and write it as one frame.
    #[cfg(feature = "figure")]
    pub fn write_figure(&mut self, figure: &crate::Figure) -> Result<()> {
        self.write(figure.to_frame())
    }

    /// Close the stream and wait for the encoder to exit.
    ///
    /// Consuming the writer makes a double close unrepresentable. A
    /// writer that never opened finishes as a clean no-op. A non-zero
    /// encoder exit status is [`Error::Encoder`], carrying the log path.
    pub fn finish(mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        // Dropping stdin signals EOF; ffmpeg then flushes and exits
        drop(stream.stdin.take());
        let status = stream.child.wait()?;
        if !status.success() {
            return Err(Error::Encoder {
                status,
                log: stream.log_path,
            });
        }
        log::debug!("encoder finished: {}", self.path.display());
        Ok(())
    }

    fn spawn(&self, shape: FrameShape, format: PixelFormat) -> Result<Stream> {
        let log_path = self.path.with_extension("log");
        let log = File::create(&log_path)?;

        let args = self.ffmpeg_args(shape, format);
        log::info!("ffmpeg {} {}", args.join(" "), self.path.display());

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .arg(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .spawn()
            .map_err(|source| Error::Spawn {
                cmd: format!("ffmpeg {}", args.join(" ")),
                source,
            })?;
        let stdin = child.stdin.take();

        Ok(Stream {
            shape,
            format,
            child,
            stdin,
            log_path,
        })
    }

    /// Input side describes the raw pipe; output side is mpeg4 at the
    /// configured bitrate, no audio. The destination path is appended
    /// separately.
    fn ffmpeg_args(&self, shape: FrameShape, format: PixelFormat) -> Vec<String> {
        vec![
            "-y".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            format.as_str().into(),
            "-s".into(),
            format!("{}x{}", shape.width, shape.height),
            "-r".into(),
            self.fps.to_string(),
            "-i".into(),
            "-".into(),
            "-an".into(),
            "-b:v".into(),
            format!("{}k", self.bitrate_kbps),
            "-c:v".into(),
            "mpeg4".into(),
        ]
    }
}

impl Drop for Mp4Writer {
    /// Best-effort close for early exits. Encoder failures on this path
    /// are logged, not surfaced; use [`Mp4Writer::finish`] to observe
    /// them.
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            drop(stream.stdin.take());
            match stream.child.wait() {
                Ok(status) if !status.success() => {
                    log::warn!(
                        "encoder exited with {status} (see {})",
                        stream.log_path.display()
                    );
                }
                Err(e) => log::warn!("failed to wait for encoder: {e}"),
                Ok(_) => {}
            }
        }
    }
}

fn closed_pipe() -> Error {
    Error::BrokenPipe(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        "encoder stdin already closed",
    ))
}
