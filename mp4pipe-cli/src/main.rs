//! mp4pipe CLI
//!
//! Encodes a sequence of still images into an MP4 by piping raw frames
//! into ffmpeg:
//!
//!   mp4pipe -o out.mp4 frames/0001.png frames/0002.png ...
//!
//! Or render the built-in animated chart demo:
//!
//!   mp4pipe -o demo.mp4 --chart-demo 5
//!
//! Frames are streamed as they load — no temp files, no frame
//! accumulation in memory. Press Ctrl+C to stop early and finalize a
//! partial video from the frames written so far.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use mp4pipe_core::plotters::prelude::{PathElement, WHITE};
use mp4pipe_core::plotters::style::{Color, RGBColor};
use mp4pipe_core::{Figure, Frame, Mp4Writer};

#[derive(Parser, Debug)]
#[command(name = "mp4pipe")]
#[command(about = "Pipe image frames into ffmpeg, out comes an MP4", long_about = None)]
#[command(arg_required_else_help = true)]
struct Args {
    /// Input image paths, in frame order
    images: Vec<PathBuf>,

    /// Output file path
    #[arg(short, long)]
    output: PathBuf,

    /// Frames per second
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Bitrate in kilobits (higher = less compression)
    #[arg(long, default_value = "40000")]
    bitrate: u32,

    /// Convert frames to grayscale before encoding
    #[arg(long)]
    gray: bool,

    /// Render the built-in animated chart demo for this many seconds
    /// instead of reading images
    #[arg(long, value_name = "SECONDS")]
    chart_demo: Option<u32>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    log::debug!("args: {:?}", args);

    // Set up SIGINT handler
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
        })
        .expect("Failed to set Ctrl-C handler");
    }

    if args.fps == 0 {
        anyhow::bail!("--fps must be positive");
    }

    let writer = Mp4Writer::new(&args.output)
        .fps(args.fps)
        .bitrate_kbps(args.bitrate);

    if let Some(seconds) = args.chart_demo {
        return run_chart_demo(writer, &args, seconds, &interrupted);
    }

    if args.images.is_empty() {
        anyhow::bail!("no input images (pass paths, or use --chart-demo)");
    }
    encode_images(writer, &args, &interrupted)
}

fn encode_images(
    mut writer: Mp4Writer,
    args: &Args,
    interrupted: &AtomicBool,
) -> anyhow::Result<()> {
    let total = args.images.len();
    println!(
        "Encoding {} frame{} at {} fps",
        total,
        if total == 1 { "" } else { "s" },
        args.fps
    );

    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let mut frames_written = 0usize;

    for path in &args.images {
        if interrupted.load(Ordering::Relaxed) {
            progress.abandon_with_message("Interrupted");
            eprintln!(
                "Interrupted after {} of {} frames, finalizing partial output...",
                frames_written, total
            );
            break;
        }

        let img = image::open(path).with_context(|| format!("failed to load {:?}", path))?;
        // Uniform sample layout across the stream: gray or rgb8
        let frame = if args.gray {
            Frame::try_from(image::DynamicImage::ImageLuma8(img.to_luma8()))
        } else {
            Frame::try_from(image::DynamicImage::ImageRgb8(img.to_rgb8()))
        }
        .with_context(|| format!("unsupported pixels in {:?}", path))?;

        writer
            .write(frame)
            .with_context(|| format!("failed to encode {:?}", path))?;
        frames_written += 1;
        progress.inc(1);
    }

    if frames_written == 0 {
        eprintln!("No frames written.");
        return Ok(());
    }

    if !interrupted.load(Ordering::Relaxed) {
        progress.finish_with_message("Encoding complete");
    }

    writer.finish()?;
    report(&args.output, frames_written, interrupted, start);
    Ok(())
}

fn run_chart_demo(
    mut writer: Mp4Writer,
    args: &Args,
    seconds: u32,
    interrupted: &AtomicBool,
) -> anyhow::Result<()> {
    const WIDTH: u32 = 640;
    const HEIGHT: u32 = 360;
    const WAVE: RGBColor = RGBColor(32, 96, 192);

    let total = (seconds * args.fps) as usize;
    println!(
        "Rendering {} chart frames at {} fps ({}s)",
        total, args.fps, seconds
    );

    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let mut figure = Figure::new(WIDTH, HEIGHT);
    let mut frames_written = 0usize;

    for i in 0..total {
        if interrupted.load(Ordering::Relaxed) {
            progress.abandon_with_message("Interrupted");
            eprintln!(
                "Interrupted after {} of {} frames, finalizing partial output...",
                frames_written, total
            );
            break;
        }

        let t = i as f64 / args.fps as f64;
        let points = wave_points(WIDTH, HEIGHT, t);
        figure.draw(|area| {
            area.fill(&WHITE)?;
            area.draw(&PathElement::new(points.clone(), WAVE.stroke_width(2)))?;
            Ok(())
        })?;
        writer.write_figure(&figure)?;
        frames_written += 1;
        progress.inc(1);
    }

    if !interrupted.load(Ordering::Relaxed) {
        progress.finish_with_message("Rendering complete");
    }

    writer.finish()?;
    report(&args.output, frames_written, interrupted, start);
    Ok(())
}

/// Polyline for one frame of the demo: two sine periods, phase advancing
/// by one full turn per second
fn wave_points(width: u32, height: u32, t: f64) -> Vec<(i32, i32)> {
    use std::f64::consts::TAU;

    let mid = height as f64 / 2.0;
    let amplitude = height as f64 * 0.35;
    (0..width as i32)
        .map(|x| {
            let phase = x as f64 / width as f64 * 2.0 * TAU + t * TAU;
            (x, (mid - amplitude * phase.sin()) as i32)
        })
        .collect()
}

fn report(output: &PathBuf, frames: usize, interrupted: &AtomicBool, start: Instant) {
    let partial = if interrupted.load(Ordering::Relaxed) {
        ", partial"
    } else {
        ""
    };
    println!("Output saved to: {:?} ({} frames{})", output, frames, partial);
    println!("Encode time: {:.1}s wall", start.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wave_points_stay_inside_the_canvas() {
        for t in [0.0, 0.25, 0.5, 0.99] {
            let points = wave_points(640, 360, t);
            assert_eq!(points.len(), 640);
            for &(x, y) in &points {
                assert!((0..640).contains(&x));
                assert!((0..360).contains(&y), "y={} out of range at t={}", y, t);
            }
        }
    }

    #[test]
    fn wave_phase_advances_between_frames() {
        let a = wave_points(640, 360, 0.0);
        let b = wave_points(640, 360, 0.1);
        assert_ne!(a, b);
    }
}
