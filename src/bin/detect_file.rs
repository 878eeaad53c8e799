//! detect_file - submit a single image to the detection service
//!
//! One-shot counterpart of the live pipeline: reads an image from disk,
//! submits it, prints the detections, and can write an annotated copy with
//! the same overlay the daemon draws.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use sortcam::config::{BoxOrigin, DetectorSettings};
use sortcam::overlay::{composite, DisplayFrame, OverlayRenderer};
use sortcam::{Detector, Frame, HttpDetectionClient};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image file to submit.
    #[arg(long)]
    image: PathBuf,
    /// Detection endpoint URL.
    #[arg(
        long,
        env = "SORTCAM_ENDPOINT",
        default_value = "http://127.0.0.1:15000/predict"
    )]
    endpoint: String,
    /// Request timeout in seconds.
    #[arg(long, default_value_t = 10)]
    timeout_s: u64,
    /// Detector input size (square) the response coordinates are in.
    #[arg(long, default_value_t = 416)]
    detector_input: u32,
    /// Confidence threshold for the annotated output.
    #[arg(long, default_value_t = 0.5)]
    threshold: f32,
    /// Write an annotated copy of the image here (.png).
    #[arg(long)]
    output: Option<PathBuf>,
    /// Label font (TTF) for the annotated output.
    #[arg(long, env = "SORTCAM_FONT_PATH")]
    font: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("read image {}", args.image.display()))?;

    let client = HttpDetectionClient::new(&args.endpoint, Duration::from_secs(args.timeout_s))?;
    let batch = client.submit(&bytes)?;

    println!("{} detections", batch.len());
    for detection in batch.iter() {
        println!(
            "  {} conf={:.2} box=({:.1},{:.1} {:.1}x{:.1})",
            detection.label,
            detection.confidence,
            detection.x,
            detection.y,
            detection.width,
            detection.height
        );
    }

    if let Some(output) = args.output {
        let frame = Frame::from_encoded(&bytes)?;
        let mut renderer = OverlayRenderer::new(
            DetectorSettings {
                input_width: args.detector_input,
                input_height: args.detector_input,
                box_origin: BoxOrigin::default(),
            },
            args.threshold,
        );
        if let Some(font) = &args.font {
            renderer.load_font(font)?;
        }

        let display = DisplayFrame::new(frame.width(), frame.height());
        let overlay = renderer.render(&batch, display);
        let annotated = composite(&frame, &overlay)?;
        annotated
            .save(&output)
            .with_context(|| format!("write annotated image {}", output.display()))?;
        println!("annotated image written to {}", output.display());
    }

    Ok(())
}
