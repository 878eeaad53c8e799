//! sortcamd - live detection overlay daemon
//!
//! This daemon:
//! 1. Acquires the configured camera feed (camera active by default)
//! 2. Samples stills on the configured cadence and submits them to the
//!    detection service
//! 3. Keeps the overlay redrawn whenever the view state changes
//! 4. Optionally writes the overlay surface to a preview file
//! 5. Logs batch summaries and periodic feed health

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sortcam::{Pipeline, SortcamConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the JSON config file.
    #[arg(long, env = "SORTCAM_CONFIG")]
    config: Option<PathBuf>,
    /// Start with the video feed off; toggle is then up to the operator UI.
    #[arg(long, default_value_t = false)]
    paused: bool,
}

fn main() -> Result<()> {
    // Initialize logging (simple stderr)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = SortcamConfig::load_with(args.config.as_deref())?;

    log::info!(
        "sortcamd {} starting; endpoint={}",
        env!("CARGO_PKG_VERSION"),
        cfg.endpoint.url
    );
    log::info!(
        "camera={} interval={:?} detector_input={}x{} threshold={:.2}",
        cfg.camera.url,
        cfg.sampler.interval,
        cfg.detector.input_width,
        cfg.detector.input_height,
        cfg.overlay.confidence_threshold
    );

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })?;
    }

    let preview_path = cfg.overlay.preview_path.clone();
    let mut pipeline = Pipeline::new(cfg)?;
    if !args.paused {
        pipeline.start()?;
    }

    let state = pipeline.state();
    let mut last_revision = state.revision();
    let mut last_health_log = Instant::now();
    let mut redraw_count = 0u64;

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(50));

        let snapshot = state.snapshot();
        if snapshot.revision != last_revision {
            last_revision = snapshot.revision;
            redraw_count += 1;

            log::info!(
                "redraw #{}: {} detections, display={}",
                redraw_count,
                snapshot.batch.len(),
                snapshot
                    .display
                    .map(|d| format!("{}x{}", d.width, d.height))
                    .unwrap_or_else(|| "unknown".to_string())
            );
            for detection in snapshot.batch.iter() {
                log::debug!(
                    "  {} conf={:.2} box=({:.1},{:.1} {:.1}x{:.1})",
                    detection.label,
                    detection.confidence,
                    detection.x,
                    detection.y,
                    detection.width,
                    detection.height
                );
            }

            if let Some(path) = &preview_path {
                match pipeline.render_overlay() {
                    Some(overlay) => {
                        if let Err(e) = overlay.save(path) {
                            log::warn!("preview write failed: {}", e);
                        }
                    }
                    None => log::debug!("preview skipped: display size not known yet"),
                }
            }
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            log::info!(
                "capture={:?} detections={} status={}",
                snapshot.capture,
                snapshot.batch.len(),
                snapshot.status.as_deref().unwrap_or("-")
            );
            last_health_log = Instant::now();
        }
    }

    log::info!("sortcamd shutting down");
    pipeline.stop();
    Ok(())
}
