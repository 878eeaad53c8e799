//! Frame sampler: the cadence timer driving the pipeline.
//!
//! While capture is on, a dedicated thread wakes at a fixed interval,
//! captures a still from the camera, and submits it to the detector on a
//! detached thread. Submissions are fire-and-forget: a slow or failed
//! request never delays the next tick, and missed ticks are skipped, not
//! queued. The late-response race is handled downstream by the view state's
//! request tokens.
//!
//! Cancellation is explicit: the timer waits on a stop channel, and
//! [`SamplerHandle::stop`] signals it and joins the thread, so no tick can
//! run after `stop` returns.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::FailurePolicy;
use crate::detect::Detector;
use crate::ingest::CameraSource;
use crate::overlay::DisplayFrame;
use crate::state::ViewState;

/// Builds and starts sampling loops.
pub struct Sampler {
    interval: Duration,
    on_failure: FailurePolicy,
}

/// Running sampling loop. Dropping the handle without calling [`stop`]
/// also ends the loop (the stop channel disconnects), but without joining.
///
/// [`stop`]: SamplerHandle::stop
pub struct SamplerHandle {
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

impl SamplerHandle {
    /// Signals the timer and waits for the loop to exit.
    pub fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.thread.join();
    }
}

impl Sampler {
    pub fn new(interval: Duration, on_failure: FailurePolicy) -> Self {
        Self {
            interval,
            on_failure,
        }
    }

    /// Starts the capture-and-submit loop, taking ownership of the camera
    /// for the lifetime of the run. The camera is stopped when the loop
    /// exits; toggling back on re-acquires a fresh source.
    pub fn start(
        &self,
        mut camera: CameraSource,
        detector: Arc<dyn Detector>,
        state: ViewState,
    ) -> SamplerHandle {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let interval = self.interval;
        let on_failure = self.on_failure;

        let thread = std::thread::spawn(move || {
            log::debug!("sampler running at {:?} cadence", interval);
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                if !state.is_on() {
                    continue;
                }
                tick(&mut camera, &detector, &state, on_failure);
            }
            camera.stop();
            log::debug!("sampler stopped");
        });

        SamplerHandle { stop_tx, thread }
    }
}

/// One timer tick: capture, encode, submit.
fn tick(
    camera: &mut CameraSource,
    detector: &Arc<dyn Detector>,
    state: &ViewState,
    on_failure: FailurePolicy,
) {
    let frame = match camera.current_frame() {
        Ok(Some(frame)) => frame,
        // Source not ready; skip this tick, never queue it.
        Ok(None) => return,
        Err(e) => {
            log::warn!("frame capture failed: {:#}", e);
            return;
        }
    };

    // The feed's native size can change at runtime; keep the display
    // dimensions current before the next draw.
    state.set_display(DisplayFrame::new(frame.width(), frame.height()));

    let jpeg = match frame.encode_jpeg() {
        Ok(jpeg) => jpeg,
        Err(e) => {
            log::warn!("frame encode failed: {:#}", e);
            return;
        }
    };

    let Some(token) = state.begin_request() else {
        return;
    };

    let detector = Arc::clone(detector);
    let state = state.clone();
    std::thread::spawn(move || {
        match detector.submit(&jpeg) {
            Ok(batch) => {
                log::debug!("batch of {} detections from {}", batch.len(), detector.name());
                if !state.commit_batch(token, batch) {
                    log::debug!("discarded stale or after-stop detection response");
                }
            }
            Err(e) => {
                log::warn!("detection submit failed: {:#}", e);
                state.record_failure(token, &format!("{:#}", e), on_failure);
            }
        }
    });
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
