//! Pipeline controller.
//!
//! Owns the wiring the daemon and tests share: configuration, the shared
//! view state, the detection client, the renderer, and the sampler lifecycle
//! for the on/off toggle. There are exactly two states; turning off stops
//! the cadence timer and clears the overlay, turning on re-acquires the
//! camera and resumes. A camera that cannot be acquired degrades to off with
//! a status message, and is only retried on the next explicit toggle.

use anyhow::{Context, Result};
use image::RgbaImage;
use std::sync::Arc;

use crate::config::SortcamConfig;
use crate::detect::{Detector, HttpDetectionClient};
use crate::ingest::{CameraConfig, CameraSource};
use crate::overlay::OverlayRenderer;
use crate::sampler::{Sampler, SamplerHandle};
use crate::state::{CaptureState, ViewState};

pub struct Pipeline {
    config: SortcamConfig,
    state: ViewState,
    detector: Arc<dyn Detector>,
    renderer: OverlayRenderer,
    running: Option<SamplerHandle>,
}

impl Pipeline {
    /// Builds the production pipeline with the HTTP detection client.
    pub fn new(config: SortcamConfig) -> Result<Self> {
        let client = HttpDetectionClient::new(&config.endpoint.url, config.endpoint.timeout)
            .context("build detection client")?;
        Self::with_detector(config, Arc::new(client))
    }

    /// Builds the pipeline around any detector; tests substitute stubs here.
    pub fn with_detector(config: SortcamConfig, detector: Arc<dyn Detector>) -> Result<Self> {
        let renderer = OverlayRenderer::from_settings(&config.detector, &config.overlay)?;
        Ok(Self {
            config,
            state: ViewState::new(CaptureState::Off),
            detector,
            renderer,
            running: None,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Shared handle to the pipeline state, for display consumers.
    pub fn state(&self) -> ViewState {
        self.state.clone()
    }

    pub fn renderer(&self) -> &OverlayRenderer {
        &self.renderer
    }

    /// Acquires the camera and starts sampling.
    pub fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Ok(());
        }
        let camera = CameraSource::new(CameraConfig {
            url: self.config.camera.url.clone(),
            width: self.config.camera.width,
            height: self.config.camera.height,
        })
        .and_then(|mut camera| camera.start().map(|()| camera))
        .map_err(|e| {
            self.state.set_status(format!("camera unavailable: {:#}", e));
            e.context("acquire camera")
        })?;

        if let Some((width, height)) = camera.native_size() {
            self.state
                .set_display(crate::overlay::DisplayFrame::new(width, height));
        }

        self.state.set_capture(CaptureState::On);
        self.state.set_status("video feed started");
        let sampler = Sampler::new(self.config.sampler.interval, self.config.endpoint.on_failure);
        self.running = Some(sampler.start(camera, Arc::clone(&self.detector), self.state.clone()));
        Ok(())
    }

    /// Stops sampling and clears the displayed detections.
    ///
    /// The off transition happens before the timer is joined, so a response
    /// landing during shutdown is already stale and gets discarded.
    pub fn stop(&mut self) {
        self.state.set_capture(CaptureState::Off);
        self.state.set_status("video feed stopped");
        if let Some(handle) = self.running.take() {
            handle.stop();
        }
    }

    pub fn toggle(&mut self) -> Result<()> {
        if self.is_running() {
            self.stop();
            Ok(())
        } else {
            self.start()
        }
    }

    /// Renders the overlay for the current state, or `None` while the feed
    /// has not reported a drawable display size yet.
    pub fn render_overlay(&self) -> Option<RgbaImage> {
        let snapshot = self.state.snapshot();
        let display = snapshot.display?;
        if !display.is_drawable() {
            return None;
        }
        Some(self.renderer.render(&snapshot.batch, display))
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.running.is_some() {
            self.stop();
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
