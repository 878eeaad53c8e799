//! Camera frame source.
//!
//! `CameraSource` hides two backends behind one start/stop surface:
//! - `stub://` URLs produce deterministic synthetic frames, so the pipeline
//!   runs end to end in tests without hardware.
//! - `http(s)://` URLs speak to snapshot cameras. A `multipart` content type
//!   on connect means an MJPEG stream; anything else is treated as a
//!   single-JPEG snapshot endpoint fetched per capture.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::{Duration, Instant};
use url::Url;

use crate::frame::Frame;

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Feed URL. Supported schemes: stub:// for synthetic frames,
    /// http(s):// for snapshot/MJPEG cameras.
    pub url: String,
    /// Frame width (synthetic frames only; real cameras report their own).
    pub width: u32,
    /// Frame height (synthetic frames only).
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "stub://sorting_bench".to_string(),
            width: 640,
            height: 480,
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub url: String,
}

/// Live camera feed.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    Http(HttpCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.url.starts_with("stub://") {
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            });
        }
        let url = Url::parse(&config.url).context("parse camera url")?;
        match url.scheme() {
            "http" | "https" => Ok(Self {
                backend: CameraBackend::Http(HttpCamera::new(config)),
            }),
            other => Err(anyhow!(
                "unsupported camera scheme '{}'; expected stub or http(s)",
                other
            )),
        }
    }

    /// Start the feed. For HTTP cameras this probes the endpoint and decides
    /// between snapshot and MJPEG mode.
    pub fn start(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.start(),
            CameraBackend::Http(camera) => camera.start(),
        }
    }

    /// Stop the feed. Subsequent captures report "no frame" until restarted.
    pub fn stop(&mut self) {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.stop(),
            CameraBackend::Http(camera) => camera.stop(),
        }
    }

    /// Capture the current frame.
    ///
    /// `Ok(None)` means the source has no frame ready (not started, or the
    /// stream has not produced one yet); the sampler skips that tick
    /// silently. `Err` is a real capture failure.
    pub fn current_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.current_frame(),
            CameraBackend::Http(camera) => camera.current_frame(),
        }
    }

    /// Native dimensions of the feed, known once a frame has been captured.
    pub fn native_size(&self) -> Option<(u32, u32)> {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.native_size(),
            CameraBackend::Http(camera) => camera.native_size(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.is_healthy(),
            CameraBackend::Http(camera) => camera.is_healthy(),
        }
    }

    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.stats(),
            CameraBackend::Http(camera) => camera.stats(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    running: bool,
    frame_count: u64,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            running: false,
            frame_count: 0,
        }
    }

    fn start(&mut self) -> Result<()> {
        self.running = true;
        log::info!("CameraSource: started {} (synthetic)", self.config.url);
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn current_frame(&mut self) -> Result<Option<Frame>> {
        if !self.running {
            return Ok(None);
        }
        self.frame_count += 1;

        // Deterministic moving pattern; varies per frame so consumers can
        // tell captures apart.
        let pixel_count = (self.config.width * self.config.height * 3) as usize;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count * 7) % 256) as u8;
        }

        let frame = Frame::new(pixels, self.config.width, self.config.height)?;
        Ok(Some(frame))
    }

    fn native_size(&self) -> Option<(u32, u32)> {
        Some((self.config.width, self.config.height))
    }

    fn is_healthy(&self) -> bool {
        self.running
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// HTTP snapshot / MJPEG source
// ----------------------------------------------------------------------------

struct HttpCamera {
    config: CameraConfig,
    mode: Option<HttpMode>,
    native: Option<(u32, u32)>,
    last_frame_at: Option<Instant>,
    started_at: Option<Instant>,
    frame_count: u64,
}

enum HttpMode {
    Snapshot,
    Mjpeg(MjpegStream),
}

impl HttpCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            mode: None,
            native: None,
            last_frame_at: None,
            started_at: None,
            frame_count: 0,
        }
    }

    fn start(&mut self) -> Result<()> {
        let response = ureq::get(&self.config.url)
            .call()
            .context("connect to camera")?;
        let content_type = response.header("Content-Type").unwrap_or("");
        if content_type.to_lowercase().contains("multipart") {
            let reader = response.into_reader();
            self.mode = Some(HttpMode::Mjpeg(MjpegStream::new(reader)));
            log::info!("CameraSource: started {} (mjpeg)", self.config.url);
        } else {
            self.mode = Some(HttpMode::Snapshot);
            log::info!("CameraSource: started {} (snapshot)", self.config.url);
        }
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn stop(&mut self) {
        self.mode = None;
        self.started_at = None;
    }

    fn current_frame(&mut self) -> Result<Option<Frame>> {
        let Some(mode) = self.mode.as_mut() else {
            return Ok(None);
        };
        let jpeg = match mode {
            HttpMode::Snapshot => fetch_snapshot(&self.config.url)?,
            HttpMode::Mjpeg(stream) => stream.read_next_jpeg()?,
        };
        let frame = Frame::from_encoded(&jpeg)?;
        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        self.native = Some((frame.width(), frame.height()));
        Ok(Some(frame))
    }

    fn native_size(&self) -> Option<(u32, u32)> {
        self.native
    }

    fn is_healthy(&self) -> bool {
        let Some(started_at) = self.started_at else {
            return false;
        };
        match self.last_frame_at {
            Some(last) => last.elapsed() <= Duration::from_secs(5),
            None => started_at.elapsed() <= Duration::from_secs(5),
        }
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

fn fetch_snapshot(url: &str) -> Result<Vec<u8>> {
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("fetch snapshot from {}", url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_JPEG_BYTES as u64)
        .read_to_end(&mut bytes)
        .context("read snapshot")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty snapshot"));
    }
    Ok(bytes)
}

struct MjpegStream {
    reader: Box<dyn Read + Send>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    /// Reads until one complete JPEG (SOI..EOI) is buffered.
    fn read_next_jpeg(&mut self) -> Result<Vec<u8>> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let jpeg = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(jpeg);
            }

            let read = self.reader.read(&mut chunk).context("read mjpeg chunk")?;
            if read == 0 {
                return Err(anyhow!("mjpeg stream ended"));
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                // Stuck mid-frame; keep only the tail and resync.
                let drain_len = self.buffer.len() - 2;
                self.buffer.drain(..drain_len);
            }
        }
    }
}

fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer
        .windows(2)
        .position(|w| w == [0xFF, 0xD8])?;
    let end = buffer[start + 2..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])
        .map(|i| start + 2 + i + 2)?;
    Some((start, end))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CameraConfig {
        CameraConfig {
            url: "stub://test".to_string(),
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn synthetic_camera_produces_configured_frames() -> Result<()> {
        let mut camera = CameraSource::new(stub_config())?;
        camera.start()?;

        let frame = camera.current_frame()?.expect("frame after start");
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
        assert_eq!(camera.native_size(), Some((64, 48)));
        Ok(())
    }

    #[test]
    fn frames_differ_across_captures() -> Result<()> {
        let mut camera = CameraSource::new(stub_config())?;
        camera.start()?;

        let first = camera.current_frame()?.expect("first frame");
        let second = camera.current_frame()?.expect("second frame");
        assert_ne!(first.pixels(), second.pixels());
        Ok(())
    }

    #[test]
    fn unstarted_and_stopped_cameras_have_no_frame() -> Result<()> {
        let mut camera = CameraSource::new(stub_config())?;
        assert!(camera.current_frame()?.is_none());

        camera.start()?;
        assert!(camera.current_frame()?.is_some());

        camera.stop();
        assert!(camera.current_frame()?.is_none());
        assert!(!camera.is_healthy());
        Ok(())
    }

    #[test]
    fn rejects_unsupported_schemes() {
        let config = CameraConfig {
            url: "rtsp://camera-1/stream".to_string(),
            ..stub_config()
        };
        assert!(CameraSource::new(config).is_err());
    }

    #[test]
    fn stats_count_captured_frames() -> Result<()> {
        let mut camera = CameraSource::new(stub_config())?;
        camera.start()?;
        camera.current_frame()?;
        camera.current_frame()?;

        let stats = camera.stats();
        assert_eq!(stats.frames_captured, 2);
        assert_eq!(stats.url, "stub://test");
        Ok(())
    }

    #[test]
    fn finds_jpeg_bounds_in_a_chunked_buffer() {
        let mut buffer = vec![0x00, 0x11];
        buffer.extend_from_slice(&[0xFF, 0xD8, 0xAA, 0xBB, 0xFF, 0xD9]);
        buffer.extend_from_slice(&[0x22]);

        let (start, end) = find_jpeg_bounds(&buffer).expect("bounds");
        assert_eq!(&buffer[start..end], &[0xFF, 0xD8, 0xAA, 0xBB, 0xFF, 0xD9]);
        assert!(find_jpeg_bounds(&buffer[..4]).is_none());
    }
}
