//! Frame ingestion sources.
//!
//! This module supplies the live feed the sampler draws stills from:
//! - HTTP cameras (single-JPEG snapshot endpoints and MJPEG streams)
//! - Stub source (`stub://`, synthetic frames for tests)
//!
//! The ingestion layer is responsible for:
//! - Fetching and decoding frames in-memory
//! - Reporting the feed's native dimensions (they size the overlay surface)
//! - Answering "no frame available" without failing the sampling loop
//!
//! The ingestion layer does NOT detect anything and does not retain frames
//! beyond handing the latest one to the sampler.

pub mod camera;

pub use camera::{CameraConfig, CameraSource, CameraStats};
