//! Sortcam detection-overlay pipeline.
//!
//! This crate implements the core of a live waste-classification display:
//! frames are sampled from a camera feed on a fixed cadence, submitted to a
//! remote inference service, and the returned bounding boxes are projected
//! onto an overlay surface sized to the live display.
//!
//! # Architecture
//!
//! Data flows through one cooperative timeline:
//!
//! 1. `ingest`: a [`CameraSource`] supplies frames (synthetic `stub://`
//!    sources for tests, HTTP snapshot/MJPEG cameras in production).
//! 2. `sampler`: a repeating timer captures a still, encodes it as JPEG and
//!    submits it fire-and-forget, so a slow request never stalls the cadence.
//! 3. `detect`: the [`Detector`] posts the image as multipart form data and
//!    parses the `{ "detections": [...] }` response into a [`DetectionBatch`].
//! 4. `state`: [`ViewState`] commits the batch only if it is still current
//!    (capture on, same epoch, newer than the last committed response).
//! 5. `overlay`: [`OverlayRenderer`] redraws boxes and labels onto a fresh
//!    transparent surface scaled from detector space to display space.
//!
//! The surrounding page, styling and upload form are external collaborators;
//! they only render what [`ViewState`] holds.
//!
//! # Module Structure
//!
//! - `config`: file + environment configuration
//! - `frame`: captured frame container
//! - `ingest`: camera frame sources
//! - `detect`: detection service client and result types
//! - `overlay`: detector-space to display-space rendering
//! - `sampler`: the cadence timer
//! - `state`: capture flag and latest-batch container
//! - `pipeline`: wiring and lifecycle

pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod pipeline;
pub mod sampler;
pub mod state;

pub use config::{BoxOrigin, FailurePolicy, SortcamConfig};
pub use detect::{Detection, DetectionBatch, Detector, HttpDetectionClient};
pub use frame::Frame;
pub use ingest::CameraSource;
pub use overlay::{DisplayFrame, OverlayRenderer};
pub use pipeline::Pipeline;
pub use sampler::{Sampler, SamplerHandle};
pub use state::{CaptureState, RequestToken, ViewState};
