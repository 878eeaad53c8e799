//! Detection service client.
//!
//! Detection itself is delegated to a remote inference service; this module
//! owns the request lifecycle against it:
//! - packaging a captured JPEG as a multipart form submission
//! - parsing the `{ "detections": [...] }` response into a typed batch
//! - degrading every failure path to "no new detections this tick"
//!
//! The client MUST NOT:
//! - Panic on a failed or malformed exchange
//! - Block the sampling cadence (submissions run fire-and-forget)
//! - Merge responses; each batch replaces the previous one wholesale

pub mod client;
pub mod result;

pub use client::{Detector, HttpDetectionClient};
pub use result::{Detection, DetectionBatch};
