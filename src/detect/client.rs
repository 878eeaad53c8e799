//! HTTP client for the detection service.
//!
//! One captured JPEG goes out as a single `multipart/form-data` POST and a
//! JSON body shaped `{ "detections": [...] }` comes back. The multipart body
//! is framed by hand; the service only needs one file field, and the framing
//! is the mirror image of the MJPEG part scanning done on the ingest side.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::Duration;
use url::Url;

use crate::detect::result::DetectionBatch;

/// Form field the service reads the image from.
const FORM_FIELD: &str = "image";
/// Fixed multipart boundary; never appears in JPEG payloads in practice.
const BOUNDARY: &str = "sortcam-frame-7d0fa23b";
/// Upper bound on response bodies; detection lists are small.
const MAX_RESPONSE_BYTES: u64 = 1024 * 1024;

/// Submission seam between the sampler and the detection service.
///
/// The production implementation is [`HttpDetectionClient`]; tests substitute
/// canned or failing detectors at this boundary.
pub trait Detector: Send + Sync {
    /// Client identifier for log lines.
    fn name(&self) -> &'static str;

    /// Submits one encoded still image, returning the parsed batch.
    ///
    /// A malformed or empty response body is a *successful* empty batch; only
    /// transport failures, timeouts and non-2xx statuses are errors.
    fn submit(&self, jpeg: &[u8]) -> Result<DetectionBatch>;
}

/// Detection client speaking multipart HTTP to a configured endpoint.
pub struct HttpDetectionClient {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpDetectionClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(endpoint)
            .with_context(|| format!("parse detection endpoint {}", endpoint))?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported detection endpoint scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self {
            agent,
            endpoint: url.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Detector for HttpDetectionClient {
    fn name(&self) -> &'static str {
        "http"
    }

    fn submit(&self, jpeg: &[u8]) -> Result<DetectionBatch> {
        let body = multipart_body(FORM_FIELD, "frame.jpg", jpeg);
        let response = self
            .agent
            .post(&self.endpoint)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .send_bytes(&body)
            .with_context(|| format!("submit frame to {}", self.endpoint))?;

        let mut raw = Vec::new();
        response
            .into_reader()
            .take(MAX_RESPONSE_BYTES)
            .read_to_end(&mut raw)
            .context("read detection response")?;

        Ok(DetectionBatch::from_json(&raw))
    }
}

/// Frames a single file field as a `multipart/form-data` body.
fn multipart_body(field: &str, filename: &str, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipart_body_frames_the_payload() {
        let body = multipart_body("image", "frame.jpg", &[0xFF, 0xD8, 0xFF, 0xD9]);
        let text = String::from_utf8_lossy(&body);

        assert!(text.starts_with(&format!("--{}\r\n", BOUNDARY)));
        assert!(text.contains("Content-Disposition: form-data; name=\"image\"; filename=\"frame.jpg\""));
        assert!(text.contains("Content-Type: image/jpeg"));
        assert!(text.ends_with(&format!("\r\n--{}--\r\n", BOUNDARY)));

        let header_end = body.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
        assert_eq!(&body[header_end..header_end + 4], &[0xFF, 0xD8, 0xFF, 0xD9]);
    }

    #[test]
    fn rejects_non_http_endpoints() {
        assert!(HttpDetectionClient::new("ftp://example/predict", Duration::from_secs(1)).is_err());
        assert!(HttpDetectionClient::new("not a url", Duration::from_secs(1)).is_err());
    }
}
