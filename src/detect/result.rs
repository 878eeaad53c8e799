use serde::{Deserialize, Serialize};

/// One detected object, in detector input coordinates.
///
/// Whether `(x, y)` is the top-left corner or the box center depends on the
/// service; the overlay projection takes that as configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub label: String,
    pub confidence: f32,
}

/// The full set of detections from one response.
///
/// A batch replaces the previous one wholesale; nothing is merged across
/// frames. Order is kept as received so display ordering stays stable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionBatch {
    detections: Vec<Detection>,
}

/// Response body of the detection service.
#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    detections: Vec<Detection>,
}

impl DetectionBatch {
    /// Builds a batch, dropping entries that violate the detection shape
    /// (non-finite coordinates, negative extents) and clamping confidence
    /// into `[0, 1]`.
    pub fn new(detections: Vec<Detection>) -> Self {
        let detections = detections
            .into_iter()
            .filter(|d| {
                [d.x, d.y, d.width, d.height, d.confidence]
                    .iter()
                    .all(|v| v.is_finite())
                    && d.width >= 0.0
                    && d.height >= 0.0
            })
            .map(|mut d| {
                d.confidence = d.confidence.clamp(0.0, 1.0);
                d
            })
            .collect();
        Self { detections }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a service response body.
    ///
    /// The shape is validated explicitly: an absent `detections` field or a
    /// body that does not deserialize yields an empty batch rather than an
    /// error, so the overlay clears instead of holding stale boxes.
    pub fn from_json(body: &[u8]) -> Self {
        match serde_json::from_slice::<PredictResponse>(body) {
            Ok(response) => Self::new(response.detections),
            Err(e) => {
                log::debug!("malformed detection response treated as empty: {}", e);
                Self::empty()
            }
        }
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
