use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const DEFAULT_ENDPOINT_URL: &str = "http://127.0.0.1:15000/predict";
const DEFAULT_REQUEST_TIMEOUT_S: u64 = 10;
const DEFAULT_INTERVAL_MS: u64 = 500;
const DEFAULT_DETECTOR_INPUT: u32 = 416;
const DEFAULT_CONF_THRESHOLD: f32 = 0.5;
const DEFAULT_CAMERA_URL: &str = "stub://sorting_bench";
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;

#[derive(Debug, Deserialize, Default)]
struct SortcamConfigFile {
    endpoint: Option<EndpointConfigFile>,
    sampler: Option<SamplerConfigFile>,
    detector: Option<DetectorConfigFile>,
    overlay: Option<OverlayConfigFile>,
    camera: Option<CameraConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct EndpointConfigFile {
    url: Option<String>,
    timeout_s: Option<u64>,
    on_failure: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct SamplerConfigFile {
    interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    input_width: Option<u32>,
    input_height: Option<u32>,
    box_origin: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    confidence_threshold: Option<f32>,
    font_path: Option<PathBuf>,
    preview_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Interpretation of the `(x, y)` coordinate a detection carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoxOrigin {
    /// `(x, y)` is the top-left corner of the box.
    #[default]
    TopLeft,
    /// `(x, y)` is the center of the box.
    Center,
}

impl BoxOrigin {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "top-left" => Ok(Self::TopLeft),
            "center" => Ok(Self::Center),
            other => Err(anyhow!(
                "unknown box origin '{}'; expected 'top-left' or 'center'",
                other
            )),
        }
    }
}

/// What happens to the current detections when a submission fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Keep the last successful batch on screen (tolerates transient blips).
    #[default]
    Retain,
    /// Clear the overlay on any failed request.
    Clear,
}

impl FailurePolicy {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "retain" => Ok(Self::Retain),
            "clear" => Ok(Self::Clear),
            other => Err(anyhow!(
                "unknown failure policy '{}'; expected 'retain' or 'clear'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SortcamConfig {
    pub endpoint: EndpointSettings,
    pub sampler: SamplerSettings,
    pub detector: DetectorSettings,
    pub overlay: OverlaySettings,
    pub camera: CameraSettings,
}

#[derive(Debug, Clone)]
pub struct EndpointSettings {
    pub url: String,
    pub timeout: Duration,
    pub on_failure: FailurePolicy,
}

#[derive(Debug, Clone)]
pub struct SamplerSettings {
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub input_width: u32,
    pub input_height: u32,
    pub box_origin: BoxOrigin,
}

#[derive(Debug, Clone)]
pub struct OverlaySettings {
    pub confidence_threshold: f32,
    pub font_path: Option<PathBuf>,
    pub preview_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl Default for SortcamConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointSettings {
                url: DEFAULT_ENDPOINT_URL.to_string(),
                timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_S),
                on_failure: FailurePolicy::default(),
            },
            sampler: SamplerSettings {
                interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            },
            detector: DetectorSettings {
                input_width: DEFAULT_DETECTOR_INPUT,
                input_height: DEFAULT_DETECTOR_INPUT,
                box_origin: BoxOrigin::default(),
            },
            overlay: OverlaySettings {
                confidence_threshold: DEFAULT_CONF_THRESHOLD,
                font_path: None,
                preview_path: None,
            },
            camera: CameraSettings {
                url: DEFAULT_CAMERA_URL.to_string(),
                width: DEFAULT_CAMERA_WIDTH,
                height: DEFAULT_CAMERA_HEIGHT,
            },
        }
    }
}

impl SortcamConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SORTCAM_CONFIG").ok();
        Self::load_with(config_path.as_deref().map(Path::new))
    }

    /// Loads from an explicit file path (or pure defaults), then applies
    /// environment overrides and validates.
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SortcamConfigFile) -> Result<Self> {
        let endpoint = EndpointSettings {
            url: file
                .endpoint
                .as_ref()
                .and_then(|endpoint| endpoint.url.clone())
                .unwrap_or_else(|| DEFAULT_ENDPOINT_URL.to_string()),
            timeout: Duration::from_secs(
                file.endpoint
                    .as_ref()
                    .and_then(|endpoint| endpoint.timeout_s)
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_S),
            ),
            on_failure: file
                .endpoint
                .as_ref()
                .and_then(|endpoint| endpoint.on_failure.as_deref())
                .map(FailurePolicy::parse)
                .transpose()?
                .unwrap_or_default(),
        };
        let sampler = SamplerSettings {
            interval: Duration::from_millis(
                file.sampler
                    .as_ref()
                    .and_then(|sampler| sampler.interval_ms)
                    .unwrap_or(DEFAULT_INTERVAL_MS),
            ),
        };
        let detector = DetectorSettings {
            input_width: file
                .detector
                .as_ref()
                .and_then(|detector| detector.input_width)
                .unwrap_or(DEFAULT_DETECTOR_INPUT),
            input_height: file
                .detector
                .as_ref()
                .and_then(|detector| detector.input_height)
                .unwrap_or(DEFAULT_DETECTOR_INPUT),
            box_origin: file
                .detector
                .as_ref()
                .and_then(|detector| detector.box_origin.as_deref())
                .map(BoxOrigin::parse)
                .transpose()?
                .unwrap_or_default(),
        };
        let overlay = OverlaySettings {
            confidence_threshold: file
                .overlay
                .as_ref()
                .and_then(|overlay| overlay.confidence_threshold)
                .unwrap_or(DEFAULT_CONF_THRESHOLD),
            font_path: file
                .overlay
                .as_ref()
                .and_then(|overlay| overlay.font_path.clone()),
            preview_path: file.overlay.and_then(|overlay| overlay.preview_path),
        };
        let camera = CameraSettings {
            url: file
                .camera
                .as_ref()
                .and_then(|camera| camera.url.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: file
                .camera
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_CAMERA_HEIGHT),
        };
        Ok(Self {
            endpoint,
            sampler,
            detector,
            overlay,
            camera,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("SORTCAM_ENDPOINT") {
            if !url.trim().is_empty() {
                self.endpoint.url = url;
            }
        }
        if let Ok(policy) = std::env::var("SORTCAM_ON_FAILURE") {
            if !policy.trim().is_empty() {
                self.endpoint.on_failure = FailurePolicy::parse(policy.trim())?;
            }
        }
        if let Ok(url) = std::env::var("SORTCAM_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(interval) = std::env::var("SORTCAM_INTERVAL_MS") {
            let millis: u64 = interval.parse().map_err(|_| {
                anyhow!("SORTCAM_INTERVAL_MS must be an integer number of milliseconds")
            })?;
            self.sampler.interval = Duration::from_millis(millis);
        }
        if let Ok(threshold) = std::env::var("SORTCAM_CONF_THRESHOLD") {
            let threshold: f32 = threshold
                .parse()
                .map_err(|_| anyhow!("SORTCAM_CONF_THRESHOLD must be a number in [0, 1]"))?;
            self.overlay.confidence_threshold = threshold;
        }
        if let Ok(path) = std::env::var("SORTCAM_FONT_PATH") {
            if !path.trim().is_empty() {
                self.overlay.font_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(path) = std::env::var("SORTCAM_PREVIEW_PATH") {
            if !path.trim().is_empty() {
                self.overlay.preview_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        let endpoint = Url::parse(&self.endpoint.url)
            .map_err(|e| anyhow!("invalid endpoint url {}: {}", self.endpoint.url, e))?;
        match endpoint.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported endpoint scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        if self.sampler.interval.is_zero() {
            return Err(anyhow!("sampling interval must be greater than zero"));
        }
        if self.detector.input_width == 0 || self.detector.input_height == 0 {
            return Err(anyhow!("detector input size must be non-zero"));
        }
        let threshold = self.overlay.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) || !threshold.is_finite() {
            return Err(anyhow!(
                "confidence threshold must be within [0, 1], got {}",
                threshold
            ));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera frame size must be non-zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<SortcamConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
