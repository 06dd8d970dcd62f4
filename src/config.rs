//! Runtime configuration: where the service and the bundled samples live.

use std::env;
use std::path::PathBuf;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api/face-detection";
pub const DEFAULT_SAMPLES_DIR: &str = "samples";
/// Origin announced in strict (CORS) request mode. Pages opened from disk send `null`.
pub const DEFAULT_ORIGIN: &str = "null";

pub const ENV_API_URL: &str = "FACE_DETECT_API_URL";
pub const ENV_SAMPLES: &str = "FACE_DETECT_SAMPLES";
pub const ENV_ORIGIN: &str = "FACE_DETECT_ORIGIN";

/// Where bundled sample images are fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleLocation {
    Dir(PathBuf),
    Url(String),
}

impl SampleLocation {
    /// `http://` and `https://` values are URLs, anything else is a directory.
    pub fn parse(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            SampleLocation::Url(value.trim_end_matches('/').to_string())
        } else {
            SampleLocation::Dir(PathBuf::from(value))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL; `/detect` and `/health` are appended.
    pub api_base_url: String,
    pub samples: SampleLocation,
    pub origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            samples: SampleLocation::Dir(PathBuf::from(DEFAULT_SAMPLES_DIR)),
            origin: DEFAULT_ORIGIN.to_string(),
        }
    }
}

impl Config {
    /// Defaults, overridden by any of the `FACE_DETECT_*` variables that are set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = env::var(ENV_API_URL) {
            config = config.with_api_base_url(url);
        }
        if let Ok(samples) = env::var(ENV_SAMPLES) {
            config.samples = SampleLocation::parse(&samples);
        }
        if let Ok(origin) = env::var(ENV_ORIGIN) {
            config.origin = origin;
        }
        config
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}
