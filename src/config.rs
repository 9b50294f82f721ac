use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Invalid value for field '{field}': {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Class label '{label}' has no disease metadata entry")]
    MissingMetadata { label: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Spatial input dimension the model was exported with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputSize {
    pub height: u32,
    pub width: u32,
}

impl InputSize {
    pub fn square(side: u32) -> Self {
        Self {
            height: side,
            width: side,
        }
    }
}

impl Default for InputSize {
    fn default() -> Self {
        Self::square(256)
    }
}

impl fmt::Display for InputSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.height == self.width {
            write!(f, "{}px", self.height)
        } else {
            write!(f, "{}x{}px", self.height, self.width)
        }
    }
}

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// ONNX export of the trained classifier
    pub model_path: PathBuf,
    pub input_size: InputSize,
    /// Falls back to the embedded catalog when unset
    pub catalog_path: Option<PathBuf>,
    /// Reported by the health endpoint
    pub model_name: Option<String>,
    /// Set to 0 to rely on the client default
    pub fetch_timeout_secs: u64,
    /// Set to 0 to disable the per-request deadline
    pub request_timeout_secs: u64,
    pub max_image_bytes: usize,
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            model_path: PathBuf::from("model/model.onnx"),
            input_size: InputSize::default(),
            catalog_path: None,
            model_name: None,
            fetch_timeout_secs: 10,
            request_timeout_secs: 30,
            max_image_bytes: 10 * 1024 * 1024, // 10MB
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.input_size.height == 0 || self.input_size.width == 0 {
            return Err(ConfigError::InvalidValue {
                field: "input_size".to_string(),
                value: self.input_size.to_string(),
                reason: "dimensions must be positive".to_string(),
            });
        }
        if self.max_image_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_image_bytes".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.model_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "model_path must not be empty".to_string(),
            });
        }
        self.log_filter()?;
        Ok(())
    }

    pub fn log_filter(&self) -> ConfigResult<log::LevelFilter> {
        match self.log_level.to_ascii_lowercase().as_str() {
            "trace" => Ok(log::LevelFilter::Trace),
            "debug" => Ok(log::LevelFilter::Debug),
            "info" => Ok(log::LevelFilter::Info),
            "warn" => Ok(log::LevelFilter::Warn),
            "error" => Ok(log::LevelFilter::Error),
            _ => Err(ConfigError::InvalidValue {
                field: "log_level".to_string(),
                value: self.log_level.clone(),
                reason: "expected one of trace, debug, info, warn, error".to_string(),
            }),
        }
    }

    pub fn model_name(&self) -> String {
        self.model_name
            .clone()
            .unwrap_or_else(|| format!("CNN {} loaded", self.input_size))
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_secs > 0).then(|| Duration::from_secs(self.fetch_timeout_secs))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}
