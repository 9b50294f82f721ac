//! Class labels and per-disease advisory text.
//!
//! The catalog is data, not code: it ships as `data/disease_catalog.json` and
//! is embedded as the default so a binary without a `catalog_path` still
//! serves the stock taxonomy.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    config::{ConfigError, ConfigResult},
    error::UnknownClassError,
};

const BUILTIN_CATALOG: &str = include_str!("../data/disease_catalog.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ringan,
    Sedang,
    Berat,
    Sehat,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Ringan => "ringan",
            Severity::Sedang => "sedang",
            Severity::Berat => "berat",
            Severity::Sehat => "sehat",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseInfo {
    pub severity: Severity,
    pub description: String,
    pub recommendations: Vec<String>,
}

/// Metadata for a resolved class index.
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    pub label: &'a str,
    pub info: &'a DiseaseInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiseaseCatalog {
    class_labels: Vec<String>,
    disease_metadata: HashMap<String, DiseaseInfo>,
}

impl DiseaseCatalog {
    pub fn new(
        class_labels: Vec<String>,
        disease_metadata: HashMap<String, DiseaseInfo>,
    ) -> ConfigResult<Self> {
        let catalog = Self {
            class_labels,
            disease_metadata,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn builtin() -> ConfigResult<Self> {
        Self::from_json(BUILTIN_CATALOG, Path::new("<builtin>"))
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw, path)
    }

    fn from_json(raw: &str, origin: &Path) -> ConfigResult<Self> {
        let catalog: Self = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.class_labels.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "class_labels must not be empty".to_string(),
            });
        }
        let mut seen = HashSet::new();
        for label in &self.class_labels {
            if !seen.insert(label.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "class_labels".to_string(),
                    value: label.clone(),
                    reason: "duplicate label".to_string(),
                });
            }
            let info = self
                .disease_metadata
                .get(label)
                .ok_or_else(|| ConfigError::MissingMetadata {
                    label: label.clone(),
                })?;
            if info.description.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "description".to_string(),
                    value: label.clone(),
                    reason: "description must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.class_labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.class_labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.class_labels
    }

    pub fn resolve(&self, index: usize) -> Result<Resolved<'_>, UnknownClassError> {
        let unknown = || UnknownClassError {
            index,
            known: self.class_labels.len(),
        };
        let label = self.class_labels.get(index).ok_or_else(unknown)?;
        let info = self.disease_metadata.get(label).ok_or_else(unknown)?;
        Ok(Resolved { label, info })
    }
}
