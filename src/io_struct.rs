use serde::{Deserialize, Serialize};

use crate::{catalog::Severity, media::InputReference};

#[derive(Debug, Deserialize, Serialize)]
pub struct PredictReqInput {
    pub image_url: Option<String>,
}

impl PredictReqInput {
    /// Blank URLs count as missing.
    pub fn image_url(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub success: bool,
    pub disease_name: String,
    pub confidence: f64,
    pub severity: Severity,
    /// Newline-delimited list.
    pub recommendations: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl PredictionResult {
    pub fn with_reference(mut self, reference: InputReference) -> Self {
        match reference {
            InputReference::ImageUrl(url) => self.image_url = Some(url),
            InputReference::Filename(name) => self.filename = Some(name),
        }
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
}
