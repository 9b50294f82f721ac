use std::time::Duration;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

pub type PredictResult<T> = Result<T, PredictError>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid image URL: {0}")]
    InvalidUrl(String),
    #[error("unsupported image URL scheme '{scheme}' in {url}")]
    UnsupportedScheme { url: String, scheme: String },
    #[error("failed to download image from {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to download image from {url}: HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("image download from {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    #[error("image at {url} exceeds the {limit} byte limit")]
    TooLarge { url: String, limit: usize },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("image payload is empty")]
    Empty,
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model error: {0}")]
    Model(String),
    #[error("model produced no scores")]
    EmptyOutput,
    #[error("model produced a non-finite score at index {0}")]
    NonFinite(usize),
    #[error("inference task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

// tract reports failures through anyhow.
impl From<anyhow::Error> for InferenceError {
    fn from(err: anyhow::Error) -> Self {
        InferenceError::Model(format!("{:#}", err))
    }
}

#[derive(Debug, Error)]
#[error("predicted class index {index} has no configured label ({known} classes known)")]
pub struct UnknownClassError {
    pub index: usize,
    pub known: usize,
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("image_url missing")]
    MissingImageUrl,
    #[error("{0}")]
    Validation(String),
    #[error("image payload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    UnknownClass(#[from] UnknownClassError),
    #[error("prediction timed out after {0:?}")]
    Timeout(Duration),
}

impl ResponseError for PredictError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictError::MissingImageUrl | PredictError::Validation(_) => StatusCode::BAD_REQUEST,
            PredictError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_bad_request() {
        assert_eq!(
            PredictError::MissingImageUrl.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PredictError::Validation("image body missing".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn downstream_errors_map_to_internal_error() {
        let fetch = PredictError::from(FetchError::Status {
            url: "http://host/leaf.jpg".into(),
            status: 404,
        });
        assert_eq!(fetch.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(fetch.to_string().contains("http://host/leaf.jpg"));

        let unknown = PredictError::from(UnknownClassError { index: 7, known: 4 });
        assert_eq!(unknown.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            PredictError::from(DecodeError::Empty).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn oversized_payload_maps_to_413() {
        let err = PredictError::PayloadTooLarge { limit: 16 };
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
