use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use reqwest::Client;
use url::Url;

use crate::error::FetchError;

#[derive(Clone, Debug)]
pub struct FetcherConfig {
    pub fetch_timeout: Option<Duration>,
    pub max_image_bytes: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Some(Duration::from_secs(10)),
            max_image_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Where the image for a prediction comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Url(String),
    Upload { filename: String, bytes: Bytes },
}

impl ImageSource {
    pub fn reference(&self) -> InputReference {
        match self {
            ImageSource::Url(url) => InputReference::ImageUrl(url.clone()),
            ImageSource::Upload { filename, .. } => InputReference::Filename(filename.clone()),
        }
    }
}

/// Echoed back to the client so it can match results to inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputReference {
    ImageUrl(String),
    Filename(String),
}

#[derive(Clone)]
pub struct ImageFetcher {
    client: Client,
    fetch_timeout: Option<Duration>,
    max_image_bytes: usize,
}

impl ImageFetcher {
    pub fn new(client: Client, config: FetcherConfig) -> Self {
        Self {
            client,
            fetch_timeout: config.fetch_timeout,
            max_image_bytes: config.max_image_bytes,
        }
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    pub async fn acquire(&self, source: ImageSource) -> Result<Bytes, FetchError> {
        match source {
            ImageSource::Url(url) => self.fetch(&url).await,
            // Upload bodies are capped while the payload is read.
            ImageSource::Upload { bytes, .. } => Ok(bytes),
        }
    }

    pub async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(FetchError::UnsupportedScheme {
                    url: url.to_string(),
                    scheme: other.to_string(),
                });
            }
        }

        let mut req = self.client.get(parsed.as_str());
        if let Some(timeout) = self.fetch_timeout {
            req = req.timeout(timeout);
        }

        let resp = req.send().await.map_err(|err| self.map_reqwest(url, err))?;
        let status = resp.status();
        log::debug!("GET {} -> {}", url, status);
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(len) = resp.content_length() {
            if len > self.max_image_bytes as u64 {
                return Err(FetchError::TooLarge {
                    url: url.to_string(),
                    limit: self.max_image_bytes,
                });
            }
        }

        // Content-Length can be absent or wrong, so the cap is enforced on the stream too.
        let mut body = BytesMut::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| self.map_reqwest(url, err))?;
            if body.len() + chunk.len() > self.max_image_bytes {
                return Err(FetchError::TooLarge {
                    url: url.to_string(),
                    limit: self.max_image_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }

    fn map_reqwest(&self, url: &str, err: reqwest::Error) -> FetchError {
        match self.fetch_timeout {
            Some(timeout) if err.is_timeout() => FetchError::Timeout {
                url: url.to_string(),
                timeout,
            },
            _ => FetchError::Request {
                url: url.to_string(),
                source: err,
            },
        }
    }
}
