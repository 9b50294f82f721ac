use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context;

use crate::{
    catalog::DiseaseCatalog,
    config::ServiceConfig,
    error::{InferenceError, PredictError, PredictResult},
    inference::{Classifier, OnnxClassifier, TopPrediction},
    io_struct::PredictionResult,
    media::{FetcherConfig, ImageFetcher, ImageSource},
    preprocess::Preprocessor,
};

/// Process-wide state shared by every worker. Nothing in here is mutated
/// after startup.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: ImageFetcher,
    pub preprocessor: Preprocessor,
    pub classifier: Arc<dyn Classifier>,
    pub catalog: Arc<DiseaseCatalog>,
    pub model_name: String,
    pub request_timeout: Option<Duration>,
}

impl AppState {
    /// Loads the catalog and the model named by `config`.
    pub fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        let catalog = match &config.catalog_path {
            Some(path) => DiseaseCatalog::load(path)?,
            None => DiseaseCatalog::builtin()?,
        };
        log::info!(
            "Loaded disease catalog with {} classes: {}",
            catalog.len(),
            catalog.labels().join(", ")
        );

        log::info!(
            "Loading model from {} (input {})",
            config.model_path.display(),
            config.input_size
        );
        let classifier = OnnxClassifier::load(&config.model_path, config.input_size)
            .with_context(|| format!("failed to load model {}", config.model_path.display()))?;

        Self::new(config, Arc::new(classifier), catalog)
    }

    pub fn new(
        config: &ServiceConfig,
        classifier: Arc<dyn Classifier>,
        catalog: DiseaseCatalog,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Self::with_client(config, client, classifier, catalog)
    }

    /// Same as [`AppState::new`] but fetches remote images through `client`,
    /// e.g. one built with `no_proxy()`.
    pub fn with_client(
        config: &ServiceConfig,
        client: reqwest::Client,
        classifier: Arc<dyn Classifier>,
        catalog: DiseaseCatalog,
    ) -> anyhow::Result<Self> {
        let fetcher = ImageFetcher::new(
            client,
            FetcherConfig {
                fetch_timeout: config.fetch_timeout(),
                max_image_bytes: config.max_image_bytes,
            },
        );
        let state = Self {
            fetcher,
            preprocessor: Preprocessor::new(config.input_size),
            classifier,
            catalog: Arc::new(catalog),
            model_name: config.model_name(),
            request_timeout: config.request_timeout(),
        };
        state.verify_model()?;
        Ok(state)
    }

    /// Runs one blank forward pass so a model/catalog mismatch fails startup
    /// instead of the first request.
    fn verify_model(&self) -> anyhow::Result<()> {
        let scores = self
            .classifier
            .predict(self.preprocessor.blank())
            .context("model warm-up pass failed")?;
        if scores.len() != self.catalog.len() {
            anyhow::bail!(
                "model outputs {} classes but the catalog defines {}",
                scores.len(),
                self.catalog.len()
            );
        }
        Ok(())
    }

    pub async fn predict(&self, source: ImageSource) -> PredictResult<PredictionResult> {
        match self.request_timeout {
            Some(timeout) => {
                let deadline = Deadline::after(timeout);
                tokio::time::timeout(timeout, self.run_pipeline(source, Some(deadline)))
                    .await
                    .map_err(|_| PredictError::Timeout(timeout))?
            }
            None => self.run_pipeline(source, None).await,
        }
    }

    async fn run_pipeline(
        &self,
        source: ImageSource,
        deadline: Option<Deadline>,
    ) -> PredictResult<PredictionResult> {
        let reference = source.reference();
        let bytes = self.fetcher.acquire(source).await?;

        let preprocessor = self.preprocessor;
        let classifier = self.classifier.clone();
        let scores = tokio::task::spawn_blocking(move || {
            classify(preprocessor, classifier.as_ref(), &bytes, deadline)
        })
        .await
        .map_err(InferenceError::from)??;

        let top = TopPrediction::from_scores(&scores)?;
        let resolved = self.catalog.resolve(top.index)?;

        Ok(PredictionResult {
            success: true,
            disease_name: resolved.label.to_string(),
            confidence: top.confidence,
            severity: resolved.info.severity,
            recommendations: resolved.info.recommendations.join("\n"),
            description: resolved.info.description.clone(),
            image_url: None,
            filename: None,
        }
        .with_reference(reference))
    }
}

/// Wall-clock deadline visible to the blocking worker. The async timeout
/// drops the awaiting future but cannot stop a `spawn_blocking` job, so the
/// worker checks this before starting the forward pass. A pass already
/// running is not interrupted.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    timeout: Duration,
}

impl Deadline {
    fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            timeout,
        }
    }

    fn check(&self) -> PredictResult<()> {
        if Instant::now() >= self.at {
            return Err(PredictError::Timeout(self.timeout));
        }
        Ok(())
    }
}

fn classify(
    preprocessor: Preprocessor,
    classifier: &dyn Classifier,
    bytes: &[u8],
    deadline: Option<Deadline>,
) -> PredictResult<Vec<f32>> {
    let tensor = preprocessor.preprocess(bytes)?;
    if let Some(deadline) = deadline {
        deadline.check()?;
    }
    Ok(classifier.predict(tensor)?)
}
