// Shared fixtures for the integration tests
#![allow(dead_code)]

use std::{
    io::Cursor,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use actix_web::{App, HttpResponse, HttpServer, dev::ServerHandle, web};
use corn_leaf_server::{
    AppState, Classifier, DiseaseCatalog, InferenceError, InputSize, ServiceConfig,
    preprocess::ImageTensor,
};
use image::{ImageFormat, Rgb, RgbImage};

pub const TEST_INPUT_SIDE: u32 = 32;

pub fn leaf_png() -> Vec<u8> {
    let img = RgbImage::from_fn(24, 24, |x, y| Rgb([(x * 10) as u8, 180, (y * 10) as u8]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::from(img)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode png fixture");
    buf.into_inner()
}

/// Always returns the same scores and checks the tensor it receives.
pub struct StubClassifier {
    scores: Vec<f32>,
}

impl StubClassifier {
    pub fn new(scores: Vec<f32>) -> Self {
        Self { scores }
    }
}

impl Classifier for StubClassifier {
    fn predict(&self, input: ImageTensor) -> Result<Vec<f32>, InferenceError> {
        let side = TEST_INPUT_SIDE as usize;
        assert_eq!(input.shape(), &[1, side, side, 3]);
        Ok(self.scores.clone())
    }
}

/// Passes the startup warm-up, then fails every real request.
pub struct FailAfterWarmup {
    calls: AtomicUsize,
}

impl FailAfterWarmup {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl Classifier for FailAfterWarmup {
    fn predict(&self, _input: ImageTensor) -> Result<Vec<f32>, InferenceError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(vec![0.25; 4])
        } else {
            Err(InferenceError::Model("graph evaluation failed".to_string()))
        }
    }
}

pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        input_size: InputSize::square(TEST_INPUT_SIDE),
        fetch_timeout_secs: 5,
        request_timeout_secs: 10,
        ..Default::default()
    }
}

pub fn test_state_with(config: &ServiceConfig, classifier: Arc<dyn Classifier>) -> AppState {
    let catalog = DiseaseCatalog::builtin().expect("builtin catalog");
    // The mock host is on loopback; a proxy from the environment must not see it.
    let client = reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("http client");
    AppState::with_client(config, client, classifier, catalog).expect("app state")
}

pub fn test_state(scores: Vec<f32>) -> AppState {
    test_state_with(&test_config(), Arc::new(StubClassifier::new(scores)))
}

async fn serve_leaf() -> HttpResponse {
    HttpResponse::Ok().content_type("image/png").body(leaf_png())
}

async fn serve_text() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain")
        .body("field notes: leaves looked fine on monday")
}

async fn serve_large() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("image/png")
        .body(vec![0u8; 64 * 1024])
}

async fn serve_slow() -> HttpResponse {
    actix_web::rt::time::sleep(Duration::from_secs(3)).await;
    serve_leaf().await
}

/// Local stand-in for a remote image host. Unknown paths return 404.
pub struct MockImageHost {
    pub base_url: String,
    handle: ServerHandle,
}

impl MockImageHost {
    pub async fn start() -> Self {
        let server = HttpServer::new(|| {
            App::new()
                .route("/leaf.png", web::get().to(serve_leaf))
                .route("/notes.txt", web::get().to(serve_text))
                .route("/large.png", web::get().to(serve_large))
                .route("/slow.png", web::get().to(serve_slow))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("bind mock image host");
        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        Self {
            base_url: format!("http://{}", addr),
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}
