//! Runs the real tract pipeline against `tests/fixtures/leaf_classifier.onnx`:
//! an 8x8x3 input, flattened, multiplied by a [192, 4] weight matrix and
//! softmaxed. Red pixels vote for class 0, blue for class 1, green for
//! class 3; class 2 has no weight.

mod common;

use std::io::Cursor;

use actix_web::{App, http::StatusCode, test, web};
use corn_leaf_server::{
    AppState, Classifier, InputSize, OnnxClassifier, ServiceConfig, TopPrediction,
    preprocess::Preprocessor, server,
};
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::Value;

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/leaf_classifier.onnx");
const SIDE: u32 = 8;

fn solid_png(color: [u8; 3]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::from(RgbImage::from_pixel(SIDE, SIDE, Rgb(color)))
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode png");
    buf.into_inner()
}

fn fixture_config() -> ServiceConfig {
    ServiceConfig {
        model_path: FIXTURE.into(),
        input_size: InputSize::square(SIDE),
        ..common::test_config()
    }
}

#[::core::prelude::v1::test]
fn blank_input_yields_uniform_finite_scores() {
    let classifier = OnnxClassifier::load(FIXTURE, InputSize::square(SIDE)).expect("load fixture");
    let scores = classifier
        .predict(Preprocessor::new(InputSize::square(SIDE)).blank())
        .expect("forward pass");

    assert_eq!(scores.len(), 4);
    assert!(scores.iter().all(|s| s.is_finite()));
    for score in &scores {
        assert!((score - 0.25).abs() < 1e-5, "{scores:?}");
    }
    let total: f32 = scores.iter().sum();
    assert!((total - 1.0).abs() < 1e-5);
}

#[::core::prelude::v1::test]
fn pixel_colour_drives_top_class() {
    let classifier = OnnxClassifier::load(FIXTURE, InputSize::square(SIDE)).expect("load fixture");
    let preprocessor = Preprocessor::new(InputSize::square(SIDE));

    let green = classifier
        .predict(preprocessor.preprocess(&solid_png([0, 255, 0])).unwrap())
        .unwrap();
    let top = TopPrediction::from_scores(&green).unwrap();
    assert_eq!(top.index, 3);
    // softmax([0, 0, 0, 1])[3] = e / (3 + e)
    assert!((top.confidence - 47.54).abs() < 0.05, "{}", top.confidence);

    let red = classifier
        .predict(preprocessor.preprocess(&solid_png([255, 0, 0])).unwrap())
        .unwrap();
    assert_eq!(TopPrediction::from_scores(&red).unwrap().index, 0);
}

#[actix_web::test]
async fn state_from_config_passes_warm_up() {
    let state = AppState::from_config(&fixture_config()).expect("fixture model loads");
    assert_eq!(state.model_name, "CNN 8px loaded");
    assert_eq!(state.catalog.len(), 4);
}

#[actix_web::test]
async fn upload_through_real_model() {
    let state = AppState::from_config(&fixture_config()).expect("fixture model loads");
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(server::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/predict?filename=green.png")
        .insert_header(("content-type", "image/png"))
        .set_payload(solid_png([0, 255, 0]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["disease_name"], "Sehat (Healthy)");
    assert_eq!(body["severity"], "sehat");
    assert_eq!(body["filename"], "green.png");
    let confidence = body["confidence"].as_f64().unwrap();
    assert!((confidence - 47.54).abs() < 0.05, "{confidence}");
}
