pub mod catalog;
pub mod config;
pub mod error;
pub mod inference;
pub mod io_struct;
pub mod media;
pub mod preprocess;
pub mod server;
pub mod state;

pub use catalog::{DiseaseCatalog, DiseaseInfo, Severity};
pub use config::{ConfigError, InputSize, ServiceConfig};
pub use error::{DecodeError, FetchError, InferenceError, PredictError, UnknownClassError};
pub use inference::{Classifier, OnnxClassifier, TopPrediction};
pub use state::AppState;
