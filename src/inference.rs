use std::path::Path;

use tract_onnx::prelude::*;

use crate::{config::InputSize, error::InferenceError, preprocess::ImageTensor};

/// A loaded image classifier. Implementations must be safe to call from
/// many request workers at once without external locking.
pub trait Classifier: Send + Sync {
    fn predict(&self, input: ImageTensor) -> Result<Vec<f32>, InferenceError>;
}

pub struct OnnxClassifier {
    plan: TypedRunnableModel<TypedModel>,
}

impl OnnxClassifier {
    pub fn load(path: impl AsRef<Path>, input_size: InputSize) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        let InputSize { height, width } = input_size;
        let plan = tract_onnx::onnx()
            .model_for_path(path)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, height as usize, width as usize, 3),
                ),
            )?
            .into_optimized()?
            .into_runnable()?;
        Ok(Self { plan })
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, input: ImageTensor) -> Result<Vec<f32>, InferenceError> {
        let outputs = self.plan.run(tvec!(input.into_tensor().into()))?;
        let scores = outputs
            .first()
            .ok_or(InferenceError::EmptyOutput)?
            .to_array_view::<f32>()?
            .iter()
            .copied()
            .collect();
        Ok(scores)
    }
}

/// Winning class of a score vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopPrediction {
    pub index: usize,
    /// Percentage rounded to two decimals.
    pub confidence: f64,
}

impl TopPrediction {
    /// Argmax over `scores`; equal maxima resolve to the lowest index.
    pub fn from_scores(scores: &[f32]) -> Result<Self, InferenceError> {
        if let Some(bad) = scores.iter().position(|s| !s.is_finite()) {
            return Err(InferenceError::NonFinite(bad));
        }
        let (index, best) = scores
            .iter()
            .copied()
            .enumerate()
            .fold(None, |acc: Option<(usize, f32)>, (i, s)| match acc {
                Some((_, best)) if s <= best => acc,
                _ => Some((i, s)),
            })
            .ok_or(InferenceError::EmptyOutput)?;

        Ok(Self {
            index,
            confidence: round2(best as f64 * 100.0),
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
