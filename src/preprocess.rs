use image::imageops::FilterType;
use tract_onnx::prelude::tract_ndarray::Array4;

use crate::{config::InputSize, error::DecodeError};

/// Batched NHWC image tensor, values in `[0, 1]`.
pub type ImageTensor = Array4<f32>;

#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    input_size: InputSize,
    filter: FilterType,
}

impl Preprocessor {
    /// Bicubic resampling, the PIL default the classifier was trained with.
    pub fn new(input_size: InputSize) -> Self {
        Self {
            input_size,
            filter: FilterType::CatmullRom,
        }
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    pub fn input_size(&self) -> InputSize {
        self.input_size
    }

    /// Decodes, converts to RGB, resizes and scales into a `[1, H, W, 3]` tensor.
    pub fn preprocess(&self, bytes: &[u8]) -> Result<ImageTensor, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        let image = image::load_from_memory(bytes)?;
        let InputSize { height, width } = self.input_size;
        let rgb = image.resize_exact(width, height, self.filter).to_rgb8();

        Ok(Array4::from_shape_fn(
            (1, height as usize, width as usize, 3),
            |(_, y, x, c)| rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0,
        ))
    }

    pub fn blank(&self) -> ImageTensor {
        let InputSize { height, width } = self.input_size;
        Array4::zeros((1, height as usize, width as usize, 3))
    }
}
