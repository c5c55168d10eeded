//! Pretrained cat/dog classifier.
//!
//! The model is an externally trained artifact loaded as-is from a weights
//! record file. Nothing here trains; the network definition only has to
//! match the shape the weights were exported with.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::NdArray;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Linear, LinearConfig, PaddingConfig2d, Relu};
use burn::record::CompactRecorder;
use burn::tensor::activation::softmax;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use image::imageops::FilterType;
use thiserror::Error;
use tracing::{info, warn};

/// Images are resized to this square edge length before inference.
pub const IMAGE_SIZE: usize = 128;

pub type InferenceBackend = NdArray<f32>;

#[derive(Error, Debug)]
pub enum PredictorError {
    #[error("model is not loaded")]
    NotLoaded,

    #[error("could not decode image: {0}")]
    InvalidImage(#[from] image::ImageError),

    #[error("inference failed: {0}")]
    Inference(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Cat,
    Dog,
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Cat => write!(f, "Cat"),
            Label::Dog => write!(f, "Dog"),
        }
    }
}

/// One classification result. Probabilities come straight from the model
/// softmax and are not re-normalized.
#[derive(Debug, Clone, Copy)]
pub struct Prediction {
    pub label: Label,
    pub confidence: f32,
    pub prob_cat: f32,
    pub prob_dog: f32,
}

/// Small CNN over 128x128 RGB input producing two class logits
/// (index 0 = cat, index 1 = dog).
#[derive(Module, Debug)]
pub struct CatDogModel<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    pool: MaxPool2d,
    fc1: Linear<B>,
    fc2: Linear<B>,
    activation: Relu,
}

impl<B: Backend> CatDogModel<B> {
    pub fn new(device: &B::Device) -> Self {
        let conv1 = Conv2dConfig::new([3, 16], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv2 = Conv2dConfig::new([16, 32], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        // Two 2x pools: 128 -> 64 -> 32 per spatial edge.
        let fc1 = LinearConfig::new(32 * (IMAGE_SIZE / 4) * (IMAGE_SIZE / 4), 128).init(device);
        let fc2 = LinearConfig::new(128, 2).init(device);

        Self {
            conv1,
            conv2,
            pool,
            fc1,
            fc2,
            activation: Relu::new(),
        }
    }

    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.activation.forward(self.conv1.forward(images));
        let x = self.pool.forward(x);
        let x = self.activation.forward(self.conv2.forward(x));
        let x = self.pool.forward(x);

        let [batch, channels, height, width] = x.dims();
        let x = x.reshape([batch, channels * height * width]);
        let x = self.activation.forward(self.fc1.forward(x));

        self.fc2.forward(x)
    }
}

/// Wraps the model together with its load state. A predictor that failed
/// to load still answers `is_loaded()` and info queries, it just refuses
/// to predict.
pub struct Predictor {
    // Burn modules are `Send` but not `Sync` (lazy parameter init uses
    // `OnceCell`), so the model is mutex-wrapped to let `Predictor` be
    // shared across request handlers.
    model: Option<Mutex<CatDogModel<InferenceBackend>>>,
    model_path: PathBuf,
    device: NdArrayDevice,
}

impl Predictor {
    /// Loads weights from `model_path` (a burn `CompactRecorder` record).
    /// A missing or unreadable record leaves the predictor unloaded
    /// rather than failing startup.
    pub fn load(model_path: impl Into<PathBuf>) -> Self {
        let model_path = model_path.into();
        let device = NdArrayDevice::default();

        let model = match CatDogModel::<InferenceBackend>::new(&device).load_file(
            model_path.clone(),
            &CompactRecorder::new(),
            &device,
        ) {
            Ok(model) => {
                info!("Loaded model weights from {}", model_path.display());
                Some(Mutex::new(model))
            }
            Err(e) => {
                warn!("Could not load model from {}: {e}", model_path.display());
                None
            }
        };

        Self {
            model,
            model_path,
            device,
        }
    }

    /// Builds a predictor around an already constructed model, bypassing
    /// the weights file. Used by tests.
    pub fn from_model(model: CatDogModel<InferenceBackend>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            model: Some(Mutex::new(model)),
            model_path: model_path.into(),
            device: NdArrayDevice::default(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn parameter_count(&self) -> usize {
        self.model
            .as_ref()
            .map_or(0, |m| m.lock().unwrap().num_params())
    }

    pub fn predict(&self, image_bytes: &[u8]) -> Result<Prediction, PredictorError> {
        let model = self
            .model
            .as_ref()
            .ok_or(PredictorError::NotLoaded)?
            .lock()
            .unwrap();

        let input = self.preprocess(image_bytes)?;
        let probs = softmax(model.forward(input), 1)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| PredictorError::Inference(format!("{e:?}")))?;

        let (prob_cat, prob_dog) = (probs[0], probs[1]);
        let label = if prob_dog > prob_cat {
            Label::Dog
        } else {
            Label::Cat
        };

        Ok(Prediction {
            label,
            confidence: prob_cat.max(prob_dog),
            prob_cat,
            prob_dog,
        })
    }

    /// Decode, resize to the model input size and scale to [0,1] CHW.
    fn preprocess(&self, bytes: &[u8]) -> Result<Tensor<InferenceBackend, 4>, PredictorError> {
        let img = image::load_from_memory(bytes)?
            .resize_exact(IMAGE_SIZE as u32, IMAGE_SIZE as u32, FilterType::Triangle)
            .to_rgb8();

        let mut data = vec![0.0f32; 3 * IMAGE_SIZE * IMAGE_SIZE];
        for (x, y, pixel) in img.enumerate_pixels() {
            for channel in 0..3 {
                data[channel * IMAGE_SIZE * IMAGE_SIZE + y as usize * IMAGE_SIZE + x as usize] =
                    pixel[channel] as f32 / 255.0;
            }
        }

        Ok(Tensor::from_data(
            TensorData::new(data, [1, 3, IMAGE_SIZE, IMAGE_SIZE]),
            &self.device,
        ))
    }
}
