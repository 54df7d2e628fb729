use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::clip;
use core_config::{env_optional, env_or_default, env_parse};
use image::{DynamicImage, RgbImage, imageops::FilterType};
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::{debug, info, instrument};

use super::Embedder;
use crate::error::{RagError, RagResult};
use crate::inference::{DEFAULT_MAX_CONCURRENCY, DevicePreference, InferencePool, ModelSource};
use crate::models::{EmbeddingVector, Query};

pub const DEFAULT_CLIP_MODEL: &str = "openai/clip-vit-base-patch32";
/// Revision carrying the safetensors weights
pub const DEFAULT_CLIP_REVISION: &str = "refs/pr/15";

const END_OF_TEXT: &str = "<|endoftext|>";

/// Per-channel statistics the CLIP image tower was trained with
const IMAGE_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const IMAGE_STD: [f32; 3] = [0.268_629_54, 0.261_302_6, 0.275_777_1];

/// CLIP embedder configuration
#[derive(Debug, Clone)]
pub struct ClipConfig {
    pub source: ModelSource,
    pub device: DevicePreference,
    pub max_concurrency: usize,
}

impl ClipConfig {
    pub fn new(source: ModelSource) -> Self {
        Self {
            source,
            device: DevicePreference::Auto,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_device(mut self, device: DevicePreference) -> Self {
        self.device = device;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn from_env() -> RagResult<Self> {
        let source = ModelSource::new(
            env_or_default("CLIP_MODEL_ID", DEFAULT_CLIP_MODEL),
            env_or_default("CLIP_MODEL_REVISION", DEFAULT_CLIP_REVISION),
        );

        let device = match env_optional("INFERENCE_DEVICE") {
            Some(raw) => raw.parse().map_err(RagError::Config)?,
            None => DevicePreference::Auto,
        };

        let max_concurrency = env_parse("INFERENCE_MAX_CONCURRENCY", DEFAULT_MAX_CONCURRENCY)?;
        if max_concurrency == 0 {
            return Err(RagError::Config(
                "INFERENCE_MAX_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            source,
            device,
            max_concurrency,
        })
    }
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self::new(ModelSource::new(DEFAULT_CLIP_MODEL, DEFAULT_CLIP_REVISION))
    }
}

/// Loaded weights and tokenizer, shared read-only across requests
struct ClipState {
    model: clip::ClipModel,
    tokenizer: Tokenizer,
    device: Device,
    image_size: usize,
    max_text_len: usize,
    eos_id: u32,
}

impl ClipState {
    fn embed_text(&self, text: &str) -> RagResult<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| RagError::PipelineFailure(format!("Tokenization failed: {}", e)))?;

        let ids = fit_to_context(encoding.get_ids().to_vec(), self.max_text_len, self.eos_id);
        let input_ids = Tensor::new(ids.as_slice(), &self.device)?.unsqueeze(0)?;

        let features = self.model.get_text_features(&input_ids)?;
        Ok(features.squeeze(0)?.to_dtype(DType::F32)?.to_vec1::<f32>()?)
    }

    fn embed_image(&self, image: &RgbImage) -> RagResult<Vec<f32>> {
        let pixels = clip_pixels(image, self.image_size, &self.device)?.unsqueeze(0)?;

        let features = self.model.get_image_features(&pixels)?;
        Ok(features.squeeze(0)?.to_dtype(DType::F32)?.to_vec1::<f32>()?)
    }
}

/// CLIP ViT-B/32 embedder; text and image towers of one checkpoint.
pub struct ClipEmbedder {
    state: Arc<ClipState>,
    pool: InferencePool,
}

impl ClipEmbedder {
    /// Fetch the weights and build the model. Blocking.
    pub fn load(config: &ClipConfig) -> RagResult<Self> {
        let device = config.device.select()?;

        let weights_path = config.source.fetch("model.safetensors")?;
        let tokenizer_path = config.source.fetch("tokenizer.json")?;

        let weights = std::fs::read(&weights_path).map_err(|e| {
            RagError::Config(format!("Failed to read {}: {}", weights_path.display(), e))
        })?;
        let vb = VarBuilder::from_buffered_safetensors(weights, DType::F32, &device)?;

        let model_config = clip::ClipConfig::vit_base_patch32();
        let model = clip::ClipModel::new(vb, &model_config)?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| RagError::Config(format!("Failed to load CLIP tokenizer: {}", e)))?;
        let eos_id = tokenizer.token_to_id(END_OF_TEXT).ok_or_else(|| {
            RagError::Config(format!("CLIP tokenizer has no {} token", END_OF_TEXT))
        })?;

        info!(
            model = %config.source.model_id,
            revision = %config.source.revision,
            max_concurrency = config.max_concurrency,
            "CLIP embedder loaded"
        );

        Ok(Self {
            state: Arc::new(ClipState {
                model,
                tokenizer,
                device,
                image_size: model_config.image_size,
                max_text_len: model_config.text_config.max_position_embeddings,
                eos_id,
            }),
            pool: InferencePool::new(config.max_concurrency),
        })
    }
}

#[async_trait]
impl Embedder for ClipEmbedder {
    #[instrument(skip_all, fields(modality = query.modality()))]
    async fn embed(&self, query: &Query) -> RagResult<EmbeddingVector> {
        query.validate()?;

        let state = Arc::clone(&self.state);
        let query = query.clone();
        let values = self
            .pool
            .run(move || match &query {
                Query::Text(text) => state.embed_text(text),
                Query::Image(image) => state.embed_image(image),
            })
            .await?;

        let vector = EmbeddingVector::normalized(values)?;
        debug!(dimension = vector.len(), "Query embedded");
        Ok(vector)
    }
}

/// Truncate token ids to the text tower's context, keeping the end-of-text
/// token the tower pools on.
fn fit_to_context(mut ids: Vec<u32>, max_len: usize, eos_id: u32) -> Vec<u32> {
    if ids.len() > max_len && max_len > 0 {
        ids.truncate(max_len - 1);
        ids.push(eos_id);
    }
    ids
}

/// Shortest-side bicubic resize with a center crop to `size`, then
/// per-channel mean/std normalization, channels first.
fn clip_pixels(image: &RgbImage, size: usize, device: &Device) -> candle_core::Result<Tensor> {
    let resized = DynamicImage::ImageRgb8(image.clone())
        .resize_to_fill(size as u32, size as u32, FilterType::CatmullRom)
        .to_rgb8();

    let data = Tensor::from_vec(resized.into_raw(), (size, size, 3), device)?
        .permute((2, 0, 1))?;
    let mean = Tensor::new(&IMAGE_MEAN, device)?.reshape((3, 1, 1))?;
    let std = Tensor::new(&IMAGE_STD, device)?.reshape((3, 1, 1))?;

    (data.to_dtype(DType::F32)? / 255.)?
        .broadcast_sub(&mean)?
        .broadcast_div(&std)
}
