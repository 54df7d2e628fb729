use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::blip;
use core_config::{env_or_default, env_parse};
use image::{DynamicImage, RgbImage, imageops::FilterType};
use std::sync::{Arc, Mutex};
use tokenizers::Tokenizer;
use tracing::{debug, info, instrument};

use super::Captioner;
use crate::error::{RagError, RagResult};
use crate::inference::{DEFAULT_MAX_CONCURRENCY, DevicePreference, InferencePool, ModelSource};

pub const DEFAULT_BLIP_MODEL: &str = "Salesforce/blip-image-captioning-large";
/// Revision carrying the safetensors weights
pub const DEFAULT_BLIP_REVISION: &str = "refs/pr/18";
pub const DEFAULT_MAX_CAPTION_TOKENS: usize = 50;

const IMAGE_SIZE: usize = 384;
const IMAGE_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const IMAGE_STD: [f32; 3] = [0.268_629_54, 0.261_302_6, 0.275_777_1];

/// Decoder start and end tokens of the BLIP text model
const BOS_TOKEN_ID: u32 = 30522;
const SEP_TOKEN_ID: u32 = 102;

/// BLIP captioner configuration
#[derive(Debug, Clone)]
pub struct BlipConfig {
    pub source: ModelSource,
    pub device: DevicePreference,
    pub max_tokens: usize,
    pub max_concurrency: usize,
}

impl BlipConfig {
    pub fn new(source: ModelSource) -> Self {
        Self {
            source,
            device: DevicePreference::Auto,
            max_tokens: DEFAULT_MAX_CAPTION_TOKENS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_device(mut self, device: DevicePreference) -> Self {
        self.device = device;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Reads BLIP_MODEL_ID, BLIP_MODEL_REVISION and CAPTION_MAX_TOKENS.
    /// Device and concurrency are shared with the embedder's settings.
    pub fn from_env(device: DevicePreference, max_concurrency: usize) -> RagResult<Self> {
        let source = ModelSource::new(
            env_or_default("BLIP_MODEL_ID", DEFAULT_BLIP_MODEL),
            env_or_default("BLIP_MODEL_REVISION", DEFAULT_BLIP_REVISION),
        );

        let max_tokens = env_parse("CAPTION_MAX_TOKENS", DEFAULT_MAX_CAPTION_TOKENS)?;
        if max_tokens == 0 {
            return Err(RagError::Config(
                "CAPTION_MAX_TOKENS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            source,
            device,
            max_tokens,
            max_concurrency,
        })
    }
}

impl Default for BlipConfig {
    fn default() -> Self {
        Self::new(ModelSource::new(DEFAULT_BLIP_MODEL, DEFAULT_BLIP_REVISION))
    }
}

struct BlipState {
    /// The text decoder keeps a KV cache, so generation is serialized
    model: Mutex<blip::BlipForConditionalGeneration>,
    tokenizer: Tokenizer,
    device: Device,
    max_tokens: usize,
}

impl BlipState {
    fn caption(&self, image: &RgbImage) -> RagResult<String> {
        let pixels = blip_pixels(image, &self.device).map_err(captioning_error)?;

        let token_ids = {
            let mut model = self
                .model
                .lock()
                .map_err(|_| RagError::CaptioningFailed("Captioning model lock poisoned".into()))?;
            let result = generate_tokens(&mut model, &pixels, &self.device, self.max_tokens);
            model.reset_kv_cache();
            result.map_err(captioning_error)?
        };

        let caption = self
            .tokenizer
            .decode(&token_ids, true)
            .map_err(|e| RagError::CaptioningFailed(format!("Failed to decode caption: {}", e)))?;
        let caption = caption.trim().to_string();

        if caption.is_empty() {
            return Err(RagError::CaptioningFailed(
                "Model produced an empty caption".to_string(),
            ));
        }

        Ok(caption)
    }
}

/// Greedy decoding; returns generated ids without the start token.
fn generate_tokens(
    model: &mut blip::BlipForConditionalGeneration,
    pixels: &Tensor,
    device: &Device,
    max_tokens: usize,
) -> candle_core::Result<Vec<u32>> {
    model.reset_kv_cache();

    let image_embeds = pixels.unsqueeze(0)?.apply(model.vision_model())?;
    let mut logits_processor = LogitsProcessor::new(0, None, None);

    let mut token_ids = vec![BOS_TOKEN_ID];
    for index in 0..max_tokens {
        let context_size = if index > 0 { 1 } else { token_ids.len() };
        let start_pos = token_ids.len().saturating_sub(context_size);
        let input_ids = Tensor::new(&token_ids[start_pos..], device)?.unsqueeze(0)?;

        let logits = model.text_decoder().forward(&input_ids, &image_embeds)?;
        let logits = logits.squeeze(0)?;
        let logits = logits.get(logits.dim(0)? - 1)?;

        let token = logits_processor.sample(&logits)?;
        if token == SEP_TOKEN_ID {
            break;
        }
        token_ids.push(token);
    }

    Ok(token_ids.split_off(1))
}

fn captioning_error(err: candle_core::Error) -> RagError {
    RagError::CaptioningFailed(err.to_string())
}

/// Pool failures (closed pool, panicked task) surface as captioning errors.
fn pool_error(err: RagError) -> RagError {
    match err {
        RagError::PipelineFailure(message) => RagError::CaptioningFailed(message),
        other => other,
    }
}

/// Resize to 384x384 and normalize with the BLIP image statistics, channels first.
fn blip_pixels(image: &RgbImage, device: &Device) -> candle_core::Result<Tensor> {
    let resized = DynamicImage::ImageRgb8(image.clone())
        .resize_to_fill(IMAGE_SIZE as u32, IMAGE_SIZE as u32, FilterType::Triangle)
        .to_rgb8();

    let data = Tensor::from_vec(resized.into_raw(), (IMAGE_SIZE, IMAGE_SIZE, 3), device)?
        .permute((2, 0, 1))?;
    let mean = Tensor::new(&IMAGE_MEAN, device)?.reshape((3, 1, 1))?;
    let std = Tensor::new(&IMAGE_STD, device)?.reshape((3, 1, 1))?;

    (data.to_dtype(DType::F32)? / 255.)?
        .broadcast_sub(&mean)?
        .broadcast_div(&std)
}

/// BLIP image captioning (large) with greedy decoding.
pub struct BlipCaptioner {
    state: Arc<BlipState>,
    pool: InferencePool,
}

impl BlipCaptioner {
    /// Fetch the weights and build the model. Blocking.
    pub fn load(config: &BlipConfig) -> RagResult<Self> {
        let device = config.device.select()?;

        let weights_path = config.source.fetch("model.safetensors")?;
        let tokenizer_path = config.source.fetch("tokenizer.json")?;

        let weights = std::fs::read(&weights_path).map_err(|e| {
            RagError::Config(format!("Failed to read {}: {}", weights_path.display(), e))
        })?;
        let vb = VarBuilder::from_buffered_safetensors(weights, DType::F32, &device)?;

        let model_config = blip::Config::image_captioning_large();
        let model = blip::BlipForConditionalGeneration::new(&model_config, vb)?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| RagError::Config(format!("Failed to load BLIP tokenizer: {}", e)))?;

        info!(
            model = %config.source.model_id,
            revision = %config.source.revision,
            max_tokens = config.max_tokens,
            "BLIP captioner loaded"
        );

        Ok(Self {
            state: Arc::new(BlipState {
                model: Mutex::new(model),
                tokenizer,
                device,
                max_tokens: config.max_tokens,
            }),
            pool: InferencePool::new(config.max_concurrency),
        })
    }
}

#[async_trait]
impl Captioner for BlipCaptioner {
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    async fn caption(&self, image: Arc<RgbImage>) -> RagResult<String> {
        let state = Arc::clone(&self.state);
        let caption = self
            .pool
            .run(move || state.caption(&image))
            .await
            .map_err(pool_error)?;

        debug!(caption = %caption, "Image captioned");
        Ok(caption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_blip_pixels_shape() {
        let image = RgbImage::from_pixel(64, 48, Rgb([128, 128, 128]));
        let pixels = blip_pixels(&image, &Device::Cpu).unwrap();
        assert_eq!(pixels.dims(), &[3, IMAGE_SIZE, IMAGE_SIZE]);
    }

    #[test]
    fn test_blip_pixels_normalization() {
        let image = RgbImage::from_pixel(8, 8, Rgb([255, 0, 255]));
        let pixels = blip_pixels(&image, &Device::Cpu).unwrap();

        let red = pixels.get(0).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
        let expected = (1.0 - IMAGE_MEAN[0]) / IMAGE_STD[0];
        assert!((red[0] - expected).abs() < 1e-4);

        let green = pixels.get(1).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
        let expected = (0.0 - IMAGE_MEAN[1]) / IMAGE_STD[1];
        assert!((green[0] - expected).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_panicking_caption_task_is_captioning_failure() {
        let pool = InferencePool::new(1);
        let err = pool
            .run(|| -> RagResult<String> { panic!("decoder exploded") })
            .await
            .map_err(pool_error)
            .unwrap_err();

        assert!(matches!(err, RagError::CaptioningFailed(_)));
        assert_eq!(pool.available_permits(), 1);
    }

    #[test]
    fn test_pool_error_keeps_captioning_errors() {
        let err = pool_error(RagError::CaptioningFailed("empty".into()));
        assert!(matches!(err, RagError::CaptioningFailed(message) if message == "empty"));
    }

    #[test]
    fn test_config_from_env() {
        temp_env::with_vars(
            [
                ("BLIP_MODEL_ID", None::<&str>),
                ("BLIP_MODEL_REVISION", None),
                ("CAPTION_MAX_TOKENS", Some("20")),
            ],
            || {
                let config = BlipConfig::from_env(DevicePreference::Cpu, 1).unwrap();
                assert_eq!(config.source.model_id, DEFAULT_BLIP_MODEL);
                assert_eq!(config.source.revision, DEFAULT_BLIP_REVISION);
                assert_eq!(config.max_tokens, 20);
                assert_eq!(config.device, DevicePreference::Cpu);
            },
        );
    }

    #[test]
    fn test_config_rejects_zero_tokens() {
        temp_env::with_var("CAPTION_MAX_TOKENS", Some("0"), || {
            assert!(BlipConfig::from_env(DevicePreference::Auto, 1).is_err());
        });
    }
}
