use async_trait::async_trait;
use image::RgbImage;
use std::sync::Arc;

use crate::error::RagResult;

/// Describes an image in natural language.
///
/// Used to turn image queries into text for the prompt; retrieval always
/// uses the image embedding itself.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Captioner: Send + Sync {
    /// Caption an image. Never returns an empty string; failures surface as
    /// `CaptioningFailed`.
    async fn caption(&self, image: Arc<RgbImage>) -> RagResult<String>;
}
