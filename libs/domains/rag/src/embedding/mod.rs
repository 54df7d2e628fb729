mod clip;
mod embedder;

pub use clip::{ClipConfig, ClipEmbedder};
pub use embedder::Embedder;

#[cfg(test)]
pub use embedder::MockEmbedder;
