mod gemini;
mod generator;

pub use gemini::{GeminiConfig, GeminiGenerator};
pub use generator::Generator;

#[cfg(test)]
pub use generator::MockGenerator;
