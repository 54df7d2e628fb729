//! Grounding prompt construction.

use core_config::env_or_default;
use std::fmt::Write;

use crate::models::RetrievedItem;

pub const DEFAULT_RESPONSE_LANGUAGE: &str = "Spanish";

/// Prompt template configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptConfig {
    /// Language every answer is written in
    pub language: String,
}

impl PromptConfig {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(env_or_default("RAG_RESPONSE_LANGUAGE", DEFAULT_RESPONSE_LANGUAGE))
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self::new(DEFAULT_RESPONSE_LANGUAGE)
    }
}

/// Builds the prompt sent to the generator. Deterministic and side-effect free.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    config: PromptConfig,
}

impl PromptBuilder {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    pub fn language(&self) -> &str {
        &self.config.language
    }

    /// One `- caption` context line per item, in retrieval order.
    pub fn build(&self, query_text: &str, items: &[RetrievedItem]) -> String {
        let mut prompt = String::new();

        // Infallible: writing into a String
        let _ = writeln!(
            prompt,
            "You are an assistant that answers questions about a collection of images. \
             Always answer in {}.",
            self.config.language
        );
        prompt.push_str(
            "Write a single coherent paragraph in a natural narrative style that can be read \
             aloud by a text-to-speech system. Do not use lists, headings or markdown.\n",
        );
        prompt.push_str(INSUFFICIENT_CONTEXT_INSTRUCTION);
        prompt.push_str("\n\nContext:\n");

        for item in items {
            let _ = writeln!(prompt, "- {}", item.caption);
        }

        let _ = write!(prompt, "\nQuery: {}\nAnswer:", query_text.trim());
        prompt
    }
}

/// Present in every prompt, including those with no context.
pub const INSUFFICIENT_CONTEXT_INSTRUCTION: &str = "Use only the information in the context below. \
     If the context is not enough to answer, say clearly that there is not enough information \
     instead of making anything up.";
