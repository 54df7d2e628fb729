use core_config::{AppInfo, FromEnv, app_info, server::ServerConfig};
use domain_rag::{
    BlipConfig, ClipConfig, GeminiConfig, IndexConfig, PromptConfig, SearchConfig,
};
use eyre::WrapErr;

// Re-export Environment for use in other modules
pub use core_config::Environment;

/// Application-specific configuration
/// Composes the shared server config with the search pipeline's configs
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub server: ServerConfig,
    pub environment: Environment,
    pub clip: ClipConfig,
    pub blip: BlipConfig,
    pub index: IndexConfig,
    pub gemini: GeminiConfig,
    pub prompt: PromptConfig,
    pub search: SearchConfig,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let server = ServerConfig::from_env()?; // Uses defaults: HOST=0.0.0.0, PORT=8000

        let clip = ClipConfig::from_env().wrap_err("Invalid CLIP configuration")?;
        // The captioner runs on the same device budget as the embedder
        let blip = BlipConfig::from_env(clip.device, clip.max_concurrency)
            .wrap_err("Invalid BLIP configuration")?;
        let index = IndexConfig::from_env().wrap_err("Invalid vector index configuration")?;
        let gemini = GeminiConfig::from_env().wrap_err("Invalid Gemini configuration")?;
        let search = SearchConfig::from_env().wrap_err("Invalid search configuration")?;

        Ok(Self {
            app: app_info!(),
            server,
            environment,
            clip,
            blip,
            index,
            gemini,
            prompt: PromptConfig::from_env(),
            search,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        temp_env::with_vars(
            [
                ("GOOGLE_API_KEY", Some("g-key")),
                ("PINECONE_API_KEY", Some("pc-key")),
                ("INDEX_BACKEND", None),
                ("PORT", Some("9100")),
                ("INFERENCE_DEVICE", Some("cpu")),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.app.name, "rag_api");
                assert_eq!(config.server.port, 9100);
                assert_eq!(config.blip.device, domain_rag::DevicePreference::Cpu);
                assert_eq!(config.index.backend.name(), "pinecone");
            },
        );
    }

    #[test]
    fn test_missing_credentials_fail_at_startup() {
        temp_env::with_vars(
            [
                ("GOOGLE_API_KEY", None::<&str>),
                ("PINECONE_API_KEY", Some("pc-key")),
                ("INDEX_BACKEND", None),
            ],
            || {
                let err = Config::from_env().unwrap_err();
                assert!(format!("{err:?}").contains("Gemini"));
            },
        );
    }
}
