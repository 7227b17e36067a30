use crate::adapter::DeliveryMode;
use crate::errors::{to_env_var, ConfigError};
use crate::providers::configs::{GeminiProviderConfig, GEMINI_HOST, GEMINI_MODEL};
use config::{Config, Environment};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Runtime settings, layered from defaults and the environment.
///
/// `API_KEY` supplies the key; `YIAMAS_API_KEY` is read when it is unset.
/// Every other field comes from `YIAMAS_<FIELD>`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub delivery: DeliveryMode,
    #[serde(default = "default_search_grounding")]
    pub search_grounding: bool,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<i32>,
    #[serde(default)]
    pub persona_file: Option<PathBuf>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    /// Defaults for everything but the key
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            model: default_model(),
            host: default_host(),
            delivery: DeliveryMode::default(),
            search_grounding: default_search_grounding(),
            temperature: None,
            max_tokens: None,
            persona_file: None,
        }
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let api_key = env::var("API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let config = Config::builder()
            .set_default("model", default_model())?
            .set_default("host", default_host())?
            .set_default("search_grounding", default_search_grounding())?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("YIAMAS")
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .set_override_option("api_key", api_key)?
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        let settings = match result {
            Ok(settings) => settings,
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    // Extract field name from error message "missing field `api_key`"
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    return Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    });
                } else if let config::ConfigError::NotFound(field) = &err {
                    return Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    });
                }
                return Err(ConfigError::Other(err));
            }
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingEnvVar {
                env_var: to_env_var("api_key"),
            });
        }
        Ok(())
    }

    pub fn provider_config(&self) -> GeminiProviderConfig {
        GeminiProviderConfig {
            host: self.host.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

fn default_model() -> String {
    GEMINI_MODEL.to_string()
}

fn default_host() -> String {
    GEMINI_HOST.to_string()
}

fn default_search_grounding() -> bool {
    true
}
