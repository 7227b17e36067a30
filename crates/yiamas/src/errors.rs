use thiserror::Error;

/// Failures surfaced by the conversation adapter.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Refusing to send an empty message")]
    EmptyInput,

    #[error("Remote session error: {0}")]
    RemoteSession(#[source] anyhow::Error),

    #[error("A request is already in flight")]
    Busy,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable {env_var} must be set")]
    MissingEnvVar { env_var: String },

    #[error("Failed to render persona prompt: {0}")]
    Persona(#[from] tera::Error),

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

pub type ChatResult<T> = Result<T, ChatError>;

/// Map a settings field to the environment variable that supplies it.
pub fn to_env_var(field: &str) -> String {
    match field {
        "api_key" => "API_KEY".to_string(),
        other => format!("YIAMAS_{}", other.to_uppercase()),
    }
}
