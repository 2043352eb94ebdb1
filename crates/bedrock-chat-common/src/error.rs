use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The inbound request was rejected before any backend call.
    #[error("{0}")]
    Validation(String),

    /// The model, knowledge base or agent service returned an error.
    #[error("{message}")]
    Backend {
        status: Option<u16>,
        kind: Option<String>,
        message: String,
    },

    #[error("response stream error: {0}")]
    Stream(String),

    #[error("credentials error: {0}")]
    Credentials(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            status: None,
            kind: None,
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
