/// Errors raised while loading or compiling the escalation policy.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },

    #[error("could not read policy file {path}: {source}")]
    PolicyFile {
        path: String,
        source: std::io::Error,
    },

    #[error("could not parse policy file {path}: {source}")]
    PolicyParse {
        path: String,
        source: serde_json::Error,
    },

    #[error("invalid brand pattern: {0}")]
    BrandPattern(#[from] regex::Error),

    #[error("template `{name}` does not render: {source}")]
    Template {
        name: &'static str,
        source: minijinja::Error,
    },
}

/// Failures reported by a chat transport.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("invalid conversation id `{0}`")]
    InvalidId(String),

    #[error("conversation `{0}` not found")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<serenity::Error> for ChannelError {
    fn from(err: serenity::Error) -> Self {
        ChannelError::Transport(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SupportError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("could not render `{name}` response: {source}")]
    Render {
        name: &'static str,
        source: minijinja::Error,
    },
}
