use thiserror::Error;

/// Core error type for the Conduit plugin host.
#[derive(Debug, Error)]
pub enum ConduitError {
    #[error("adapter received a non-request payload")]
    InvalidRequestType,

    #[error("adapter received a non-response payload")]
    InvalidResponseType,

    #[error("plugin '{0}' returned empty capabilities")]
    EmptyCapabilities(String),

    #[error("plugin did not bind its address within {0:?}")]
    StartTimeout(std::time::Duration),

    #[error("handshake with plugin failed: {0}")]
    HandshakeFailed(String),

    #[error("required plugin '{plugin}' failed: {source}")]
    RequiredPluginFailed {
        plugin: String,
        #[source]
        source: Box<ConduitError>,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("pipeline aborted in category '{category}': {source}")]
    PipelineAborted {
        category: String,
        #[source]
        source: Box<ConduitError>,
    },

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("{} plugin error(s) occurred", .0.len())]
    Multiple(Vec<ConduitError>),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration load error: {0}")]
    ConfigLoad(#[from] figment::Error),
}

impl ConduitError {
    /// Fold a batch of fatal errors (e.g. a parallel category's joined
    /// results) into one: a single error passes through unwrapped, more
    /// than one becomes [`ConduitError::Multiple`].
    pub fn from_many(mut errors: Vec<ConduitError>) -> Self {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            ConduitError::Multiple(errors)
        }
    }
}

pub type Result<T> = std::result::Result<T, ConduitError>;
