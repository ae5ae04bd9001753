use thiserror::Error;

/// Why a slide could not be prepared for display.
///
/// Load errors never reach the caller of `start`; the scheduler skips the
/// slide and reports the message through the error notifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The descriptor names a kind no loader knows how to prepare.
    #[error("Unknown entry type {0} encountered")]
    UnknownKind(String),

    /// Fetching or decoding the underlying asset failed.
    #[error("Error occurred when loading {uri}: {reason}")]
    Fetch { uri: String, reason: String },

    /// The preparation task ended without producing a result.
    #[error("preparation of {0} was aborted")]
    Aborted(String),
}

/// Misuse of the start/stop lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Slideshow has already stopped")]
    AlreadyStopped,
}

/// Library error type for slideshow operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The spawned stop/swap/start cycle of `set_entries` did not finish.
    #[error("reconfiguration task failed: {0}")]
    Reconfigure(#[from] tokio::task::JoinError),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),

    /// The configuration parsed but describes something unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
