use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the monitoring core.
///
/// `Provider` failures are degraded at the call site (fallback query,
/// sentinel article, literal error text). `Persistence` failures propagate
/// and fail the cycle. `Delivery` failures are surfaced to the caller, which
/// decides how to report them.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("delivery error: {0}")]
    Delivery(String),

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for failures the research pipeline degrades instead of
    /// propagating.
    pub fn is_provider(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}
