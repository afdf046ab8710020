use thiserror::Error;

/// Errors raised while framing, seeking and composing transport streams.
#[derive(Error, Debug)]
pub enum TsError {
    /// Failure of the underlying byte store or writer.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed packet structure.
    #[error("parser error: {0}")]
    Parser(String),

    /// Field values that cannot be encoded or decoded.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// No random access PCR packet found while seeking to the given PCR.
    #[error("position not found for pcr {0}")]
    SeekNotFound(u64),

    /// Rewind requested before any mark was set.
    #[error("no random access mark set")]
    NoMark,

    /// A reset was required from a source that cannot restart.
    #[error("source is not resettable")]
    NotResettable,

    /// Invalid composition or builder configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation on a source or sink that was already closed.
    #[error("source is closed")]
    Closed,

    /// A background production task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TsError>;
