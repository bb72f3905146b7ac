use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("dimensions must be positive")]
    InvalidDimensions,

    #[error("universe too large: {width}x{height}x{depth} exceeds {max} cells", max = crate::universe::MAX_CELLS)]
    TooLarge {
        width: usize,
        height: usize,
        depth: usize,
    },

    #[error("unknown pattern: {0}")]
    UnknownPattern(String),

    #[error("universe not initialized")]
    NotInitialized,

    #[error("invalid rule notation: {0}")]
    InvalidRule(String),
}
