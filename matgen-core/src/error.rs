use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Cycle detected involving node '{0}'")]
    CycleDetected(String),

    #[error("Unresolved input pin '{pin}' on node '{node}'")]
    UnresolvedPin { node: String, pin: String },

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Unknown identifier '{0}'")]
    UnknownIdentifier(String),
}

pub type Result<T> = std::result::Result<T, GeneratorError>;

// Bail macros, one per error class.

#[macro_export]
macro_rules! bail_graph {
    ($($arg:tt)*) => {
        return Err($crate::error::GeneratorError::InvalidGraph(format!($($arg)*)))
    };
}

#[macro_export]
macro_rules! bail_type {
    ($($arg:tt)*) => {
        return Err($crate::error::GeneratorError::TypeError(format!($($arg)*)))
    };
}
