use std::fmt;

/// Failure reported by a [`RenderTarget`](super::RenderTarget) operation.
///
/// None of these are retryable: they reflect either a caller bug or an
/// unrecoverable device condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    /// An operation needs a capability that was not configured at construction
    /// (GPU depth unprojection, triangle ids).
    Configuration(String),
    /// The caller broke an operation's contract (view size, pixel format,
    /// destination buffer size or usage).
    Contract(String),
    /// GPU resources for the target could not be created.
    Resource(String),
    /// The device failed while completing a transfer (map failure, device lost).
    Device(String),
}

impl TargetError {
    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn contract(msg: impl Into<String>) -> Self {
        Self::Contract(msg.into())
    }
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "render target configuration error: {msg}"),
            Self::Contract(msg) => write!(f, "render target contract violation: {msg}"),
            Self::Resource(msg) => write!(f, "render target resource error: {msg}"),
            Self::Device(msg) => write!(f, "render target device error: {msg}"),
        }
    }
}

impl std::error::Error for TargetError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_error_class() {
        let e = TargetError::configuration("no depth shader");
        assert_eq!(e.to_string(), "render target configuration error: no depth shader");

        let e = TargetError::contract("wrong size");
        assert!(e.to_string().contains("contract violation"));
    }
}
