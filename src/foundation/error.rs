/// Convenience result type used across the crate.
pub type KeyResult<T> = Result<T, KeyError>;

/// Crate-level error type.
#[derive(thiserror::Error, Debug)]
pub enum KeyError {
    /// Caller-supplied arguments violate an API contract.
    #[error("validation error: {0}")]
    Validation(String),

    /// The frame source could not supply a decoded frame.
    #[error("frame decode error: {0}")]
    FrameDecode(String),

    /// A key color string is not `#RRGGBB`.
    #[error("invalid color format: {0}")]
    InvalidColorFormat(String),

    /// The output surface could not be acquired or written.
    #[error("surface acquisition error: {0}")]
    SurfaceAcquisition(String),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Any other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KeyError {
    /// Build a [`KeyError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`KeyError::FrameDecode`].
    pub fn frame_decode(msg: impl Into<String>) -> Self {
        Self::FrameDecode(msg.into())
    }

    /// Build a [`KeyError::InvalidColorFormat`].
    pub fn invalid_color(msg: impl Into<String>) -> Self {
        Self::InvalidColorFormat(msg.into())
    }

    /// Build a [`KeyError::SurfaceAcquisition`].
    pub fn surface(msg: impl Into<String>) -> Self {
        Self::SurfaceAcquisition(msg.into())
    }

    /// Build a [`KeyError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Errors after which a renderer instance cannot recover by retrying.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SurfaceAcquisition(_))
    }
}

impl From<serde_json::Error> for KeyError {
    fn from(e: serde_json::Error) -> Self {
        Self::serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
