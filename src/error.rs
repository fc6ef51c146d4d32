//! Error types for catalog lookup and per-field extraction.
//!
//! Absence of data is never an error here: a field that cannot be read this
//! frame resolves to `None`, an unknown pose or an empty leaderboard. These
//! variants cover configuration defects and inputs that cannot be processed.

use thiserror::Error;

/// Errors raised while extracting a single field from a frame.
///
/// `InvalidImage` and `Recognition` are fatal to one field only; the frame
/// pipeline records them and carries on with the remaining regions.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The catalog has no region with this name.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// The region exists but is not read with the requested operation.
    #[error("field {field} is a {role} region")]
    WrongRole { field: String, role: String },

    /// The region could not be cut out of the supplied frame.
    #[error("invalid image for field {field}: {reason}")]
    InvalidImage { field: String, reason: String },

    /// The external recognition engine failed on this field.
    #[error("recognizer failed on field {field}")]
    Recognition {
        field: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ExtractError {
    pub fn invalid_image(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidImage {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn recognition(field: &str, source: anyhow::Error) -> Self {
        Self::Recognition {
            field: field.to_string(),
            source: source.into(),
        }
    }

    /// Name of the field this error belongs to.
    pub fn field(&self) -> &str {
        match self {
            Self::UnknownField(name) => name,
            Self::WrongRole { field, .. }
            | Self::InvalidImage { field, .. }
            | Self::Recognition { field, .. } => field,
        }
    }
}

/// Errors raised while building or loading a region catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("region {name} is invalid: {reason}")]
    InvalidRegion { name: String, reason: String },

    #[error("region {0} is defined more than once")]
    DuplicateRegion(String),

    #[error("no catalog found for resolution {width}x{height}")]
    NoConfigForResolution { width: u32, height: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_name_is_reported() {
        let err = ExtractError::invalid_image("speed", "rectangle outside frame");
        assert_eq!(err.field(), "speed");
        assert_eq!(
            err.to_string(),
            "invalid image for field speed: rectangle outside frame"
        );
    }

    #[test]
    fn test_recognition_keeps_source() {
        let err = ExtractError::recognition("power", anyhow::anyhow!("tesseract exited 1"));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("tesseract exited 1"));
    }
}
