//! Error types for state snapshot handling.

use thiserror::Error;

/// Errors that can occur while decoding or inspecting a state snapshot.
#[derive(Debug, Error)]
pub enum Error {
    /// The snapshot is not valid JSON or does not look like a v4 state
    #[error("cannot parse state: {0}")]
    Parse(#[source] serde_json::Error),

    /// The snapshot could not be written back to JSON
    #[error("cannot serialize state: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The encoded form is not valid base64
    #[error("cannot decode encoded state: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The id field is absent from the resource attributes
    #[error("no value for id field: {field}")]
    MissingField {
        /// Name of the attribute that was looked up
        field: String,
    },

    /// The id field exists but is not a string
    #[error("id field is not a string: {field}")]
    FieldType {
        /// Name of the attribute that was looked up
        field: String,
    },
}

impl Error {
    /// Whether the error means the snapshot itself is malformed.
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Decode(_))
    }

    /// Whether the error points at a mismatch between the tool's schema and the
    /// resource definition (the id attribute is missing or mistyped).
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, Self::MissingField { .. } | Self::FieldType { .. })
    }
}

/// Result type for state operations.
pub type Result<T> = std::result::Result<T, Error>;
