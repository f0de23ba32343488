//! Error types for the datastore mapping layer
//!
//! A single error enum covers schema definition, value validation, key
//! handling, query building, and failures surfaced by the storage
//! collaborator. All of them are returned as values; nothing in this crate
//! retries on its own.

use thiserror::Error;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Error types for datastore model operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// A property is declared twice, inherited from two unrelated schemas,
    /// or collides with a generated reverse collection
    #[error("Duplicate property error: {0}")]
    DuplicateProperty(String),

    /// A property name is reserved by the model base type
    #[error("Reserved word error: {0}")]
    ReservedWord(String),

    /// No schema is registered for a kind, or an entity has the wrong kind
    #[error("Kind error: {0}")]
    Kind(String),

    /// A kind name is registered twice
    #[error("Duplicate kind error: {0}")]
    DuplicateKind(String),

    /// A property or model is improperly configured
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A value failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// A saved-object action was performed on an unsaved object
    #[error("Not saved error: {0}")]
    NotSaved(String),

    /// A key is malformed or its components do not match
    #[error("Bad key error: {0}")]
    BadKey(String),

    /// Conflicting or invalid arguments
    #[error("Bad argument error: {0}")]
    BadArgument(String),

    /// A filter string or filter value is malformed
    #[error("Bad filter error: {0}")]
    BadFilter(String),

    /// A query combines options that cannot be executed
    #[error("Bad query error: {0}")]
    BadQuery(String),

    /// A property does not exist or cannot be used the way requested
    #[error("Property error: {0}")]
    Property(String),

    /// Positional query access past the last result
    #[error("Index out of range: {0}")]
    IndexOutOfRange(String),

    /// A single-key fetch found nothing
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// A transaction could not be committed after exhausting retries
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// A storage call exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The storage collaborator rejected a request it cannot serve
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The query needs an index the storage collaborator does not have
    #[error("Need index: {0}")]
    NeedIndex(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Record or cursor encoding failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ModelError {
    /// Whether the storage collaborator may succeed if the same call is made again
    pub fn is_retryable(&self) -> bool {
        matches!(self, ModelError::TransactionFailed(_) | ModelError::Timeout(_))
    }

    /// Whether the error was raised while defining a schema
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            ModelError::DuplicateProperty(_)
                | ModelError::ReservedWord(_)
                | ModelError::Kind(_)
                | ModelError::DuplicateKind(_)
                | ModelError::Configuration(_)
        )
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for ModelError {
    fn from(err: base64::DecodeError) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelError::Validation("Property title is required".to_string());
        assert_eq!(err.to_string(), "Validation error: Property title is required");

        let err = ModelError::Kind("No implementation for kind 'Story'".to_string());
        assert_eq!(err.to_string(), "Kind error: No implementation for kind 'Story'");
    }

    #[test]
    fn test_error_classification() {
        assert!(ModelError::TransactionFailed("contention".into()).is_retryable());
        assert!(!ModelError::Validation("bad".into()).is_retryable());
        assert!(ModelError::ReservedWord("key_name".into()).is_definition_error());
        assert!(!ModelError::NotSaved("unsaved".into()).is_definition_error());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ModelError = json_err.into();
        assert!(matches!(err, ModelError::Serialization(_)));
    }
}
