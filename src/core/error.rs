use std::time::Duration;
use thiserror::Error;

/// Boxed cause carried by accessor failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum OrmError {
    #[error("Cannot create {type_name}: no zero-argument constructor registered")]
    Instantiation { type_name: &'static str },

    #[error("Cannot set {property}: incompatible types, cannot convert {actual} to {expected}")]
    TypeMismatch {
        property: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Cannot access {property}: {source}")]
    Access {
        property: String,
        #[source]
        source: BoxError,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection pool timeout after {0:?}: no connections available")]
    PoolTimeout(Duration),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Driver error: {0}")]
    Driver(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl OrmError {
    /// Wraps an arbitrary failure raised while invoking a property accessor.
    pub fn access(property: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Access {
            property: property.into(),
            source: source.into(),
        }
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, OrmError>;

impl<T> From<std::sync::PoisonError<T>> for OrmError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_message_names_property_and_types() {
        let err = OrmError::TypeMismatch {
            property: "age".into(),
            expected: "i32",
            actual: "ARRAY",
        };
        let msg = err.to_string();
        assert!(msg.contains("age"));
        assert!(msg.contains("i32"));
        assert!(msg.contains("ARRAY"));
        assert!(err.is_type_mismatch());
    }

    #[test]
    fn test_access_error_preserves_cause() {
        use std::error::Error as _;

        let err = OrmError::access("name", "setter panicked");
        assert!(err.source().is_some());
        assert_eq!(err.source().unwrap().to_string(), "setter panicked");
    }
}
