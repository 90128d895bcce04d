use crate::core::OrmError;
use http::{Method, StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebError {
    #[error("Request method {0} is not allowed")]
    MethodNotAllowed(Method),

    #[error(transparent)]
    Orm(#[from] OrmError),

    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Cannot store attribute {key}: {source}")]
    Attribute {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Controller error: {0}")]
    Controller(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl WebError {
    /// Status code a host should answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            WebError::InvalidHeader { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for WebError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        WebError::LockError(err.to_string())
    }
}
