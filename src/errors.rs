use actix_web::{
    error,
    http::{header, StatusCode},
    HttpResponse,
};
use derive_more::{Display, Error};

use crate::db::StoreError;

#[derive(Debug, Display, Error)]
pub enum ServiceError {
    #[display(fmt = "{} '{}' not found", entity, id)]
    NotFound { entity: &'static str, id: String },

    #[display(fmt = "invalid argument: {}", message)]
    InvalidArgument { message: String },

    #[display(fmt = "concurrent modification of '{}'", key)]
    Conflict { key: String },

    #[display(fmt = "storage error: {}", message)]
    StorageError { message: String },

    #[display(fmt = "storage timeout")]
    StorageTimeout,

    #[display(fmt = "internal error: {}", message)]
    InternalError { message: String },
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ServiceError::NotFound { entity, id: id.to_string() }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::InvalidArgument { message: message.into() }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound { .. } => "NOT_FOUND",
            ServiceError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            ServiceError::Conflict { .. } => "CONFLICT",
            ServiceError::StorageError { .. } => "STORAGE_ERROR",
            ServiceError::StorageTimeout => "STORAGE_TIMEOUT",
            ServiceError::InternalError { .. } => "INTERNAL_ERROR",
        }
    }

    /// Only a timed out round-trip is worth retrying by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::StorageTimeout)
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { key } => ServiceError::Conflict { key },
            StoreError::Backend { message } => ServiceError::StorageError { message },
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::StorageError { message: format!("malformed row: {}", err) }
    }
}

impl error::ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ServiceError::StorageError { .. } | ServiceError::InternalError { .. } => {
                log::error!("{}", self);
                "internal error".to_string()
            }
            _ => self.to_string(),
        };
        let mut res = HttpResponse::build(self.status_code());
        if self.is_retryable() {
            res.insert_header((header::RETRY_AFTER, "1"));
        }
        res.json(serde_json::json!({
            "success": false,
            "code": self.code(),
            "error": message,
        }))
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Conflict { .. } => StatusCode::CONFLICT,
            ServiceError::StorageError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::StorageTimeout => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
