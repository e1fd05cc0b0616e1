use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use checkout_engine::{notifications::HubError, InvoiceError};
use log::error;
use thiserror::Error;

/// Seconds a client should wait before retrying a request that failed for transient reasons.
pub const RETRY_AFTER_SECS: u64 = 1;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unavailable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        response.insert_header(ContentType::json());
        if matches!(self, Self::Unavailable(_)) {
            response.insert_header(("Retry-After", RETRY_AFTER_SECS.to_string()));
        }
        response.body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<InvoiceError> for ServerError {
    fn from(e: InvoiceError) -> Self {
        match e {
            InvoiceError::InvoiceNotFound(_) | InvoiceError::SessionNotFound(_) => Self::NoRecordFound(e.to_string()),
            InvoiceError::Conflict { .. } | InvoiceError::AddOnsLocked(_) => Self::Conflict(e.to_string()),
            InvoiceError::Validation(_) => Self::BadRequest(e.to_string()),
            InvoiceError::TransientIo(_) | InvoiceError::GatewayTimeout(_) => {
                error!("💻️ Transient backend failure. {e}");
                Self::Unavailable(e.to_string())
            },
        }
    }
}

impl From<HubError> for ServerError {
    fn from(e: HubError) -> Self {
        match e {
            HubError::ShutDown => Self::Unavailable(e.to_string()),
            HubError::UnknownConnection(_) => Self::BackendError(e.to_string()),
        }
    }
}
