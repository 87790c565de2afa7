use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use reconciliation_engine::traits::{AuditError, LedgerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticationError(e) => match e {
                AuthError::MissingSignature => StatusCode::UNAUTHORIZED,
                AuthError::InvalidSignature => StatusCode::UNAUTHORIZED,
                AuthError::SignatureNotConfigured => StatusCode::UNAUTHORIZED,
                AuthError::MissingApiKey => StatusCode::UNAUTHORIZED,
                AuthError::InvalidApiKey => StatusCode::UNAUTHORIZED,
                AuthError::ApiDisabled => StatusCode::FORBIDDEN,
                AuthError::ForbiddenPeer => StatusCode::FORBIDDEN,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        Self::BackendError(e.to_string())
    }
}

impl From<AuditError> for ServerError {
    fn from(e: AuditError) -> Self {
        Self::BackendError(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No signature was found in the request.")]
    MissingSignature,
    #[error("The request signature is invalid.")]
    InvalidSignature,
    #[error("Signature checks are enabled, but no signing secret has been configured.")]
    SignatureNotConfigured,
    #[error("No API key was provided.")]
    MissingApiKey,
    #[error("The API key is invalid.")]
    InvalidApiKey,
    #[error("The ledger API is disabled on this server.")]
    ApiDisabled,
    #[error("Requests from this address are not allowed.")]
    ForbiddenPeer,
}
