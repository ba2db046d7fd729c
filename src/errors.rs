use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Verification gateway error: {0}")]
    VerificationGateway(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("System locked: {0}")]
    SystemLocked(String),

    #[error("Transfer between linked accounts is not allowed")]
    AltAccount,

    #[error("Identity fingerprint mismatch")]
    FingerprintMismatch,

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("Conflicting concurrent update: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Internal(format!("JSON serialization error: {}", err))
    }
}

impl ResponseError for LedgerError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.to_string();

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": error_message,
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::AccountNotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::VerificationFailed(_) => StatusCode::UNAUTHORIZED,
            LedgerError::VerificationGateway(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LedgerError::Unauthorized => StatusCode::FORBIDDEN,
            LedgerError::SystemLocked(_) => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::AltAccount => StatusCode::FORBIDDEN,
            LedgerError::FingerprintMismatch => StatusCode::FORBIDDEN,
            LedgerError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
            LedgerError::Conflict(_) => StatusCode::CONFLICT,
            LedgerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl LedgerError {
    fn error_type(&self) -> &str {
        match self {
            LedgerError::Database(_) => "database_error",
            LedgerError::Validation(_) => "validation_error",
            LedgerError::AccountNotFound(_) => "not_found",
            LedgerError::VerificationFailed(_) => "verification_failed",
            LedgerError::VerificationGateway(_) => "verification_gateway_error",
            LedgerError::Unauthorized => "unauthorized",
            LedgerError::SystemLocked(_) => "system_locked",
            LedgerError::AltAccount => "alt_account",
            LedgerError::FingerprintMismatch => "fingerprint_mismatch",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::Conflict(_) => "conflict",
            LedgerError::Internal(_) => "internal_error",
        }
    }

    /// Distinguishes commit races (retryable by replaying the whole
    /// operation) from other database failures.
    pub fn from_commit_error(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            // 40001 = serialization_failure, 40P01 = deadlock_detected
            if matches!(db_err.code().as_deref(), Some("40001") | Some("40P01")) {
                return LedgerError::Conflict(db_err.to_string());
            }
        }
        LedgerError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            LedgerError::SystemLocked("maintenance".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(LedgerError::AltAccount.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            LedgerError::AccountNotFound("ghost".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            LedgerError::InsufficientFunds {
                required: "100".into(),
                available: "50".into()
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            LedgerError::Conflict("lost race".into()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_lock_message_is_user_facing() {
        let err = LedgerError::SystemLocked("scheduled maintenance until 18:00".into());
        assert!(err.to_string().contains("scheduled maintenance until 18:00"));
    }
}
