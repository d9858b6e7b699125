use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Serialize;
use std::fmt::Display;

use crate::applications::ApplicationStoreError;
use crate::codes::CodeGenerationError;
use crate::domain::InvalidEnumValue;
use crate::ledger::LedgerError;
use crate::policy::PolicyError;
use crate::sla::SlaError;
use crate::users::UserStoreError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    detail: Option<String>,
}

/// Internal detail attached to error responses; only rendered in development mode.
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    pub message: String,
    pub detail: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "resource not found")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// Stored data violates an invariant; never papered over with a fallback value.
    pub fn consistency<E: Display>(error: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "data consistency error")
            .with_detail(error.to_string())
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            .with_detail(error.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({}): {}", self.message, self.status, detail),
            None => write!(f, "{} ({})", self.message, self.status),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        if status.is_server_error() {
            tracing::error!(
                status = status.as_u16(),
                message = %self.message,
                detail = self.detail.as_deref().unwrap_or(""),
                "request failed"
            );
        }

        let body = Json(ErrorEnvelope {
            success: false,
            message: self.message.clone(),
            error: None,
        });
        let mut response = (status, body).into_response();
        if let Some(detail) = self.detail {
            response.extensions_mut().insert(ErrorDetail {
                message: self.message,
                detail,
            });
        }
        response
    }
}

#[derive(Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Human-readable hint for a unique violation, keyed on the constraint name.
pub fn describe_unique_violation(constraint: Option<&str>) -> String {
    let field = match constraint {
        Some(name) if name.contains("email") => "email",
        Some(name) if name.contains("agent_code") => "agent code",
        Some(name) if name.contains("display_code") => "application code",
        Some(name) if name.contains("national_id") => "national ID",
        _ => "value",
    };
    format!("{field} already in use")
}

impl From<DieselError> for AppError {
    fn from(value: DieselError) -> Self {
        match value {
            DieselError::NotFound => AppError::not_found(),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info) => {
                AppError::conflict(describe_unique_violation(info.constraint_name()))
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                AppError::bad_request("referenced record does not exist")
            }
            DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, ref info) => {
                AppError::bad_request("value rejected by a data constraint")
                    .with_detail(info.message().to_string())
            }
            _ => AppError::internal(value),
        }
    }
}

impl From<InvalidEnumValue> for AppError {
    fn from(value: InvalidEnumValue) -> Self {
        AppError::bad_request(value.to_string())
    }
}

impl From<PolicyError> for AppError {
    fn from(value: PolicyError) -> Self {
        match value {
            PolicyError::Forbidden(_) => AppError::forbidden(value.to_string()),
            PolicyError::NotEditable(_) => AppError::bad_request(value.to_string()),
        }
    }
}

impl From<SlaError> for AppError {
    fn from(value: SlaError) -> Self {
        match value {
            SlaError::Database(err) => AppError::from(err),
            SlaError::NegativeDuration { .. } | SlaError::DurationOverflow { .. } => {
                AppError::consistency(value)
            }
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::NotFound(_) => AppError::new(StatusCode::NOT_FOUND, value.to_string()),
            LedgerError::InvalidArgument(message) => AppError::bad_request(message),
            LedgerError::PreconditionFailed(message) => AppError::bad_request(message),
            LedgerError::Sla(err) => AppError::from(err),
            LedgerError::Database(err) => AppError::from(err),
        }
    }
}

impl From<CodeGenerationError> for AppError {
    fn from(value: CodeGenerationError) -> Self {
        match value {
            CodeGenerationError::Database(err) => AppError::from(err),
            CodeGenerationError::Exhausted { .. } => AppError::internal(value),
        }
    }
}

impl From<ApplicationStoreError> for AppError {
    fn from(value: ApplicationStoreError) -> Self {
        match value {
            ApplicationStoreError::NotFound(_) => {
                AppError::new(StatusCode::NOT_FOUND, value.to_string())
            }
            ApplicationStoreError::InvalidArgument(message) => AppError::bad_request(message),
            ApplicationStoreError::Policy(err) => AppError::from(err),
            ApplicationStoreError::Ledger(err) => AppError::from(err),
            ApplicationStoreError::Codes(err) => AppError::from(err),
            ApplicationStoreError::Database(err) => AppError::from(err),
        }
    }
}

impl From<UserStoreError> for AppError {
    fn from(value: UserStoreError) -> Self {
        match value {
            UserStoreError::NotFound(_) => AppError::new(StatusCode::NOT_FOUND, value.to_string()),
            UserStoreError::InvalidArgument(message) => AppError::bad_request(message),
            UserStoreError::InUse(message) => AppError::conflict(message),
            UserStoreError::Codes(err) => AppError::from(err),
            UserStoreError::Database(err) => AppError::from(err),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}
