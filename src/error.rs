// HTTP API error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

/// API error with stable machine-readable codes and client-safe messages.
///
/// Domain services raise these (or typed errors converted into these) and
/// they propagate unmodified to the boundary, which renders the uniform
/// `{success:false, error:{code, message, details}}` envelope.
#[derive(Debug)]
pub enum ApiError {
    // 401 - missing/invalid/expired credential
    Unauthenticated(String),

    // 403 - authenticated but not permitted
    Forbidden(String),

    // 404 - missing, or outside the caller's tenant (indistinguishable on purpose)
    NotFound(String),

    // 400 - malformed or out-of-range request data
    InvalidInput {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 409 - unique violation, or state transition raced ("already processed")
    Conflict(String),

    // 422 - business-rule rejection, distinct from Conflict so clients can react differently
    InsufficientBudget(String),

    // 500 - unexpected failure, collaborator outage
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InsufficientBudget(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "UNAUTHENTICATED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidInput { .. } => "INVALID_INPUT",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InsufficientBudget(_) => "INSUFFICIENT_BUDGET",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Unauthenticated(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::InsufficientBudget(msg)
            | ApiError::Internal(msg) => msg,
            ApiError::InvalidInput { message, .. } => message,
        }
    }

    /// Uniform error envelope: {success:false, error:{code, message, details}}
    pub fn to_json(&self) -> Value {
        let details = match self {
            ApiError::InvalidInput {
                field_errors: Some(errors),
                ..
            } => json!(errors),
            _ => Value::Null,
        };

        json!({
            "success": false,
            "error": {
                "code": self.error_code(),
                "message": self.message(),
                "details": details,
            }
        })
    }
}

// Static constructors, mirroring how call sites read
impl ApiError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApiError::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        ApiError::InvalidInput {
            message: message.into(),
            field_errors: None,
        }
    }

    pub fn invalid_fields(
        message: impl Into<String>,
        field_errors: HashMap<String, String>,
    ) -> Self {
        ApiError::InvalidInput {
            message: message.into(),
            field_errors: Some(field_errors),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn insufficient_budget(message: impl Into<String>) -> Self {
        ApiError::InsufficientBudget(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::not_found("Record not found"),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ApiError::conflict("Record already exists")
            }
            _ => {
                // Log the real error, return a generic message
                tracing::error!("sqlx error: {}", err);
                ApiError::internal("An error occurred while processing your request")
            }
        }
    }
}

impl From<crate::database::manager::DatabaseError> for ApiError {
    fn from(err: crate::database::manager::DatabaseError) -> Self {
        match err {
            crate::database::manager::DatabaseError::Sqlx(e) => e.into(),
            crate::database::manager::DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            other => {
                tracing::error!("database error: {}", other);
                ApiError::internal("Database temporarily unavailable")
            }
        }
    }
}

impl From<crate::filter::FilterError> for ApiError {
    fn from(err: crate::filter::FilterError) -> Self {
        ApiError::invalid_input(err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_stable_code() {
        let err = ApiError::insufficient_budget("monthly budget exceeded");
        let body = err.to_json();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "INSUFFICIENT_BUDGET");
        assert_eq!(body["error"]["message"], "monthly budget exceeded");
    }

    #[test]
    fn budget_conflict_distinct_from_generic_conflict() {
        let budget = ApiError::insufficient_budget("x");
        let generic = ApiError::conflict("x");
        assert_ne!(budget.error_code(), generic.error_code());
        assert_ne!(budget.status_code(), generic.status_code());
    }

    #[test]
    fn field_errors_surface_in_details() {
        let mut fields = HashMap::new();
        fields.insert("quantity".to_string(), "must be at least 1".to_string());
        let err = ApiError::invalid_fields("Invalid items", fields);
        let body = err.to_json();
        assert_eq!(body["error"]["details"]["quantity"], "must be at least 1");
    }
}
