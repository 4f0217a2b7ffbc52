use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Value};

/// Success envelope: `{success:true, data, message?}`.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub message: Option<String>,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            data,
            message: None,
            status_code: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
            status_code: None,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            data,
            message: None,
            status_code: Some(StatusCode::CREATED),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "error": {
                            "code": "INTERNAL",
                            "message": "Failed to serialize response data",
                            "details": Value::Null,
                        }
                    })),
                )
                    .into_response();
            }
        };

        let mut envelope = json!({
            "success": true,
            "data": data_value,
        });
        if let Some(message) = self.message {
            envelope["message"] = json!(message);
        }

        (status, Json(envelope)).into_response()
    }
}

/// Paginated envelope: adds `pagination:{page, limit, total, total_pages}`.
#[derive(Debug)]
pub struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

impl<T: Serialize> Paginated<T> {
    pub fn total_pages(&self) -> i64 {
        if self.limit <= 0 {
            return 0;
        }
        (self.total + self.limit - 1) / self.limit
    }
}

impl<T: Serialize> IntoResponse for Paginated<T> {
    fn into_response(self) -> Response {
        let total_pages = self.total_pages();
        let data_value = match serde_json::to_value(&self.items) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize page data: {}", e);
                return crate::error::ApiError::internal("Failed to serialize response data")
                    .into_response();
            }
        };

        Json(json!({
            "success": true,
            "data": data_value,
            "pagination": {
                "page": self.page,
                "limit": self.limit,
                "total": self.total,
                "total_pages": total_pages,
            },
        }))
        .into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        let page = Paginated {
            items: vec![1, 2, 3],
            page: 1,
            limit: 20,
            total: 41,
        };
        assert_eq!(page.total_pages(), 3);
    }

    #[test]
    fn empty_result_has_zero_pages() {
        let page: Paginated<i32> = Paginated {
            items: vec![],
            page: 1,
            limit: 20,
            total: 0,
        };
        assert_eq!(page.total_pages(), 0);
    }
}
