use axum::extract::{Multipart, Path};
use serde_json::{json, Value};

use crate::config;
use crate::error::ApiError;
use crate::external::storage::{object_key, storage};
use crate::middleware::response::{ApiResponse, ApiResult};

/// POST /api/files - ADMIN. Multipart upload through the object-storage
/// collaborator; returns the stored key and public URL.
pub async fn upload(mut multipart: Multipart) -> ApiResult<Value> {
    let max_bytes = config::config().api.max_request_size_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid_input(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::invalid_input(format!("Failed to read upload: {}", e)))?;

        if bytes.is_empty() {
            return Err(ApiError::invalid_input("Uploaded file is empty"));
        }
        if bytes.len() > max_bytes {
            return Err(ApiError::invalid_input("Uploaded file is too large"));
        }

        let key = object_key(&bytes, &original_name);
        let url = storage().put(&bytes, &key).await.map_err(|e| {
            tracing::error!("object store put failed: {}", e);
            ApiError::internal("Upload failed")
        })?;

        return Ok(ApiResponse::created(json!({ "key": key, "url": url })));
    }

    Err(ApiError::invalid_input("Missing 'file' field"))
}

/// GET /api/files/:key/signed-url
pub async fn signed_url(Path(key): Path<String>) -> ApiResult<Value> {
    let url = storage()
        .signed_url(&key, 15 * 60)
        .await
        .map_err(|e| ApiError::invalid_input(e.to_string()))?;
    Ok(ApiResponse::success(json!({ "url": url })))
}

/// DELETE /api/files/:key - ADMIN.
pub async fn delete(Path(key): Path<String>) -> ApiResult<Value> {
    storage().delete(&key).await.map_err(|e| {
        tracing::error!("object store delete failed: {}", e);
        ApiError::internal("Delete failed")
    })?;
    Ok(ApiResponse::success(json!({})))
}
