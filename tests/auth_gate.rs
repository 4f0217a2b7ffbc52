//! Router-level gate tests, driven in-process with no external services.
//! Everything behind /api must reject a request that fails the
//! authentication gate before any other work happens.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::{middleware, Extension, Json, Router};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use snackhub_api::auth::issue_token_pair;
use snackhub_api::database::models::Role;
use snackhub_api::middleware::auth::{bearer_auth, AuthPrincipal};
use snackhub_api::middleware::role::require_admin;

fn request(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// A protected router that stops at the authentication gate, with a handler
/// that echoes the principal the gate attached.
fn gated_router() -> Router {
    async fn whoami(Extension(principal): Extension<AuthPrincipal>) -> Json<Value> {
        Json(serde_json::json!({
            "id": principal.id,
            "role": principal.role,
        }))
    }

    Router::new()
        .route("/p/whoami", get(whoami))
        .merge(
            Router::new()
                .route("/p/admin-only", get(|| async { "ok" }))
                .route_layer(middleware::from_fn(require_admin)),
        )
        .layer(middleware::from_fn(bearer_auth))
}

#[tokio::test]
async fn missing_credential_is_unauthenticated() {
    let response = gated_router()
        .oneshot(request("/p/whoami", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn malformed_bearer_credentials_are_rejected() {
    for bad in [
        "Basic abc",
        "Bearer",
        "Bearer ",
        "Bearerabc",
        "bearer abc",
        "Bearer a b",
    ] {
        let response = gated_router()
            .oneshot(request("/p/whoami", Some(bad)))
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "expected 401 for {:?}",
            bad
        );
    }
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let response = gated_router()
        .oneshot(request("/p/whoami", Some("Bearer not.a.jwt")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn valid_token_reaches_the_handler_with_its_principal() {
    let user_id = Uuid::new_v4();
    let tokens = issue_token_pair(user_id, Uuid::new_v4(), "kim@acme.test", Role::User).unwrap();

    let response = gated_router()
        .oneshot(request(
            "/p/whoami",
            Some(&format!("Bearer {}", tokens.access_token)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["id"], serde_json::json!(user_id));
    assert_eq!(body["role"], "USER");
}

#[tokio::test]
async fn refresh_token_cannot_be_used_as_access_token() {
    let tokens =
        issue_token_pair(Uuid::new_v4(), Uuid::new_v4(), "kim@acme.test", Role::Admin).unwrap();

    let response = gated_router()
        .oneshot(request(
            "/p/whoami",
            Some(&format!("Bearer {}", tokens.refresh_token)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn role_gate_blocks_below_minimum_role() {
    let tokens =
        issue_token_pair(Uuid::new_v4(), Uuid::new_v4(), "kim@acme.test", Role::Manager).unwrap();

    let response = gated_router()
        .oneshot(request(
            "/p/admin-only",
            Some(&format!("Bearer {}", tokens.access_token)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn role_gate_admits_the_minimum_role_and_above() {
    let tokens =
        issue_token_pair(Uuid::new_v4(), Uuid::new_v4(), "kim@acme.test", Role::Admin).unwrap();

    let response = gated_router()
        .oneshot(request(
            "/p/admin-only",
            Some(&format!("Bearer {}", tokens.access_token)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn public_routes_skip_the_gates() {
    let response = snackhub_api::app::app()
        .oneshot(request("/", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn full_app_rejects_unauthenticated_protected_requests() {
    for uri in [
        "/api/auth/me",
        "/api/products",
        "/api/purchases",
        "/api/notifications",
        "/api/dashboard",
    ] {
        let response = snackhub_api::app::app()
            .oneshot(request(uri, None))
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "expected 401 for {}",
            uri
        );
    }
}
