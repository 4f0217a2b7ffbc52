use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers;
use crate::middleware::auth::bearer_auth;
use crate::middleware::role::{require_admin, require_manager};
use crate::middleware::tenant::tenant_scope;

pub fn app() -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_auth_routes())
        // Protected API behind authentication + tenant gates
        .merge(protected_routes())
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn public_auth_routes() -> Router {
    use handlers::auth;

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
}

/// Everything below runs inside the authentication gate and, after it, the
/// tenant gate that scopes data access for the rest of the request.
/// Role-restricted methods carry their own route layer.
fn protected_routes() -> Router {
    Router::new()
        .merge(session_routes())
        .merge(company_routes())
        .merge(user_admin_routes())
        .merge(catalog_routes())
        .merge(cart_routes())
        .merge(budget_routes())
        .merge(purchase_routes())
        .merge(notification_routes())
        .merge(dashboard_routes())
        .merge(file_routes())
        .layer(middleware::from_fn(tenant_scope))
        .layer(middleware::from_fn(bearer_auth))
}

fn session_routes() -> Router {
    use handlers::auth;

    Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
}

fn company_routes() -> Router {
    use handlers::company;

    Router::new().route("/api/company", get(company::get)).route(
        "/api/company",
        patch(company::update_profile).route_layer(middleware::from_fn(require_admin)),
    )
}

fn user_admin_routes() -> Router {
    use handlers::users;

    Router::new()
        .route("/api/users", get(users::list).post(users::invite))
        .route("/api/users/:id/role", patch(users::change_role))
        .route("/api/users/:id/active", patch(users::set_active))
        .route_layer(middleware::from_fn(require_admin))
}

fn catalog_routes() -> Router {
    use handlers::catalog;

    Router::new()
        .route("/api/categories", get(catalog::list_categories))
        .route(
            "/api/categories",
            post(catalog::create_category).route_layer(middleware::from_fn(require_admin)),
        )
        .route("/api/products", get(catalog::list_products))
        .route(
            "/api/products",
            post(catalog::create_product).route_layer(middleware::from_fn(require_admin)),
        )
        .route("/api/products/:id", get(catalog::get_product))
        .route(
            "/api/products/:id",
            patch(catalog::update_product)
                .delete(catalog::delete_product)
                .route_layer(middleware::from_fn(require_admin)),
        )
}

fn cart_routes() -> Router {
    use handlers::cart;

    Router::new()
        .route("/api/cart", get(cart::list).post(cart::add))
        .route(
            "/api/cart/:product_id",
            patch(cart::set_quantity).delete(cart::remove),
        )
        .route("/api/wishlist", get(cart::list_wishlist).post(cart::add_wishlist))
        .route("/api/wishlist/:product_id", delete(cart::remove_wishlist))
}

fn budget_routes() -> Router {
    use handlers::budgets;

    Router::new()
        .route(
            "/api/budgets",
            get(budgets::get).route_layer(middleware::from_fn(require_manager)),
        )
        .route(
            "/api/budgets",
            put(budgets::upsert).route_layer(middleware::from_fn(require_admin)),
        )
        .route(
            "/api/budgets/criteria",
            get(budgets::get_criteria)
                .put(budgets::set_criteria)
                .route_layer(middleware::from_fn(require_admin)),
        )
}

fn purchase_routes() -> Router {
    use handlers::purchases;

    Router::new()
        .route("/api/purchases", get(purchases::list).post(purchases::create))
        .route(
            "/api/purchases/instant",
            post(purchases::create_instant).route_layer(middleware::from_fn(require_admin)),
        )
        .route("/api/purchases/:id", get(purchases::get))
        .route("/api/purchases/:id/cancel", post(purchases::cancel))
        .route(
            "/api/purchases/:id/approve",
            post(purchases::approve).route_layer(middleware::from_fn(require_manager)),
        )
        .route(
            "/api/purchases/:id/reject",
            post(purchases::reject).route_layer(middleware::from_fn(require_manager)),
        )
}

fn notification_routes() -> Router {
    use handlers::notifications;

    Router::new()
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/unread-count", get(notifications::unread_count))
        .route("/api/notifications/:id/read", post(notifications::mark_read))
        .route("/api/notifications/read-all", post(notifications::mark_all_read))
        .route("/api/notifications/stream", get(notifications::stream))
}

fn dashboard_routes() -> Router {
    use handlers::dashboard;

    Router::new().route(
        "/api/dashboard",
        get(dashboard::stats).route_layer(middleware::from_fn(require_manager)),
    )
}

fn file_routes() -> Router {
    use handlers::files;

    Router::new()
        .route("/api/files/:key/signed-url", get(files::signed_url))
        .route(
            "/api/files",
            post(files::upload).route_layer(middleware::from_fn(require_admin)),
        )
        .route(
            "/api/files/:key",
            delete(files::delete).route_layer(middleware::from_fn(require_admin)),
        )
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Snackhub API",
            "version": version,
            "description": "Multi-tenant company snack store backend",
            "endpoints": {
                "home": "/ (public)",
                "auth": "/auth/register, /auth/login, /auth/refresh (public)",
                "session": "/api/auth/* (protected)",
                "company": "/api/company (protected)",
                "users": "/api/users (admin)",
                "catalog": "/api/categories, /api/products (protected)",
                "cart": "/api/cart, /api/wishlist (protected)",
                "budgets": "/api/budgets (manager+)",
                "purchases": "/api/purchases (protected)",
                "notifications": "/api/notifications (protected)",
                "dashboard": "/api/dashboard (manager+)",
                "files": "/api/files (admin)",
            },
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match crate::database::manager::DatabaseManager::health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": {
                    "code": "INTERNAL",
                    "message": "database unavailable",
                    "details": { "status": "degraded", "timestamp": now, "database_error": e.to_string() },
                }
            })),
        ),
    }
}
