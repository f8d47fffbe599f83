//! HTTP route handlers for the storefront.
//!
//! Every handler answers JSON. All routes except `/health` require a valid
//! session and answer 401 otherwise.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                 - Health check (served from main)
//!
//! # Catalog
//! GET    /products?page=         - Product listing
//! GET    /products/{item_code}   - Product detail
//! GET    /search?q=              - Product search (never cached)
//!
//! # Cart
//! GET    /cart                   - Cart view with sync phase and busy lines
//! POST   /cart/items             - Add item
//! PATCH  /cart/items/{line}      - Update quantity
//! DELETE /cart/items/{line}      - Remove line
//! POST   /cart/details           - Update coupon code and notes
//! POST   /cart/submit            - Submit the quotation
//! POST   /cart/clear             - Forget the cart locally
//! POST   /cart/refresh           - Re-fetch from the ERP
//!
//! # Account
//! GET    /account?page=          - Current user and their quotations
//! GET    /account/statement?page= - Account statement
//! POST   /auth/logout            - Logout
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::state::AppState;

/// Create the catalog routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalog::index))
        .route("/{item_code}", get(catalog::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/items", post(cart::add))
        .route("/items/{line}", patch(cart::update).delete(cart::remove))
        .route("/details", post(cart::details))
        .route("/submit", post(cart::submit))
        .route("/clear", post(cart::clear))
        .route("/refresh", post(cart::refresh))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/products", product_routes())
        .route("/search", get(catalog::search))
        .nest("/cart", cart_routes())
        .route("/account", get(account::index))
        .route("/account/statement", get(account::statement))
        .route("/auth/logout", post(auth::logout))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::config::StorefrontConfig;
    use crate::session::{MemoryStorage, SessionStore};

    use super::*;

    fn app() -> Router {
        let config = StorefrontConfig::from_vars(&|key| {
            (key == "ERP_BASE_URL").then(|| "https://erp.example".to_string())
        })
        .unwrap();
        let session = SessionStore::open(MemoryStorage::new()).unwrap();
        routes().with_state(AppState::new(config, session))
    }

    #[tokio::test]
    async fn test_routes_require_session() {
        for (method, uri) in [
            ("GET", "/cart"),
            ("POST", "/cart/clear"),
            ("POST", "/cart/refresh"),
            ("DELETE", "/cart/items/row-1"),
            ("GET", "/products?page=2"),
            ("GET", "/search?q=bolt"),
            ("GET", "/account"),
            ("GET", "/account/statement?page=2"),
            ("POST", "/auth/logout"),
        ] {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let response = app().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }
}
