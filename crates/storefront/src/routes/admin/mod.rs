//! Admin console API.
//!
//! Every handler takes [`RequireAdmin`](crate::middleware::RequireAdmin), so
//! anonymous callers get 401 and non-admins 403.
//!
//! ```text
//! GET    /api/admin/products                 - Paged products, name search
//! POST   /api/admin/products                 - Create
//! GET    /api/admin/products/activity        - Active vs archived counts
//! PUT    /api/admin/products/{id}            - Update
//! DELETE /api/admin/products/{id}            - Delete
//! GET    /api/admin/categories               - Paged categories (?kind=parent|child|all)
//! POST   /api/admin/categories               - Create
//! PUT    /api/admin/categories/{id}          - Update
//! DELETE /api/admin/categories/{id}          - Delete
//! GET    /api/admin/orders                   - Paged orders
//! GET    /api/admin/orders/summary           - Paid order count and revenue
//! PATCH  /api/admin/orders/{id}/status       - Fulfilment status change
//! GET    /api/admin/users                    - Paged customers, name search
//! GET    /api/admin/users/summary            - Customer count and average spend
//! GET    /api/admin/analytics/sales          - Paid revenue per day
//! GET    /api/admin/analytics/customers      - Sign-ups per day
//! GET    /api/admin/analytics/products       - Top products by revenue
//! ```

pub mod analytics;
pub mod categories;
pub mod orders;
pub mod products;
pub mod users;

use axum::{
    Router,
    routing::{get, patch, put},
};

use crate::state::AppState;

/// Admin routes, nested under `/api/admin`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index).post(products::create))
        .route("/products/activity", get(products::activity))
        .route(
            "/products/{id}",
            put(products::update).delete(products::delete),
        )
        .route(
            "/categories",
            get(categories::index).post(categories::create),
        )
        .route(
            "/categories/{id}",
            put(categories::update).delete(categories::delete),
        )
        .route("/orders", get(orders::index))
        .route("/orders/summary", get(orders::summary))
        .route("/orders/{id}/status", patch(orders::update_status))
        .route("/users", get(users::index))
        .route("/users/summary", get(users::summary))
        .route("/analytics/sales", get(analytics::sales))
        .route("/analytics/customers", get(analytics::customers))
        .route("/analytics/products", get(analytics::products))
}
