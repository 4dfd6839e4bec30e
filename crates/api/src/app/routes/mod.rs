use axum::{routing::get, Router};

pub mod accounts;
pub mod system;
pub mod transactions;

/// Router for all authenticated (user-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/accounts", accounts::router())
        .nest("/transactions", transactions::router())
}
