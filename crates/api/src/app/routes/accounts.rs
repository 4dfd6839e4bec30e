use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use tally_core::AccountId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_accounts).post(create_account))
        .route("/:id", put(rename_account).delete(delete_account))
}

pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    body: Result<Json<dto::CreateAccountRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()),
    };

    match services
        .create_account(user.user_id(), &body.name, body.balance)
        .await
    {
        Ok(account) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "account": dto::account_to_json(&account) })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    match services.list_accounts(user.user_id()).await {
        Ok(accounts) => {
            let accounts: Vec<_> = accounts.iter().map(dto::account_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "accounts": accounts }))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn rename_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::RenameAccountRequest>, JsonRejection>,
) -> axum::response::Response {
    let account_id: AccountId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid account id"),
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()),
    };

    match services
        .rename_account(user.user_id(), account_id, &body.name)
        .await
    {
        Ok(account) => (
            StatusCode::OK,
            Json(serde_json::json!({ "account": dto::account_to_json(&account) })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn delete_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let account_id: AccountId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid account id"),
    };

    match services.delete_account(user.user_id(), account_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "account deleted" })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
