use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use tally_core::{AccountId, TransactionId};
use tally_ledger::TransactionChange;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_transaction))
        // The path parameter is an account id for GET and a transaction id
        // for PUT/DELETE, matching the external contract.
        .route(
            "/:id",
            get(list_transactions)
                .put(update_transaction)
                .delete(delete_transaction),
        )
}

pub async fn create_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    body: Result<Json<dto::CreateTransactionRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()),
    };

    let account_id: AccountId = match body.account_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid account id"),
    };

    match services
        .create_transaction(user.user_id(), account_id, body.amount, body.description)
        .await
    {
        Ok((transaction, new_balance)) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "transaction": dto::transaction_to_json(&transaction),
                "new_balance": dto::balance_to_json(new_balance),
            })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(account_id): Path<String>,
) -> axum::response::Response {
    let account_id: AccountId = match account_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid account id"),
    };

    match services.list_transactions(user.user_id(), account_id).await {
        Ok(transactions) => {
            let transactions: Vec<_> = transactions
                .iter()
                .map(dto::transaction_summary_to_json)
                .collect();
            (
                StatusCode::OK,
                Json(serde_json::json!({ "transactions": transactions })),
            )
                .into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn update_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateTransactionRequest>, JsonRejection>,
) -> axum::response::Response {
    let transaction_id: TransactionId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid transaction id")
        }
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()),
    };

    let change = TransactionChange {
        amount: body.amount,
        description: body.description,
    };

    match services
        .update_transaction(user.user_id(), transaction_id, change)
        .await
    {
        Ok((transaction, new_balance)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "transaction": dto::transaction_to_json(&transaction),
                "new_balance": new_balance.map(dto::balance_to_json),
            })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn delete_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let transaction_id: TransactionId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid transaction id")
        }
    };

    match services
        .delete_transaction(user.user_id(), transaction_id)
        .await
    {
        Ok(new_balance) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "transaction deleted",
                "new_balance": dto::balance_to_json(new_balance),
            })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
