use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tally_ledger::LedgerError;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        LedgerError::AccountNotFound => {
            json_error(StatusCode::NOT_FOUND, "not_found", "account not found")
        }
        LedgerError::TransactionNotFound => {
            json_error(StatusCode::NOT_FOUND, "not_found", "transaction not found")
        }
        // Ownership mismatch is reported as not-found so existence of foreign
        // entities is not leaked.
        LedgerError::Forbidden => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        LedgerError::Constraint(msg) => {
            json_error(StatusCode::CONFLICT, "constraint_violation", msg)
        }
        LedgerError::Unavailable(msg) => {
            tracing::warn!("store unavailable: {msg}");
            json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "store_unavailable",
                "store temporarily unavailable",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(res: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unavailable_maps_to_503_without_leaking_detail() {
        let res = ledger_error_to_response(LedgerError::unavailable("pool closed at 10.0.0.3"));
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = body_json(res).await;
        assert_eq!(body["error"], "store_unavailable");
        assert!(!body["message"].as_str().unwrap().contains("10.0.0.3"));
    }

    #[tokio::test]
    async fn forbidden_maps_to_404() {
        let res = ledger_error_to_response(LedgerError::Forbidden);
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(res).await["error"], "not_found");
    }
}
