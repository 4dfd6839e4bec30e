use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;
use tally_auth::JwtClaims;
use tally_core::UserId;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = tally_api::app::build_app(jwt_secret.to_string()).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, user_id: UserId) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: user_id,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn create_account(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    name: &str,
) -> String {
    let res = client
        .post(format!("{}/accounts", base_url))
        .bearer_auth(token)
        .json(&json!({ "name": name }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    body["account"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn("test-secret").await;

    let res = reqwest::Client::new()
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn("test-secret").await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn user_context_is_derived_from_token() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let user_id = UserId::new();
    let token = mint_jwt(jwt_secret, user_id);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["user_id"].as_str().unwrap(), user_id.to_string());
}

#[tokio::test]
async fn ledger_lifecycle_create_update_delete() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, UserId::new());
    let client = reqwest::Client::new();

    let account_id = create_account(&client, &srv.base_url, &token, "Checking").await;

    // balance 0 -> +500 -> 500
    let res = client
        .post(format!("{}/transactions", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "account_id": account_id, "amount": 500, "description": "salary" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["new_balance"]["balance"], 500);
    assert_eq!(body["transaction"]["amount"], 500);
    let first_id = body["transaction"]["id"].as_str().unwrap().to_string();

    // -200 -> 300
    let res = client
        .post(format!("{}/transactions", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "account_id": account_id, "amount": -200 }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["new_balance"]["balance"], 300);
    let second_id = body["transaction"]["id"].as_str().unwrap().to_string();

    // listing is ordered by creation time ascending
    let res = client
        .get(format!("{}/transactions/{}", srv.base_url, account_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let listed: Vec<&str> = body["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(listed, vec![first_id.as_str(), second_id.as_str()]);

    // update first 500 -> 400, balance 300 - 100 = 200
    let res = client
        .put(format!("{}/transactions/{}", srv.base_url, first_id))
        .bearer_auth(&token)
        .json(&json!({ "amount": 400 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["new_balance"]["balance"], 200);

    // delete second, balance 200 + 200 = 400
    let res = client
        .delete(format!("{}/transactions/{}", srv.base_url, second_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["new_balance"]["balance"], 400);

    // the stored account balance agrees
    let res = client
        .get(format!("{}/accounts", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["accounts"][0]["balance"], 400);
}

#[tokio::test]
async fn description_only_update_returns_null_balance() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, UserId::new());
    let client = reqwest::Client::new();

    let account_id = create_account(&client, &srv.base_url, &token, "Checking").await;

    let res = client
        .post(format!("{}/transactions", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "account_id": account_id, "amount": 500 }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    let id = body["transaction"]["id"].as_str().unwrap().to_string();

    let res = client
        .put(format!("{}/transactions/{}", srv.base_url, id))
        .bearer_auth(&token)
        .json(&json!({ "description": "rent" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["new_balance"].is_null());
    assert_eq!(body["transaction"]["description"], "rent");
}

#[tokio::test]
async fn update_with_no_fields_is_rejected() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, UserId::new());
    let client = reqwest::Client::new();

    let account_id = create_account(&client, &srv.base_url, &token, "Checking").await;

    let res = client
        .post(format!("{}/transactions", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "account_id": account_id, "amount": 500 }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    let id = body["transaction"]["id"].as_str().unwrap().to_string();

    let res = client
        .put(format!("{}/transactions/{}", srv.base_url, id))
        .bearer_auth(&token)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn missing_required_fields_are_a_400() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, UserId::new());

    let res = reqwest::Client::new()
        .post(format!("{}/transactions", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "description": "no account, no amount" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_account_name_is_a_conflict() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, UserId::new());
    let client = reqwest::Client::new();

    create_account(&client, &srv.base_url, &token, "Checking").await;

    let res = client
        .post(format!("{}/accounts", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": "Checking" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "constraint_violation");
}

#[tokio::test]
async fn foreign_transactions_surface_as_not_found_and_change_nothing() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let owner_token = mint_jwt(jwt_secret, UserId::new());
    let intruder_token = mint_jwt(jwt_secret, UserId::new());
    let client = reqwest::Client::new();

    let account_id = create_account(&client, &srv.base_url, &owner_token, "Checking").await;

    let res = client
        .post(format!("{}/transactions", srv.base_url))
        .bearer_auth(&owner_token)
        .json(&json!({ "account_id": account_id, "amount": 500 }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    let id = body["transaction"]["id"].as_str().unwrap().to_string();

    let res = client
        .put(format!("{}/transactions/{}", srv.base_url, id))
        .bearer_auth(&intruder_token)
        .json(&json!({ "amount": 9999 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .delete(format!("{}/transactions/{}", srv.base_url, id))
        .bearer_auth(&intruder_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Owner's balance is untouched.
    let res = client
        .get(format!("{}/accounts", srv.base_url))
        .bearer_auth(&owner_token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["accounts"][0]["balance"], 500);
}

#[tokio::test]
async fn account_delete_cascades_transactions() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, UserId::new());
    let client = reqwest::Client::new();

    let account_id = create_account(&client, &srv.base_url, &token, "Checking").await;

    client
        .post(format!("{}/transactions", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "account_id": account_id, "amount": 500 }))
        .send()
        .await
        .unwrap();

    let res = client
        .delete(format!("{}/accounts/{}", srv.base_url, account_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/transactions/{}", srv.base_url, account_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
