use serde::{Deserialize, Deserializer};

use tally_core::{Account, Transaction};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
    /// Optional opening balance in the smallest currency unit.
    pub balance: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RenameAccountRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub account_id: String,
    pub amount: i64,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTransactionRequest {
    pub amount: Option<i64>,
    /// Absent = leave untouched; `null` = clear; string = replace.
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

// -------------------------
// Response mapping
// -------------------------

pub fn account_to_json(account: &Account) -> serde_json::Value {
    serde_json::json!({
        "id": account.id.to_string(),
        "name": account.name,
        "balance": account.balance,
    })
}

pub fn transaction_to_json(t: &Transaction) -> serde_json::Value {
    serde_json::json!({
        "id": t.id.to_string(),
        "description": t.description,
        "account_id": t.account_id.to_string(),
        "amount": t.amount,
        "created_at": t.created_at,
    })
}

/// Listing shape: no timestamps, matching the external contract.
pub fn transaction_summary_to_json(t: &Transaction) -> serde_json::Value {
    serde_json::json!({
        "id": t.id.to_string(),
        "description": t.description,
        "account_id": t.account_id.to_string(),
        "amount": t.amount,
    })
}

pub fn balance_to_json(balance: i64) -> serde_json::Value {
    serde_json::json!({ "balance": balance })
}
