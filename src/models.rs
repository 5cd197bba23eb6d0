// src/models.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Запись каталога. Синхронизируется из HUB, локально только читается.
#[derive(Debug, Serialize, ToSchema)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    /// Стоимость одного кредита в USD.
    pub value_credits_usd: f64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Одна попытка пополнения баланса. Статус и суммы мутирует IPN шлюза.
#[derive(Debug, Serialize, ToSchema)]
pub struct Payment {
    pub id: i64,
    pub user_id: i32,
    pub invoice_id: Option<String>,
    pub order_id: Option<String>,
    pub status: String,
    pub amount_usd: Option<f64>,
    pub amount_crypto: Option<f64>,
    pub currency: Option<String>,
    pub pay_currency: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Партия выпуска либо админская корректировка. Append-only: `usd_spent`
/// после записи не меняется.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionRecord {
    pub id: i64,
    pub user_id: i32,
    pub product_id: Option<String>,
    pub token_type: String, // product | master | admin_adjustment
    pub batch_label: Option<String>,
    pub credits: i64,
    pub usd_spent: f64,
    pub value_label: Option<String>,
    pub token_count: i32,
    pub mode: Option<String>,
    pub fee_usd: f64,
    pub credits_per_token: i64,
    pub activated: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Token {
    pub id: i64,
    pub batch_tx_id: i64,
    pub user_id: i32,
    pub product_id: Option<String>,
    pub token_string: String,
    pub credits: i64,
    pub token_type: String,
    pub activated: bool,
    pub locked: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Одно пополнение токена со снимками кредитов и баланса до/после.
#[derive(Debug, Serialize, ToSchema)]
pub struct RefillRecord {
    pub id: i64,
    pub user_id: i32,
    pub token_id: i64,
    pub token_string: String,
    pub token_type: String,
    pub refill_mode: String,
    pub refill_amount: f64,
    pub credits_added: i64,
    pub usd_spent: f64,
    pub fee_usd: f64,
    pub credits_before: i64,
    pub credits_after: i64,
    pub balance_before: f64,
    pub balance_after: f64,
    pub created_at: Option<DateTime<Utc>>,
}
