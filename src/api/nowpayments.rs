// src/api/nowpayments.rs
//
// Минимальный клиент NOWPayments (https://api.nowpayments.io)
// Авторизация: заголовок x-api-key

use serde::Serialize;
use serde_json::Value;
use std::fmt;

const NOWPAYMENTS_API_BASE: &str = "https://api.nowpayments.io";

#[derive(Debug)]
pub enum NowPaymentsError {
    Http(reqwest::Error),
    Api { status: u16, body: String },
    InvalidResponse(String),
}

impl fmt::Display for NowPaymentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NowPaymentsError::Http(e) => write!(f, "http error: {e}"),
            NowPaymentsError::Api { status, body } => {
                write!(f, "nowpayments api error status={status} body={body}")
            }
            NowPaymentsError::InvalidResponse(e) => write!(f, "invalid response: {e}"),
        }
    }
}

impl From<reqwest::Error> for NowPaymentsError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentRequest {
    pub price_amount: f64,
    pub price_currency: String,
    pub order_id: String,
    pub ipn_callback_url: String,
}

/// Ответ шлюза. Поля у NOWPayments плавают между ревизиями API
/// (payment_id/id, payment_url/invoice_url), поэтому разбираем Value.
#[derive(Debug)]
pub struct CreatedPayment {
    pub payment_id: Option<String>,
    pub payment_url: Option<String>,
    pub raw: Value,
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match &value[*key] {
            Value::String(s) => return Some(s.clone()),
            Value::Number(n) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

pub async fn create_payment(
    api_key: &str,
    req: CreatePaymentRequest,
) -> Result<CreatedPayment, NowPaymentsError> {
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{NOWPAYMENTS_API_BASE}/v1/payment"))
        .header("x-api-key", api_key)
        .json(&req)
        .send()
        .await?;

    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(NowPaymentsError::Api {
            status: status.as_u16(),
            body,
        });
    }

    let raw = serde_json::from_str::<Value>(&body)
        .map_err(|e| NowPaymentsError::InvalidResponse(format!("{e}; body={body}")))?;

    Ok(CreatedPayment {
        payment_id: string_field(&raw, &["payment_id", "id"]),
        payment_url: string_field(&raw, &["payment_url", "invoice_url"]),
        raw,
    })
}
