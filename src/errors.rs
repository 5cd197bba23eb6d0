// src/errors.rs

use actix_web::HttpResponse;
use serde_json::json;
use std::fmt;

/// Ошибки движков выпуска и пополнения. Все варианты кроме ошибок хранилища
/// обнаруживаются до первой записи, компенсация не нужна.
#[derive(Debug, Clone, PartialEq)]
pub enum FundingError {
    Validation(String),
    NotFound(String),
    Locked,
    NotActivated,
    UnsupportedMode,
    AmountTooSmall,
    InsufficientBalance { required: f64, available: f64 },
}

impl fmt::Display for FundingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FundingError::Validation(msg) => write!(f, "{msg}"),
            FundingError::NotFound(what) => write!(f, "{what} not found"),
            FundingError::Locked => write!(f, "Token locked"),
            FundingError::NotActivated => write!(f, "Activate the token first"),
            FundingError::UnsupportedMode => {
                write!(f, "Master tokens only support USD refill mode")
            }
            FundingError::AmountTooSmall => {
                write!(f, "Amount too small to generate any credits")
            }
            FundingError::InsufficientBalance {
                required,
                available,
            } => write!(
                f,
                "Insufficient balance. Required: ${required:.4}, Available: ${available:.4}"
            ),
        }
    }
}

impl FundingError {
    /// HTTP-ответ в формате, который ожидает дашборд: `error` + опционально
    /// `error_type`, для нехватки баланса ещё обе суммы.
    pub fn to_response(&self) -> HttpResponse {
        match self {
            FundingError::NotFound(_) => {
                HttpResponse::NotFound().json(json!({ "error": self.to_string() }))
            }
            FundingError::Locked => HttpResponse::BadRequest().json(json!({
                "error": self.to_string(),
                "error_type": "locked"
            })),
            FundingError::NotActivated => HttpResponse::BadRequest().json(json!({
                "error": self.to_string(),
                "error_type": "not_activated"
            })),
            FundingError::InsufficientBalance {
                required,
                available,
            } => HttpResponse::BadRequest().json(json!({
                "error": self.to_string(),
                "required_amount": required,
                "current_balance": available
            })),
            _ => HttpResponse::BadRequest().json(json!({ "error": self.to_string() })),
        }
    }
}
