// src/issuance.rs
//
// Расчёт партии токенов: кредиты на токен, итоговая стоимость, строки токенов.
// Генератор случайности передаётся снаружи, чтобы тесты могли подсунуть
// детерминированный RNG.

use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::FundingError;
use crate::ledger::{usd_to_credits, FIXED_FEE_USD};

pub const MAX_TOKENS_PER_BATCH: u32 = 1000;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Product,
    Master,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Product => "product",
            TokenKind::Master => "master",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FundingMode {
    Usd,
    Credits,
}

impl FundingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundingMode::Usd => "usd",
            FundingMode::Credits => "credits",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PrefixMode {
    Auto,
    Custom,
}

/// Входные параметры выпуска после разбора запроса.
#[derive(Debug, Clone)]
pub struct IssueSpec {
    pub kind: TokenKind,
    pub mode: FundingMode,
    pub token_count: u32,
    pub usd: Option<f64>,
    pub credits: Option<i64>,
}

/// Результат расчёта партии. `total_cost_usd` уже включает комиссию.
#[derive(Debug, Clone)]
pub struct IssueQuote {
    pub credits_per_token: i64,
    pub per_token_usd: f64,
    pub total_credits: i64,
    pub total_cost_usd: f64,
    pub value_label: String,
    pub mode: FundingMode,
}

pub fn rand_string(rng: &mut impl Rng, len: usize) -> String {
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Префикс партии: 4 случайных символа в auto-режиме, иначе пользовательский
/// (1..=4 ASCII-буквы/цифры, проверяется до генерации).
pub fn resolve_prefix(
    rng: &mut impl Rng,
    mode: PrefixMode,
    input: Option<&str>,
) -> Result<String, FundingError> {
    match mode {
        PrefixMode::Auto => Ok(rand_string(rng, 4)),
        PrefixMode::Custom => {
            let prefix = input.unwrap_or("").trim();
            if prefix.is_empty()
                || prefix.len() > 4
                || !prefix.chars().all(|c| c.is_ascii_alphanumeric())
            {
                return Err(FundingError::Validation(
                    "Invalid prefix: max 4 alphanumeric chars".to_string(),
                ));
            }
            Ok(prefix.to_string())
        }
    }
}

/// Считает кредиты на токен и итоговую стоимость партии.
///
/// `value_credits_usd` — курс выбранного продукта (USD за кредит), для
/// master-токенов не используется.
pub fn quote_issue(
    spec: &IssueSpec,
    value_credits_usd: Option<f64>,
) -> Result<IssueQuote, FundingError> {
    if spec.token_count < 1 || spec.token_count > MAX_TOKENS_PER_BATCH {
        return Err(FundingError::Validation(format!(
            "Token count must be between 1 and {MAX_TOKENS_PER_BATCH}"
        )));
    }

    let (credits_per_token, per_token_usd, value_label, mode) = match spec.kind {
        TokenKind::Product => {
            let rate = value_credits_usd.ok_or_else(|| {
                FundingError::Validation("Select a product".to_string())
            })?;
            match spec.mode {
                FundingMode::Usd => {
                    let usd = declared_usd(spec.usd)?;
                    (usd_to_credits(usd, rate), usd, format!("{rate}"), FundingMode::Usd)
                }
                FundingMode::Credits => {
                    let credits = match spec.credits {
                        Some(c) if c >= 1 => c,
                        _ => {
                            return Err(FundingError::Validation(
                                "Credits per token is required and must be at least 1"
                                    .to_string(),
                            ))
                        }
                    };
                    (credits, credits as f64 * rate, format!("{rate}"), FundingMode::Credits)
                }
            }
        }
        // Master-токены всегда в долларах; режим из запроса игнорируется.
        TokenKind::Master => {
            let usd = declared_usd(spec.usd)?;
            if usd.fract() != 0.0 {
                return Err(FundingError::Validation(
                    "Master tokens accept whole USD amounts only".to_string(),
                ));
            }
            (usd as i64, usd, "USD".to_string(), FundingMode::Usd)
        }
    };

    if credits_per_token <= 0 {
        return Err(FundingError::AmountTooSmall);
    }

    Ok(IssueQuote {
        credits_per_token,
        per_token_usd,
        total_credits: credits_per_token * spec.token_count as i64,
        total_cost_usd: per_token_usd * spec.token_count as f64 + FIXED_FEE_USD,
        value_label,
        mode,
    })
}

fn declared_usd(usd: Option<f64>) -> Result<f64, FundingError> {
    match usd {
        Some(v) if v.is_finite() && v >= 1.0 => Ok(v),
        _ => Err(FundingError::Validation(
            "USD per token is required and must be at least 1".to_string(),
        )),
    }
}

/// `{PREFIX}-{CREDITS}-{RANDOM15}` для product, `{PREFIX}-{CREDITS}USD-{RANDOM15}`
/// для master. Строка токена глобально уникальна и неизменяема.
pub fn token_string(
    rng: &mut impl Rng,
    prefix: &str,
    credits_per_token: i64,
    kind: TokenKind,
) -> String {
    match kind {
        TokenKind::Product => format!("{prefix}-{credits_per_token}-{}", rand_string(rng, 15)),
        TokenKind::Master => format!("{prefix}-{credits_per_token}USD-{}", rand_string(rng, 15)),
    }
}

pub fn batch_label(rng: &mut impl Rng, token_count: u32) -> String {
    format!("BATCH-{token_count}tokens-{}", rand_string(rng, 10))
}
