// src/refill.rs
//
// Расчёт пополнения существующего токена. Никакого I/O: курс продукта и
// состояние токена резолвит вызывающая сторона.

use crate::errors::FundingError;
use crate::issuance::{FundingMode, TokenKind};
use crate::ledger::{usd_to_credits, FIXED_FEE_USD, MASTER_CREDITS_PER_USD};

/// Итог пополнения. `usd_spent` уже включает комиссию.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefillQuote {
    pub credits_added: i64,
    pub usd_spent: f64,
    pub fee_usd: f64,
}

/// Считает кредиты и стоимость пополнения.
///
/// - product + credits: `floor(amount)` кредитов, стоимость `credits * rate + fee`;
/// - product + usd: из суммы вычитается комиссия, остаток конвертируется по курсу;
/// - master: только usd, 1 USD = 1 кредит после вычета комиссии.
pub fn quote_refill(
    kind: TokenKind,
    mode: FundingMode,
    amount: f64,
    value_credits_usd: Option<f64>,
) -> Result<RefillQuote, FundingError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(FundingError::Validation(
            "Refill amount must be greater than 0".to_string(),
        ));
    }

    let (credits_added, usd_spent) = match kind {
        TokenKind::Product => {
            let rate = value_credits_usd
                .ok_or_else(|| FundingError::NotFound("Product for this token".to_string()))?;
            match mode {
                FundingMode::Credits => {
                    let credits = amount.floor() as i64;
                    (credits, credits as f64 * rate + FIXED_FEE_USD)
                }
                FundingMode::Usd => {
                    let available = amount - FIXED_FEE_USD;
                    if available <= 0.0 {
                        return Err(FundingError::AmountTooSmall);
                    }
                    (usd_to_credits(available, rate), amount)
                }
            }
        }
        TokenKind::Master => {
            if mode == FundingMode::Credits {
                return Err(FundingError::UnsupportedMode);
            }
            let available = amount - FIXED_FEE_USD;
            if available <= 0.0 {
                return Err(FundingError::AmountTooSmall);
            }
            (usd_to_credits(available, MASTER_CREDITS_PER_USD), amount)
        }
    };

    if credits_added <= 0 {
        return Err(FundingError::AmountTooSmall);
    }

    Ok(RefillQuote {
        credits_added,
        usd_spent,
        fee_usd: FIXED_FEE_USD,
    })
}
