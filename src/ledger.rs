// src/ledger.rs
//
// Чистая арифметика баланса: подтверждённые платежи минус все списания.
// Никакого кеширования — баланс всегда пересчитывается из полной истории.

use serde::Serialize;

/// Фиксированная комиссия за запрос (партия токенов или одно пополнение),
/// не зависит от количества токенов.
pub const FIXED_FEE_USD: f64 = 0.0001;

/// Master-токены привязаны к доллару 1:1 и при выпуске, и при пополнении.
pub const MASTER_CREDITS_PER_USD: f64 = 1.0;

/// Платёж учитывается в балансе только в одном из этих статусов.
const CONFIRMED_STATUSES: [&str; 4] = ["finished", "confirmed", "completed", "paid"];

/// Срез платёжной записи, достаточный для расчёта баланса.
#[derive(Debug, Clone)]
pub struct PaymentFunds {
    pub status: String,
    /// NULL для платежей не в долларовой деноминации.
    pub amount_usd: Option<f64>,
}

/// Одна строка списания: выпуск партии или пополнение.
#[derive(Debug, Clone, Copy)]
pub struct SpendRecord {
    pub usd_spent: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BalanceBreakdown {
    pub confirmed_usd: f64,
    pub spent_usd: f64,
    pub balance_usd: f64,
}

pub fn is_confirmed_status(status: &str) -> bool {
    let status = status.to_lowercase();
    CONFIRMED_STATUSES.iter().any(|s| *s == status)
}

pub fn confirmed_usd(payments: &[PaymentFunds]) -> f64 {
    payments
        .iter()
        .filter(|p| is_confirmed_status(&p.status))
        .map(|p| p.amount_usd.unwrap_or(0.0))
        .sum()
}

pub fn spent_usd(spends: &[SpendRecord]) -> f64 {
    spends.iter().map(|s| s.usd_spent).sum()
}

/// `balance = max(0, confirmed - spent)`, никогда не отрицательный.
pub fn compute_balance(payments: &[PaymentFunds], spends: &[SpendRecord]) -> BalanceBreakdown {
    let confirmed = confirmed_usd(payments);
    let spent = spent_usd(spends);
    BalanceBreakdown {
        confirmed_usd: confirmed,
        spent_usd: spent,
        balance_usd: (confirmed - spent).max(0.0),
    }
}

/// Конвертация USD -> кредиты: всегда floor, никогда не вверх.
pub fn usd_to_credits(usd: f64, usd_per_credit: f64) -> i64 {
    (usd / usd_per_credit).floor() as i64
}
