// src/db.rs
//
// Доступ к данным. Все запросы runtime (без макросов), чтобы сборка не
// зависела от наличия таблиц в DEV БД.

use sqlx::{PgPool, Row};

use crate::issuance::IssueQuote;
use crate::ledger::{self, BalanceBreakdown, PaymentFunds, SpendRecord};
use crate::models::{Payment, Product, RefillRecord, Token, TransactionRecord};
use crate::refill::RefillQuote;

// ---------------------------------------------------------------------------
// Баланс

pub async fn load_payment_funds(
    pool: &PgPool,
    user_id: i32,
) -> Result<Vec<PaymentFunds>, sqlx::Error> {
    let rows = sqlx::query("SELECT status, amount_usd FROM payment_history WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|r| PaymentFunds {
            status: r.get("status"),
            amount_usd: r.get("amount_usd"),
        })
        .collect())
}

/// Все списания владельца: партии выпуска и пополнения.
pub async fn load_spends(pool: &PgPool, user_id: i32) -> Result<Vec<SpendRecord>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT usd_spent FROM transactions WHERE user_id = $1
           UNION ALL
           SELECT usd_spent FROM refill_transactions WHERE user_id = $1"#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| SpendRecord {
            usd_spent: r.get("usd_spent"),
        })
        .collect())
}

/// Баланс всегда пересчитывается из полной истории, без кеша.
pub async fn user_balance(pool: &PgPool, user_id: i32) -> Result<BalanceBreakdown, sqlx::Error> {
    let payments = load_payment_funds(pool, user_id).await?;
    let spends = load_spends(pool, user_id).await?;
    Ok(ledger::compute_balance(&payments, &spends))
}

// ---------------------------------------------------------------------------
// Каталог

fn map_product(r: sqlx::postgres::PgRow) -> Product {
    Product {
        product_id: r.get("product_id"),
        name: r.get("name"),
        value_credits_usd: r.get("value_credits_usd"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

pub async fn list_products(pool: &PgPool) -> Result<Vec<Product>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT product_id, name, value_credits_usd, created_at, updated_at
           FROM products
           ORDER BY name ASC"#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(map_product).collect())
}

pub async fn get_product(pool: &PgPool, product_id: &str) -> Result<Option<Product>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT product_id, name, value_credits_usd, created_at, updated_at
           FROM products
           WHERE product_id = $1"#,
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(map_product))
}

pub async fn insert_product(
    pool: &PgPool,
    product_id: &str,
    name: &str,
    value_credits_usd: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO products (product_id, name, value_credits_usd)
           VALUES ($1, $2, $3)"#,
    )
    .bind(product_id)
    .bind(name)
    .bind(value_credits_usd)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn update_product(
    pool: &PgPool,
    product_id: &str,
    name: &str,
    value_credits_usd: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE products
           SET name = $1, value_credits_usd = $2, updated_at = NOW()
           WHERE product_id = $3"#,
    )
    .bind(name)
    .bind(value_credits_usd)
    .bind(product_id)
    .execute(pool)
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Выпуск партии

pub struct NewIssuance<'a> {
    pub user_id: i32,
    pub product_id: Option<&'a str>,
    pub token_type: &'a str,
    pub batch_label: &'a str,
    pub quote: &'a IssueQuote,
    pub activated: bool,
    pub token_strings: &'a [String],
}

/// Пишет строку партии и все токены одной транзакцией БД: либо партия
/// видна целиком, либо её нет вовсе.
pub async fn insert_issuance(pool: &PgPool, new: &NewIssuance<'_>) -> Result<i64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        r#"INSERT INTO transactions
               (user_id, product_id, token_type, batch_label, credits, usd_spent,
                value_label, token_count, mode, fee_usd, credits_per_token, activated)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
           RETURNING id"#,
    )
    .bind(new.user_id)
    .bind(new.product_id)
    .bind(new.token_type)
    .bind(new.batch_label)
    .bind(new.quote.total_credits)
    .bind(new.quote.total_cost_usd)
    .bind(&new.quote.value_label)
    .bind(new.token_strings.len() as i32)
    .bind(new.quote.mode.as_str())
    .bind(crate::ledger::FIXED_FEE_USD)
    .bind(new.quote.credits_per_token)
    .bind(new.activated)
    .fetch_one(&mut *tx)
    .await?;

    let batch_tx_id: i64 = row.get("id");

    for token_string in new.token_strings {
        sqlx::query(
            r#"INSERT INTO tokens
                   (batch_tx_id, user_id, product_id, token_string, credits, token_type, activated)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(batch_tx_id)
        .bind(new.user_id)
        .bind(new.product_id)
        .bind(token_string)
        .bind(new.quote.credits_per_token)
        .bind(new.token_type)
        .bind(new.activated)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(batch_tx_id)
}

// ---------------------------------------------------------------------------
// Токены и пополнение

pub struct TokenRow {
    pub id: i64,
    pub credits: i64,
    pub activated: bool,
    pub locked: bool,
    pub token_type: String,
    pub product_id: Option<String>,
}

/// Поиск по точной строке токена, только среди токенов владельца.
pub async fn find_user_token(
    pool: &PgPool,
    user_id: i32,
    token_string: &str,
) -> Result<Option<TokenRow>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, credits, activated, locked, token_type, product_id
           FROM tokens
           WHERE token_string = $1 AND user_id = $2"#,
    )
    .bind(token_string)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| TokenRow {
        id: r.get("id"),
        credits: r.get("credits"),
        activated: r.get("activated"),
        locked: r.get("locked"),
        token_type: r.get("token_type"),
        product_id: r.get("product_id"),
    }))
}

#[derive(Debug)]
pub enum RefillWriteError {
    /// CAS по кредитам не прошёл: токен изменился между чтением и записью.
    Conflict,
    Db(sqlx::Error),
}

impl From<sqlx::Error> for RefillWriteError {
    fn from(value: sqlx::Error) -> Self {
        Self::Db(value)
    }
}

pub struct NewRefill<'a> {
    pub user_id: i32,
    pub token: &'a TokenRow,
    pub token_string: &'a str,
    pub refill_mode: &'a str,
    pub refill_amount: f64,
    pub quote: &'a RefillQuote,
    pub balance_before: f64,
}

/// Пишет запись пополнения и обновляет кредиты токена одной транзакцией БД.
/// Обновление guarded по `credits = credits_before`: проигравший гонку запрос
/// откатывается целиком.
pub async fn insert_refill(pool: &PgPool, new: &NewRefill<'_>) -> Result<i64, RefillWriteError> {
    let credits_after = new.token.credits + new.quote.credits_added;
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        r#"INSERT INTO refill_transactions
               (user_id, token_id, token_string, token_type, refill_mode, refill_amount,
                credits_added, usd_spent, fee_usd, credits_before, credits_after,
                balance_before, balance_after)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
           RETURNING id"#,
    )
    .bind(new.user_id)
    .bind(new.token.id)
    .bind(new.token_string)
    .bind(&new.token.token_type)
    .bind(new.refill_mode)
    .bind(new.refill_amount)
    .bind(new.quote.credits_added)
    .bind(new.quote.usd_spent)
    .bind(new.quote.fee_usd)
    .bind(new.token.credits)
    .bind(credits_after)
    .bind(new.balance_before)
    .bind(new.balance_before - new.quote.usd_spent)
    .fetch_one(&mut *tx)
    .await?;

    let refill_id: i64 = row.get("id");

    let updated = sqlx::query(
        r#"UPDATE tokens SET credits = $1 WHERE id = $2 AND credits = $3"#,
    )
    .bind(credits_after)
    .bind(new.token.id)
    .bind(new.token.credits)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(RefillWriteError::Conflict);
    }

    tx.commit().await?;
    Ok(refill_id)
}

// ---------------------------------------------------------------------------
// Платежи

pub async fn insert_pending_payment(
    pool: &PgPool,
    user_id: i32,
    invoice_id: Option<&str>,
    order_id: &str,
    amount_usd: f64,
    raw: &serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO payment_history
               (user_id, invoice_id, order_id, status, amount_usd, currency, raw)
           VALUES ($1, $2, $3, 'pending', $4, 'USD', $5)"#,
    )
    .bind(user_id)
    .bind(invoice_id)
    .bind(order_id)
    .bind(amount_usd)
    .bind(raw)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn payment_order_exists(pool: &PgPool, order_id: &str) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT id FROM payment_history WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

pub struct IpnUpdate<'a> {
    pub status: &'a str,
    pub amount_usd: Option<f64>,
    pub amount_crypto: Option<f64>,
    pub currency: Option<&'a str>,
    pub pay_currency: Option<&'a str>,
    pub raw: &'a serde_json::Value,
}

pub async fn update_payment_from_ipn(
    pool: &PgPool,
    order_id: &str,
    upd: &IpnUpdate<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE payment_history
           SET status = $1, amount_usd = $2, amount_crypto = $3,
               currency = $4, pay_currency = $5, raw = $6
           WHERE order_id = $7"#,
    )
    .bind(upd.status)
    .bind(upd.amount_usd)
    .bind(upd.amount_crypto)
    .bind(upd.currency)
    .bind(upd.pay_currency)
    .bind(upd.raw)
    .bind(order_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn insert_payment_from_ipn(
    pool: &PgPool,
    user_id: i32,
    invoice_id: Option<&str>,
    order_id: &str,
    upd: &IpnUpdate<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO payment_history
               (user_id, invoice_id, order_id, status, amount_usd, amount_crypto,
                currency, pay_currency, raw)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
    )
    .bind(user_id)
    .bind(invoice_id)
    .bind(order_id)
    .bind(upd.status)
    .bind(upd.amount_usd)
    .bind(upd.amount_crypto)
    .bind(upd.currency)
    .bind(upd.pay_currency)
    .bind(upd.raw)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_payments(pool: &PgPool, user_id: i32) -> Result<Vec<Payment>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, user_id, invoice_id, order_id, status, amount_usd, amount_crypto,
                  currency, pay_currency, created_at
           FROM payment_history
           WHERE user_id = $1
           ORDER BY created_at DESC"#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| Payment {
            id: r.get("id"),
            user_id: r.get("user_id"),
            invoice_id: r.get("invoice_id"),
            order_id: r.get("order_id"),
            status: r.get("status"),
            amount_usd: r.get("amount_usd"),
            amount_crypto: r.get("amount_crypto"),
            currency: r.get("currency"),
            pay_currency: r.get("pay_currency"),
            created_at: r.get("created_at"),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// История и выгрузка

pub async fn list_transactions(
    pool: &PgPool,
    user_id: i32,
) -> Result<Vec<TransactionRecord>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, user_id, product_id, token_type, batch_label, credits, usd_spent,
                  value_label, token_count, mode, fee_usd, credits_per_token, activated,
                  created_at
           FROM transactions
           WHERE user_id = $1
           ORDER BY created_at DESC"#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| TransactionRecord {
            id: r.get("id"),
            user_id: r.get("user_id"),
            product_id: r.get("product_id"),
            token_type: r.get("token_type"),
            batch_label: r.get("batch_label"),
            credits: r.get("credits"),
            usd_spent: r.get("usd_spent"),
            value_label: r.get("value_label"),
            token_count: r.get("token_count"),
            mode: r.get("mode"),
            fee_usd: r.get("fee_usd"),
            credits_per_token: r.get("credits_per_token"),
            activated: r.get("activated"),
            created_at: r.get("created_at"),
        })
        .collect())
}

pub async fn list_tokens(
    pool: &PgPool,
    user_id: i32,
    batch_tx_id: Option<i64>,
) -> Result<Vec<Token>, sqlx::Error> {
    let base = r#"SELECT id, batch_tx_id, user_id, product_id, token_string, credits,
                         token_type, activated, locked, created_at
                  FROM tokens
                  WHERE user_id = $1"#;

    let rows = match batch_tx_id {
        Some(batch) => {
            sqlx::query(&format!("{base} AND batch_tx_id = $2 ORDER BY created_at DESC"))
                .bind(user_id)
                .bind(batch)
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query(&format!("{base} ORDER BY created_at DESC"))
                .bind(user_id)
                .fetch_all(pool)
                .await?
        }
    };

    Ok(rows
        .into_iter()
        .map(|r| Token {
            id: r.get("id"),
            batch_tx_id: r.get("batch_tx_id"),
            user_id: r.get("user_id"),
            product_id: r.get("product_id"),
            token_string: r.get("token_string"),
            credits: r.get("credits"),
            token_type: r.get("token_type"),
            activated: r.get("activated"),
            locked: r.get("locked"),
            created_at: r.get("created_at"),
        })
        .collect())
}

pub async fn list_refills(pool: &PgPool, user_id: i32) -> Result<Vec<RefillRecord>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, user_id, token_id, token_string, token_type, refill_mode,
                  refill_amount, credits_added, usd_spent, fee_usd, credits_before,
                  credits_after, balance_before, balance_after, created_at
           FROM refill_transactions
           WHERE user_id = $1
           ORDER BY created_at DESC"#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| RefillRecord {
            id: r.get("id"),
            user_id: r.get("user_id"),
            token_id: r.get("token_id"),
            token_string: r.get("token_string"),
            token_type: r.get("token_type"),
            refill_mode: r.get("refill_mode"),
            refill_amount: r.get("refill_amount"),
            credits_added: r.get("credits_added"),
            usd_spent: r.get("usd_spent"),
            fee_usd: r.get("fee_usd"),
            credits_before: r.get("credits_before"),
            credits_after: r.get("credits_after"),
            balance_before: r.get("balance_before"),
            balance_after: r.get("balance_after"),
            created_at: r.get("created_at"),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Админка

pub async fn is_admin(pool: &PgPool, user_id: i32) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT is_admin FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.get("is_admin")).unwrap_or(false))
}

/// Корректировка кредитов: новая append-only строка с нулевым usd_spent,
/// существующие записи не трогаются.
pub async fn insert_admin_adjustment(
    pool: &PgPool,
    user_id: i32,
    credits: i64,
    label: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO transactions
               (user_id, token_type, credits, usd_spent, value_label, token_count)
           VALUES ($1, 'admin_adjustment', $2, 0, $3, 0)
           RETURNING id"#,
    )
    .bind(user_id)
    .bind(credits)
    .bind(label.unwrap_or("Admin adjustment"))
    .fetch_one(pool)
    .await?;

    Ok(row.get("id"))
}
