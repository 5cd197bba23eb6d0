// src/api/account.rs

use actix_web::{get, web, HttpResponse, Responder};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{db, AppState};

#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    pub confirmed_usd: f64,
    pub spent_usd: f64,
    pub balance_usd: f64,
}

/// Баланс считается на каждый запрос из полной истории платежей и списаний.
#[utoipa::path(
    get,
    path = "/api/balance",
    tag = "account",
    responses(
        (status = 200, description = "Current spendable balance", body = BalanceResponse),
        (status = 500, description = "Server error")
    )
)]
#[get("/balance")]
pub async fn get_balance(state: web::Data<AppState>, user_id: web::ReqData<i32>) -> impl Responder {
    match db::user_balance(&state.pool, *user_id).await {
        Ok(b) => HttpResponse::Ok().json(BalanceResponse {
            confirmed_usd: b.confirmed_usd,
            spent_usd: b.spent_usd,
            balance_usd: b.balance_usd,
        }),
        Err(e) => {
            log::error!("user_balance db error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/payments",
    tag = "account",
    responses(
        (status = 200, description = "Funding attempts, newest first", body = [crate::models::Payment]),
        (status = 500, description = "Server error")
    )
)]
#[get("/payments")]
pub async fn list_payments(
    state: web::Data<AppState>,
    user_id: web::ReqData<i32>,
) -> impl Responder {
    match db::list_payments(&state.pool, *user_id).await {
        Ok(payments) => HttpResponse::Ok().json(payments),
        Err(e) => {
            log::error!("list_payments db error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/transactions",
    tag = "account",
    responses(
        (status = 200, description = "Issuance batches and adjustments, newest first"),
        (status = 500, description = "Server error")
    )
)]
#[get("/transactions")]
pub async fn list_transactions(
    state: web::Data<AppState>,
    user_id: web::ReqData<i32>,
) -> impl Responder {
    match db::list_transactions(&state.pool, *user_id).await {
        Ok(txs) => HttpResponse::Ok().json(txs),
        Err(e) => {
            log::error!("list_transactions db error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
