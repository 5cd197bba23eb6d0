// src/api/payments.rs

use actix_web::{post, web, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::api::nowpayments;
use crate::issuance::rand_string;
use crate::{db, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct TopupRequest {
    /// Сумма пополнения в USD, минимум 1.
    pub amount_usd: f64,
}

/// Создаёт платёж в NOWPayments и возвращает ссылку на оплату.
///
/// Баланс не меняется до подтверждения от шлюза (IPN): здесь только pending
/// запись в payment_history с нашим order_id.
#[utoipa::path(
    post,
    path = "/api/payments/topup",
    tag = "payments",
    request_body = TopupRequest,
    responses(
        (status = 200, description = "Pending payment created, payment_url returned"),
        (status = 400, description = "Invalid amount or gateway rejection"),
        (status = 500, description = "Server error")
    )
)]
#[post("/payments/topup")]
pub async fn create_topup(
    state: web::Data<AppState>,
    user_id: web::ReqData<i32>,
    payload: web::Json<TopupRequest>,
) -> impl Responder {
    let user_id = *user_id;
    let amount = payload.amount_usd;

    if !amount.is_finite() || amount < 1.0 {
        return HttpResponse::BadRequest().json(json!({ "error": "Minimum top-up is $1" }));
    }

    // order_id в формате {user}_{ts}_{nonce}: IPN достаёт владельца из префикса
    let order_id = format!(
        "{}_{}_{}",
        user_id,
        Utc::now().timestamp(),
        rand_string(&mut rand::thread_rng(), 6)
    );

    let ipn_url = format!("{}/webhook/nowpayments", state.callback_base_url);

    log::info!("nowpayments create payment user_id={user_id} amount={amount} order_id={order_id}");

    let created = match nowpayments::create_payment(
        &state.nowpayments_api_key,
        nowpayments::CreatePaymentRequest {
            price_amount: amount,
            price_currency: "USD".to_string(),
            order_id: order_id.clone(),
            ipn_callback_url: ipn_url,
        },
    )
    .await
    {
        Ok(c) => c,
        Err(e) => {
            log::error!("nowpayments create_payment error: {e} user_id={user_id}");
            return HttpResponse::BadRequest().json(json!({
                "error": "Failed to create payment",
                "details": e.to_string()
            }));
        }
    };

    if let Err(e) = db::insert_pending_payment(
        &state.pool,
        user_id,
        created.payment_id.as_deref(),
        &order_id,
        amount,
        &created.raw,
    )
    .await
    {
        log::error!("insert_pending_payment error: {e}");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok().json(json!({
        "payment_id": created.payment_id,
        "payment_url": created.payment_url,
        "order_id": order_id
    }))
}
