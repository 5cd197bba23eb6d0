// src/api/webhooks_nowpayments.rs
//
// IPN от NOWPayments. Подпись: HMAC-SHA512 от сырого тела запроса, hex в
// заголовке x-nowpayments-sig. При несовпадении — 401 и никаких записей.

use actix_web::{post, web, HttpRequest, HttpResponse};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha512;

use crate::{db, AppState};

pub fn sign_ipn_sha512_hex(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// order_id имеет вид `{user_id}_{timestamp}_{nonce}`.
pub fn extract_order_user(order_id: &str) -> Option<i32> {
    order_id.split('_').next()?.parse().ok()
}

fn string_field(payload: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match &payload[*key] {
            Value::String(s) if !s.is_empty() => return Some(s.clone()),
            Value::Number(n) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn number_field(payload: &Value, keys: &[&str]) -> Option<f64> {
    for key in keys {
        if let Some(n) = payload[*key].as_f64() {
            return Some(n);
        }
    }
    None
}

#[utoipa::path(
    post,
    path = "/webhook/nowpayments",
    tag = "webhooks",
    responses(
        (status = 200, description = "Payment record upserted (or callback ignored)"),
        (status = 400, description = "Malformed payload"),
        (status = 401, description = "Invalid signature"),
        (status = 500, description = "Server error")
    )
)]
#[post("/webhook/nowpayments")]
pub async fn nowpayments_ipn(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> HttpResponse {
    let sent_sig = req
        .headers()
        .get("x-nowpayments-sig")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let calc_sig = sign_ipn_sha512_hex(&state.nowpayments_ipn_secret, &body);
    if !sent_sig.eq_ignore_ascii_case(&calc_sig) {
        log::warn!("nowpayments ipn: invalid signature");
        return HttpResponse::Unauthorized().json(json!({ "error": "Invalid signature" }));
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("nowpayments ipn: bad json: {e}");
            return HttpResponse::BadRequest().json(json!({ "error": "Invalid payload" }));
        }
    };

    let Some(order_id) = string_field(&payload, &["order_id"]) else {
        log::warn!("nowpayments ipn: missing order_id");
        return HttpResponse::BadRequest().json(json!({ "error": "Missing order_id" }));
    };

    let status = string_field(&payload, &["payment_status"]).unwrap_or_default();
    let invoice_id = string_field(&payload, &["invoice_id", "payment_id", "id"]);
    let price_amount = number_field(&payload, &["price_amount", "order_amount"]);
    let price_currency = string_field(&payload, &["price_currency", "currency"])
        .unwrap_or_else(|| "USD".to_string())
        .to_uppercase();
    let actually_paid = number_field(&payload, &["actually_paid", "pay_amount"]);
    let pay_currency = string_field(&payload, &["pay_currency"])
        .map(|c| c.to_lowercase());

    // amount_usd только для долларовой деноминации, иначе NULL
    let amount_usd = if price_currency == "USD" {
        price_amount
    } else {
        None
    };

    let upd = db::IpnUpdate {
        status: &status,
        amount_usd,
        amount_crypto: actually_paid,
        currency: Some(&price_currency),
        pay_currency: pay_currency.as_deref(),
        raw: &payload,
    };

    let exists = match db::payment_order_exists(&state.pool, &order_id).await {
        Ok(v) => v,
        Err(e) => {
            log::error!("nowpayments ipn select error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if exists {
        if let Err(e) = db::update_payment_from_ipn(&state.pool, &order_id, &upd).await {
            log::error!("nowpayments ipn update error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    } else {
        // Записи ещё нет (IPN обогнал create-payment или платёж создан извне):
        // владельца достаём из префикса order_id. Неразборчивый order_id
        // подтверждаем 200-кой, чтобы шлюз не ретраил бесконечно.
        let Some(user_id) = extract_order_user(&order_id) else {
            log::warn!("nowpayments ipn: unparseable order_id={order_id}");
            return HttpResponse::Ok().json(json!({ "ok": true, "ignored": true }));
        };

        if let Err(e) =
            db::insert_payment_from_ipn(&state.pool, user_id, invoice_id.as_deref(), &order_id, &upd)
                .await
        {
            log::error!("nowpayments ipn insert error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    }

    log::info!("nowpayments ipn processed order_id={order_id} status={status}");
    HttpResponse::Ok().json(json!({ "ok": true }))
}
