// src/api/refill.rs

use actix_web::{get, post, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::errors::FundingError;
use crate::hub::HubSyncStatus;
use crate::issuance::{FundingMode, TokenKind};
use crate::refill::quote_refill;
use crate::{db, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefillRequest {
    pub token_string: String,
    pub refill_amount: f64,
    pub refill_mode: FundingMode,
    /// Что клиент считает типом токена; сверяется с фактическим.
    pub token_type: TokenKind,
}

/// Пополнение существующего токена.
///
/// Запись пополнения и обновление кредитов токена идут одной транзакцией БД;
/// обновление guarded по `credits = credits_before`, проигравший гонку запрос
/// получает 409 без каких-либо изменений.
#[utoipa::path(
    post,
    path = "/api/tokens/refill",
    tag = "tokens",
    request_body = RefillRequest,
    responses(
        (status = 200, description = "Token refilled"),
        (status = 400, description = "Validation or balance error"),
        (status = 404, description = "Token or product not found"),
        (status = 409, description = "Concurrent refill detected, retry"),
        (status = 500, description = "Server error")
    )
)]
#[post("/tokens/refill")]
pub async fn refill_token(
    state: web::Data<AppState>,
    user_id: web::ReqData<i32>,
    payload: web::Json<RefillRequest>,
) -> impl Responder {
    let user_id = *user_id;
    let payload = payload.into_inner();

    log::info!(
        "refill request user_id={} token={} mode={}",
        user_id,
        payload.token_string,
        payload.refill_mode.as_str()
    );

    // 1) токен ищется по точной строке и только среди токенов владельца
    let token = match db::find_user_token(&state.pool, user_id, &payload.token_string).await {
        Ok(Some(t)) => t,
        Ok(None) => return FundingError::NotFound("Token".to_string()).to_response(),
        Err(e) => {
            log::error!("find_user_token db error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if token.locked {
        return FundingError::Locked.to_response();
    }
    if !token.activated {
        return FundingError::NotActivated.to_response();
    }

    let kind = match token.token_type.as_str() {
        "master" => TokenKind::Master,
        _ => TokenKind::Product,
    };

    if kind != payload.token_type {
        return FundingError::Validation(
            "token_type does not match the token".to_string(),
        )
        .to_response();
    }

    // 2) курс продукта для product-токенов
    let value_credits_usd = match kind {
        TokenKind::Product => match token.product_id.as_deref() {
            Some(product_id) => match db::get_product(&state.pool, product_id).await {
                Ok(Some(p)) => Some(p.value_credits_usd),
                Ok(None) => {
                    return FundingError::NotFound("Product for this token".to_string())
                        .to_response()
                }
                Err(e) => {
                    log::error!("get_product db error: {e}");
                    return HttpResponse::InternalServerError().finish();
                }
            },
            None => {
                return FundingError::NotFound("Product for this token".to_string()).to_response()
            }
        },
        TokenKind::Master => None,
    };

    // 3) расчёт
    let quote = match quote_refill(kind, payload.refill_mode, payload.refill_amount, value_credits_usd)
    {
        Ok(q) => q,
        Err(e) => return e.to_response(),
    };

    // 4) баланс до любой записи
    let balance = match db::user_balance(&state.pool, user_id).await {
        Ok(b) => b,
        Err(e) => {
            log::error!("user_balance db error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if quote.usd_spent > balance.balance_usd {
        return FundingError::InsufficientBalance {
            required: quote.usd_spent,
            available: balance.balance_usd,
        }
        .to_response();
    }

    // 5) запись пополнения + обновление токена одной транзакцией
    let refill_id = match db::insert_refill(
        &state.pool,
        &db::NewRefill {
            user_id,
            token: &token,
            token_string: &payload.token_string,
            refill_mode: payload.refill_mode.as_str(),
            refill_amount: payload.refill_amount,
            quote: &quote,
            balance_before: balance.balance_usd,
        },
    )
    .await
    {
        Ok(id) => id,
        Err(db::RefillWriteError::Conflict) => {
            log::warn!(
                "refill conflict user_id={} token={}",
                user_id,
                payload.token_string
            );
            return HttpResponse::Conflict().json(json!({
                "error": "Token credits changed concurrently, retry"
            }));
        }
        Err(db::RefillWriteError::Db(e)) => {
            log::error!("insert_refill db error: {e}");
            return HttpResponse::InternalServerError()
                .json(json!({ "error": "Failed to create refill transaction record" }));
        }
    };

    let new_credits = token.credits + quote.credits_added;

    // 6) mirror sync: ошибка попадает в ответ, локальное пополнение не откатывается
    let hub_sync = match state.hub_client() {
        Some(hub) => match hub
            .update_token_credits(kind == TokenKind::Master, &payload.token_string, new_credits)
            .await
        {
            Ok(()) => HubSyncStatus::ok(),
            Err(e) => {
                log::error!("hub update_token_credits error (non-critical): {e}");
                HubSyncStatus::failed(e.to_string())
            }
        },
        None => {
            log::info!("HUB API credentials not configured, skipping HUB update");
            HubSyncStatus::unconfigured()
        }
    };

    log::info!(
        "refill successful user_id={} token={} credits_added={} refill_id={}",
        user_id,
        payload.token_string,
        quote.credits_added,
        refill_id
    );

    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Token refilled successfully",
        "refill_transaction_id": refill_id,
        "credits_added": quote.credits_added,
        "usd_spent": quote.usd_spent,
        "fee_usd": quote.fee_usd,
        "new_credits": new_credits,
        "remaining_balance": balance.balance_usd - quote.usd_spent,
        "hub_update": hub_sync
    }))
}

#[utoipa::path(
    get,
    path = "/api/refills",
    tag = "tokens",
    responses(
        (status = 200, description = "Refill history, newest first", body = [crate::models::RefillRecord]),
        (status = 500, description = "Server error")
    )
)]
#[get("/refills")]
pub async fn list_refills(
    state: web::Data<AppState>,
    user_id: web::ReqData<i32>,
) -> impl Responder {
    match db::list_refills(&state.pool, *user_id).await {
        Ok(refills) => HttpResponse::Ok().json(refills),
        Err(e) => {
            log::error!("list_refills db error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
