// src/api/tokens.rs

use actix_web::{get, post, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::errors::FundingError;
use crate::hub::{HubSyncStatus, HubTokenRow};
use crate::issuance::{
    self, batch_label, resolve_prefix, token_string, FundingMode, IssueSpec, PrefixMode, TokenKind,
};
use crate::ledger::FIXED_FEE_USD;
use crate::{db, AppState};

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateTokensRequest {
    #[serde(rename = "type")]
    pub token_type: TokenKind,

    #[serde(rename = "productId")]
    pub product_id: Option<String>,

    /// USD на токен (режим usd и все master-токены).
    pub usd: Option<f64>,

    /// Кредитов на токен (режим credits).
    pub credits: Option<i64>,

    /// Для master игнорируется: они всегда в USD.
    pub mode: Option<FundingMode>,

    #[serde(rename = "tokenCount")]
    pub token_count: u32,

    #[serde(rename = "prefixMode")]
    pub prefix_mode: PrefixMode,

    #[serde(rename = "prefixInput")]
    pub prefix_input: Option<String>,

    #[serde(default = "default_true")]
    pub activate: bool,
}

/// Выпуск партии токенов.
///
/// Стоимость всегда пересчитывается на сервере из заявленных входов; итог,
/// присланный клиентом, не учитывается. Партия и токены пишутся одной
/// транзакцией БД, после коммита — best-effort push в HUB.
#[utoipa::path(
    post,
    path = "/api/tokens/generate",
    tag = "tokens",
    request_body = GenerateTokensRequest,
    responses(
        (status = 200, description = "Batch issued"),
        (status = 400, description = "Validation or balance error"),
        (status = 404, description = "Product not found"),
        (status = 500, description = "Server error")
    )
)]
#[post("/tokens/generate")]
pub async fn generate_tokens(
    state: web::Data<AppState>,
    user_id: web::ReqData<i32>,
    payload: web::Json<GenerateTokensRequest>,
) -> impl Responder {
    let user_id = *user_id;
    let payload = payload.into_inner();

    log::info!(
        "token generation request user_id={} type={} count={}",
        user_id,
        payload.token_type.as_str(),
        payload.token_count
    );

    // 1) курс продукта (только для product-токенов)
    let value_credits_usd = match payload.token_type {
        TokenKind::Product => {
            let Some(product_id) = payload.product_id.as_deref() else {
                return FundingError::Validation("Select a product".to_string()).to_response();
            };
            match db::get_product(&state.pool, product_id).await {
                Ok(Some(p)) => Some(p.value_credits_usd),
                Ok(None) => return FundingError::NotFound("Product".to_string()).to_response(),
                Err(e) => {
                    log::error!("get_product db error: {e}");
                    return HttpResponse::InternalServerError().finish();
                }
            }
        }
        TokenKind::Master => None,
    };

    // 2) расчёт партии
    let spec = IssueSpec {
        kind: payload.token_type,
        mode: payload.mode.unwrap_or(FundingMode::Usd),
        token_count: payload.token_count,
        usd: payload.usd,
        credits: payload.credits,
    };

    let quote = match issuance::quote_issue(&spec, value_credits_usd) {
        Ok(q) => q,
        Err(e) => return e.to_response(),
    };

    // 3) проверка баланса до любой записи
    let balance = match db::user_balance(&state.pool, user_id).await {
        Ok(b) => b,
        Err(e) => {
            log::error!("user_balance db error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if quote.total_cost_usd > balance.balance_usd {
        return FundingError::InsufficientBalance {
            required: quote.total_cost_usd,
            available: balance.balance_usd,
        }
        .to_response();
    }

    // 4) префикс и строки токенов
    let mut rng = rand::thread_rng();

    let prefix = match resolve_prefix(&mut rng, payload.prefix_mode, payload.prefix_input.as_deref())
    {
        Ok(p) => p,
        Err(e) => return e.to_response(),
    };

    let token_strings: Vec<String> = (0..payload.token_count)
        .map(|_| token_string(&mut rng, &prefix, quote.credits_per_token, payload.token_type))
        .collect();

    let label = batch_label(&mut rng, payload.token_count);

    // 5) партия + токены одной транзакцией
    let product_id = match payload.token_type {
        TokenKind::Product => payload.product_id.as_deref(),
        TokenKind::Master => None,
    };

    let batch_tx_id = match db::insert_issuance(
        &state.pool,
        &db::NewIssuance {
            user_id,
            product_id,
            token_type: payload.token_type.as_str(),
            batch_label: &label,
            quote: &quote,
            activated: payload.activate,
            token_strings: &token_strings,
        },
    )
    .await
    {
        Ok(id) => id,
        Err(e) => {
            log::error!("insert_issuance db error: {e}");
            return HttpResponse::InternalServerError()
                .json(json!({ "error": "Failed to create transaction" }));
        }
    };

    // 6) mirror sync: ошибка уходит в ответ, но выпуск уже закоммичен
    let hub_sync = match state.hub_client() {
        Some(hub) => {
            let rows: Vec<HubTokenRow<'_>> = token_strings
                .iter()
                .map(|t| HubTokenRow {
                    token: t,
                    credits: quote.credits_per_token,
                    activated: payload.activate,
                })
                .collect();

            match hub
                .push_tokens(payload.token_type == TokenKind::Master, &rows)
                .await
            {
                Ok(()) => HubSyncStatus::ok(),
                Err(e) => {
                    log::error!("hub push_tokens error (non-critical): {e}");
                    HubSyncStatus::failed(e.to_string())
                }
            }
        }
        None => {
            log::info!("HUB API credentials not configured, skipping HUB update");
            HubSyncStatus::unconfigured()
        }
    };

    log::info!(
        "generated {} tokens for user {} batch_tx_id={}",
        payload.token_count,
        user_id,
        batch_tx_id
    );

    HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("{} tokens generated successfully", payload.token_count),
        "transaction_id": batch_tx_id,
        "credits_per_token": quote.credits_per_token,
        "total_cost_usd": quote.total_cost_usd,
        "fee_usd": FIXED_FEE_USD,
        "activated": payload.activate,
        "hub_sync": hub_sync
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListTokensQuery {
    pub batch_tx_id: Option<i64>,
}

/// Выгрузка токенов владельца, опционально по одной партии.
#[utoipa::path(
    get,
    path = "/api/tokens",
    tag = "tokens",
    responses(
        (status = 200, description = "Tokens, newest first", body = [crate::models::Token]),
        (status = 500, description = "Server error")
    )
)]
#[get("/tokens")]
pub async fn list_tokens(
    state: web::Data<AppState>,
    user_id: web::ReqData<i32>,
    query: web::Query<ListTokensQuery>,
) -> impl Responder {
    match db::list_tokens(&state.pool, *user_id, query.batch_tx_id).await {
        Ok(tokens) => HttpResponse::Ok().json(tokens),
        Err(e) => {
            log::error!("list_tokens db error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
