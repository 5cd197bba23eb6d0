// src/api/admin.rs

use actix_web::{post, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::{db, AppState};

/// Админские роуты дополнительно проверяют users.is_admin.
async fn ensure_admin(state: &AppState, user_id: i32) -> Result<(), HttpResponse> {
    match db::is_admin(&state.pool, user_id).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(HttpResponse::Forbidden().json(json!({ "error": "admin only" }))),
        Err(e) => {
            log::error!("is_admin db error: {e}");
            Err(HttpResponse::InternalServerError().finish())
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjustRequest {
    pub user_id: i32,
    /// Кредиты корректировки, положительные или отрицательные.
    pub credits: i64,
    pub label: Option<String>,
}

/// Корректировка кредитов пользователя: новая append-only строка
/// admin_adjustment с нулевым usd_spent. Существующие записи не трогаются.
#[utoipa::path(
    post,
    path = "/api/admin/adjust",
    tag = "admin",
    request_body = AdjustRequest,
    responses(
        (status = 200, description = "Adjustment recorded"),
        (status = 400, description = "Zero adjustment"),
        (status = 403, description = "Not an admin"),
        (status = 500, description = "Server error")
    )
)]
#[post("/admin/adjust")]
pub async fn adjust_credits(
    state: web::Data<AppState>,
    user_id: web::ReqData<i32>,
    payload: web::Json<AdjustRequest>,
) -> impl Responder {
    if let Err(resp) = ensure_admin(&state, *user_id).await {
        return resp;
    }

    if payload.credits == 0 {
        return HttpResponse::BadRequest().json(json!({ "error": "credits must be non-zero" }));
    }

    match db::insert_admin_adjustment(
        &state.pool,
        payload.user_id,
        payload.credits,
        payload.label.as_deref(),
    )
    .await
    {
        Ok(id) => {
            log::info!(
                "admin adjustment by={} for={} credits={} tx_id={}",
                *user_id,
                payload.user_id,
                payload.credits,
                id
            );
            HttpResponse::Ok().json(json!({ "transaction_id": id }))
        }
        Err(e) => {
            log::error!("insert_admin_adjustment db error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Синхронизация локального каталога с видимыми продуктами HUB.
/// Частичные ошибки не прерывают проход: ответ 207 со списком.
#[utoipa::path(
    post,
    path = "/api/admin/sync-products",
    tag = "admin",
    responses(
        (status = 200, description = "Catalog synced"),
        (status = 207, description = "Synced with partial errors"),
        (status = 403, description = "Not an admin"),
        (status = 500, description = "HUB unavailable or not configured")
    )
)]
#[post("/admin/sync-products")]
pub async fn sync_products(
    state: web::Data<AppState>,
    user_id: web::ReqData<i32>,
) -> impl Responder {
    if let Err(resp) = ensure_admin(&state, *user_id).await {
        return resp;
    }

    let Some(hub) = state.hub_client() else {
        return HttpResponse::InternalServerError()
            .json(json!({ "error": "HUB API credentials not configured" }));
    };

    log::info!("fetching products from HUB API");
    let hub_products = match hub.fetch_visible_products().await {
        Ok(p) => p,
        Err(e) => {
            log::error!("hub fetch_visible_products error: {e}");
            return HttpResponse::InternalServerError().json(json!({
                "error": "Failed to fetch products from HUB",
                "details": e.to_string()
            }));
        }
    };

    if hub_products.is_empty() {
        return HttpResponse::Ok().json(json!({
            "message": "No visible products found in HUB",
            "synced": 0,
            "created": 0,
            "updated": 0
        }));
    }

    let local = match db::list_products(&state.pool).await {
        Ok(p) => p,
        Err(e) => {
            log::error!("list_products db error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let local_by_id: std::collections::HashMap<&str, &crate::models::Product> =
        local.iter().map(|p| (p.product_id.as_str(), p)).collect();

    let mut created = 0;
    let mut updated = 0;
    let mut errors: Vec<String> = Vec::new();

    for hub_product in &hub_products {
        match local_by_id.get(hub_product.id.as_str()) {
            Some(existing) => {
                let needs_update = existing.name != hub_product.name
                    || existing.value_credits_usd != hub_product.value;
                if !needs_update {
                    continue;
                }
                match db::update_product(
                    &state.pool,
                    &hub_product.id,
                    &hub_product.name,
                    hub_product.value,
                )
                .await
                {
                    Ok(()) => updated += 1,
                    Err(e) => {
                        log::error!("update product {} error: {e}", hub_product.id);
                        errors.push(format!("Failed to update product {}: {e}", hub_product.name));
                    }
                }
            }
            None => {
                match db::insert_product(
                    &state.pool,
                    &hub_product.id,
                    &hub_product.name,
                    hub_product.value,
                )
                .await
                {
                    Ok(()) => created += 1,
                    Err(e) => {
                        log::error!("create product {} error: {e}", hub_product.id);
                        errors.push(format!("Failed to create product {}: {e}", hub_product.name));
                    }
                }
            }
        }
    }

    let body = json!({
        "message": "Sync completed",
        "totalHubProducts": hub_products.len(),
        "created": created,
        "updated": updated,
        "errors": if errors.is_empty() { serde_json::Value::Null } else { json!(errors) }
    });

    log::info!("product sync: created={created} updated={updated} errors={}", errors.len());

    if errors.is_empty() {
        HttpResponse::Ok().json(body)
    } else {
        // 207 Multi-Status при частичных ошибках
        HttpResponse::build(actix_web::http::StatusCode::MULTI_STATUS).json(body)
    }
}
