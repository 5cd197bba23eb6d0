// src/api/products.rs

use actix_web::{get, web, HttpResponse, Responder};

use crate::{db, AppState};

#[utoipa::path(
    get,
    path = "/api/products",
    tag = "products",
    responses(
        (status = 200, description = "Product catalog", body = [crate::models::Product]),
        (status = 500, description = "Server error")
    )
)]
#[get("/products")]
pub async fn list_products(state: web::Data<AppState>) -> impl Responder {
    match db::list_products(&state.pool).await {
        Ok(products) => HttpResponse::Ok().json(products),
        Err(e) => {
            log::error!("list_products db error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
