// src/main.rs
use actix_web::{App, HttpResponse, HttpServer, Responder, web};
use dotenvy::dotenv;
use sqlx::PgPool;
use std::env;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use token_portal::{AppState, api, docs};

async fn index() -> impl Responder {
    HttpResponse::Ok().body("Service ready!")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let nowpayments_api_key = env::var("NOWPAYMENTS_API_KEY").expect("NOWPAYMENTS_API_KEY required");
    let nowpayments_ipn_secret =
        env::var("NOWPAYMENTS_IPN_SECRET").expect("NOWPAYMENTS_IPN_SECRET required");
    let callback_base_url =
        env::var("CALLBACK_BASE_URL").unwrap_or_else(|_| "https://your-domain.com".to_string());

    // HUB не обязателен: без него mirror sync просто пропускается
    let hub_api_url = env::var("HUB_API_URL").ok();
    let hub_api_key = env::var("HUB_API_KEY").ok();

    let state = web::Data::new(AppState {
        pool,
        nowpayments_api_key,
        nowpayments_ipn_secret,
        callback_base_url,
        hub_api_url,
        hub_api_key,
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/", web::get().to(index))
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            // Публичные роуты авторизации
            .service(api::auth::register)
            .service(api::auth::login)
            // Вебхук платёжного шлюза (публичный, подпись проверяется внутри)
            .service(api::webhooks_nowpayments::nowpayments_ipn)
            // Защищённые роуты
            .service(
                web::scope("/api")
                    .wrap(api::auth::JwtMiddleware)
                    .service(api::account::get_balance)
                    .service(api::account::list_payments)
                    .service(api::account::list_transactions)
                    .service(api::products::list_products)
                    .service(api::payments::create_topup)
                    .service(api::tokens::generate_tokens)
                    .service(api::tokens::list_tokens)
                    .service(api::refill::refill_token)
                    .service(api::refill::list_refills)
                    .service(api::admin::adjust_credits)
                    .service(api::admin::sync_products),
            )
    })
    .bind(("0.0.0.0", 8065))?
    .run()
    .await
}
