use actix_web::test::TestRequest;
use actix_web::{test, web, App};
use serde_json::{json, Value};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use token_portal::api;

mod support;

#[derive(serde::Serialize)]
struct Claims {
    sub: i32,
    exp: usize,
}

fn make_jwt(user_id: i32) -> String {
    std::env::set_var("JWT_SECRET", "test-secret");
    let claims = Claims {
        sub: user_id,
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret("test-secret".as_ref()),
    )
    .expect("encode jwt")
}

async fn seed_user(pool: &PgPool) -> i32 {
    let suffix = Uuid::new_v4().to_string();
    sqlx::query(
        r#"INSERT INTO users (username, email, password_hash)
           VALUES ($1, $2, 'test-hash')
           RETURNING id"#,
    )
    .bind(format!("user_{suffix}"))
    .bind(format!("user_{suffix}@example.com"))
    .fetch_one(pool)
    .await
    .expect("insert user")
    .get("id")
}

async fn seed_confirmed_payment(pool: &PgPool, user_id: i32, amount_usd: f64) {
    sqlx::query(
        r#"INSERT INTO payment_history (user_id, order_id, status, amount_usd, currency)
           VALUES ($1, $2, 'finished', $3, 'USD')"#,
    )
    .bind(user_id)
    .bind(format!("{user_id}_{}", Uuid::new_v4()))
    .bind(amount_usd)
    .execute(pool)
    .await
    .expect("insert payment");
}

async fn seed_product(pool: &PgPool, product_id: &str, value_credits_usd: f64) {
    sqlx::query(
        r#"INSERT INTO products (product_id, name, value_credits_usd)
           VALUES ($1, 'Premium API Access', $2)"#,
    )
    .bind(product_id)
    .bind(value_credits_usd)
    .execute(pool)
    .await
    .expect("insert product");
}

macro_rules! api_app {
    ($state:expr) => {
        test::init_service(
            App::new().app_data($state.clone()).service(
                web::scope("/api")
                    .wrap(api::auth::JwtMiddleware)
                    .service(api::account::get_balance)
                    .service(api::tokens::generate_tokens)
                    .service(api::tokens::list_tokens)
                    .service(api::refill::refill_token)
                    .service(api::refill::list_refills),
            ),
        )
        .await
    };
}

#[actix_web::test]
async fn generate_product_tokens_charges_batch_cost() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;

    seed_product(pool, "prod_gen_1", 0.01).await;
    let user_id = seed_user(pool).await;
    seed_confirmed_payment(pool, user_id, 100.0).await;

    let state = web::Data::new(support::build_state(test_db.pool.clone(), "test-key"));
    let app = api_app!(state);
    let jwt = make_jwt(user_id);

    let req = TestRequest::post()
        .uri("/api/tokens/generate")
        .insert_header(("Authorization", format!("Bearer {jwt}")))
        .set_json(json!({
            "type": "product",
            "productId": "prod_gen_1",
            "usd": 10.0,
            "mode": "usd",
            "tokenCount": 5,
            "prefixMode": "custom",
            "prefixInput": "AB12"
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: Value = test::read_body_json(resp).await;

    assert_eq!(body["success"], json!(true));
    assert_eq!(body["credits_per_token"], json!(1000));
    assert!((body["total_cost_usd"].as_f64().unwrap() - 50.0001).abs() < 1e-9);
    assert!((body["fee_usd"].as_f64().unwrap() - 0.0001).abs() < 1e-12);
    // HUB не сконфигурирован в тестах
    assert_eq!(body["hub_sync"]["success"], json!(false));

    let tx_id = body["transaction_id"].as_i64().expect("transaction_id");
    let tx_row = sqlx::query(
        "SELECT usd_spent, credits, token_count, token_type FROM transactions WHERE id = $1",
    )
    .bind(tx_id)
    .fetch_one(pool)
    .await
    .expect("select tx");
    assert!((tx_row.get::<f64, _>("usd_spent") - 50.0001).abs() < 1e-9);
    assert_eq!(tx_row.get::<i64, _>("credits"), 5000);
    assert_eq!(tx_row.get::<i32, _>("token_count"), 5);
    assert_eq!(tx_row.get::<String, _>("token_type"), "product");

    let token_rows = sqlx::query("SELECT token_string, credits FROM tokens WHERE batch_tx_id = $1")
        .bind(tx_id)
        .fetch_all(pool)
        .await
        .expect("select tokens");
    assert_eq!(token_rows.len(), 5);
    for row in &token_rows {
        let token_string: String = row.get("token_string");
        assert!(token_string.starts_with("AB12-1000-"));
        assert_eq!(token_string.len(), "AB12-1000-".len() + 15);
        assert_eq!(row.get::<i64, _>("credits"), 1000);
    }

    let req = TestRequest::get()
        .uri("/api/balance")
        .insert_header(("Authorization", format!("Bearer {jwt}")))
        .to_request();
    let balance: Value = test::call_and_read_body_json(&app, req).await;
    assert!((balance["balance_usd"].as_f64().unwrap() - 49.9999).abs() < 1e-6);
}

#[actix_web::test]
async fn generate_rejected_without_balance() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;

    seed_product(pool, "prod_poor_1", 0.01).await;
    let user_id = seed_user(pool).await;

    let state = web::Data::new(support::build_state(test_db.pool.clone(), "test-key"));
    let app = api_app!(state);
    let jwt = make_jwt(user_id);

    let req = TestRequest::post()
        .uri("/api/tokens/generate")
        .insert_header(("Authorization", format!("Bearer {jwt}")))
        .set_json(json!({
            "type": "product",
            "productId": "prod_poor_1",
            "usd": 10.0,
            "mode": "usd",
            "tokenCount": 1,
            "prefixMode": "auto"
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert!((body["required_amount"].as_f64().unwrap() - 10.0001).abs() < 1e-9);
    assert_eq!(body["current_balance"].as_f64().unwrap(), 0.0);

    // ничего не записано
    let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM transactions WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("count txs")
        .get("n");
    assert_eq!(count, 0);
}

#[actix_web::test]
async fn refill_product_token_usd_mode_updates_token_and_ledger() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;

    seed_product(pool, "prod_ref_1", 0.01).await;
    let user_id = seed_user(pool).await;
    seed_confirmed_payment(pool, user_id, 100.0).await;

    let state = web::Data::new(support::build_state(test_db.pool.clone(), "test-key"));
    let app = api_app!(state);
    let jwt = make_jwt(user_id);

    let req = TestRequest::post()
        .uri("/api/tokens/generate")
        .insert_header(("Authorization", format!("Bearer {jwt}")))
        .set_json(json!({
            "type": "product",
            "productId": "prod_ref_1",
            "usd": 10.0,
            "mode": "usd",
            "tokenCount": 1,
            "prefixMode": "auto"
        }))
        .to_request();
    let issued: Value = test::call_and_read_body_json(&app, req).await;
    let tx_id = issued["transaction_id"].as_i64().expect("transaction_id");

    let req = TestRequest::get()
        .uri(&format!("/api/tokens?batch_tx_id={tx_id}"))
        .insert_header(("Authorization", format!("Bearer {jwt}")))
        .to_request();
    let tokens: Value = test::call_and_read_body_json(&app, req).await;
    let token_string = tokens[0]["token_string"].as_str().expect("token_string").to_string();

    let req = TestRequest::post()
        .uri("/api/tokens/refill")
        .insert_header(("Authorization", format!("Bearer {jwt}")))
        .set_json(json!({
            "token_string": &token_string,
            "refill_amount": 10.0,
            "refill_mode": "usd",
            "token_type": "product"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: Value = test::read_body_json(resp).await;

    // (10 - 0.0001) / 0.01 -> 999 кредитов, стоимость ровно $10
    assert_eq!(body["credits_added"], json!(999));
    assert!((body["usd_spent"].as_f64().unwrap() - 10.0).abs() < 1e-12);
    assert_eq!(body["new_credits"], json!(1999));

    let credits: i64 = sqlx::query("SELECT credits FROM tokens WHERE token_string = $1")
        .bind(&token_string)
        .fetch_one(pool)
        .await
        .expect("select token")
        .get("credits");
    assert_eq!(credits, 1999);

    let refill_row = sqlx::query(
        r#"SELECT credits_before, credits_after, balance_before, balance_after, fee_usd
           FROM refill_transactions
           WHERE token_string = $1"#,
    )
    .bind(&token_string)
    .fetch_one(pool)
    .await
    .expect("select refill");
    assert_eq!(refill_row.get::<i64, _>("credits_before"), 1000);
    assert_eq!(refill_row.get::<i64, _>("credits_after"), 1999);
    assert!((refill_row.get::<f64, _>("balance_before") - 89.9999).abs() < 1e-6);
    assert!((refill_row.get::<f64, _>("balance_after") - 79.9999).abs() < 1e-6);
    assert!((refill_row.get::<f64, _>("fee_usd") - 0.0001).abs() < 1e-12);

    let req = TestRequest::get()
        .uri("/api/balance")
        .insert_header(("Authorization", format!("Bearer {jwt}")))
        .to_request();
    let balance: Value = test::call_and_read_body_json(&app, req).await;
    assert!((balance["balance_usd"].as_f64().unwrap() - 79.9999).abs() < 1e-6);
}

async fn seed_master_token(pool: &PgPool, user_id: i32, token_string: &str, credits: i64) {
    let tx_id: i64 = sqlx::query(
        r#"INSERT INTO transactions
               (user_id, token_type, batch_label, credits, usd_spent, value_label,
                token_count, mode, fee_usd, credits_per_token)
           VALUES ($1, 'master', 'BATCH-1tokens-seeded', $2, $3, 'USD', 1, 'usd', 0.0001, $2)
           RETURNING id"#,
    )
    .bind(user_id)
    .bind(credits)
    .bind(credits as f64 + 0.0001)
    .fetch_one(pool)
    .await
    .expect("insert master tx")
    .get("id");

    sqlx::query(
        r#"INSERT INTO tokens
               (batch_tx_id, user_id, token_string, credits, token_type)
           VALUES ($1, $2, $3, $4, 'master')"#,
    )
    .bind(tx_id)
    .bind(user_id)
    .bind(token_string)
    .bind(credits)
    .execute(pool)
    .await
    .expect("insert master token");
}

#[actix_web::test]
async fn master_token_refill_is_usd_only() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;

    let user_id = seed_user(pool).await;
    seed_confirmed_payment(pool, user_id, 200.0).await;
    let token_string = format!("MT01-25USD-{}", &Uuid::new_v4().simple().to_string()[..15]);
    seed_master_token(pool, user_id, &token_string, 25).await;

    let state = web::Data::new(support::build_state(test_db.pool.clone(), "test-key"));
    let app = api_app!(state);
    let jwt = make_jwt(user_id);

    // credits-режим для master всегда отклоняется
    let req = TestRequest::post()
        .uri("/api/tokens/refill")
        .insert_header(("Authorization", format!("Bearer {jwt}")))
        .set_json(json!({
            "token_string": &token_string,
            "refill_amount": 100.0,
            "refill_mode": "credits",
            "token_type": "master"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["error"],
        json!("Master tokens only support USD refill mode")
    );

    // usd-режим: 1 USD = 1 кредит после вычета комиссии
    let req = TestRequest::post()
        .uri("/api/tokens/refill")
        .insert_header(("Authorization", format!("Bearer {jwt}")))
        .set_json(json!({
            "token_string": &token_string,
            "refill_amount": 10.0,
            "refill_mode": "usd",
            "token_type": "master"
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["credits_added"], json!(9));
    assert_eq!(body["new_credits"], json!(34));
}

#[actix_web::test]
async fn locked_and_unactivated_tokens_are_refused() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;

    let user_id = seed_user(pool).await;
    seed_confirmed_payment(pool, user_id, 50.0).await;
    let token_string = format!("LK01-10USD-{}", &Uuid::new_v4().simple().to_string()[..15]);
    seed_master_token(pool, user_id, &token_string, 10).await;

    sqlx::query("UPDATE tokens SET locked = TRUE WHERE token_string = $1")
        .bind(&token_string)
        .execute(pool)
        .await
        .expect("lock token");

    let state = web::Data::new(support::build_state(test_db.pool.clone(), "test-key"));
    let app = api_app!(state);
    let jwt = make_jwt(user_id);

    let refill = json!({
        "token_string": &token_string,
        "refill_amount": 5.0,
        "refill_mode": "usd",
        "token_type": "master"
    });

    let req = TestRequest::post()
        .uri("/api/tokens/refill")
        .insert_header(("Authorization", format!("Bearer {jwt}")))
        .set_json(&refill)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error_type"], json!("locked"));

    sqlx::query("UPDATE tokens SET locked = FALSE, activated = FALSE WHERE token_string = $1")
        .bind(refill["token_string"].as_str().unwrap())
        .execute(pool)
        .await
        .expect("deactivate token");

    let req = TestRequest::post()
        .uri("/api/tokens/refill")
        .insert_header(("Authorization", format!("Bearer {jwt}")))
        .set_json(&refill)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error_type"], json!("not_activated"));

    // отказ не оставляет следов в ledger
    let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM refill_transactions WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("count refills")
        .get("n");
    assert_eq!(count, 0);
}
