use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::account::get_balance,
        crate::api::account::list_payments,
        crate::api::account::list_transactions,
        crate::api::products::list_products,
        crate::api::payments::create_topup,
        crate::api::tokens::generate_tokens,
        crate::api::tokens::list_tokens,
        crate::api::refill::refill_token,
        crate::api::refill::list_refills,
        crate::api::webhooks_nowpayments::nowpayments_ipn,
        crate::api::admin::adjust_credits,
        crate::api::admin::sync_products
    ),
    components(
        schemas(
            crate::api::auth::RegisterRequest,
            crate::api::auth::LoginRequest,
            crate::api::auth::AuthResponse,
            crate::api::account::BalanceResponse,
            crate::api::payments::TopupRequest,
            crate::api::tokens::GenerateTokensRequest,
            crate::api::refill::RefillRequest,
            crate::api::admin::AdjustRequest,
            crate::hub::HubSyncStatus,
            crate::issuance::TokenKind,
            crate::issuance::FundingMode,
            crate::issuance::PrefixMode,
            crate::models::Product,
            crate::models::Payment,
            crate::models::TransactionRecord,
            crate::models::Token,
            crate::models::RefillRecord
        )
    ),
    tags(
        (name = "auth", description = "Authentication"),
        (name = "account", description = "Balance and spend history"),
        (name = "payments", description = "Balance top-ups via NOWPayments"),
        (name = "products", description = "Product catalog"),
        (name = "tokens", description = "Token issuance and refill"),
        (name = "webhooks", description = "Callbacks from the payment gateway"),
        (name = "admin", description = "Admin adjustments and catalog sync")
    )
)]
pub struct ApiDoc;
