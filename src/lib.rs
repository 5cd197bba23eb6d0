pub mod api;
pub mod db;
pub mod docs;
pub mod errors;
pub mod hub;
pub mod issuance;
pub mod ledger;
pub mod models;
pub mod refill;

use sqlx::PgPool;

use crate::hub::HubClient;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub nowpayments_api_key: String,
    pub nowpayments_ipn_secret: String,
    pub callback_base_url: String,
    pub hub_api_url: Option<String>,
    pub hub_api_key: Option<String>,
}

impl AppState {
    /// Клиент HUB API, если заданы HUB_API_URL / HUB_API_KEY.
    pub fn hub_client(&self) -> Option<HubClient> {
        match (&self.hub_api_url, &self.hub_api_key) {
            (Some(url), Some(key)) => Some(HubClient::new(url, key)),
            _ => None,
        }
    }
}
