// src/hub.rs
//
// Клиент HUB API — внешнего хранилища авторизации, которое читает hub при
// проверке токенов. Все операции best-effort: ошибка логируется и попадает в
// ответ строкой, но никогда не роняет уже закоммиченную локальную операцию.
// Авторизация: заголовок X-Api-Key.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use utoipa::ToSchema;

#[derive(Debug)]
pub enum HubError {
    Http(reqwest::Error),
    Api { status: u16, body: String },
    InvalidResponse(String),
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubError::Http(e) => write!(f, "http error: {e}"),
            HubError::Api { status, body } => {
                write!(f, "hub api error status={status} body={body}")
            }
            HubError::InvalidResponse(e) => write!(f, "invalid response: {e}"),
        }
    }
}

impl From<reqwest::Error> for HubError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

/// Строка зеркала для одного выпущенного токена.
#[derive(Debug, Serialize)]
pub struct HubTokenRow<'a> {
    pub token: &'a str,
    pub credits: i64,
    pub activated: bool,
}

/// Продукт каталога HUB: `value` — USD за кредит.
#[derive(Debug, Deserialize)]
pub struct HubProduct {
    pub id: String,
    pub name: String,
    pub value: f64,
}

/// Статус mirror sync в ответе операции.
#[derive(Debug, Serialize, ToSchema)]
pub struct HubSyncStatus {
    pub success: bool,
    pub error: Option<String>,
}

impl HubSyncStatus {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            success: false,
            error: Some("HUB API credentials not configured".to_string()),
        }
    }
}

pub struct HubClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl HubClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
        }
    }

    // master-токены живут в отдельной коллекции HUB
    fn collection(master: bool) -> &'static str {
        if master {
            "tokens_master"
        } else {
            "tokens"
        }
    }

    /// Выпуск: по строке на каждый токен партии.
    pub async fn push_tokens(
        &self,
        master: bool,
        rows: &[HubTokenRow<'_>],
    ) -> Result<(), HubError> {
        let url = format!("{}/{}", self.base_url, Self::collection(master));
        let resp = self
            .http
            .post(url)
            .header("X-Api-Key", &self.api_key)
            .json(rows)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(HubError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    /// Пополнение: новое значение кредитов по строке токена.
    pub async fn update_token_credits(
        &self,
        master: bool,
        token_string: &str,
        credits: i64,
    ) -> Result<(), HubError> {
        let url = format!(
            "{}/{}/credits",
            self.base_url,
            Self::collection(master)
        );
        let resp = self
            .http
            .patch(url)
            .header("X-Api-Key", &self.api_key)
            .json(&json!({ "token": token_string, "credits": credits }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(HubError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    /// Видимые продукты каталога HUB для синхронизации локального каталога.
    pub async fn fetch_visible_products(&self) -> Result<Vec<HubProduct>, HubError> {
        let resp = self
            .http
            .get(format!("{}/products", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .query(&[("visible", "true")])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(HubError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<Vec<HubProduct>>(&body)
            .map_err(|e| HubError::InvalidResponse(format!("{e}; body={body}")))
    }
}
