use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::NotionError;
use crate::parser::blocks::{decode_blocks, Block};
use crate::parser::{BlockSource, PageRef};
use crate::settings::Settings;

const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 30_000;

static ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([0-9a-f]{8})-?([0-9a-f]{4})-?([0-9a-f]{4})-?([0-9a-f]{4})-?([0-9a-f]{12})$")
        .unwrap()
});

/// One page of a Notion list endpoint.
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    results: Vec<T>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

pub struct NotionClient {
    http: reqwest::Client,
    api_base: String,
    max_retries: u32,
}

impl NotionClient {
    pub fn from_settings(settings: &Settings) -> Result<Self, NotionError> {
        let token = settings
            .notion_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(NotionError::MissingToken)?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|_| NotionError::InvalidHeader("Authorization"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            "Notion-Version",
            HeaderValue::from_str(&settings.notion_version)
                .map_err(|_| NotionError::InvalidHeader("Notion-Version"))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("soal_notion/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(NotionClient {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            max_retries: settings.max_retries,
        })
    }

    /// Query a database and return the matching pages (first page of results only).
    pub async fn query_database(
        &self,
        database_id: &str,
        filter: Option<&Value>,
    ) -> Result<Vec<PageRef>, NotionError> {
        let database_id = normalize_id(database_id)?;
        let url = format!("{}/databases/{}/query", self.api_base, database_id);
        let body = match filter {
            Some(f) if !f.is_null() => json!({ "filter": f }),
            _ => json!({}),
        };

        info!("Querying database {}", database_id);
        let list: ListResponse<PageRef> = self
            .send_with_retry(&url, || self.http.post(&url).json(&body))
            .await?;
        if list.has_more {
            warn!(
                "Database query returned more than {} pages; only the first batch is used",
                list.results.len()
            );
        }
        Ok(list.results)
    }

    /// List a block's direct children (first page of results only).
    pub async fn list_block_children(&self, block_id: &str) -> Result<Vec<Block>, NotionError> {
        let block_id = normalize_id(block_id)?;
        let url = format!("{}/blocks/{}/children", self.api_base, block_id);
        let list: ListResponse<Value> = self
            .send_with_retry(&url, || self.http.get(&url))
            .await?;
        if list.has_more {
            warn!(page = %block_id, "Page has more blocks than one listing; the rest are ignored");
        }
        Ok(decode_blocks(list.results))
    }

    async fn send_with_retry<T, F>(&self, url: &str, build: F) -> Result<T, NotionError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let response = build().send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response.json::<T>().await?);
            }

            if is_retryable(status) && attempt < self.max_retries {
                let backoff = backoff_for(attempt);
                warn!(
                    "{} on {} (attempt {}/{}), backing off {:.1}s",
                    status,
                    url,
                    attempt + 1,
                    self.max_retries,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            debug!(url, %status, body = %body, "Notion request failed");
            return Err(api_error(status, &body));
        }
    }
}

#[async_trait]
impl BlockSource for NotionClient {
    async fn fetch_blocks(&self, page_id: &str) -> Result<Vec<Block>, NotionError> {
        self.list_block_children(page_id).await
    }
}

/// Exponential backoff before retry `attempt` (zero-based), capped.
fn backoff_for(attempt: u32) -> Duration {
    let ms = BASE_BACKOFF_MS
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(MAX_BACKOFF_MS);
    Duration::from_millis(ms)
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn api_error(status: StatusCode, body: &str) -> NotionError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(e) => NotionError::Api {
            status: status.as_u16(),
            code: e.code,
            message: e.message,
        },
        Err(_) => NotionError::Api {
            status: status.as_u16(),
            code: "unknown".to_string(),
            message: body.chars().take(200).collect(),
        },
    }
}

/// Normalize a Notion id: dashed UUID, 32 hex chars, or a page URL ending in
/// the id. Returns the lowercase dashed form.
pub fn normalize_id(input: &str) -> Result<String, NotionError> {
    let trimmed = input.trim();
    let path = trimmed
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');

    let caps = ID_RE
        .captures(path)
        .ok_or_else(|| NotionError::InvalidId(trimmed.to_string()))?;
    Ok(format!(
        "{}-{}-{}-{}-{}",
        &caps[1], &caps[2], &caps[3], &caps[4], &caps[5]
    )
    .to_lowercase())
}
