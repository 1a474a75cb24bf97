//! Bitrix24 REST API client
//!
//! Every call is a single POST to `https://{domain}/rest/{method}` with the
//! OAuth token injected into the JSON body as `auth`. List methods are paged
//! 50 items at a time; `fetch_all` walks the pages up to a hard ceiling.
//!
//! API docs: https://apidocs.bitrix24.com/api-reference/

use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::Credentials;
use crate::constants;
use crate::error::{ReportError, Result};

/// Bitrix24 REST client bound to one portal and access token
pub struct BitrixClient {
    client: reqwest::Client,
    /// Base URL without trailing slash, e.g. "https://example.bitrix24.ru/rest"
    base_url: String,
    domain: String,
    access_token: String,
}

impl BitrixClient {
    /// Create a client for the portal named in `credentials`
    pub fn new(credentials: &Credentials, timeout: Duration) -> Result<Self> {
        let base_url = format!("https://{}/rest", credentials.domain);
        Self::with_base_url(base_url, credentials, timeout)
    }

    /// Create a client against an explicit base URL (used by tests)
    pub fn with_base_url(
        base_url: impl Into<String>,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            domain: credentials.domain.clone(),
            access_token: credentials.access_token.clone(),
        })
    }

    /// Call a REST method once. No retries.
    pub async fn call(&self, method: &str, params: Map<String, Value>) -> Result<Value> {
        match self.send(method, params).await {
            Ok(data) => {
                debug!(method, payload = %data, "Bitrix24 response");
                Ok(data)
            }
            Err(err) => {
                error!(method, domain = %self.domain, error = %err, "Bitrix24 API request failed");
                Err(err)
            }
        }
    }

    async fn send(&self, method: &str, mut params: Map<String, Value>) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, method);
        params.insert("auth".to_string(), Value::String(self.access_token.clone()));

        let response = self.client.post(&url).json(&params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let data: Value = match serde_json::from_str(&body) {
            Ok(data) => data,
            Err(_) if !status.is_success() => {
                return Err(ReportError::Transport(format!("HTTP {}", status)));
            }
            Err(e) => {
                return Err(ReportError::Transport(format!("Invalid JSON response: {}", e)));
            }
        };

        // Bitrix24 reports errors in the body, often alongside a 4xx status
        if let Some(err) = envelope_error(&data) {
            return Err(err);
        }

        if !status.is_success() {
            return Err(ReportError::Transport(format!("HTTP {}", status)));
        }

        Ok(data)
    }

    /// Fetch every item of a list method, 50 per page, up to `hard_limit`.
    ///
    /// Stops on a missing item list, an empty page, a short page, or once the
    /// accumulated count reaches `hard_limit`. A `next` cursor in the response
    /// replaces the computed offset verbatim. The result is truncated to
    /// `hard_limit`; any failed page aborts the whole fetch.
    pub async fn fetch_all(
        &self,
        method: &str,
        base_params: Map<String, Value>,
        hard_limit: usize,
    ) -> Result<Vec<Value>> {
        let mut items: Vec<Value> = Vec::new();
        let mut params = base_params;
        let mut start: u64 = 0;

        while items.len() < hard_limit {
            params.insert("start".to_string(), json!(start));

            let response = self.call(method, params.clone()).await?;
            let (page, next) = into_page(response);

            let Some(page) = page else {
                break;
            };
            if page.is_empty() {
                break;
            }

            let page_len = page.len();
            items.extend(page);
            debug!(method, start, page_len, fetched = items.len(), "fetched page");

            if page_len < constants::BATCH_SIZE {
                break;
            }

            start = next.unwrap_or(start + page_len as u64);
        }

        items.truncate(hard_limit);
        info!(method, count = items.len(), "fetch complete");

        Ok(items)
    }

    /// Fetch smart process items matching a `crm.item.list` filter
    pub async fn fetch_smart_process_items(
        &self,
        entity_type_id: u64,
        filter: Map<String, Value>,
        limit: usize,
    ) -> Result<Vec<Value>> {
        let mut params = Map::new();
        params.insert("entityTypeId".to_string(), json!(entity_type_id));
        params.insert("filter".to_string(), Value::Object(filter));

        self.fetch_all(constants::METHOD_ITEM_LIST, params, limit).await
    }
}

/// Map an `error` envelope to `RemoteApi`
fn envelope_error(data: &Value) -> Option<ReportError> {
    let code = match data.get("error")? {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let description = data
        .get("error_description")
        .and_then(Value::as_str)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| code.clone());

    Some(ReportError::RemoteApi { code, description })
}

/// Split a list response into its items and `next` cursor.
///
/// `result` is either the item array itself (`user.get`) or an object with an
/// `items` array (`crm.item.list`). Anything else has no extractable list.
fn into_page(mut response: Value) -> (Option<Vec<Value>>, Option<u64>) {
    let next = response.get("next").and_then(Value::as_u64);

    let items = match response.get_mut("result").map(Value::take) {
        Some(Value::Array(items)) => Some(items),
        Some(Value::Object(mut result)) => match result.remove("items") {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    };

    (items, next)
}
