//! HTTP implementation of [`BlockSource`] against the Notion REST API.
//!
//! Both listing endpoints are cursor-paginated (`has_more` / `next_cursor`);
//! the loops here follow cursors until the source reports no more results.
//! Binary resources are fetched without the API credentials: image URLs are
//! pre-signed object-store links that reject extra authorisation headers.

use super::{BlockSource, FetchedResource, RawBlock, RawPage, SourceError};
use futures::future::{BoxFuture, FutureExt};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Default API root.
pub const DEFAULT_API_BASE: &str = "https://api.notion.com/v1";

/// API version pinned in every request.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Maximum page size the API accepts.
const PAGE_SIZE: u32 = 100;

#[derive(Deserialize)]
struct ListResponse {
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Notion API client.
#[derive(Clone)]
pub struct NotionClient {
    http: Client,
    token: String,
    api_base: String,
    timeout_secs: u64,
}

impl fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionClient")
            .field("token", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl NotionClient {
    pub fn new(
        token: impl Into<String>,
        api_base: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, SourceError> {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SourceError::Http {
                url: api_base.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            token: token.into(),
            api_base,
            timeout_secs,
        })
    }

    async fn query_pages_paginated(
        &self,
        database_id: &str,
        filter: Option<&Value>,
    ) -> Result<Vec<RawPage>, SourceError> {
        let url = format!("{}/databases/{}/query", self.api_base, database_id);
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(filter) = filter {
                body["filter"] = filter.clone();
            }
            if let Some(ref c) = cursor {
                body["start_cursor"] = json!(c);
            }

            let list: ListResponse = self.send_api(self.http.post(&url).json(&body), &url).await?;
            for result in list.results {
                if result.get("object").and_then(Value::as_str) != Some("page") {
                    continue;
                }
                let page: RawPage = decode(result, &url)?;
                pages.push(page);
            }

            match (list.has_more, list.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        debug!("Database {} listed {} pages", database_id, pages.len());
        Ok(pages)
    }

    async fn list_children_paginated(&self, block_id: &str) -> Result<Vec<RawBlock>, SourceError> {
        let url = format!("{}/blocks/{}/children", self.api_base, block_id);
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(&url)
                .query(&[("page_size", PAGE_SIZE.to_string())]);
            if let Some(ref c) = cursor {
                request = request.query(&[("start_cursor", c)]);
            }

            let list: ListResponse = self.send_api(request, &url).await?;
            for result in list.results {
                let block: RawBlock = decode(result, &url)?;
                blocks.push(block);
            }

            match (list.has_more, list.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(blocks)
    }

    async fn download(&self, locator: &str) -> Result<FetchedResource, SourceError> {
        let response = self
            .http
            .get(locator)
            .send()
            .await
            .map_err(|e| self.transport_error(locator, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: locator.to_string(),
                status: status.as_u16(),
                body: String::new(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(locator, e))?;

        Ok(FetchedResource {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    /// Send an authenticated API request and decode its JSON body.
    async fn send_api<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> Result<T, SourceError> {
        let response = request
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response.json::<T>().await.map_err(|e| SourceError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::Timeout {
                url: url.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            SourceError::Http {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

fn decode<T: DeserializeOwned>(value: Value, url: &str) -> Result<T, SourceError> {
    serde_json::from_value(value).map_err(|e| SourceError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

impl BlockSource for NotionClient {
    fn query_pages<'a>(
        &'a self,
        database_id: &'a str,
        filter: Option<&'a Value>,
    ) -> BoxFuture<'a, Result<Vec<RawPage>, SourceError>> {
        self.query_pages_paginated(database_id, filter).boxed()
    }

    fn list_children<'a>(
        &'a self,
        block_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<RawBlock>, SourceError>> {
        self.list_children_paginated(block_id).boxed()
    }

    fn fetch_resource<'a>(
        &'a self,
        locator: &'a str,
    ) -> BoxFuture<'a, Result<FetchedResource, SourceError>> {
        self.download(locator).boxed()
    }
}
