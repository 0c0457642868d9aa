//! KoboToolbox v2 REST API as a [`RecordSource`].
//!
//! - `GET {server}/api/v2/assets/{uid}/` for survey metadata
//! - `GET {server}/api/v2/assets/{uid}/data/?format=json&limit=N` for
//!   submissions, following `next` until the last page or a link already
//!   visited

use std::collections::HashSet;

use serde::Deserialize;

use kobo_api::{BackendError, BoxFuture, Record, RecordSource};

pub const DEFAULT_SERVER: &str = "https://kf.kobotoolbox.org";
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// How much of an unexpected response body ends up in errors and logs.
const BODY_PREFIX_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct KoboSettings {
    pub server: String,
    pub token: String,
    pub page_size: usize,
}

impl Default for KoboSettings {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            token: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Survey asset metadata. Only the fields the loader reports on.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetMetadata {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub date_modified: Option<String>,
    #[serde(default, rename = "deployment__submission_count")]
    pub submission_count: Option<u64>,
}

/// One page of `/data/`.
#[derive(Debug)]
pub struct Page {
    pub results: Vec<Record>,
    pub next: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  KoboSource
// ═══════════════════════════════════════════════════════════════

pub struct KoboSource {
    http: reqwest::Client,
    server: String,
    token: String,
    page_size: usize,
}

impl KoboSource {
    pub fn new(settings: &KoboSettings) -> Result<Self, BackendError> {
        if settings.token.is_empty() {
            return Err(BackendError::config("KoboToolbox API token is empty"));
        }
        if settings.page_size == 0 {
            return Err(BackendError::config("page size must be positive"));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| BackendError::config(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            server: settings.server.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
            page_size: settings.page_size,
        })
    }

    pub fn asset_url(&self, uid: &str) -> String {
        asset_url(&self.server, uid)
    }

    pub fn data_url(&self, uid: &str) -> String {
        data_url(&self.server, uid, self.page_size)
    }

    pub async fn asset_metadata(&self, uid: &str) -> Result<AssetMetadata, BackendError> {
        let url = self.asset_url(uid);
        let body = self.get(&url).await?;
        serde_json::from_str(&body).map_err(|e| {
            BackendError::format(format!("asset metadata: {e}; body: {}", body_prefix(&body)))
        })
    }

    /// One page of submissions.
    pub async fn fetch_page(&self, url: &str) -> Result<Page, BackendError> {
        let body = self.get(url).await?;
        let json: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(url = %url, body = %body_prefix(&body), "response is not JSON");
            BackendError::format(format!("submissions: {e}; body: {}", body_prefix(&body)))
        })?;
        parse_page(json)
    }

    async fn get(&self, url: &str) -> Result<String, BackendError> {
        tracing::debug!(url = %url, "GET");
        let resp = self
            .http
            .get(url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| BackendError::io(format!("request {url}: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| BackendError::io(format!("read {url}: {e}")))?;

        if status.is_success() {
            return Ok(body);
        }
        let msg = format!("GET {url}: HTTP {status}: {}", body_prefix(&body));
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            Err(BackendError::auth(msg))
        } else {
            Err(BackendError::io(msg))
        }
    }
}

impl RecordSource for KoboSource {
    fn fetch_all<'a>(&'a self, source_id: &'a str) -> BoxFuture<'a, Result<Vec<Record>, BackendError>> {
        Box::pin(async move {
            let mut records = Vec::new();
            let mut url = self.data_url(source_id);
            let mut pager = Pager::starting_at(&url);
            let mut pages = 0usize;
            loop {
                let page = self.fetch_page(&url).await?;
                pages += 1;
                tracing::debug!(page = pages, records = page.results.len(), "fetched page");
                records.extend(page.results);
                match pager.advance(page.next) {
                    Some(next) => url = next,
                    None => break,
                }
            }
            tracing::info!(source = %source_id, records = records.len(), pages, "fetched submissions");
            Ok(records)
        })
    }
}

/// Remembers every page URL requested so a `next` chain that loops back
/// (A → B → A) ends instead of refetching forever.
struct Pager {
    visited: HashSet<String>,
}

impl Pager {
    fn starting_at(url: &str) -> Self {
        Self {
            visited: HashSet::from([url.to_string()]),
        }
    }

    /// URL of the page to fetch next, `None` when done.
    fn advance(&mut self, next: Option<String>) -> Option<String> {
        let next = next?;
        if !self.visited.insert(next.clone()) {
            tracing::warn!(url = %next, pages = self.visited.len(), "next page already fetched, stopping");
            return None;
        }
        Some(next)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════

fn asset_url(server: &str, uid: &str) -> String {
    format!("{server}/api/v2/assets/{uid}/")
}

fn data_url(server: &str, uid: &str, page_size: usize) -> String {
    format!("{server}/api/v2/assets/{uid}/data/?format=json&limit={page_size}")
}

/// Split a `/data/` response into records and the next page link.
///
/// A missing `results` array is an empty page. Every result must be a JSON
/// object.
pub fn parse_page(body: serde_json::Value) -> Result<Page, BackendError> {
    let serde_json::Value::Object(mut obj) = body else {
        return Err(BackendError::format("submissions response is not a JSON object"));
    };
    let next = match obj.remove("next") {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    };
    let results = match obj.remove("results") {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                Record::from_json(item).map_err(|e| e.with_context(format!("result {i}")))
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(BackendError::format("`results` is not an array")),
    };
    Ok(Page { results, next })
}

fn body_prefix(body: &str) -> String {
    body.chars().take(BODY_PREFIX_CHARS).collect()
}
