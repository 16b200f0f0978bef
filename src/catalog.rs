use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CurtainError;
use crate::progress::{CancelToken, ProgressEvent, ProgressSink};
use crate::userdata::{DataFilterList, UserDataStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub data: String,
    #[serde(default)]
    pub default: bool,
}

impl CatalogEntry {
    pub fn into_filter_list(self) -> DataFilterList {
        let mut list = DataFilterList::new(&self.name, &self.category, &self.data);
        list.api_id = Some(self.id);
        list.is_default = self.default;
        list
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogPage {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub next: Option<String>,
    pub results: Vec<CatalogEntry>,
}

pub trait FilterListClient: Send + Sync {
    fn fetch_page(&self, offset: usize, limit: usize) -> Result<CatalogPage, CurtainError>;
}

#[derive(Clone)]
pub struct FilterListHttpClient {
    client: Client,
    base_url: String,
}

impl FilterListHttpClient {
    pub fn new(base_url: &str) -> Result<Self, CurtainError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("curtain-core/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| CurtainError::CatalogHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| CurtainError::CatalogHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn page_url(&self, offset: usize, limit: usize) -> String {
        format!("{}/data_filter_list/?limit={limit}&offset={offset}", self.base_url)
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<reqwest::blocking::Response, CurtainError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        std::thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && (err.is_timeout() || err.is_connect()) {
                        std::thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Err(CurtainError::CatalogHttp(err.to_string()));
                }
            }
        }
    }
}

impl FilterListClient for FilterListHttpClient {
    fn fetch_page(&self, offset: usize, limit: usize) -> Result<CatalogPage, CurtainError> {
        let url = self.page_url(offset, limit);
        let response = self.send_with_retries(|| self.client.get(&url))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "catalog request failed".to_string());
            return Err(CurtainError::CatalogStatus { status, message });
        }
        response
            .json::<CatalogPage>()
            .map_err(|err| CurtainError::CatalogHttp(err.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub pages: usize,
    pub lists: usize,
}

pub fn sync_filter_lists<C: FilterListClient>(
    client: &C,
    store: &UserDataStore,
    page_size: usize,
    cancel: &CancelToken,
    sink: &dyn ProgressSink,
) -> Result<SyncResult, CurtainError> {
    let started = Instant::now();
    let page_size = page_size.max(1);
    let mut offset = 0;
    let mut pages = 0;
    let mut lists = 0;
    loop {
        cancel.checkpoint()?;
        let page = client.fetch_page(offset, page_size)?;
        let received = page.results.len();
        let has_next = page.next.is_some();
        let total = (page.count > 0).then_some(page.count);
        let entries = page
            .results
            .into_iter()
            .map(CatalogEntry::into_filter_list)
            .collect::<Vec<_>>();
        lists += store.upsert_filter_lists(&entries)?;
        pages += 1;
        offset += received;
        debug!(page = pages, received, "synced filter list page");
        sink.event(ProgressEvent {
            message: "phase=Sync; filter lists".to_string(),
            done: lists,
            total,
            elapsed: Some(started.elapsed()),
        });
        if !has_next || received == 0 {
            break;
        }
    }
    info!(pages, lists, "filter list catalog synced");
    Ok(SyncResult { pages, lists })
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}
