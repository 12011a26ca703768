//! Client for the order-delivery API.
//!
//! Uses the curl crate (libcurl), one easy handle per request. Calls block the
//! current thread, which suits the worker pool: each worker owns its transfer.

mod error;
mod http;
mod source;
mod types;

pub use error::{ApiError, DownloadError};
pub use source::{FetchedFile, FileSource};
pub use types::{
    CompleteRun, ModelRun, OrderDetails, OrderFile, OrderList, OrderManifest, OrderSummary,
    RunList,
};

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;
use std::str;
use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

use crate::retry::{run_with_retry, RetryPolicy};
use crate::settings::{BatchSettings, Credentials};
use crate::storage::PartFile;

use self::http::{HttpResponse, ResponseHead};

const ACCEPT_JSON: &str = "application/json";
const ACCEPT_GRIB: &str = "application/x-grib";
const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Client for one API base URL and one set of credentials.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: Url,
    credentials: Credentials,
    model_runs_retry: RetryPolicy,
    chunk_size: usize,
}

impl ApiClient {
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self, ApiError> {
        let base = Url::parse(base_url).map_err(|e| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "URL cannot carry a path".to_string(),
            });
        }
        Ok(Self {
            base,
            credentials,
            model_runs_retry: RetryPolicy::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn from_settings(settings: &BatchSettings) -> Result<Self, ApiError> {
        Ok(Self::new(&settings.base_url, settings.credentials.clone())?
            .with_model_runs_retry(settings.model_runs_retry)
            .with_chunk_size(settings.chunk_size))
    }

    pub fn with_model_runs_retry(mut self, policy: RetryPolicy) -> Self {
        self.model_runs_retry = policy;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1024);
        self
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    /// Configure an easy handle with URL, redirects, timeouts and headers.
    fn easy_for(&self, url: &Url, accept: &str) -> Result<curl::easy::Easy, curl::Error> {
        let mut easy = curl::easy::Easy::new();
        easy.url(url.as_str())?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(Duration::from_secs(30))?;

        let mut list = curl::easy::List::new();
        list.append(&format!("Accept: {}", accept))?;
        for (k, v) in self.credentials.headers() {
            list.append(&format!("{}: {}", k, v))?;
        }
        easy.http_headers(list)?;
        Ok(easy)
    }

    fn log_redirect(url: &Url, easy: &mut curl::easy::Easy) {
        if let Ok(Some(effective)) = easy.effective_url() {
            if effective != url.as_str() {
                tracing::debug!(%url, effective, "redirected");
            }
        }
    }

    /// GET a metadata endpoint and buffer the body.
    fn get(&self, url: &Url, accept: &str) -> Result<HttpResponse, ApiError> {
        tracing::trace!(%url, "GET");
        let transport = |source| ApiError::Transport {
            url: url.to_string(),
            source,
        };
        let mut easy = self.easy_for(url, accept).map_err(transport)?;
        let mut head = ResponseHead::default();
        let mut body = Vec::new();
        {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    if let Ok(s) = str::from_utf8(data) {
                        head.push_line(s);
                    }
                    true
                })
                .map_err(transport)?;
            transfer
                .write_function(|data| {
                    body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(transport)?;
            transfer.perform().map_err(transport)?;
        }
        let status = easy.response_code().map_err(transport)?;
        Self::log_redirect(url, &mut easy);
        Ok(HttpResponse { status, head, body })
    }

    fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<(T, HttpResponse), ApiError> {
        let resp = self.get(url, ACCEPT_JSON)?;
        if resp.status != 200 {
            return Err(ApiError::HttpStatus {
                url: url.to_string(),
                status: resp.status,
            });
        }
        let value = serde_json::from_slice(&resp.body).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })?;
        Ok((value, resp))
    }

    /// The caller's active orders.
    pub fn fetch_my_orders(&self) -> Result<OrderList, ApiError> {
        let url = self.endpoint(&["orders"], &[("detail", "MINIMAL")]);
        let (orders, _) = self.get_json(&url)?;
        Ok(orders)
    }

    /// File manifest of an order's latest delivery. `run_filter` narrows the
    /// manifest to a single run server-side.
    pub fn fetch_order_details(
        &self,
        order_id: &str,
        run_filter: Option<&str>,
    ) -> Result<OrderDetails, ApiError> {
        let mut query = vec![("detail", "MINIMAL")];
        if let Some(run) = run_filter {
            query.push(("runfilter", run));
        }
        let url = self.endpoint(&["orders", order_id, "latest"], &query);
        let (details, resp): (OrderDetails, _) = self.get_json(&url)?;
        if !self.credentials.is_api_key() {
            tracing::debug!(
                order_id,
                limit = resp.head.header("X-RateLimit-Limit").unwrap_or("-"),
                remaining = resp.head.header("X-RateLimit-Remaining").unwrap_or("-"),
                "rate limit"
            );
        }
        Ok(details)
    }

    /// Most recent complete run of one model (single attempt).
    pub fn fetch_latest_run(&self, model_id: &str) -> Result<ModelRun, ApiError> {
        let url = self.endpoint(&["runs", model_id], &[("sort", "RUNDATETIME")]);
        let (runs, _): (RunList, _) = self.get_json(&url)?;
        let latest = runs
            .complete_runs
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NoCompleteRuns {
                model: model_id.to_string(),
            })?;
        Ok(ModelRun {
            model_id: model_id.to_string(),
            run: latest.run,
            run_date_time: latest.run_date_time,
        })
    }

    /// Latest run per model. Each model is retried with a fixed backoff; a model
    /// whose attempts run out is logged and left out of the map.
    pub fn fetch_model_runs(&self, model_ids: &[String]) -> HashMap<String, ModelRun> {
        let mut runs = HashMap::new();
        for model in model_ids {
            match run_with_retry(&self.model_runs_retry, || self.fetch_latest_run(model)) {
                Ok(run) => {
                    tracing::debug!(model = %model, run = %run.run, at = %run.run_date_time, "latest run");
                    runs.insert(model.clone(), run);
                }
                Err(e) => {
                    tracing::error!(model = %model, "ran out of retries getting latest run: {}", e);
                }
            }
        }
        runs
    }

    pub fn order_file_url(&self, order_id: &str, file_id: &str) -> Url {
        self.endpoint(&["orders", order_id, "latest", file_id, "data"], &[])
    }
}

impl FileSource for ApiClient {
    /// Stream one file body to `dest` via a `.part` file. Non-200 bodies are
    /// drained and discarded.
    fn fetch_file(
        &self,
        order_id: &str,
        file_id: &str,
        dest: &Path,
    ) -> Result<FetchedFile, DownloadError> {
        let url = self.order_file_url(order_id, file_id);
        tracing::trace!(%url, "GET");
        let mut easy = self
            .easy_for(&url, ACCEPT_GRIB)
            .map_err(DownloadError::Transport)?;
        easy.buffer_size(self.chunk_size)
            .map_err(DownloadError::Transport)?;

        let head = RefCell::new(ResponseHead::default());
        let part: RefCell<Option<PartFile>> = RefCell::new(None);
        let storage_error: RefCell<Option<std::io::Error>> = RefCell::new(None);
        let body_started = Cell::new(false);

        let perform_result = {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    if let Ok(s) = str::from_utf8(data) {
                        head.borrow_mut().push_line(s);
                    }
                    true
                })
                .map_err(DownloadError::Transport)?;
            transfer
                .write_function(|data| {
                    body_started.set(true);
                    if head.borrow().status != Some(200) {
                        return Ok(data.len());
                    }
                    let mut slot = part.borrow_mut();
                    if slot.is_none() {
                        match PartFile::create(dest) {
                            Ok(p) => *slot = Some(p),
                            Err(e) => {
                                *storage_error.borrow_mut() = Some(e);
                                return Ok(0);
                            }
                        }
                    }
                    if let Some(file) = slot.as_mut() {
                        if let Err(e) = file.write(data) {
                            *storage_error.borrow_mut() = Some(e);
                            return Ok(0);
                        }
                    }
                    Ok(data.len())
                })
                .map_err(DownloadError::Transport)?;
            transfer.perform()
        };

        let part = part.into_inner();
        if let Err(e) = perform_result {
            if let Some(p) = part {
                p.discard();
            }
            if e.is_write_error() {
                if let Some(io_err) = storage_error.into_inner() {
                    return Err(DownloadError::Storage(io_err));
                }
            }
            return Err(DownloadError::Transport(e));
        }

        let status = easy.response_code().map_err(DownloadError::Transport)?;
        Self::log_redirect(&url, &mut easy);
        if status != 200 {
            if let Some(p) = part {
                p.discard();
            }
            let head = head.into_inner();
            return Err(DownloadError::Http {
                status,
                reason: head.reason,
            });
        }

        let part = match part {
            Some(p) => p,
            // 200 with an empty body still yields a (zero-byte) file.
            None => PartFile::create(dest).map_err(DownloadError::Storage)?,
        };
        let bytes = part.finalize().map_err(DownloadError::Storage)?;
        let time_to_first_byte = easy
            .starttransfer_time()
            .map_err(DownloadError::Transport)?;
        tracing::trace!(file_id, bytes, body = body_started.get(), "file stored");

        Ok(FetchedFile {
            time_to_first_byte,
            path: dest.to_path_buf(),
            bytes,
        })
    }

    fn file_url(&self, order_id: &str, file_id: &str) -> String {
        self.order_file_url(order_id, file_id).to_string()
    }
}
