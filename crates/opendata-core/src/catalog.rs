//! Client side of the catalog endpoints.
//!
//! [`CatalogView`] is shared with the proxy: it names the two endpoints and
//! decides which upstream records belong to each. [`CatalogClient`] fetches a view
//! from a running proxy and keeps the result for a short while.

use crate::feature::Feature;
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

pub const API_PREFIX: &str = "api/opendata";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogView {
    /// Downloadable datasets: records without a service endpoint.
    Data,
    /// Map layers: records with a service endpoint.
    Features,
}

impl CatalogView {
    pub fn segment(&self) -> &'static str {
        match self {
            CatalogView::Data => "data",
            CatalogView::Features => "features",
        }
    }

    /// Path relative to the deployment base, e.g. `api/opendata/features`.
    pub fn path(&self) -> String {
        format!("{}/{}", API_PREFIX, self.segment())
    }

    /// Whether an upstream record belongs to this view. Only a truthy `ags` counts
    /// as an endpoint, so `""`, `null`, `false` and `0` all land in `Data`.
    pub fn includes(&self, record: &Value) -> bool {
        let has_service = record.get("ags").map(is_truthy).unwrap_or(false);
        match self {
            CatalogView::Data => !has_service,
            CatalogView::Features => has_service,
        }
    }
}

impl fmt::Display for CatalogView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid API base URL '{0}'")]
    InvalidBase(String),
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Failed to fetch {view} ({status}): {message}")]
    Status {
        view: CatalogView,
        status: u16,
        message: String,
    },
}

/// Converts each entry on its own. Entries that are not records are skipped
/// with a warning instead of failing the whole list.
pub fn parse_records(values: Vec<Value>, view: CatalogView) -> Vec<Feature> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<Feature>(value) {
            Ok(feature) => Some(feature),
            Err(e) => {
                warn!("[Catalog] Skipping malformed {} record #{}: {}", view, index, e);
                None
            }
        })
        .collect()
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

struct CachedCatalog {
    fetched_at: Instant,
    records: Vec<Feature>,
}

pub struct CatalogClient {
    base: Url,
    client: reqwest::blocking::Client,
    ttl: Duration,
    cache: HashMap<CatalogView, CachedCatalog>,
}

impl CatalogClient {
    /// `base` is the deployment root, e.g. `http://127.0.0.1:3000/opendata-viewer`.
    pub fn new(base: &str, timeout: Duration, ttl: Duration) -> Result<Self, CatalogError> {
        let mut base = Url::parse(base).map_err(|_| CatalogError::InvalidBase(base.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(CatalogError::InvalidBase(base.to_string()));
        }
        // Url::join replaces the last segment unless the path ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base,
            client,
            ttl,
            cache: HashMap::new(),
        })
    }

    pub fn endpoint(&self, view: CatalogView) -> Result<Url, CatalogError> {
        self.base
            .join(&view.path())
            .map_err(|_| CatalogError::InvalidBase(self.base.to_string()))
    }

    pub fn fetch_features(&mut self) -> Result<Vec<Feature>, CatalogError> {
        self.fetch(CatalogView::Features)
    }

    pub fn fetch_data(&mut self) -> Result<Vec<Feature>, CatalogError> {
        self.fetch(CatalogView::Data)
    }

    /// Returns the cached records while they are younger than the TTL, otherwise
    /// fetches. A failed fetch leaves any previous cache entry untouched.
    pub fn fetch(&mut self, view: CatalogView) -> Result<Vec<Feature>, CatalogError> {
        if let Some(cached) = self.cache.get(&view) {
            if cached.fetched_at.elapsed() < self.ttl {
                debug!(
                    "[Catalog] Using cached {} ({} records)",
                    view,
                    cached.records.len()
                );
                return Ok(cached.records.clone());
            }
        }

        let records = self.fetch_uncached(view)?;
        self.cache.insert(
            view,
            CachedCatalog {
                fetched_at: Instant::now(),
                records: records.clone(),
            },
        );
        Ok(records)
    }

    pub fn fetch_uncached(&self, view: CatalogView) -> Result<Vec<Feature>, CatalogError> {
        let url = self.endpoint(view)?;
        info!("[Catalog] Fetching {} from {}", view, url);

        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("error").to_string());
            warn!("[Catalog] {} returned {}: {}", view, status, message);
            return Err(CatalogError::Status {
                view,
                status: status.as_u16(),
                message,
            });
        }

        let values: Vec<Value> = response.json()?;
        let total = values.len();
        let records = parse_records(values, view);
        debug!("[Catalog] Received {} of {} {} records", records.len(), total, view);
        Ok(records)
    }

    pub fn invalidate(&mut self) {
        self.cache.clear();
    }
}
