// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Open Data Viewer contributors

//! Read-only HTTP front for the upstream catalog document.
//!
//! Both endpoints fetch the whole upstream array on every request (no caching),
//! keep the records that belong to their [`CatalogView`] and answer `200` with the
//! filtered array. Any failure is logged here and answered with a fixed `500`
//! body; upstream status codes and messages never reach the client.

use crate::catalog::CatalogView;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::{debug, error, info, warn};
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use url::Url;

pub const GENERIC_ERROR: &str = "Failed to fetch or process data";

/// What to answer when filtering leaves nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyPolicy {
    /// An empty result is treated as a broken upstream.
    #[default]
    Reject,
    Allow,
}

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("Failed to fetch data: {0}")]
    Status(String),
    #[error("Upstream body is not JSON: {0}")]
    NotJson(#[from] serde_json::Error),
    #[error("Upstream body is not a JSON array")]
    NotArray,
    #[error("No {0} records in upstream catalog")]
    Empty(CatalogView),
}

/// Keeps the records of `view`, in upstream order. Entries that are not objects
/// belong to neither view.
pub fn filter_catalog(records: Vec<Value>, view: CatalogView) -> Vec<Value> {
    records
        .into_iter()
        .filter(|record| {
            if !record.is_object() {
                debug!("[Proxy] Skipping non-object catalog entry");
                return false;
            }
            view.includes(record)
        })
        .collect()
}

pub struct UpstreamCatalog {
    client: reqwest::Client,
    url: Url,
}

impl UpstreamCatalog {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetches the full upstream array, bypassing every cache on the way.
    pub async fn fetch(&self) -> Result<Vec<Value>, ProxyError> {
        let response = self
            .client
            .get(self.url.clone())
            .header(CACHE_CONTROL, "no-store")
            .header(PRAGMA, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::Status(
                status
                    .canonical_reason()
                    .unwrap_or(status.as_str())
                    .to_string(),
            ));
        }

        let body = response.text().await?;
        match serde_json::from_str::<Value>(&body)? {
            Value::Array(records) => Ok(records),
            _ => Err(ProxyError::NotArray),
        }
    }

    pub async fn view(&self, view: CatalogView, policy: EmptyPolicy) -> Result<Vec<Value>, ProxyError> {
        let records = self.fetch().await?;
        let total = records.len();
        let filtered = filter_catalog(records, view);
        debug!("[Proxy] {} kept {} of {} records", view, filtered.len(), total);

        if filtered.is_empty() && policy == EmptyPolicy::Reject {
            return Err(ProxyError::Empty(view));
        }
        Ok(filtered)
    }
}

#[derive(Clone)]
pub struct ProxyState {
    upstream: Arc<UpstreamCatalog>,
    policy: EmptyPolicy,
}

impl ProxyState {
    pub fn new(upstream: UpstreamCatalog, policy: EmptyPolicy) -> Self {
        Self {
            upstream: Arc::new(upstream),
            policy,
        }
    }
}

/// Routes for both endpoints, served at the root and again under `base_path`
/// (e.g. `/opendata-viewer`) when one is given.
pub fn router(state: ProxyState, base_path: &str) -> Router {
    let api = Router::new()
        .route("/api/opendata/data", get(data))
        .route("/api/opendata/features", get(features))
        .with_state(state);

    let base = base_path.trim_matches('/');
    if base.is_empty() {
        return api;
    }
    Router::new().nest(&format!("/{}", base), api.clone()).merge(api)
}

async fn data(State(state): State<ProxyState>) -> Response {
    respond(&state, CatalogView::Data).await
}

async fn features(State(state): State<ProxyState>) -> Response {
    respond(&state, CatalogView::Features).await
}

async fn respond(state: &ProxyState, view: CatalogView) -> Response {
    match state.upstream.view(view, state.policy).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => {
            error!("[Proxy] /api/opendata/{} failed: {}", view, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": GENERIC_ERROR })),
            )
                .into_response()
        }
    }
}

pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    match listener.local_addr() {
        Ok(addr) => info!("[Proxy] Listening on http://{}", addr),
        Err(e) => warn!("[Proxy] Listening on an unknown address: {}", e),
    }
    axum::serve(listener, app).await
}
