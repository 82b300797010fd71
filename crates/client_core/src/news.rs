//! Source listing: the one read endpoint of the news provider, plus the
//! pure category derivation/filtering used by the home feature.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use shared::domain::NewsSource;

use crate::http::expect_success;

/// Response shape as dictated by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesResponse {
    pub status: Option<String>,
    #[serde(rename = "totalResults")]
    pub total_results: Option<i64>,
    pub results: Option<Vec<NewsSource>>,
}

#[async_trait]
pub trait SourcesApi: Send + Sync {
    async fn fetch_sources(&self, country: &str) -> Result<SourcesResponse>;
}

pub struct HttpSourcesApi {
    http: Client,
    base_url: String,
    api_key: String,
}

impl HttpSourcesApi {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SourcesApi for HttpSourcesApi {
    async fn fetch_sources(&self, country: &str) -> Result<SourcesResponse> {
        let response = self
            .http
            .get(format!("{}/sources", self.base_url))
            .query(&[("country", country), ("apikey", self.api_key.as_str())])
            .send()
            .await?;
        let response = expect_success(response).await?;
        Ok(response.json().await?)
    }
}

pub struct NewsRepository {
    api: Arc<dyn SourcesApi>,
}

impl NewsRepository {
    pub fn new(api: Arc<dyn SourcesApi>) -> Self {
        Self { api }
    }

    /// Fetches the source list for a country. A missing `results` field is
    /// an empty list, matching the provider's behavior for sparse regions.
    pub async fn sources(&self, country: &str) -> Result<Vec<NewsSource>> {
        let response = self.api.fetch_sources(country).await?;
        Ok(response.results.unwrap_or_default())
    }
}

/// Deduplicated, sorted union of all sources' category lists. Computed once
/// per fetch.
pub fn derive_categories(sources: &[NewsSource]) -> Vec<String> {
    let mut categories: Vec<String> = sources
        .iter()
        .flat_map(|source| source.categories().iter().cloned())
        .collect();
    categories.sort();
    categories.dedup();
    categories
}

/// Case-insensitive membership filter. `None` selects everything. Pure and
/// idempotent: filtering an already-filtered list by the same category
/// returns the same list.
pub fn filter_by_category(sources: &[NewsSource], category: Option<&str>) -> Vec<NewsSource> {
    match category {
        None => sources.to_vec(),
        Some(label) => sources
            .iter()
            .filter(|source| {
                source
                    .categories()
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(label))
            })
            .cloned()
            .collect(),
    }
}
