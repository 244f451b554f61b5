use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::{ApiError, MovieApi, MovieCategory};
use crate::config::ApiConfig;
use crate::db::models::{Movie, MovieId, MoviePage, Review};

#[derive(Deserialize)]
struct ReviewPage {
    #[serde(default)]
    results: Vec<Review>,
}

#[derive(Deserialize)]
struct StatusBody {
    status_message: String,
}

/// HTTPS client for the TMDB v3 API
#[derive(Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl std::fmt::Debug for TmdbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TmdbClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl TmdbClient {
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let base_url = normalize_base(&config.base_url)?;
        tracing::info!("Movie API client using base URL {}", base_url);

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    /// Resolve an endpoint path against the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Decode(format!("invalid endpoint {}: {}", path, e)))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let body = response.text().await.map_err(classify)?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: status_message(&body),
            });
        }

        decode(&body)
    }
}

#[async_trait]
impl MovieApi for TmdbClient {
    async fn fetch_list(
        &self,
        category: MovieCategory,
        page: Option<u32>,
    ) -> Result<MoviePage, ApiError> {
        self.get(category.path(), &page_query(page)).await
    }

    async fn fetch_detail(&self, movie_id: MovieId) -> Result<Movie, ApiError> {
        self.get(&format!("movie/{}", movie_id), &[]).await
    }

    async fn fetch_reviews(&self, movie_id: MovieId) -> Result<Vec<Review>, ApiError> {
        let page: ReviewPage = self
            .get(&format!("movie/{}/reviews", movie_id), &[])
            .await?;
        Ok(page.results)
    }

    async fn search(&self, query: &str, page: Option<u32>) -> Result<MoviePage, ApiError> {
        let mut params = page_query(page);
        params.push(("query", query.to_string()));
        self.get("search/movie", &params).await
    }

    async fn fetch_similar(
        &self,
        movie_id: MovieId,
        page: Option<u32>,
    ) -> Result<MoviePage, ApiError> {
        self.get(&format!("movie/{}/similar", movie_id), &page_query(page))
            .await
    }
}

fn normalize_base(base: &str) -> anyhow::Result<Url> {
    // Url::join drops the last segment unless the base ends in a slash
    let base = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };
    Ok(Url::parse(&base)?)
}

fn page_query(page: Option<u32>) -> Vec<(&'static str, String)> {
    page.map(|p| vec![("page", p.to_string())])
        .unwrap_or_default()
}

/// Only an unparseable payload is a decode error. A body cut off mid-read is a lost connection.
fn classify(err: reqwest::Error) -> ApiError {
    if err.is_decode() {
        ApiError::Decode(err.to_string())
    } else {
        ApiError::Network(err.to_string())
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))
}

fn status_message(body: &str) -> String {
    serde_json::from_str::<StatusBody>(body)
        .map(|b| b.status_message)
        .unwrap_or_else(|_| body.chars().take(200).collect())
}
