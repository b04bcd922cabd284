use std::{future::Future, sync::Arc, time::Duration};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, header::CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::Instrument;
use url::Url;

use crate::{
    config::models::ElasticsearchConfig,
    core::city::CityRecord,
    ports::city_store::{CityStore, LIST_ALL_LIMIT, StoreError, StoreResult},
};

const USER_AGENT: &str = concat!("citypop/", env!("CARGO_PKG_VERSION"));
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ClusterHealthResponse {
    status: String,
    #[serde(default)]
    timed_out: bool,
}

#[derive(Debug, Deserialize)]
struct PopulationSource {
    population: u64,
}

#[derive(Debug, Deserialize)]
struct MultiGetDocument {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<PopulationSource>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct MultiGetResponse {
    docs: Vec<MultiGetDocument>,
}

#[derive(Debug, Deserialize)]
struct BulkItemResult {
    status: u16,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    index: BulkItemResult,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    errors: bool,
    items: Vec<BulkItem>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_source")]
    source: CityRecord,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct ErrorCause {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorCause,
}

/// Index definition applied when the backing index does not exist yet.
fn index_definition() -> serde_json::Value {
    json!({
        "mappings": {
            "properties": {
                "city": { "type": "keyword" },
                "population": { "type": "long" }
            }
        },
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        }
    })
}

/// NDJSON body for a single-document `_bulk` index request.
///
/// Document ids travel in the body rather than the URL path, so names such
/// as `.` or `..` are never collapsed as dot segments.
fn bulk_index_body(record: &CityRecord) -> String {
    let action = json!({ "index": { "_id": record.city } });
    let document = json!({ "city": record.city, "population": record.population });
    format!("{action}\n{document}\n")
}

/// Whether a cluster health status still serves reads and writes.
pub fn is_serving_status(status: &str) -> bool {
    matches!(status, "green" | "yellow")
}

/// Document store adapter speaking the Elasticsearch REST API over reqwest.
///
/// Responsibilities:
/// * Owns the pooled HTTP client (created on [`connect`](CityStore::connect),
///   dropped on [`close`](CityStore::close))
/// * Waits for the cluster to reach `yellow` and provisions the index
/// * Retries connect-phase requests on transient failures; runtime operations
///   fail fast and surface the first error
/// * Maps HTTP outcomes to [`StoreError`] variants, with "document not found"
///   reported as `Ok(None)` by [`get`](CityStore::get)
pub struct ElasticsearchStore {
    config: ElasticsearchConfig,
    client: ArcSwapOption<Client>,
}

impl ElasticsearchStore {
    pub fn new(config: ElasticsearchConfig) -> Self {
        Self {
            config,
            client: ArcSwapOption::empty(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.load().is_some()
    }

    fn build_client(&self) -> StoreResult<Client> {
        Client::builder()
            .timeout(self.config.request_timeout)
            .connect_timeout(self.config.request_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StoreError::Configuration(format!("Failed to build HTTP client: {e}")))
    }

    fn client(&self) -> StoreResult<Arc<Client>> {
        self.client.load_full().ok_or(StoreError::NotConnected)
    }

    /// Resolve `segments` (and an optional query) against the configured base URL.
    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> StoreResult<Url> {
        let mut url = Url::parse(&self.config.url).map_err(|e| {
            StoreError::Configuration(format!("Invalid Elasticsearch URL '{}': {e}", self.config.url))
        })?;

        url.path_segments_mut()
            .map_err(|()| {
                StoreError::Configuration(format!(
                    "Elasticsearch URL '{}' cannot be used as a base",
                    self.config.url
                ))
            })?
            .pop_if_empty()
            .extend(segments);

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        Ok(url)
    }

    fn request(&self, client: &Client, method: Method, url: Url) -> RequestBuilder {
        let builder = client.request(method, url);
        match &self.config.credentials {
            Some(credentials) => {
                builder.basic_auth(&credentials.username, credentials.password.as_deref())
            }
            None => builder,
        }
    }

    fn span(&self, operation: &'static str, city: Option<&str>) -> tracing::Span {
        tracing::info_span!(
            "store_request",
            store.operation = operation,
            store.index = %self.config.index,
            city = city.unwrap_or(""),
            http.status_code = tracing::field::Empty,
        )
    }

    async fn send(&self, builder: RequestBuilder) -> StoreResult<Response> {
        match builder.send().await {
            Ok(response) => {
                tracing::Span::current().record("http.status_code", response.status().as_u16());
                Ok(response)
            }
            Err(e) if e.is_timeout() => {
                Err(StoreError::Timeout(self.config.request_timeout.as_secs()))
            }
            Err(e) => Err(StoreError::Connection(e.to_string())),
        }
    }

    async fn unexpected(operation: &'static str, response: Response) -> StoreError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        StoreError::UnexpectedStatus {
            operation,
            status,
            body,
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> StoreResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    /// Run `attempt` until it succeeds, fails permanently, or the retry budget
    /// is spent. Only used while connecting.
    async fn with_retries<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let attempts = self.config.max_retries.saturating_add(1);
        let mut delay = RETRY_BASE_DELAY;
        let mut n = 1;

        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && n < attempts => {
                    tracing::warn!(
                        operation,
                        attempt = n,
                        max_attempts = attempts,
                        "Transient store error, retrying in {:?}: {}",
                        delay,
                        e
                    );
                    sleep(delay).await;
                    delay = (delay * 2).min(RETRY_MAX_DELAY);
                    n += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Block until the cluster reports at least `yellow`.
    async fn wait_for_cluster(&self, client: &Client) -> StoreResult<()> {
        // Let the cluster answer before the client-side timeout fires
        let wait = self
            .config
            .request_timeout
            .saturating_sub(Duration::from_secs(1))
            .max(Duration::from_secs(1));
        let timeout = format!("{}ms", wait.as_millis());
        let url = self.endpoint(
            &["_cluster", "health"],
            &[("wait_for_status", "yellow"), ("timeout", timeout.as_str())],
        )?;
        let url = &url;

        let health = self
            .with_retries("cluster_health", move || async move {
                let response = self
                    .send(self.request(client, Method::GET, url.clone()))
                    .await?;
                match response.status() {
                    // 408: the wait expired; the body still carries the status
                    s if s.is_success() || s == StatusCode::REQUEST_TIMEOUT => {
                        Self::decode::<ClusterHealthResponse>(response).await
                    }
                    _ => Err(Self::unexpected("cluster_health", response).await),
                }
            })
            .await
            .map_err(|e| StoreError::Unavailable(format!("cluster health check failed: {e}")))?;

        if health.timed_out || !is_serving_status(&health.status) {
            return Err(StoreError::Unavailable(format!(
                "cluster status is '{}' (timed out: {})",
                health.status, health.timed_out
            )));
        }

        tracing::info!(status = %health.status, "Elasticsearch cluster is available");
        Ok(())
    }

    async fn index_exists(&self, client: &Client) -> StoreResult<bool> {
        let url = self.endpoint(&[self.config.index.as_str()], &[])?;
        let url = &url;

        self.with_retries("index_exists", move || async move {
            let response = self
                .send(self.request(client, Method::HEAD, url.clone()))
                .await?;
            match response.status() {
                StatusCode::OK => Ok(true),
                StatusCode::NOT_FOUND => Ok(false),
                _ => Err(Self::unexpected("index_exists", response).await),
            }
        })
        .await
    }

    async fn create_index(&self, client: &Client) -> StoreResult<()> {
        let url = self.endpoint(&[self.config.index.as_str()], &[])?;
        let url = &url;

        self.with_retries("create_index", move || async move {
            let response = self
                .send(
                    self.request(client, Method::PUT, url.clone())
                        .json(&index_definition()),
                )
                .await?;

            let status = response.status();
            if status.is_success() {
                tracing::info!(index = %self.config.index, "Created index");
                return Ok(());
            }

            let body = response.text().await.unwrap_or_default();
            let already_exists = status == StatusCode::BAD_REQUEST
                && serde_json::from_str::<ErrorResponse>(&body)
                    .is_ok_and(|e| e.error.kind == "resource_already_exists_exception");
            if already_exists {
                tracing::info!(index = %self.config.index, "Index created concurrently by another instance");
                return Ok(());
            }

            Err(StoreError::UnexpectedStatus {
                operation: "create_index",
                status: status.as_u16(),
                body,
            })
        })
        .await
    }
}

#[async_trait]
impl CityStore for ElasticsearchStore {
    async fn connect(&self) -> StoreResult<()> {
        let span = self.span("connect", None);
        async {
            let client = self.build_client()?;

            self.wait_for_cluster(&client).await?;

            if !self.index_exists(&client).await? {
                self.create_index(&client).await?;
            }

            self.client.store(Some(Arc::new(client)));
            tracing::info!(url = %self.config.url, "Connected to Elasticsearch");
            Ok::<_, StoreError>(())
        }
        .instrument(span)
        .await
        .inspect_err(|e| tracing::error!("Failed to connect to Elasticsearch: {}", e))
    }

    async fn close(&self) -> StoreResult<()> {
        if self.client.swap(None).is_some() {
            tracing::info!("Elasticsearch connection closed");
        } else {
            tracing::debug!("Elasticsearch connection already closed");
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let span = self.span("health_check", None);
        async {
            let client = self.client()?;
            let url = self.endpoint(&["_cluster", "health"], &[])?;
            let response = self
                .send(self.request(&client, Method::GET, url))
                .await?;
            if !response.status().is_success() {
                return Err(Self::unexpected("health_check", response).await);
            }
            let health = Self::decode::<ClusterHealthResponse>(response).await?;
            Ok::<_, StoreError>(health.status)
        }
        .instrument(span)
        .await
        .map(|status| {
            let healthy = is_serving_status(&status);
            if !healthy {
                tracing::error!(status = %status, "Elasticsearch cluster is not serving");
            }
            healthy
        })
        .unwrap_or_else(|e| {
            tracing::error!("Elasticsearch health check failed: {}", e);
            false
        })
    }

    async fn upsert(&self, record: &CityRecord) -> StoreResult<()> {
        let span = self.span("upsert", Some(&record.city));
        async {
            let client = self.client()?;
            // refresh=true: the write is visible to the next read
            let url = self.endpoint(
                &[self.config.index.as_str(), "_bulk"],
                &[("refresh", "true")],
            )?;
            let response = self
                .send(
                    self.request(&client, Method::POST, url)
                        .header(CONTENT_TYPE, "application/x-ndjson")
                        .body(bulk_index_body(record)),
                )
                .await?;

            if !response.status().is_success() {
                return Err(Self::unexpected("upsert", response).await);
            }

            let bulk = Self::decode::<BulkResponse>(response).await?;
            let has_errors = bulk.errors;
            let item = bulk
                .items
                .into_iter()
                .next()
                .map(|item| item.index)
                .ok_or_else(|| StoreError::Decode("bulk response carried no items".to_string()))?;

            if has_errors || item.error.is_some() || !(200..300).contains(&item.status) {
                return Err(StoreError::UnexpectedStatus {
                    operation: "upsert",
                    status: item.status,
                    body: item.error.map(|e| e.to_string()).unwrap_or_default(),
                });
            }

            tracing::debug!(population = record.population, "Upserted city");
            Ok::<_, StoreError>(())
        }
        .instrument(span)
        .await
    }

    async fn get(&self, city: &str) -> StoreResult<Option<u64>> {
        let span = self.span("get", Some(city));
        async {
            let client = self.client()?;
            let url = self.endpoint(
                &[self.config.index.as_str(), "_mget"],
                &[("_source_includes", "population")],
            )?;
            let response = self
                .send(
                    self.request(&client, Method::POST, url)
                        .json(&json!({ "ids": [city] })),
                )
                .await?;

            // A missing index answers 404 with an error body
            if response.status() != StatusCode::OK {
                return Err(Self::unexpected("get", response).await);
            }

            let document = Self::decode::<MultiGetResponse>(response)
                .await?
                .docs
                .into_iter()
                .next()
                .ok_or_else(|| StoreError::Decode("mget response carried no documents".to_string()))?;

            if let Some(error) = document.error {
                return Err(StoreError::UnexpectedStatus {
                    operation: "get",
                    status: StatusCode::OK.as_u16(),
                    body: error.to_string(),
                });
            }

            match (document.found, document.source) {
                (true, Some(source)) => Ok(Some(source.population)),
                (true, None) => Err(StoreError::Decode(
                    "document found without a population field".to_string(),
                )),
                (false, _) => {
                    tracing::debug!("City not found");
                    Ok(None)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn list_all(&self) -> StoreResult<Vec<CityRecord>> {
        let span = self.span("list_all", None);
        async {
            let client = self.client()?;
            let query = json!({
                "query": { "match_all": {} },
                "size": LIST_ALL_LIMIT,
                "sort": [{ "city": "asc" }]
            });
            let url = self.endpoint(&[self.config.index.as_str(), "_search"], &[])?;
            let response = self
                .send(self.request(&client, Method::POST, url).json(&query))
                .await?;

            if !response.status().is_success() {
                return Err(Self::unexpected("list_all", response).await);
            }

            let search = Self::decode::<SearchResponse>(response).await?;
            let records: Vec<CityRecord> =
                search.hits.hits.into_iter().map(|hit| hit.source).collect();
            Ok::<_, StoreError>(records)
        }
        .instrument(span)
        .await
    }

    fn backend_name(&self) -> &'static str {
        "elasticsearch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serving_statuses() {
        assert!(is_serving_status("green"));
        assert!(is_serving_status("yellow"));
        assert!(!is_serving_status("red"));
        assert!(!is_serving_status("unknown"));
    }

    #[test]
    fn test_endpoints_resolve_against_base_url() {
        let store = ElasticsearchStore::new(ElasticsearchConfig::new("http://localhost:9200/", "cities"));
        let url = store
            .endpoint(&["cities", "_bulk"], &[("refresh", "true")])
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:9200/cities/_bulk?refresh=true");

        let store = ElasticsearchStore::new(ElasticsearchConfig::new("https://proxy.internal/es", "cities"));
        let url = store.endpoint(&["cities", "_search"], &[]).unwrap();
        assert_eq!(url.as_str(), "https://proxy.internal/es/cities/_search");
    }

    #[test]
    fn test_invalid_base_url_is_a_configuration_error() {
        let store = ElasticsearchStore::new(ElasticsearchConfig::new("http://:9200", "cities"));
        assert!(matches!(
            store.endpoint(&["cities"], &[]),
            Err(StoreError::Configuration(_))
        ));
    }

    #[test]
    fn test_bulk_body_keeps_dot_ids_out_of_the_path() {
        assert_eq!(
            bulk_index_body(&CityRecord::new("..", 1)),
            "{\"index\":{\"_id\":\"..\"}}\n{\"city\":\"..\",\"population\":1}\n"
        );
    }

    #[test]
    fn test_index_definition() {
        let definition = index_definition();
        assert_eq!(definition["mappings"]["properties"]["city"]["type"], "keyword");
        assert_eq!(definition["mappings"]["properties"]["population"]["type"], "long");
        assert_eq!(definition["settings"]["number_of_shards"], 1);
        assert_eq!(definition["settings"]["number_of_replicas"], 1);
    }

    #[tokio::test]
    async fn test_operations_before_connect_fail() {
        let store = ElasticsearchStore::new(ElasticsearchConfig::new("http://localhost:9200", "cities"));
        assert!(!store.is_connected());
        assert!(matches!(store.get("tokyo").await, Err(StoreError::NotConnected)));
        assert!(matches!(store.list_all().await, Err(StoreError::NotConnected)));
        assert!(!store.health_check().await);
        assert!(store.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_cluster_fails() {
        let config = ElasticsearchConfig::new("http://127.0.0.1:1", "cities")
            .request_timeout(Duration::from_secs(2))
            .max_retries(0);
        let store = ElasticsearchStore::new(config);

        let result = store.connect().await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(!store.is_connected());
    }
}
