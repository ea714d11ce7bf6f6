//! HTTP client for the snapshot file and the live spreadsheet backend.

use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use reqwest::{header, Client};
use serde_json::Value;
use tracing::{debug, warn};

use super::SourceError;
use crate::models::{parse_payload, payload::rows_from_value, RawRows, RosterEntry};

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Anything that can produce a roster asynchronously.
///
/// Futures are boxed so sources can be held as `Arc<dyn RosterSource>`.
pub trait RosterSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn fetch(&self) -> BoxFuture<'_, Result<Vec<RosterEntry>, SourceError>>;
}

/// A JSON resource fetched over HTTP.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    name: String,
    url: String,
    initial_backoff: Duration,
}

impl HttpSource {
    pub fn new(name: &str, url: &str, request_timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(client, name, url))
    }

    /// Create a source sharing an existing connection pool.
    pub fn with_client(client: Client, name: &str, url: &str) -> Self {
        Self {
            client,
            name: name.to_string(),
            url: url.to_string(),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    /// Another resource on the same connection pool.
    pub fn sibling(&self, name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            ..self.clone()
        }
    }

    #[cfg(test)]
    fn with_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// GET the resource as JSON, retrying on 429 with exponential backoff.
    pub async fn fetch_json(&self) -> Result<Value, SourceError> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let response = self
                .client
                .get(&self.url)
                .header(header::ACCEPT, "application/json")
                .header(header::CACHE_CONTROL, "no-store")
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                let body = response.text().await?;
                debug!(source = %self.name, bytes = body.len(), "Response received");
                return serde_json::from_str(&body).map_err(|e| SourceError::Parse(e.to_string()));
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(SourceError::RateLimited);
                }
                warn!(
                    source = %self.name,
                    retry = retries,
                    backoff_ms = backoff.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::from_status(status, &body));
        }
    }

    /// Fetch a `{"values": [[...]]}` sheet range. A body without `values`
    /// yields no rows.
    pub async fn fetch_rows(&self) -> Result<RawRows, SourceError> {
        let value = self.fetch_json().await?;
        match value.get("values") {
            None => Ok(Vec::new()),
            Some(values) => rows_from_value(values)
                .ok_or_else(|| SourceError::Parse("\"values\" is not a list of rows".to_string())),
        }
    }
}

impl RosterSource for HttpSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> BoxFuture<'_, Result<Vec<RosterEntry>, SourceError>> {
        async move {
            let value = self.fetch_json().await?;
            parse_payload(&value)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn source_for(server: &MockServer, route: &str) -> HttpSource {
        HttpSource::new("test", &format!("{}{}", server.uri(), route), Duration::from_secs(5))
            .unwrap()
            .with_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_fetch_contacts_wrapper() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contacts"))
            .and(header_matcher("cache-control", "no-store"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "contacts": [{"name": "Dr. A", "phone": "111", "department": "medical"}]
            })))
            .mount(&server)
            .await;

        let entries = source_for(&server, "/contacts").await.fetch().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].department, "MEDICAL");
    }

    #[tokio::test]
    async fn test_fetch_raw_values() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [["MEDICAL NAME", "MEDICAL PHONE"], ["Dr. A", "0123456789"]]
            })))
            .mount(&server)
            .await;

        let entries = source_for(&server, "/contacts").await.fetch().await.unwrap();
        assert_eq!(entries[0].name, "Dr. A");
    }

    #[tokio::test]
    async fn test_server_error_is_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let err = source_for(&server, "/contacts").await.fetch().await.unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 503, .. }));
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_empty_list_is_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let err = source_for(&server, "/snapshot.json").await.fetch().await.unwrap_err();
        assert!(matches!(err, SourceError::EmptyResult));
    }

    #[tokio::test]
    async fn test_invalid_json_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = source_for(&server, "/contacts").await.fetch().await.unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(4)
            .mount(&server)
            .await;

        let err = source_for(&server, "/contacts").await.fetch().await.unwrap_err();
        assert!(matches!(err, SourceError::RateLimited));
    }

    #[tokio::test]
    async fn test_fetch_rows_keeps_position_of_malformed_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [["ED NAME", "ED PHONE"], null, ["Dr. E", 555]]
            })))
            .mount(&server)
            .await;

        let rows = source_for(&server, "/contacts").await.fetch_rows().await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[1].is_empty());
        assert_eq!(rows[2], vec!["Dr. E".to_string(), "555".to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_rows_without_values() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/timetable"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let rows = source_for(&server, "/timetable").await.fetch_rows().await.unwrap();
        assert!(rows.is_empty());
    }
}
