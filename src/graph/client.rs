//! Microsoft Graph HTTP client with retry handling and paging.

use std::time::Duration;

use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::auth::TokenSource;
use super::error::{GraphError, GraphResult};
use super::models::{ODataCollection, ODataError};
use crate::config::GraphConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Upper bound for a server-provided `Retry-After`.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(120);

/// Microsoft Graph API client.
///
/// Paths are relative to the versioned base URL (`groups/{id}`); absolute
/// URLs such as `@odata.nextLink` values are used as is.
#[derive(Debug)]
pub struct GraphClient {
    http_client: reqwest::Client,
    tokens: TokenSource,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl GraphClient {
    /// Build a client from the resolved provider configuration.
    pub fn from_config(config: &GraphConfig) -> GraphResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let tokens = TokenSource::from_config(config, http_client.clone())?;
        Ok(Self::new(http_client, tokens, config.graph_base_url(), config.max_retries))
    }

    /// Build a client from parts.
    pub fn new(
        http_client: reqwest::Client,
        tokens: TokenSource,
        base_url: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            http_client,
            tokens,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Override the initial backoff used when Graph sends no `Retry-After`.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Versioned base URL, e.g. `https://graph.microsoft.com/v1.0`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of a directory object, as used by `@odata.bind` and `$ref`.
    pub fn directory_object_url(&self, id: &str) -> String {
        format!("{}/directoryObjects/{}", self.base_url, urlencoding::encode(id))
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// GET and decode a JSON body.
    #[instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> GraphResult<T> {
        let response = self.execute(Method::GET, path, None::<&()>).await?;
        Ok(response.json().await?)
    }

    /// POST a JSON body and decode the response.
    #[instrument(skip(self, body))]
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> GraphResult<T> {
        let response = self.execute(Method::POST, path, Some(body)).await?;
        Ok(response.json().await?)
    }

    /// POST a JSON body to an endpoint answering `204 No Content`.
    #[instrument(skip(self, body))]
    pub async fn post_no_content<B: Serialize>(&self, path: &str, body: &B) -> GraphResult<()> {
        self.execute(Method::POST, path, Some(body)).await?;
        Ok(())
    }

    /// PUT a JSON body and decode the response.
    #[instrument(skip(self, body))]
    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> GraphResult<T> {
        let response = self.execute(Method::PUT, path, Some(body)).await?;
        Ok(response.json().await?)
    }

    /// PATCH a JSON body. Graph answers `204 No Content`.
    #[instrument(skip(self, body))]
    pub async fn patch<B: Serialize>(&self, path: &str, body: &B) -> GraphResult<()> {
        self.execute(Method::PATCH, path, Some(body)).await?;
        Ok(())
    }

    /// DELETE.
    #[instrument(skip(self))]
    pub async fn delete(&self, path: &str) -> GraphResult<()> {
        self.execute(Method::DELETE, path, None::<&()>).await?;
        Ok(())
    }

    /// GET every page of a collection, following `@odata.nextLink`.
    #[instrument(skip(self))]
    pub async fn get_collection<T: DeserializeOwned>(&self, path: &str) -> GraphResult<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(path.to_string());

        while let Some(url) = next.take() {
            debug!(url = %url, "Fetching page");
            let page: ODataCollection<T> = self.get(&url).await?;
            items.extend(page.value);
            next = page.next_link;
        }

        Ok(items)
    }

    /// Send a request, retrying throttled (429) and transient (502, 503, 504)
    /// responses. A 401 drops the cached token and is retried once.
    async fn execute<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> GraphResult<Response> {
        let url = self.url(path);
        let mut attempts = 0u32;
        let mut delay = self.retry_delay;
        let mut reauthenticated = false;

        loop {
            let token = self.tokens.token().await?;
            let mut request = self
                .http_client
                .request(method.clone(), &url)
                .bearer_auth(&token);
            if let Some(b) = body {
                request = request.json(b);
            }

            let response = request.send().await?;
            let status = response.status();
            debug!(%method, %url, status = status.as_u16(), "Graph response");

            if status.is_success() {
                return Ok(response);
            }

            if status == StatusCode::UNAUTHORIZED && !reauthenticated {
                if let TokenSource::ClientCredentials(_) = &self.tokens {
                    warn!("Graph rejected the token, refreshing");
                    self.tokens.invalidate().await;
                    reauthenticated = true;
                    continue;
                }
            }

            let retryable = matches!(
                status,
                StatusCode::TOO_MANY_REQUESTS
                    | StatusCode::BAD_GATEWAY
                    | StatusCode::SERVICE_UNAVAILABLE
                    | StatusCode::GATEWAY_TIMEOUT
            );

            if retryable {
                if attempts >= self.max_retries {
                    return Err(GraphError::RetriesExhausted {
                        attempts: attempts + 1,
                        status: status.as_u16(),
                    });
                }
                attempts += 1;

                let wait = retry_after(&response).unwrap_or(delay);
                warn!(
                    "Graph returned {}, retry {}/{} after {:?}",
                    status, attempts, self.max_retries, wait
                );
                tokio::time::sleep(wait).await;
                delay = delay.saturating_mul(2).min(MAX_RETRY_AFTER);
                continue;
            }

            return Err(api_error(status, response).await);
        }
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
}

/// `Retry-After` in delay-seconds form, capped at [`MAX_RETRY_AFTER`].
fn parse_retry_after(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

async fn api_error(status: StatusCode, response: Response) -> GraphError {
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ODataError>(&body) {
        Ok(odata) => GraphError::Api {
            status: status.as_u16(),
            code: odata.error.code,
            message: odata.error.message,
        },
        Err(_) => GraphError::Api {
            status: status.as_u16(),
            code: status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
            message: body,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::models::{DirectoryObject, Group};
    use httpmock::prelude::*;
    use secrecy::SecretString;
    use serde_json::json;

    fn client(server: &MockServer) -> GraphClient {
        GraphClient::new(
            reqwest::Client::new(),
            TokenSource::Static(SecretString::from("test-token".to_string())),
            format!("{}/v1.0", server.base_url()),
            2,
        )
        .with_retry_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_get_sends_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1.0/groups/g-1")
                    .header("authorization", "Bearer test-token");
                then.status(200)
                    .json_body(json!({"id": "g-1", "displayName": "Ops"}));
            })
            .await;

        let group: Group = client(&server).get("groups/g-1").await.unwrap();

        mock.assert_async().await;
        assert_eq!(group.display_name.as_deref(), Some("Ops"));
    }

    #[tokio::test]
    async fn test_odata_error_is_decoded() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1.0/groups/missing");
                then.status(404).json_body(json!({
                    "error": {
                        "code": "Request_ResourceNotFound",
                        "message": "Resource 'missing' does not exist."
                    }
                }));
            })
            .await;

        let err = client(&server)
            .get::<Group>("groups/missing")
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(
            matches!(err, GraphError::Api { ref code, .. } if code == "Request_ResourceNotFound")
        );
    }

    #[tokio::test]
    async fn test_plain_error_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/v1.0/groups/g-1");
                then.status(403).body("nope");
            })
            .await;

        let err = client(&server).delete("groups/g-1").await.unwrap_err();
        assert!(matches!(
            err,
            GraphError::Api { status: 403, ref code, ref message } if code == "Forbidden" && message == "nope"
        ));
    }

    #[tokio::test]
    async fn test_throttling_exhausts_retries() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1.0/groups");
                then.status(429).header("Retry-After", "0");
            })
            .await;

        let err = client(&server)
            .get::<serde_json::Value>("groups")
            .await
            .unwrap_err();

        // One initial attempt plus two retries.
        mock.assert_hits_async(3).await;
        assert!(matches!(
            err,
            GraphError::RetriesExhausted { attempts: 3, status: 429 }
        ));
    }

    #[tokio::test]
    async fn test_gateway_errors_are_retried() {
        for status in [502u16, 503, 504] {
            let server = MockServer::start_async().await;
            let mock = server
                .mock_async(|when, then| {
                    when.method(GET).path("/v1.0/groups/g-1");
                    then.status(status);
                })
                .await;

            let err = client(&server)
                .get::<serde_json::Value>("groups/g-1")
                .await
                .unwrap_err();

            mock.assert_hits_async(3).await;
            assert!(
                matches!(err, GraphError::RetriesExhausted { attempts: 3, status: s } if s == status),
                "unexpected error for {}: {:?}",
                status,
                err
            );
        }
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1.0/groups/g-1");
                then.status(500);
            })
            .await;

        let err = client(&server)
            .get::<serde_json::Value>("groups/g-1")
            .await
            .unwrap_err();

        mock.assert_hits_async(1).await;
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_retry_after_is_honoured() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1.0/groups");
                then.status(429).header("Retry-After", "1");
            })
            .await;

        let client = GraphClient::new(
            reqwest::Client::new(),
            TokenSource::Static(SecretString::from("test-token".to_string())),
            format!("{}/v1.0", server.base_url()),
            1,
        )
        .with_retry_delay(Duration::from_millis(1));

        let started = tokio::time::Instant::now();
        let err = client.get::<serde_json::Value>("groups").await.unwrap_err();

        mock.assert_hits_async(2).await;
        assert!(started.elapsed() >= Duration::from_millis(900));
        assert!(matches!(err, GraphError::RetriesExhausted { attempts: 2, status: 429 }));
    }

    #[test]
    fn test_retry_after_parsing() {
        assert_eq!(parse_retry_after("7"), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("3600"), Some(MAX_RETRY_AFTER));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2026 07:28:00 GMT"), None);
    }

    #[tokio::test]
    async fn test_long_retry_budget_does_not_overflow_backoff() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1.0/groups");
                then.status(429).header("Retry-After", "0");
            })
            .await;

        let client = GraphClient::new(
            reqwest::Client::new(),
            TokenSource::Static(SecretString::from("test-token".to_string())),
            format!("{}/v1.0", server.base_url()),
            80,
        )
        .with_retry_delay(Duration::from_millis(1));

        let err = client.get::<serde_json::Value>("groups").await.unwrap_err();

        mock.assert_hits_async(81).await;
        assert!(matches!(err, GraphError::RetriesExhausted { attempts: 81, status: 429 }));
    }

    #[tokio::test]
    async fn test_patch_and_post_no_content() {
        let server = MockServer::start_async().await;
        let patch = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::PATCH)
                    .path("/v1.0/groups/g-1")
                    .json_body(json!({"description": "updated"}));
                then.status(204);
            })
            .await;
        let reference = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1.0/groups/g-1/members/$ref")
                    .json_body(json!({"@odata.id": "x"}));
                then.status(204);
            })
            .await;

        let client = client(&server);
        client
            .patch("groups/g-1", &json!({"description": "updated"}))
            .await
            .unwrap();
        client
            .post_no_content("groups/g-1/members/$ref", &json!({"@odata.id": "x"}))
            .await
            .unwrap();

        patch.assert_async().await;
        reference.assert_async().await;
    }

    #[tokio::test]
    async fn test_collection_follows_next_link() {
        let server = MockServer::start_async().await;
        let next = format!(
            "{}/v1.0/groups/g-1/members?$skiptoken=page2",
            server.base_url()
        );
        let first = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1.0/groups/g-1/members")
                    .query_param("$top", "1");
                then.status(200).json_body(json!({
                    "value": [{"id": "u-1"}],
                    "@odata.nextLink": next
                }));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1.0/groups/g-1/members")
                    .query_param("$skiptoken", "page2");
                then.status(200).json_body(json!({"value": [{"id": "u-2"}]}));
            })
            .await;

        let members: Vec<DirectoryObject> = client(&server)
            .get_collection("groups/g-1/members?$top=1")
            .await
            .unwrap();

        first.assert_async().await;
        second.assert_async().await;
        let ids: Vec<_> = members.iter().filter_map(|m| m.id.as_deref()).collect();
        assert_eq!(ids, vec!["u-1", "u-2"]);
    }

    #[test]
    fn test_urls() {
        let client = GraphClient::new(
            reqwest::Client::new(),
            TokenSource::Static(SecretString::from("t".to_string())),
            "https://graph.microsoft.com/v1.0/",
            0,
        );

        assert_eq!(client.url("/groups"), "https://graph.microsoft.com/v1.0/groups");
        assert_eq!(
            client.url("https://graph.microsoft.com/v1.0/groups?$skiptoken=a"),
            "https://graph.microsoft.com/v1.0/groups?$skiptoken=a"
        );
        assert_eq!(
            client.directory_object_url("u-1"),
            "https://graph.microsoft.com/v1.0/directoryObjects/u-1"
        );
    }
}
