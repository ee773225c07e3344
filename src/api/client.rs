//! Typed REST client for the trick-sharing site
//!
//! Endpoint URLs are built from the parsed base URL one path segment at a
//! time, so caller-supplied segments such as reset tokens are percent-encoded
//! and can never change the route.

use super::transport::{ApiResponse, HttpTransport, Params, ProgressFn, Transport, Upload};
use crate::config::AppConfig;
use crate::errors::{Result, ShelfError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;
use url::Url;

/// REST client rooted at the site base URL
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    base_url: Url,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Client for the site at `base_url`, which must be an absolute
    /// http(s) URL. Query and fragment are dropped.
    pub fn new(transport: Arc<dyn Transport>, base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| ShelfError::ConfigError(format!("invalid base URL {}: {}", base_url, e)))?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(ShelfError::ConfigError(format!(
                "base URL must be an http(s) URL: {}",
                base_url
            )));
        }
        base_url.set_query(None);
        base_url.set_fragment(None);
        Ok(Self {
            transport,
            base_url,
        })
    }

    /// Client over HTTP for the configured site
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.http_timeout())?;
        Self::new(Arc::new(transport), &config.base_url())
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Base URL with `segments` appended, each encoded as a single path
    /// segment. An empty last segment leaves a trailing slash.
    pub fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> String {
        let mut url = self.base_url.clone();
        // cannot fail: new() rejects cannot-be-a-base URLs
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.into()
    }

    /// `{base}{path}`; `path` is split on `/` into segments
    pub fn site_url(&self, path: &str) -> String {
        self.endpoint(path.trim_start_matches('/').split('/'))
    }

    /// `{base}/api{path}`
    pub fn api_url(&self, path: &str) -> String {
        let segments = path.trim_start_matches('/').split('/');
        self.endpoint(std::iter::once("api").chain(segments))
    }

    /// GET `url` and decode a successful body as `T`
    pub async fn get<T: DeserializeOwned>(&self, url: &str, query: &Params) -> Result<T> {
        let response = self.transport.get(url, query).await?;
        decode(response)
    }

    /// POST `form` to `url` and decode a successful body as `T`
    pub async fn post_form<T: DeserializeOwned>(&self, url: &str, form: &Params) -> Result<T> {
        let response = self.transport.post_form(url, form).await?;
        decode(response)
    }

    /// Multipart POST of `fields` and `upload`, reporting upload progress
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        url: &str,
        fields: &Params,
        upload: &Upload,
        on_progress: ProgressFn,
    ) -> Result<T> {
        let response = self
            .transport
            .post_multipart(url, fields, upload, on_progress)
            .await?;
        decode(response)
    }
}

fn decode<T: DeserializeOwned>(response: ApiResponse) -> Result<T> {
    if !response.is_success() {
        let message = error_message(response.status, &response.body);
        warn!(status = response.status, %message, "API request failed");
        return Err(ShelfError::ApiError {
            status: response.status,
            message,
        });
    }
    Ok(serde_json::from_value(response.body)?)
}

/// Message for a failed response: `error.message` when the body carries an
/// error object, otherwise the top-level `message`.
pub fn error_message(status: u16, body: &Value) -> String {
    if let Some(message) = body
        .get("error")
        .filter(|e| e.is_object())
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
    {
        return message.to_string();
    }
    match body.get("message").and_then(Value::as_str) {
        Some(message) => message.to_string(),
        None => match body.as_str() {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => format!("request failed with status {}", status),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{Method, MockTransport};
    use crate::api::types::{Envelope, User};
    use serde_json::json;

    #[test]
    fn test_urls() {
        let client =
            ApiClient::new(Arc::new(MockTransport::new()), "http://localhost:3001/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:3001");
        assert_eq!(client.site_url("/login"), "http://localhost:3001/login");
        assert_eq!(client.api_url("/trick"), "http://localhost:3001/api/trick");
        assert_eq!(client.api_url("trick/create"), "http://localhost:3001/api/trick/create");
        assert_eq!(
            client.api_url("/user/current/"),
            "http://localhost:3001/api/user/current/"
        );
    }

    #[test]
    fn test_base_url_with_path_prefix() {
        let client = ApiClient::new(Arc::new(MockTransport::new()), "https://host/shelf/").unwrap();
        assert_eq!(client.base_url(), "https://host/shelf");
        assert_eq!(client.api_url("/trick"), "https://host/shelf/api/trick");
    }

    #[test]
    fn test_endpoint_encodes_each_segment() {
        let client = ApiClient::new(Arc::new(MockTransport::new()), "http://site").unwrap();
        assert_eq!(client.endpoint(["reset", "a/b"]), "http://site/reset/a%2Fb");
        assert_eq!(client.endpoint(["reset", "x?y#z"]), "http://site/reset/x%3Fy%23z");
    }

    #[test]
    fn test_rejects_non_http_base() {
        let transport: Arc<dyn Transport> = Arc::new(MockTransport::new());
        assert!(ApiClient::new(transport.clone(), "not a url").is_err());
        assert!(ApiClient::new(transport.clone(), "mailto:rin@example.com").is_err());
        assert!(ApiClient::new(transport, "ftp://site").is_err());
    }

    #[test]
    fn test_error_message_prefers_nested_error() {
        let body = json!({"error": {"message": "Token expired"}, "message": "outer"});
        assert_eq!(error_message(400, &body), "Token expired");
    }

    #[test]
    fn test_error_message_falls_back_to_message() {
        assert_eq!(error_message(404, &json!({"message": "No user"})), "No user");
        assert_eq!(
            error_message(400, &json!({"error": "flat", "message": "outer"})),
            "outer"
        );
        assert_eq!(error_message(500, &Value::Null), "request failed with status 500");
    }

    #[tokio::test]
    async fn test_get_decodes_success() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            Method::Get,
            "http://site/api/user/current/",
            200,
            json!({"data": {"_id": "1", "username": "rin"}}),
        );
        let client = ApiClient::new(transport.clone(), "http://site").unwrap();
        let env: Envelope<User> = client
            .get(&client.api_url("/user/current/"), &Vec::new())
            .await
            .unwrap();
        assert_eq!(env.data.username, "rin");
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_maps_to_api_error() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            Method::Post,
            "http://site/forgot-password",
            422,
            json!({"error": {"message": "Unknown e-mail"}}),
        );
        let client = ApiClient::new(transport, "http://site").unwrap();
        let err = client
            .post_form::<Value>("http://site/forgot-password", &Vec::new())
            .await
            .unwrap_err();
        match err {
            ShelfError::ApiError { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "Unknown e-mail");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
