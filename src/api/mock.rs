//! In-memory [`Transport`] for tests and offline runs
//!
//! Responses are registered per method and URL. Several responses for the
//! same route are served in order; the last one repeats. Unregistered
//! routes answer 404. Multipart uploads are routed as POSTs and report
//! progress chunk by chunk, like the HTTP transport.

use super::transport::{upload_chunks, ApiResponse, Params, ProgressFn, Transport, Upload};
use crate::errors::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

/// A request seen by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub params: Params,
    /// File part of a multipart request
    pub upload: Option<Upload>,
}

impl RecordedRequest {
    /// First value of `key`
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a repeated `key`
    pub fn params_named(&self, key: &str) -> Vec<&str> {
        self.params
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<ApiResponse>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    latency: Option<Duration>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request sleeps `latency` on the tokio clock before answering
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn respond(&self, method: Method, url: &str, status: u16, body: Value) {
        lock(&self.routes)
            .entry((method, url.to_string()))
            .or_default()
            .push_back(ApiResponse::new(status, body));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    fn answer(
        &self,
        method: Method,
        url: &str,
        params: &Params,
        upload: Option<&Upload>,
    ) -> ApiResponse {
        lock(&self.requests).push(RecordedRequest {
            method,
            url: url.to_string(),
            params: params.clone(),
            upload: upload.cloned(),
        });

        let mut routes = lock(&self.routes);
        match routes.get_mut(&(method, url.to_string())) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(not_found),
            Some(queue) => queue.front().cloned().unwrap_or_else(not_found),
            None => not_found(),
        }
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn not_found() -> ApiResponse {
    ApiResponse::new(404, json!({"message": "Not found"}))
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str, query: &Params) -> Result<ApiResponse> {
        let response = self.answer(Method::Get, url, query, None);
        self.simulate_latency().await;
        Ok(response)
    }

    async fn post_form(&self, url: &str, form: &Params) -> Result<ApiResponse> {
        let response = self.answer(Method::Post, url, form, None);
        self.simulate_latency().await;
        Ok(response)
    }

    async fn post_multipart(
        &self,
        url: &str,
        fields: &Params,
        upload: &Upload,
        on_progress: ProgressFn,
    ) -> Result<ApiResponse> {
        let response = self.answer(Method::Post, url, fields, Some(upload));
        let mut chunks = Box::pin(upload_chunks(&upload.bytes, on_progress));
        while chunks.next().await.is_some() {
            tokio::task::yield_now().await;
        }
        self.simulate_latency().await;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_last_response_repeats() {
        let mock = MockTransport::new();
        mock.respond(Method::Get, "u", 500, Value::Null);
        mock.respond(Method::Get, "u", 200, json!(1));
        assert_eq!(mock.get("u", &Vec::new()).await.unwrap().status, 500);
        assert_eq!(mock.get("u", &Vec::new()).await.unwrap().status, 200);
        assert_eq!(mock.get("u", &Vec::new()).await.unwrap().status, 200);
        assert_eq!(mock.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let mock = MockTransport::new();
        let response = mock.post_form("nowhere", &Vec::new()).await.unwrap();
        assert_eq!(response.status, 404);
    }

    #[test]
    fn test_repeated_params() {
        let request = RecordedRequest {
            method: Method::Post,
            url: "u".to_string(),
            params: vec![
                ("tags[]".to_string(), "a".to_string()),
                ("tags[]".to_string(), "b".to_string()),
            ],
            upload: None,
        };
        assert_eq!(request.params_named("tags[]"), vec!["a", "b"]);
        assert_eq!(request.param("tags[]"), Some("a"));
        assert_eq!(request.param("missing"), None);
    }
}
