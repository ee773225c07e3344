//! HTTP transport seam
//!
//! Controllers talk to the site through [`Transport`] so they can be driven
//! by an in-memory implementation in tests.

use crate::errors::Result;
use async_trait::async_trait;
use futures_util::stream::{self, Stream};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Bytes handed to the connection per upload chunk
pub const UPLOAD_CHUNK_SIZE: usize = 16 * 1024;

/// Raw response: status code and JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Ordered key/value pairs; repeated keys are allowed
pub type Params = Vec<(String, String)>;

/// File part of a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Upload progress: bytes sent out of the file size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub loaded: u64,
    pub total: u64,
}

impl UploadProgress {
    /// Whole percent sent, rounded down. An empty file counts as complete.
    pub fn percent(&self) -> u64 {
        if self.total == 0 {
            return 100;
        }
        self.loaded.min(self.total) * 100 / self.total
    }

    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.loaded.min(self.total) as f64 / self.total as f64
    }
}

/// Callback receiving [`UploadProgress`] after each chunk
pub type ProgressFn = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// `bytes` split into [`UPLOAD_CHUNK_SIZE`] chunks, reporting progress as
/// each chunk is taken.
pub fn upload_chunks(
    bytes: &[u8],
    on_progress: ProgressFn,
) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + Sync + 'static {
    let total = bytes.len() as u64;
    let chunks: Vec<Vec<u8>> = bytes.chunks(UPLOAD_CHUNK_SIZE).map(<[u8]>::to_vec).collect();
    let mut loaded = 0u64;
    stream::iter(chunks.into_iter().map(move |chunk| {
        loaded += chunk.len() as u64;
        on_progress(UploadProgress { loaded, total });
        Ok(chunk)
    }))
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, query: &Params) -> Result<ApiResponse>;

    /// POST as `application/x-www-form-urlencoded`
    async fn post_form(&self, url: &str, form: &Params) -> Result<ApiResponse>;

    /// POST as `multipart/form-data` with `fields` followed by `upload`
    async fn post_multipart(
        &self,
        url: &str,
        fields: &Params,
        upload: &Upload,
        on_progress: ProgressFn,
    ) -> Result<ApiResponse>;
}

/// [`Transport`] over reqwest
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn into_response(response: reqwest::Response) -> Result<ApiResponse> {
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(ApiResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, query: &Params) -> Result<ApiResponse> {
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;
        Self::into_response(response).await
    }

    async fn post_form(&self, url: &str, form: &Params) -> Result<ApiResponse> {
        debug!(url, fields = form.len(), "POST");
        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;
        Self::into_response(response).await
    }

    async fn post_multipart(
        &self,
        url: &str,
        fields: &Params,
        upload: &Upload,
        on_progress: ProgressFn,
    ) -> Result<ApiResponse> {
        debug!(url, file = %upload.file_name, bytes = upload.bytes.len(), "POST multipart");
        let body = Body::wrap_stream(upload_chunks(&upload.bytes, on_progress));
        let part = Part::stream_with_length(body, upload.bytes.len() as u64)
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)?;

        let form = fields
            .iter()
            .fold(Form::new(), |form, (key, value)| {
                form.text(key.clone(), value.clone())
            })
            .part(upload.field.clone(), part);

        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await?;
        Self::into_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_range() {
        assert!(ApiResponse::new(200, Value::Null).is_success());
        assert!(ApiResponse::new(204, Value::Null).is_success());
        assert!(!ApiResponse::new(302, Value::Null).is_success());
        assert!(!ApiResponse::new(422, Value::Null).is_success());
    }

    #[test]
    fn test_upload_progress_percent() {
        let at = |loaded, total| UploadProgress { loaded, total };
        assert_eq!(at(0, 200).percent(), 0);
        assert_eq!(at(99, 200).percent(), 49);
        assert_eq!(at(200, 200).percent(), 100);
        assert_eq!(at(0, 0).percent(), 100);
        assert_eq!(at(50, 200).ratio(), 0.25);
    }

    #[tokio::test]
    async fn test_upload_chunks_report_cumulative_progress() {
        use futures_util::StreamExt;
        use std::sync::Mutex;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let bytes = vec![7u8; UPLOAD_CHUNK_SIZE * 2 + 10];
        let chunks: Vec<_> = upload_chunks(
            &bytes,
            Arc::new(move |p: UploadProgress| sink.lock().unwrap().push(p.loaded)),
        )
        .collect()
        .await;

        assert_eq!(chunks.len(), 3);
        let total = bytes.len() as u64;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![UPLOAD_CHUNK_SIZE as u64, 2 * UPLOAD_CHUNK_SIZE as u64, total]
        );
    }

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new(Duration::from_secs(5)).is_ok());
    }
}
