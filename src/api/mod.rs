//! REST API access
//!
//! [`ApiClient`] sits on a pluggable [`Transport`]: [`HttpTransport`] for the
//! real site, [`MockTransport`] for tests and offline runs.

pub mod client;
pub mod mock;
pub mod transport;
pub mod types;

pub use client::{error_message, ApiClient};
pub use mock::{Method, MockTransport, RecordedRequest};
pub use transport::{
    upload_chunks, ApiResponse, HttpTransport, Params, ProgressFn, Transport, Upload,
    UploadProgress, UPLOAD_CHUNK_SIZE,
};
pub use types::{Envelope, NewTrick, Tags, Trick, TrickOwner, TricksByUser, User};
