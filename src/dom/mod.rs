//! Minimal document model for the progress indicator
//!
//! Provides an arena-backed element tree, a fragment parser for injected
//! markup, vendor-aware inline style application and structured class lists.

pub mod class_list;
pub mod document;
pub mod markup;
pub mod style;

pub use class_list::ClassList;
pub use document::{Document, NodeId};
pub use style::{StyleDeclaration, StyleSupport};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Document shared between an indicator handle and its queued transitions.
pub type SharedDocument = Arc<Mutex<Document>>;

/// Wrap a document for sharing.
pub fn shared(document: Document) -> SharedDocument {
    Arc::new(Mutex::new(document))
}

/// Lock a shared document, ignoring poisoning. Every tree mutation is a
/// single call, so a panicked holder never leaves it half-written.
pub fn lock(document: &SharedDocument) -> MutexGuard<'_, Document> {
    document.lock().unwrap_or_else(PoisonError::into_inner)
}
