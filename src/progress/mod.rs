//! Slim top-of-page progress indicator
//!
//! A [`ProgressBar`] renders a thin bar (and optional spinner) into a
//! [`Document`](crate::dom::Document) and animates it between ratios in
//! `[0, 1]`. Visual steps are serialized through a [`TransitionQueue`];
//! a [`PromiseTracker`] derives progress from in-flight async operations.

pub mod bar;
pub mod queue;
pub mod settings;
pub mod status;
pub mod tracker;

pub use bar::{ProgressBar, BUSY_CLASS, ELEMENT_ID};
pub use queue::TransitionQueue;
pub use settings::{Easing, PositioningMode, ProgressOptions, Settings, DEFAULT_TEMPLATE};
pub use status::ProgressStatus;
pub use tracker::PromiseTracker;
