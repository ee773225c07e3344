//! Progress indicator state machine
//!
//! ```text
//! Idle ──set/start──▶ Active(n) ──set(1)/done──▶ Completing ──3 × speed──▶ Idle
//!                       │  ▲
//!                       └──┘ inc / trickle / set(n < 1)
//! ```
//!
//! Status changes happen synchronously in the caller. Every visual step is
//! pushed onto a [`TransitionQueue`], so bar movement and the fade-out of a
//! completion never interleave, however quickly operations are issued.

use super::queue::TransitionQueue;
use super::tracker::PromiseTracker;
use super::settings::{PositioningMode, ProgressOptions, Settings};
use super::status::{
    auto_increment, bar_position_css, clamp, to_bar_percent, ProgressStatus, MAX_INCREMENT_RATIO,
};
use crate::dom::{self, Document, NodeId, SharedDocument};
use crate::errors::{Result, ShelfError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

/// `id` of the indicator container element.
pub const ELEMENT_ID: &str = "nprogress";

/// Class on the document root while the indicator is shown.
pub const BUSY_CLASS: &str = "nprogress-busy";

struct BarState {
    status: ProgressStatus,
    settings: Settings,
    rng: StdRng,
}

struct Inner {
    state: Mutex<BarState>,
    document: SharedDocument,
    queue: TransitionQueue,
    runtime: Handle,
    trickling: AtomicBool,
    tracker: PromiseTracker,
}

/// Handle to one progress indicator. Clones share the same indicator.
#[derive(Clone)]
pub struct ProgressBar {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ProgressBar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressBar")
            .field("status", &self.state().status)
            .field("pending_transitions", &self.inner.queue.pending())
            .finish()
    }
}

impl ProgressBar {
    /// Indicator with default settings on `document`.
    ///
    /// Must be called from within a tokio runtime; timers and the transition
    /// worker run on it.
    pub fn new(document: SharedDocument) -> Result<Self> {
        Self::with_settings(document, Settings::default())
    }

    pub fn with_settings(document: SharedDocument, settings: Settings) -> Result<Self> {
        let runtime =
            Handle::try_current().map_err(|e| ShelfError::NoRuntime(e.to_string()))?;
        Ok(Self::build(document, settings, runtime, StdRng::from_entropy()))
    }

    /// Indicator whose random steps are reproducible.
    pub fn with_seed(document: SharedDocument, settings: Settings, seed: u64) -> Result<Self> {
        let runtime =
            Handle::try_current().map_err(|e| ShelfError::NoRuntime(e.to_string()))?;
        Ok(Self::build(document, settings, runtime, StdRng::seed_from_u64(seed)))
    }

    fn build(document: SharedDocument, settings: Settings, runtime: Handle, rng: StdRng) -> Self {
        let queue = TransitionQueue::with_handle(&runtime);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(BarState {
                    status: ProgressStatus::Unset,
                    settings,
                    rng,
                }),
                document,
                queue,
                runtime,
                trickling: AtomicBool::new(false),
                tracker: PromiseTracker::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, BarState> {
        self.inner.state()
    }

    /// Override settings with every field `options` specifies.
    ///
    /// The merged settings are validated first; on error nothing changes.
    pub fn configure(&self, options: &ProgressOptions) -> Result<&Self> {
        let mut state = self.state();
        let mut merged = state.settings.clone();
        merged.apply(options);
        merged.validate()?;
        state.settings = merged;
        Ok(self)
    }

    pub fn settings(&self) -> Settings {
        self.state().settings.clone()
    }

    pub fn document(&self) -> &SharedDocument {
        &self.inner.document
    }

    pub fn status(&self) -> ProgressStatus {
        self.state().status
    }

    /// True while the status holds a ratio.
    pub fn is_started(&self) -> bool {
        self.state().status.is_set()
    }

    /// Whether the indicator element is in the document.
    pub fn is_rendered(&self) -> bool {
        dom::lock(&self.inner.document)
            .get_element_by_id(ELEMENT_ID)
            .is_some()
    }

    /// Transitions queued or running.
    pub fn pending_transitions(&self) -> usize {
        self.inner.queue.pending()
    }

    /// Wait for every queued transition, including a running fade-out.
    pub async fn idle(&self) {
        self.inner.queue.idle().await;
    }

    /// Move to `n`, clamped to `[minimum, 1]`. `1` completes the indicator.
    pub fn set(&self, n: f64) -> &Self {
        let (n, status, settings, started) = {
            let mut state = self.state();
            let started = state.status.is_set();
            let n = clamp(n, state.settings.minimum, 1.0);
            state.status = ProgressStatus::from_clamped(n);
            (n, state.status, state.settings.clone(), started)
        };
        debug!(ratio = n, started, "progress set");

        let (progress, bar) = {
            let mut doc = dom::lock(&self.inner.document);
            let progress = render_into(&mut doc, &settings, !started, status);
            let bar = doc.query_selector(progress, &settings.bar_selector);
            doc.flush_layout(progress);
            (progress, bar)
        };

        let inner = Arc::clone(&self.inner);
        self.inner
            .queue
            .enqueue(async move { inner.transition(n, progress, bar).await });
        self
    }

    /// Show the indicator at the minimum and start trickling.
    ///
    /// Does not move an active indicator backwards. At most one trickle loop
    /// runs per indicator; it ends once the status is unset. The interval is
    /// read from the settings before every step.
    pub fn start(&self) -> &Self {
        if !self.is_started() {
            self.set(0.0);
        }

        let trickle = self.state().settings.trickle;
        if trickle && !self.inner.trickling.swap(true, Ordering::SeqCst) {
            let bar = self.clone();
            self.inner.runtime.spawn(async move {
                loop {
                    let every = bar.state().settings.trickle_speed();
                    sleep(every).await;
                    if bar.is_started() {
                        bar.trickle();
                        continue;
                    }
                    bar.inner.trickling.store(false, Ordering::SeqCst);
                    // a start() may have landed between the check and the store
                    if !bar.is_started() || bar.inner.trickling.swap(true, Ordering::SeqCst) {
                        break;
                    }
                }
                debug!("trickle loop stopped");
            });
        }
        self
    }

    /// Finish with a small placebo increment and the fade-out.
    ///
    /// Without `force` this is a no-op while idle.
    pub fn done(&self, force: bool) -> &Self {
        if !force && !self.is_started() {
            return self;
        }
        let bump = 0.3 + 0.5 * self.state().rng.gen::<f64>();
        self.inc(Some(bump)).set(1.0)
    }

    /// Increase by `amount`, or by a random step that shrinks near the end.
    ///
    /// Starts the indicator if it is idle. Never reaches 1 on its own.
    pub fn inc(&self, amount: Option<f64>) -> &Self {
        let next = {
            let mut state = self.state();
            match state.status {
                ProgressStatus::Unset => None,
                ProgressStatus::Ratio(n) => {
                    let amount = match amount {
                        Some(amount) => amount,
                        None => {
                            let r = state.rng.gen::<f64>();
                            auto_increment(n, r)
                        }
                    };
                    Some(clamp(n + amount, 0.0, MAX_INCREMENT_RATIO))
                }
            }
        };

        match next {
            None => self.start(),
            Some(n) => self.set(n),
        }
    }

    /// One random step of at most `trickle_rate`.
    pub fn trickle(&self) -> &Self {
        let amount = {
            let mut state = self.state();
            let rate = state.settings.trickle_rate;
            state.rng.gen::<f64>() * rate
        };
        self.inc(Some(amount))
    }

    /// Render the indicator element if it is not there yet.
    pub fn render(&self, from_start: bool) -> NodeId {
        let settings = self.settings();
        let status = self.status();
        let mut doc = dom::lock(&self.inner.document);
        render_into(&mut doc, &settings, from_start, status)
    }

    /// Remove the element and the busy class immediately.
    pub fn remove(&self) {
        remove_from(&mut dom::lock(&self.inner.document));
    }

    /// Drive the indicator from `operation`, see [`PromiseTracker`].
    ///
    /// The operation runs on the runtime; the returned handle yields its
    /// output.
    pub fn promise<F>(&self, operation: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.inner.tracker.track(self, operation)
    }

    /// `(initial, current)` counters of the operation tracker.
    pub fn tracked_operations(&self) -> (usize, usize) {
        self.inner.tracker.counters()
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, BarState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Positioning mode, probing the document once.
    fn positioning_mode(&self) -> PositioningMode {
        let current = self.state().settings.position_using;
        if current != PositioningMode::Unset {
            return current;
        }
        let detected = PositioningMode::detect(&dom::lock(&self.document));
        debug!(?detected, "positioning mode resolved");
        self.state().settings.position_using = detected;
        detected
    }

    /// Queued visual step for a `set(n)` call.
    async fn transition(&self, n: f64, progress: NodeId, bar: Option<NodeId>) {
        let mode = self.positioning_mode();
        let (speed, easing) = {
            let state = self.state();
            (state.settings.speed(), state.settings.easing.clone())
        };

        if let Some(bar) = bar {
            let css = bar_position_css(n, mode, speed, &easing);
            dom::lock(&self.document).apply_css(bar, &css);
        }

        if n < 1.0 {
            sleep(speed).await;
            return;
        }

        sleep(speed).await;
        {
            let mut doc = dom::lock(&self.document);
            doc.apply_css(progress, &[("transition", "none"), ("opacity", "1")]);
            doc.flush_layout(progress);
        }

        sleep(speed).await;
        dom::lock(&self.document).apply_css(
            progress,
            &[
                ("transition", format!("all {}ms linear", speed.as_millis())),
                ("opacity", "0".to_string()),
            ],
        );

        sleep(speed).await;
        remove_from(&mut dom::lock(&self.document));
        debug!("progress indicator removed");
    }
}

fn render_into(
    doc: &mut Document,
    settings: &Settings,
    from_start: bool,
    status: ProgressStatus,
) -> NodeId {
    if let Some(existing) = doc.get_element_by_id(ELEMENT_ID) {
        return existing;
    }

    let root = doc.document_element();
    doc.add_class(root, BUSY_CLASS);

    let progress = doc.create_element("div");
    doc.set_attribute(progress, "id", ELEMENT_ID);
    if let Err(e) = doc.set_inner_html(progress, &settings.template) {
        warn!(error = %e, "indicator template rejected, rendering an empty container");
    }

    match doc.query_selector(progress, &settings.bar_selector) {
        Some(bar) => {
            let perc = if from_start {
                -100.0
            } else {
                to_bar_percent(status.ratio().unwrap_or(0.0))
            };
            doc.apply_css(
                bar,
                &[
                    ("transition", "all 0 linear".to_string()),
                    ("transform", format!("translate3d({perc}%,0,0)")),
                ],
            );
        }
        None => warn!(selector = %settings.bar_selector, "indicator template has no bar"),
    }

    if !settings.show_spinner {
        if let Some(spinner) = doc.query_selector(progress, &settings.spinner_selector) {
            doc.release(spinner);
        }
    }

    let body = doc.body();
    doc.append_child(body, progress);
    progress
}

fn remove_from(doc: &mut Document) {
    let root = doc.document_element();
    doc.remove_class(root, BUSY_CLASS);
    if let Some(progress) = doc.get_element_by_id(ELEMENT_ID) {
        doc.release(progress);
    }
}
