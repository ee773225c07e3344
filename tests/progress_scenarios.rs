//! End-to-end indicator behavior on an in-memory document

use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{sleep, Instant};
use trickshelf::dom::{self, Document, SharedDocument, StyleSupport};
use trickshelf::progress::{
    PositioningMode, ProgressBar, ProgressOptions, ProgressStatus, Settings, BUSY_CLASS,
    ELEMENT_ID,
};

fn quiet() -> Settings {
    Settings {
        trickle: false,
        ..Settings::default()
    }
}

fn bar_transform(doc: &SharedDocument) -> Option<String> {
    let mut doc = dom::lock(doc);
    let progress = doc.get_element_by_id(ELEMENT_ID)?;
    let bar = doc.query_selector(progress, r#"[role="bar"]"#)?;
    doc.style_value(bar, "transform")
}

#[tokio::test(start_paused = true)]
async fn test_configured_minimum_positions_bar() {
    let document = dom::shared(Document::new());
    let bar = ProgressBar::with_seed(document.clone(), quiet(), 11).unwrap();
    bar.configure(&ProgressOptions {
        minimum: Some(0.1),
        ..Default::default()
    })
    .unwrap();

    bar.start();
    assert_eq!(bar.status(), ProgressStatus::Ratio(0.1));
    bar.idle().await;
    assert_eq!(bar_transform(&document).as_deref(), Some("translate3d(-90%,0,0)"));
}

#[tokio::test(start_paused = true)]
async fn test_start_then_complete_removes_after_three_stages() {
    let document = dom::shared(Document::new());
    let bar = ProgressBar::with_seed(document.clone(), quiet(), 1).unwrap();
    bar.start();
    bar.idle().await;

    let begun = Instant::now();
    bar.set(1.0);
    assert!(bar.is_rendered());
    bar.idle().await;
    assert_eq!(begun.elapsed(), Duration::from_millis(600));

    let doc = dom::lock(&document);
    assert!(doc.get_element_by_id(ELEMENT_ID).is_none());
    assert!(!doc.has_class(doc.document_element(), BUSY_CLASS));
}

#[tokio::test(start_paused = true)]
async fn test_rapid_calls_play_out_in_order() {
    let document = dom::shared(Document::new());
    let bar = ProgressBar::with_seed(document.clone(), quiet(), 2).unwrap();
    let begun = Instant::now();
    bar.set(0.2).set(0.4).set(0.6);
    assert_eq!(bar.pending_transitions(), 3);

    bar.idle().await;
    assert_eq!(begun.elapsed(), Duration::from_millis(600));
    assert_eq!(bar_transform(&document).as_deref(), Some("translate3d(-40%,0,0)"));
}

#[tokio::test(start_paused = true)]
async fn test_restart_during_fade_keeps_new_status() {
    let document = dom::shared(Document::new());
    let bar = ProgressBar::with_seed(document.clone(), quiet(), 3).unwrap();
    bar.start().done(false);
    // restart while the fade-out is still queued
    bar.start();
    assert!(bar.is_started());

    bar.idle().await;
    // the restart reused the fading element, which the completion then removed
    assert_eq!(bar.status(), ProgressStatus::Ratio(0.08));
    assert!(!bar.is_rendered());

    bar.set(0.5);
    assert!(bar.is_rendered());
}

#[tokio::test(start_paused = true)]
async fn test_repeated_cycles_do_not_grow_document() {
    let document = dom::shared(Document::new());
    let bar = ProgressBar::with_seed(document.clone(), quiet(), 8).unwrap();
    let baseline = dom::lock(&document).node_count();

    for _ in 0..200 {
        bar.start().done(false);
        bar.idle().await;
    }
    assert_eq!(dom::lock(&document).node_count(), baseline);

    // a restart during the fade-out still settles back to the same size
    bar.start().done(false);
    bar.start();
    bar.idle().await;
    assert_eq!(dom::lock(&document).node_count(), baseline);
}

#[tokio::test(start_paused = true)]
async fn test_legacy_runtime_falls_back_to_margin() {
    let document = dom::shared(Document::with_style_support(StyleSupport::no_transforms()));
    let bar = ProgressBar::with_seed(document.clone(), quiet(), 4).unwrap();
    bar.set(0.6);
    bar.idle().await;
    assert_eq!(bar.settings().position_using, PositioningMode::Margin);

    let mut doc = dom::lock(&document);
    let progress = doc.get_element_by_id(ELEMENT_ID).unwrap();
    let node = doc.query_selector(progress, r#"[role="bar"]"#).unwrap();
    assert_eq!(doc.style_value(node, "margin-left").as_deref(), Some("-40%"));
}

#[tokio::test(start_paused = true)]
async fn test_trickle_advances_without_reaching_end() {
    let bar = ProgressBar::with_seed(dom::shared(Document::new()), Settings::default(), 9).unwrap();
    bar.start();
    sleep(Duration::from_secs(120)).await;
    let n = bar.status().ratio().unwrap();
    assert!(n > 0.08);
    assert!(n <= 0.994);
}

#[tokio::test(start_paused = true)]
async fn test_promises_drive_progress_to_completion() {
    let document = dom::shared(Document::new());
    let bar = ProgressBar::with_seed(document.clone(), quiet(), 5).unwrap();

    let (tx1, rx1) = oneshot::channel::<()>();
    let (tx2, rx2) = oneshot::channel::<()>();
    let (tx3, rx3) = oneshot::channel::<()>();
    let h1 = bar.promise(rx1);
    let h2 = bar.promise(rx2);
    let h3 = bar.promise(rx3);
    assert_eq!(bar.tracked_operations(), (3, 3));
    assert_eq!(bar.status(), ProgressStatus::Ratio(0.08));

    tx2.send(()).unwrap();
    h2.await.unwrap().unwrap();
    let n = bar.status().ratio().unwrap();
    assert!((n - 1.0 / 3.0).abs() < 1e-12);

    // a dropped sender is a failed operation and still counts
    drop(tx1);
    assert!(h1.await.unwrap().is_err());
    let n = bar.status().ratio().unwrap();
    assert!((n - 2.0 / 3.0).abs() < 1e-12);

    tx3.send(()).unwrap();
    h3.await.unwrap().unwrap();
    assert_eq!(bar.status(), ProgressStatus::Unset);
    bar.idle().await;
    assert!(!bar.is_rendered());
}

#[tokio::test]
async fn test_invalid_template_is_rejected_by_configure() {
    let bar = ProgressBar::new(dom::shared(Document::new())).unwrap();
    let result = bar.configure(&ProgressOptions {
        template: Some("<div class=\"nothing\"></div>".to_string()),
        ..Default::default()
    });
    assert!(result.is_err());
    assert!(bar.settings().template.contains("role=\"bar\""));
}
