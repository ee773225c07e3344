//! Terminal output for the CLI
//!
//! Mirrors a document indicator onto an indicatif bar and prints trick
//! cards and summaries.

use crate::controllers::TrickCard;
use crate::progress::{ProgressBar, ProgressStatus};
use colored::*;
use indicatif::{ProgressBar as TermBar, ProgressStyle};
use std::future::Future;
use std::time::Duration;

/// Poll interval of the mirror: 10 FPS
const MIRROR_INTERVAL: Duration = Duration::from_millis(100);

/// Terminal bar following a document indicator
#[derive(Clone)]
pub struct TerminalMirror {
    bar: TermBar,
}

impl TerminalMirror {
    pub fn new(visible: bool) -> Self {
        let bar = if visible {
            TermBar::new(100)
        } else {
            TermBar::hidden()
        };
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        Self { bar }
    }

    /// Reflect `status`; an unset status reads as complete.
    pub fn update(&self, status: ProgressStatus) {
        self.bar.set_position(mirror_position(status));
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.bar.set_message(msg.into());
    }

    pub fn finish(&self, msg: impl Into<String>) {
        self.bar.set_position(100);
        self.bar.finish_with_message(msg.into());
    }

    /// Run `work`, refreshing from `progress` until it resolves and every
    /// queued transition has played out.
    pub async fn follow<F: Future>(&self, progress: &ProgressBar, work: F) -> F::Output {
        tokio::pin!(work);
        let mut ticker = tokio::time::interval(MIRROR_INTERVAL);
        let output = loop {
            tokio::select! {
                output = &mut work => break output,
                _ = ticker.tick() => self.update(progress.status()),
            }
        };
        self.update(progress.status());
        progress.idle().await;
        output
    }
}

/// Percentage shown for `status`.
pub fn mirror_position(status: ProgressStatus) -> u64 {
    match status {
        ProgressStatus::Unset => 100,
        ProgressStatus::Ratio(n) => (n * 100.0).round().clamp(0.0, 100.0) as u64,
    }
}

/// Section header
pub fn show_banner(title: &str) {
    let width = 56;
    println!("\n{}", "=".repeat(width).cyan());
    println!("  {}", title.bold().cyan());
    println!("{}\n", "=".repeat(width).cyan());
}

pub fn show_error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message);
}

pub fn show_success(message: &str) {
    println!("{} {}", "ok:".green().bold(), message);
}

/// One card per trick
pub fn show_cards(cards: &[TrickCard]) {
    if cards.is_empty() {
        println!("{}", "No tricks yet.".dimmed());
        return;
    }
    for card in cards {
        println!("{}", card.title.bold());
        println!("  {}", card.origin_url.blue().underline());
        if let Some(description) = card.description.as_deref().filter(|d| !d.is_empty()) {
            println!("  {}", description);
        }
        if !card.tags.is_empty() {
            let tags: Vec<String> = card.tags.iter().map(|t| format!("#{}", t)).collect();
            println!("  {}", tags.join(" ").green());
        }
        println!("  {} {}", "by".dimmed(), card.user.username.yellow());
        println!("  {}", card.user.photo_profile.dimmed());
        println!();
    }
}
