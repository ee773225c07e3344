//! Completion status and the pure arithmetic behind the indicator

use super::settings::{Easing, PositioningMode};
use std::time::Duration;

/// Highest ratio reachable through `inc`; only `set(1)`/`done` complete.
pub const MAX_INCREMENT_RATIO: f64 = 0.994;

/// Completion of the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ProgressStatus {
    /// Idle, or completing after `set(1)`.
    #[default]
    Unset,
    /// In progress, always below 1.
    Ratio(f64),
}

impl ProgressStatus {
    /// Status stored for an already clamped value: `1` means done.
    pub fn from_clamped(n: f64) -> Self {
        if n >= 1.0 {
            ProgressStatus::Unset
        } else {
            ProgressStatus::Ratio(n)
        }
    }

    pub fn ratio(&self) -> Option<f64> {
        match self {
            ProgressStatus::Unset => None,
            ProgressStatus::Ratio(n) => Some(*n),
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, ProgressStatus::Ratio(_))
    }
}

/// Clamp `n` into `[min, max]`; NaN becomes `min`.
pub fn clamp(n: f64, min: f64, max: f64) -> f64 {
    if n.is_nan() || n < min {
        min
    } else if n > max {
        max
    } else {
        n
    }
}

/// Ratio `0..1` to a translate percentage `-100..0`.
pub fn to_bar_percent(n: f64) -> f64 {
    (-1.0 + n) * 100.0
}

/// Default increment: large steps early, shrinking as `n` approaches 1.
///
/// `random` is a sample from `[0, 1)`.
pub fn auto_increment(n: f64, random: f64) -> f64 {
    (1.0 - n) * clamp(random * n, 0.1, 0.95)
}

/// Bar position style for ratio `n` under `mode`.
pub fn bar_position_css(
    n: f64,
    mode: PositioningMode,
    speed: Duration,
    easing: &Easing,
) -> Vec<(&'static str, String)> {
    let perc = to_bar_percent(n);
    let mut css = match mode {
        PositioningMode::Translate3d | PositioningMode::Unset => {
            vec![("transform", format!("translate3d({perc}%,0,0)"))]
        }
        PositioningMode::Translate => vec![("transform", format!("translate({perc}%,0)"))],
        PositioningMode::Margin => vec![("margin-left", format!("{perc}%"))],
    };
    css.push(("transition", format!("all {}ms {}", speed.as_millis(), easing)));
    css
}
