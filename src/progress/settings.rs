//! Indicator settings and the sparse options record used to override them

use crate::dom::Document;
use crate::errors::{Result, ShelfError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Markup injected into the indicator container.
pub const DEFAULT_TEMPLATE: &str = r#"<div class="bar" role="bar"><div class="peg"></div></div><div class="spinner" role="spinner"><div class="spinner-icon"></div></div>"#;

/// CSS timing function used for bar movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Easing {
    Ease,
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    CubicBezier(f64, f64, f64, f64),
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Easing::Ease => f.write_str("ease"),
            Easing::Linear => f.write_str("linear"),
            Easing::EaseIn => f.write_str("ease-in"),
            Easing::EaseOut => f.write_str("ease-out"),
            Easing::EaseInOut => f.write_str("ease-in-out"),
            Easing::CubicBezier(a, b, c, d) => write!(f, "cubic-bezier({a},{b},{c},{d})"),
        }
    }
}

impl FromStr for Easing {
    type Err = ShelfError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "ease" => return Ok(Easing::Ease),
            "linear" => return Ok(Easing::Linear),
            "ease-in" => return Ok(Easing::EaseIn),
            "ease-out" => return Ok(Easing::EaseOut),
            "ease-in-out" => return Ok(Easing::EaseInOut),
            _ => {}
        }

        let args = s
            .strip_prefix("cubic-bezier(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| ShelfError::ConfigError(format!("unknown easing '{s}'")))?;
        let values = args
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ShelfError::ConfigError(format!("invalid cubic-bezier '{s}': {e}")))?;
        match values.as_slice() {
            [a, b, c, d] if (0.0..=1.0).contains(a) && (0.0..=1.0).contains(c) => {
                Ok(Easing::CubicBezier(*a, *b, *c, *d))
            }
            _ => Err(ShelfError::ConfigError(format!(
                "cubic-bezier needs four values with x in [0,1]: '{s}'"
            ))),
        }
    }
}

impl TryFrom<String> for Easing {
    type Error = ShelfError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Easing> for String {
    fn from(value: Easing) -> Self {
        value.to_string()
    }
}

/// CSS technique used to move the bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositioningMode {
    /// Not yet probed; resolved on the first transition.
    #[serde(rename = "", alias = "auto")]
    Unset,
    Translate3d,
    Translate,
    Margin,
}

impl PositioningMode {
    /// Probe a style runtime: perspective support wins, then transforms,
    /// then plain margins.
    pub fn detect(document: &Document) -> Self {
        let support = document.style_support();
        let prefix = support.vendor_prefix();
        let property = |name: &str| {
            if prefix.is_empty() {
                name.to_ascii_lowercase()
            } else {
                format!("{prefix}{name}")
            }
        };

        if support.supports(&property("Perspective")) {
            PositioningMode::Translate3d
        } else if support.supports(&property("Transform")) {
            PositioningMode::Translate
        } else {
            PositioningMode::Margin
        }
    }
}

/// Effective indicator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Lowest ratio `set` will store.
    pub minimum: f64,
    pub easing: Easing,
    pub position_using: PositioningMode,
    /// Duration of every transition stage, in milliseconds.
    pub speed_ms: u64,
    pub trickle: bool,
    /// Upper bound of a single trickle step.
    pub trickle_rate: f64,
    pub trickle_speed_ms: u64,
    pub show_spinner: bool,
    pub bar_selector: String,
    pub spinner_selector: String,
    pub template: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            minimum: 0.08,
            easing: Easing::Ease,
            position_using: PositioningMode::Unset,
            speed_ms: 200,
            trickle: true,
            trickle_rate: 0.02,
            trickle_speed_ms: 800,
            show_spinner: true,
            bar_selector: r#"[role="bar"]"#.to_string(),
            spinner_selector: r#"[role="spinner"]"#.to_string(),
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl Settings {
    pub fn speed(&self) -> Duration {
        Duration::from_millis(self.speed_ms)
    }

    pub fn trickle_speed(&self) -> Duration {
        Duration::from_millis(self.trickle_speed_ms)
    }

    /// Overwrite every field that `options` specifies.
    pub fn apply(&mut self, options: &ProgressOptions) {
        if let Some(minimum) = options.minimum {
            self.minimum = minimum;
        }
        if let Some(easing) = &options.easing {
            self.easing = easing.clone();
        }
        if let Some(mode) = options.position_using {
            self.position_using = mode;
        }
        if let Some(speed) = options.speed {
            self.speed_ms = speed;
        }
        if let Some(trickle) = options.trickle {
            self.trickle = trickle;
        }
        if let Some(rate) = options.trickle_rate {
            self.trickle_rate = rate;
        }
        if let Some(speed) = options.trickle_speed {
            self.trickle_speed_ms = speed;
        }
        if let Some(show) = options.show_spinner {
            self.show_spinner = show;
        }
        if let Some(selector) = &options.bar_selector {
            self.bar_selector = selector.clone();
        }
        if let Some(selector) = &options.spinner_selector {
            self.spinner_selector = selector.clone();
        }
        if let Some(template) = &options.template {
            self.template = template.clone();
        }
    }

    /// Check ranges and that the template parses and contains a bar.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.minimum) {
            return Err(ShelfError::ConfigError(format!(
                "minimum must be in [0, 1), got {}",
                self.minimum
            )));
        }

        if !(0.0..=1.0).contains(&self.trickle_rate) {
            return Err(ShelfError::ConfigError(format!(
                "trickle_rate must be in [0, 1], got {}",
                self.trickle_rate
            )));
        }

        if self.trickle && self.trickle_speed_ms == 0 {
            return Err(ShelfError::ConfigError(
                "trickle_speed must be greater than 0 when trickle is enabled".to_string(),
            ));
        }

        let mut probe = Document::new();
        let container = probe.create_element("div");
        probe.set_inner_html(container, &self.template)?;
        if probe.query_selector(container, &self.bar_selector).is_none() {
            return Err(ShelfError::ConfigError(format!(
                "template has no element matching bar selector {}",
                self.bar_selector
            )));
        }

        Ok(())
    }
}

/// Sparse override record; `None` fields leave the current value alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "ease")]
    pub easing: Option<Easing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_using: Option<PositioningMode>,
    /// Milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trickle: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trickle_rate: Option<f64>,
    /// Milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trickle_speed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_spinner: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar_selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spinner_selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl ProgressOptions {
    /// Settings produced by applying these options to the defaults.
    pub fn to_settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.apply(self);
        settings
    }

    pub fn validate(&self) -> Result<()> {
        self.to_settings().validate()
    }
}
