//! Inline style handling with vendor-prefix resolution
//!
//! A document carries a [`StyleSupport`] describing which camel-cased style
//! properties its runtime understands. Logical names such as `transform` or
//! `margin-left` are resolved against it once and cached, so a legacy
//! runtime that only knows `WebkitTransform` still receives the right
//! property.

use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Vendor prefixes, probed from the back of the list.
const CSS_PREFIXES: [&str; 4] = ["Webkit", "O", "Moz", "ms"];

/// Prefix order used when sniffing which engine family a runtime belongs to.
const SNIFF_PREFIXES: [&str; 4] = ["Webkit", "Moz", "ms", "O"];

/// Properties every runtime modelled here understands.
const BASE_PROPERTIES: &[&str] = &[
    "display",
    "opacity",
    "marginLeft",
    "width",
    "height",
    "position",
];

/// Set of style property names a runtime exposes on its style object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSupport {
    properties: BTreeSet<String>,
}

impl StyleSupport {
    /// An engine with unprefixed transforms, 3D perspective and transitions.
    pub fn modern() -> Self {
        Self::with_extra(&["transform", "perspective", "transition"])
    }

    /// A WebKit engine that only exposes prefixed transform properties.
    pub fn webkit_legacy() -> Self {
        Self::with_extra(&["WebkitTransform", "WebkitPerspective", "WebkitTransition"])
    }

    /// An engine with 2D transforms but no perspective, e.g. IE9.
    pub fn transform_2d() -> Self {
        Self::with_extra(&["msTransform"])
    }

    /// An engine without any transform support, e.g. IE7-8.
    pub fn no_transforms() -> Self {
        Self::with_extra(&[])
    }

    fn with_extra(extra: &[&str]) -> Self {
        let properties = BASE_PROPERTIES
            .iter()
            .chain(extra.iter())
            .map(|p| p.to_string())
            .collect();
        Self { properties }
    }

    pub fn supports(&self, property: &str) -> bool {
        self.properties.contains(property)
    }

    /// First vendor prefix with a prefixed transform, or `""`.
    pub fn vendor_prefix(&self) -> &'static str {
        SNIFF_PREFIXES
            .iter()
            .find(|prefix| self.supports(&format!("{prefix}Transform")))
            .copied()
            .unwrap_or("")
    }
}

impl Default for StyleSupport {
    fn default() -> Self {
        Self::modern()
    }
}

/// Resolved inline style of one element, keyed by runtime property name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleDeclaration {
    properties: BTreeMap<String, String>,
}

impl StyleDeclaration {
    pub fn get(&self, property: &str) -> Option<&str> {
        self.properties.get(property).map(String::as_str)
    }

    pub fn set(&mut self, property: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(property.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// `style` attribute rendering, e.g. `opacity: 1; transition: none`.
    pub fn to_css_text(&self) -> String {
        self.properties
            .iter()
            .map(|(k, v)| format!("{}: {}", to_kebab_case(k), v))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Caches the runtime name for each logical property name.
#[derive(Debug, Clone, Default)]
pub struct CssResolver {
    cache: HashMap<String, String>,
}

impl CssResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runtime property name for `name`, probing and caching on first use.
    pub fn resolve(&mut self, support: &StyleSupport, name: &str) -> String {
        let name = camel_case(name);
        if let Some(resolved) = self.cache.get(&name) {
            return resolved.clone();
        }
        let resolved = vendor_property(support, &name);
        self.cache.insert(name, resolved.clone());
        resolved
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

fn vendor_property(support: &StyleSupport, name: &str) -> String {
    if support.supports(name) {
        return name.to_string();
    }

    let mut chars = name.chars();
    let cap_name = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => return String::new(),
    };

    CSS_PREFIXES
        .iter()
        .rev()
        .map(|prefix| format!("{prefix}{cap_name}"))
        .find(|vendor_name| support.supports(vendor_name))
        .unwrap_or_else(|| name.to_string())
}

/// `margin-left` -> `marginLeft`, `-ms-transform` -> `msTransform`.
pub fn camel_case(name: &str) -> String {
    let name = name.strip_prefix("-ms-").map_or_else(
        || name.to_string(),
        |rest| format!("ms-{rest}"),
    );

    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '-' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Inverse of [`camel_case`] for rendering, vendor prefixes get a leading dash.
pub fn to_kebab_case(name: &str) -> String {
    for prefix in CSS_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix) {
            if rest.starts_with(|c: char| c.is_ascii_uppercase()) {
                return format!("-{}{}", prefix.to_ascii_lowercase(), kebab(rest));
            }
        }
    }
    kebab(name)
}

fn kebab(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
