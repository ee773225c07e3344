//! In-memory document tree
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Detached nodes stay
//! in the arena, so a handle held by a pending transition keeps working after
//! the element has been removed from the tree, as it would in a browser.
//! [`Document::release`] frees a subtree for reuse; handles into it go stale
//! and every operation on them becomes a no-op.

use super::class_list::ClassList;
use super::markup::{parse_fragment, MarkupNode};
use super::style::{CssResolver, StyleDeclaration, StyleSupport};
use crate::errors::Result;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    const ROOT: NodeId = NodeId {
        index: 0,
        generation: 0,
    };
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

#[derive(Debug, Clone, Default)]
struct Element {
    tag: String,
    attrs: BTreeMap<String, String>,
    classes: ClassList,
    style: StyleDeclaration,
}

/// A document with `<html>` and `<body>` elements and a style runtime.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Slot>,
    free: Vec<usize>,
    root: NodeId,
    html: NodeId,
    body: NodeId,
    support: StyleSupport,
    css: CssResolver,
    layout_flushes: usize,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document on a modern style runtime.
    pub fn new() -> Self {
        Self::with_style_support(StyleSupport::modern())
    }

    pub fn with_style_support(support: StyleSupport) -> Self {
        let mut doc = Self {
            nodes: vec![Slot {
                generation: 0,
                node: Some(Node {
                    parent: None,
                    children: Vec::new(),
                    kind: NodeKind::Document,
                }),
            }],
            free: Vec::new(),
            root: NodeId::ROOT,
            html: NodeId::ROOT,
            body: NodeId::ROOT,
            support,
            css: CssResolver::new(),
            layout_flushes: 0,
        };
        doc.html = doc.create_element("html");
        doc.append_child(doc.root, doc.html);
        doc.body = doc.create_element("body");
        doc.append_child(doc.html, doc.body);
        doc
    }

    /// The `<html>` element.
    pub fn document_element(&self) -> NodeId {
        self.html
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn style_support(&self) -> &StyleSupport {
        &self.support
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeKind::Element(Element {
            tag: tag.to_ascii_lowercase(),
            ..Element::default()
        }))
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let node = Node {
            parent: None,
            children: Vec::new(),
            kind,
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.nodes[index];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        self.nodes.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index: self.nodes.len() - 1,
            generation: 0,
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        let slot = self.nodes.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.nodes.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    /// Nodes currently allocated, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.node(id)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Move `child` under `parent`, detaching it from any previous parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.node(parent).is_none() || self.node(child).is_none() || parent == child {
            return;
        }
        self.detach(child);
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
    }

    /// Detach `id` from its parent. The node and its subtree stay addressable.
    pub fn remove(&mut self, id: NodeId) {
        self.detach(id);
    }

    /// Detach `id` and free it with its subtree. The document's own
    /// `<html>` and `<body>` cannot be released.
    pub fn release(&mut self, id: NodeId) {
        if id == self.root || id == self.html || id == self.body || self.node(id).is_none() {
            return;
        }
        self.detach(id);
        for node in self.descendants(id) {
            if self.node(node).is_none() {
                continue;
            }
            let slot = &mut self.nodes[node.index];
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(node.index);
        }
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).and_then(|n| n.parent) else {
            return;
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|c| *c != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
    }

    /// Whether `id` is reachable from the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == self.root {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        let element = self.element(id)?;
        match name {
            "class" => element.classes.to_attribute(),
            "style" if !element.style.is_empty() => Some(element.style.to_css_text()),
            "style" => None,
            _ => element.attrs.get(name).cloned(),
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(element) = self.element_mut(id) else {
            return;
        };
        match name {
            "class" => element.classes = ClassList::parse(value),
            _ => {
                element.attrs.insert(name.to_string(), value.to_string());
            }
        }
    }

    pub fn class_list(&self, id: NodeId) -> Option<&ClassList> {
        self.element(id).map(|e| &e.classes)
    }

    pub fn has_class(&self, id: NodeId, name: &str) -> bool {
        self.class_list(id).is_some_and(|c| c.contains(name))
    }

    pub fn add_class(&mut self, id: NodeId, name: &str) {
        if let Some(element) = self.element_mut(id) {
            element.classes.add(name);
        }
    }

    pub fn remove_class(&mut self, id: NodeId, name: &str) {
        if let Some(element) = self.element_mut(id) {
            element.classes.remove(name);
        }
    }

    pub fn style(&self, id: NodeId) -> Option<&StyleDeclaration> {
        self.element(id).map(|e| &e.style)
    }

    /// Value of a logical style property, resolved the same way as writes.
    pub fn style_value(&mut self, id: NodeId, name: &str) -> Option<String> {
        let property = self.css.resolve(&self.support, name);
        self.style(id)?.get(&property).map(str::to_string)
    }

    /// Apply logical style properties to `id`, resolving vendor prefixes.
    pub fn apply_css<K, V>(&mut self, id: NodeId, properties: &[(K, V)])
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let resolved: Vec<(String, String)> = properties
            .iter()
            .map(|(k, v)| {
                (
                    self.css.resolve(&self.support, k.as_ref()),
                    v.as_ref().to_string(),
                )
            })
            .collect();
        if let Some(element) = self.element_mut(id) {
            for (property, value) in resolved {
                element.style.set(property, value);
            }
        }
    }

    /// Read layout, forcing pending style changes to take effect.
    pub fn flush_layout(&mut self, _id: NodeId) {
        self.layout_flushes += 1;
    }

    pub fn layout_flushes(&self) -> usize {
        self.layout_flushes
    }

    /// Replace the children of `id` with the parsed `markup`.
    pub fn set_inner_html(&mut self, id: NodeId, markup: &str) -> Result<()> {
        let fragment = parse_fragment(markup)?;
        let old: Vec<NodeId> = self.children(id).to_vec();
        for child in old {
            self.release(child);
        }
        for node in fragment {
            self.insert_markup(id, node);
        }
        Ok(())
    }

    fn insert_markup(&mut self, parent: NodeId, node: MarkupNode) {
        match node {
            MarkupNode::Text(text) => {
                let id = self.push_node(NodeKind::Text(text));
                self.append_child(parent, id);
            }
            MarkupNode::Element {
                tag,
                attrs,
                children,
            } => {
                let id = self.create_element(&tag);
                for (name, value) in &attrs {
                    self.set_attribute(id, name, value);
                }
                self.append_child(parent, id);
                for child in children {
                    self.insert_markup(id, child);
                }
            }
        }
    }

    /// First connected element whose `id` attribute equals `id`.
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|n| self.element(*n).and_then(|e| e.attrs.get("id")).is_some_and(|v| v == id))
    }

    /// First descendant of `scope` (document order) matching `selector`.
    ///
    /// Supports compound selectors made of a tag name, `#id`, `.class` and
    /// `[attr]` / `[attr="value"]` parts, e.g. `div.bar[role="bar"]`.
    pub fn query_selector(&self, scope: NodeId, selector: &str) -> Option<NodeId> {
        let parsed = Selector::parse(selector)?;
        self.descendants(scope)
            .into_iter()
            .skip(1)
            .find(|n| self.matches(*n, &parsed))
    }

    fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![scope];
        while let Some(id) = stack.pop() {
            out.push(id);
            for child in self.children(id).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        let Some(element) = self.element(id) else {
            return false;
        };
        if selector.tag.as_deref().is_some_and(|t| t != element.tag) {
            return false;
        }
        if let Some(want) = &selector.id {
            if element.attrs.get("id") != Some(want) {
                return false;
            }
        }
        if !selector.classes.iter().all(|c| element.classes.contains(c)) {
            return false;
        }
        selector.attrs.iter().all(|(name, value)| {
            let actual = if name == "class" {
                element.classes.to_attribute()
            } else {
                element.attrs.get(name).cloned()
            };
            match (actual, value) {
                (Some(actual), Some(value)) => actual == *value,
                (Some(_), None) => true,
                (None, _) => false,
            }
        })
    }

    /// Text content of `id` and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|n| match &self.node(n)?.kind {
                NodeKind::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Serialize `id` and its subtree as markup.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Document => {
                for child in &node.children {
                    self.write_html(*child, out);
                }
            }
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in &element.attrs {
                    out.push_str(&format!(" {name}=\"{value}\""));
                }
                if let Some(class) = element.classes.to_attribute() {
                    out.push_str(&format!(" class=\"{class}\""));
                }
                if !element.style.is_empty() {
                    out.push_str(&format!(" style=\"{}\"", element.style.to_css_text()));
                }
                out.push('>');
                for child in &node.children {
                    self.write_html(*child, out);
                }
                out.push_str(&format!("</{}>", element.tag));
            }
        }
    }
}

#[derive(Debug, Default)]
struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Selector {
    fn parse(selector: &str) -> Option<Self> {
        let selector = selector.trim();
        // descendant combinators are not supported
        let has_combinator = selector.contains(char::is_whitespace) && !selector.contains('[');
        if selector.is_empty() || has_combinator {
            return None;
        }

        let mut parsed = Selector::default();
        let mut rest = selector;
        let tag_len = rest
            .find(|c: char| matches!(c, '#' | '.' | '['))
            .unwrap_or(rest.len());
        if tag_len > 0 {
            parsed.tag = Some(rest[..tag_len].to_ascii_lowercase());
        }
        rest = &rest[tag_len..];

        while let Some(first) = rest.chars().next() {
            match first {
                '#' | '.' => {
                    let body = &rest[1..];
                    let len = body
                        .find(|c: char| matches!(c, '#' | '.' | '['))
                        .unwrap_or(body.len());
                    if len == 0 {
                        return None;
                    }
                    let name = body[..len].to_string();
                    if first == '#' {
                        parsed.id = Some(name);
                    } else {
                        parsed.classes.push(name);
                    }
                    rest = &body[len..];
                }
                '[' => {
                    let close = rest.find(']')?;
                    let inner = rest[1..close].trim();
                    let (name, value) = match inner.split_once('=') {
                        Some((name, value)) => {
                            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
                            (name.trim(), Some(value.to_string()))
                        }
                        None => (inner, None),
                    };
                    if name.is_empty() {
                        return None;
                    }
                    parsed.attrs.push((name.to_ascii_lowercase(), value));
                    rest = &rest[close + 1..];
                }
                _ => return None,
            }
        }
        Some(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"<div class="bar" role="bar"><div class="peg"></div></div><div class="spinner" role="spinner"><div class="spinner-icon"></div></div>"#;

    fn doc_with_template() -> (Document, NodeId) {
        let mut doc = Document::new();
        let container = doc.create_element("div");
        doc.set_attribute(container, "id", "nprogress");
        doc.set_inner_html(container, TEMPLATE).unwrap();
        let body = doc.body();
        doc.append_child(body, container);
        (doc, container)
    }

    #[test]
    fn test_new_document_has_html_and_body() {
        let doc = Document::new();
        assert_eq!(doc.tag_name(doc.document_element()), Some("html"));
        assert_eq!(doc.tag_name(doc.body()), Some("body"));
        assert!(doc.is_connected(doc.body()));
    }

    #[test]
    fn test_get_element_by_id_only_finds_connected() {
        let mut doc = Document::new();
        let el = doc.create_element("div");
        doc.set_attribute(el, "id", "nprogress");
        assert_eq!(doc.get_element_by_id("nprogress"), None);
        let body = doc.body();
        doc.append_child(body, el);
        assert_eq!(doc.get_element_by_id("nprogress"), Some(el));
        doc.remove(el);
        assert_eq!(doc.get_element_by_id("nprogress"), None);
    }

    #[test]
    fn test_query_selector_by_role() {
        let (doc, container) = doc_with_template();
        let bar = doc.query_selector(container, r#"[role="bar"]"#).unwrap();
        assert!(doc.has_class(bar, "bar"));
        let spinner = doc.query_selector(container, "[role='spinner']").unwrap();
        assert!(doc.has_class(spinner, "spinner"));
        assert!(doc.query_selector(container, "div.peg").is_some());
        assert!(doc.query_selector(container, "#missing").is_none());
    }

    #[test]
    fn test_query_selector_excludes_scope() {
        let (doc, container) = doc_with_template();
        assert_ne!(doc.query_selector(container, "div"), Some(container));
    }

    #[test]
    fn test_apply_css_uses_vendor_prefix() {
        let mut doc = Document::with_style_support(StyleSupport::webkit_legacy());
        let el = doc.create_element("div");
        doc.apply_css(el, &[("transform", "translate3d(-100%,0,0)")]);
        assert_eq!(
            doc.style(el).unwrap().get("WebkitTransform"),
            Some("translate3d(-100%,0,0)")
        );
        assert_eq!(
            doc.style_value(el, "transform").as_deref(),
            Some("translate3d(-100%,0,0)")
        );
    }

    #[test]
    fn test_class_helpers_on_document_element() {
        let mut doc = Document::new();
        let html = doc.document_element();
        doc.add_class(html, "nprogress-busy");
        doc.add_class(html, "nprogress-busy");
        assert_eq!(doc.attribute(html, "class").as_deref(), Some("nprogress-busy"));
        doc.remove_class(html, "nprogress-busy");
        assert!(!doc.has_class(html, "nprogress-busy"));
        assert_eq!(doc.attribute(html, "class"), None);
    }

    #[test]
    fn test_outer_html_round_trip_shape() {
        let (doc, container) = doc_with_template();
        let html = doc.outer_html(container);
        assert!(html.starts_with(r#"<div id="nprogress">"#));
        assert!(html.contains(r#"role="spinner""#));
    }

    #[test]
    fn test_removed_node_is_still_addressable() {
        let (mut doc, container) = doc_with_template();
        let bar = doc.query_selector(container, r#"[role="bar"]"#).unwrap();
        doc.remove(container);
        doc.apply_css(bar, &[("opacity", "0")]);
        assert_eq!(doc.style(bar).unwrap().get("opacity"), Some("0"));
        assert!(!doc.is_connected(bar));
    }

    #[test]
    fn test_released_subtree_is_reused_and_old_handles_go_stale() {
        let (mut doc, container) = doc_with_template();
        let count = doc.node_count();
        let bar = doc.query_selector(container, r#"[role="bar"]"#).unwrap();

        doc.release(container);
        assert_eq!(doc.node_count(), count - 5);
        assert_eq!(doc.get_element_by_id("nprogress"), None);
        assert_eq!(doc.tag_name(bar), None);
        doc.apply_css(bar, &[("opacity", "0")]);
        assert!(doc.style(bar).is_none());

        let again = doc.create_element("div");
        doc.set_inner_html(again, TEMPLATE).unwrap();
        assert_eq!(doc.node_count(), count);
        assert_ne!(again, container);
        assert!(doc.style(bar).is_none());
    }

    #[test]
    fn test_release_keeps_document_elements() {
        let mut doc = Document::new();
        let body = doc.body();
        doc.release(body);
        doc.release(doc.document_element());
        assert!(doc.is_connected(body));
        assert_eq!(doc.node_count(), 3);
    }

    #[test]
    fn test_set_inner_html_frees_previous_children() {
        let mut doc = Document::new();
        let el = doc.create_element("div");
        doc.set_inner_html(el, "<b>one</b>").unwrap();
        let count = doc.node_count();
        for _ in 0..10 {
            doc.set_inner_html(el, "<i>two</i>").unwrap();
        }
        assert_eq!(doc.node_count(), count);
        assert_eq!(doc.text_content(el), "two");
    }

    #[test]
    fn test_text_content() {
        let mut doc = Document::new();
        let el = doc.create_element("p");
        doc.set_inner_html(el, "<b>hello</b> world").unwrap();
        assert_eq!(doc.text_content(el), "hello world");
    }
}
