//! Markup fragment parser for `inner_html` style injection.
//!
//! Handles the small subset of HTML used by indicator templates: nested
//! elements, quoted/unquoted/bare attributes, void and self-closing tags,
//! comments and text.

use crate::errors::{Result, ShelfError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<MarkupNode>,
    },
    Text(String),
}

/// Parse `markup` into a list of top-level nodes.
pub fn parse_fragment(markup: &str) -> Result<Vec<MarkupNode>> {
    let bytes = markup.as_bytes();
    let mut i = 0usize;
    // (tag, attrs, children) of every currently open element; index 0 is the fragment root
    let mut stack: Vec<(String, Vec<(String, String)>, Vec<MarkupNode>)> =
        vec![(String::new(), Vec::new(), Vec::new())];

    while i < bytes.len() {
        if markup[i..].starts_with("<!--") {
            let end = markup[i + 4..]
                .find("-->")
                .ok_or_else(|| ShelfError::MarkupError("unclosed comment".into()))?;
            i += 4 + end + 3;
            continue;
        }

        if bytes[i] == b'<' && markup[i..].starts_with("</") {
            let (tag, next) = parse_end_tag(markup, i)?;
            i = next;
            if !stack[1..].iter().any(|(open, _, _)| *open == tag) {
                return Err(ShelfError::MarkupError(format!(
                    "unexpected closing tag </{tag}>"
                )));
            }
            // implicitly close anything opened after the matching tag
            while let Some((open, attrs, children)) = stack.pop() {
                let done = open == tag;
                let node = MarkupNode::Element {
                    tag: open,
                    attrs,
                    children,
                };
                push_child(&mut stack, node)?;
                if done {
                    break;
                }
            }
            continue;
        }

        if bytes[i] == b'<' {
            let (tag, attrs, self_closing, next) = parse_start_tag(markup, i)?;
            i = next;
            if self_closing || is_void_tag(&tag) {
                push_child(
                    &mut stack,
                    MarkupNode::Element {
                        tag,
                        attrs,
                        children: Vec::new(),
                    },
                )?;
            } else {
                stack.push((tag, attrs, Vec::new()));
            }
            continue;
        }

        let start = i;
        while i < bytes.len() && bytes[i] != b'<' {
            i += 1;
        }
        let text = &markup[start..i];
        if !text.trim().is_empty() {
            push_child(&mut stack, MarkupNode::Text(text.to_string()))?;
        }
    }

    if stack.len() > 1 {
        let open = stack
            .iter()
            .skip(1)
            .map(|(tag, _, _)| tag.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ShelfError::MarkupError(format!("unclosed element(s): {open}")));
    }

    Ok(stack.pop().map(|(_, _, children)| children).unwrap_or_default())
}

fn push_child(
    stack: &mut [(String, Vec<(String, String)>, Vec<MarkupNode>)],
    node: MarkupNode,
) -> Result<()> {
    let parent = stack
        .last_mut()
        .ok_or_else(|| ShelfError::MarkupError("invalid parser state".into()))?;
    parent.2.push(node);
    Ok(())
}

fn parse_start_tag(
    markup: &str,
    at: usize,
) -> Result<(String, Vec<(String, String)>, bool, usize)> {
    let bytes = markup.as_bytes();
    let mut i = at + 1;

    let tag_start = i;
    while i < bytes.len() && is_name_char(bytes[i]) {
        i += 1;
    }
    let tag = markup[tag_start..i].to_ascii_lowercase();
    if tag.is_empty() {
        return Err(ShelfError::MarkupError(format!("empty tag name at byte {at}")));
    }

    let mut attrs = Vec::new();
    loop {
        skip_ws(bytes, &mut i);
        match bytes.get(i) {
            None => return Err(ShelfError::MarkupError(format!("unclosed <{tag}> tag"))),
            Some(b'>') => return Ok((tag, attrs, false, i + 1)),
            Some(b'/') if bytes.get(i + 1) == Some(&b'>') => {
                return Ok((tag, attrs, true, i + 2));
            }
            Some(_) => {}
        }

        let name_start = i;
        while i < bytes.len() && is_name_char(bytes[i]) {
            i += 1;
        }
        let name = markup[name_start..i].to_ascii_lowercase();
        if name.is_empty() {
            return Err(ShelfError::MarkupError(format!(
                "invalid attribute in <{tag}> at byte {i}"
            )));
        }

        skip_ws(bytes, &mut i);
        let value = if bytes.get(i) == Some(&b'=') {
            i += 1;
            skip_ws(bytes, &mut i);
            parse_attr_value(markup, &mut i)?
        } else {
            String::new()
        };
        attrs.push((name, value));
    }
}

fn parse_attr_value(markup: &str, i: &mut usize) -> Result<String> {
    let bytes = markup.as_bytes();
    match bytes.get(*i) {
        Some(&quote) if quote == b'"' || quote == b'\'' => {
            let start = *i + 1;
            let len = markup[start..]
                .find(quote as char)
                .ok_or_else(|| ShelfError::MarkupError("unclosed attribute value".into()))?;
            *i = start + len + 1;
            Ok(markup[start..start + len].to_string())
        }
        Some(_) => {
            let start = *i;
            while *i < bytes.len() && !bytes[*i].is_ascii_whitespace() && bytes[*i] != b'>' {
                *i += 1;
            }
            Ok(markup[start..*i].to_string())
        }
        None => Err(ShelfError::MarkupError("missing attribute value".into())),
    }
}

fn parse_end_tag(markup: &str, at: usize) -> Result<(String, usize)> {
    let close = markup[at..]
        .find('>')
        .ok_or_else(|| ShelfError::MarkupError("unclosed end tag".into()))?;
    let tag = markup[at + 2..at + close].trim().to_ascii_lowercase();
    Ok((tag, at + close + 1))
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
            | "source" | "track" | "wbr"
    )
}
