//! # HTML Data Processor
//!
//! Converts between HTML strings and detached view fragments.
//!
//! ## Design
//!
//! - Parsing is a single pass over [`crate::lexer`] tokens with a stack of
//!   open elements; unmatched close tags are dropped with a warning and
//!   elements left open at the end are closed
//! - Void tags become empty elements, inline formatting tags become
//!   attribute elements, everything else becomes a container
//! - Whitespace is collapsed outside `<pre>`; whitespace-only text at block
//!   edges and between blocks is dropped
//! - A block holding only `&nbsp;` is the data form of an empty block, so
//!   empty containers serialize as `<p>&nbsp;</p>` and parse back empty
//!
//! ```rust,ignore
//! let processor = HtmlDataProcessor::new();
//! let fragment = processor.to_view("<p>foo <b>bar</b></p>")?;
//! assert_eq!(processor.to_data(&fragment), "<p>foo <b>bar</b></p>");
//! ```

use crate::error::{ViewError, ViewResult};
use crate::lexer::{lex, lex_tag, LexError, MarkupToken, TagToken};
use crate::node::{normalize_texts, ElementKind, ViewElement, ViewFragment, ViewNode, ViewText, DEFAULT_PRIORITY};
use tracing::{trace, warn};

/// Elements that never have content or a closing tag
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

const INLINE_ELEMENTS: &[&str] = &[
    "a", "b", "code", "em", "i", "mark", "s", "span", "strong", "sub", "sup", "u",
];

const NBSP: char = '\u{a0}';

fn is_html_space(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r' | '\x0c')
}

fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if is_html_space(ch) {
            if !in_space {
                result.push(' ');
            }
            in_space = true;
        } else {
            result.push(ch);
            in_space = false;
        }
    }
    result
}

fn markup_error(offset: usize, error: LexError) -> ViewError {
    ViewError::Markup {
        position: offset + error.span.start,
        message: error.message,
    }
}

struct Tag {
    name: String,
    attributes: Vec<(String, String)>,
    self_closing: bool,
}

fn parse_tag(inner: &str, position: usize) -> ViewResult<Tag> {
    let trimmed = inner.trim_end();
    let (inner, self_closing) = match trimmed.strip_suffix('/') {
        Some(rest) => (rest, true),
        None => (trimmed, false),
    };

    let tokens = lex_tag(inner)
        .map(|token| token.map(|t| t.token))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| markup_error(position + 1, error))?;
    let mut tokens = tokens.into_iter().peekable();

    let name = match tokens.next() {
        Some(TagToken::Name(name)) => name.to_lowercase(),
        _ => {
            return Err(ViewError::Markup {
                position,
                message: "Missing tag name".to_string(),
            })
        }
    };

    let mut attributes = Vec::new();
    while let Some(token) = tokens.next() {
        let TagToken::Name(key) = token else {
            continue;
        };
        let mut value = String::new();
        if tokens.next_if_eq(&TagToken::Eq).is_some() {
            match tokens.next() {
                Some(TagToken::Name(v) | TagToken::DoubleQuoted(v) | TagToken::SingleQuoted(v)) => {
                    value = html_escape::decode_html_entities(v).into_owned();
                }
                _ => {}
            }
        }
        attributes.push((key.to_lowercase(), value));
    }

    Ok(Tag {
        name,
        attributes,
        self_closing,
    })
}

fn create_element(tag: &Tag) -> ViewElement {
    let name = tag.name.as_str();
    let element = if VOID_ELEMENTS.contains(&name) {
        ViewElement::empty(name)
    } else if INLINE_ELEMENTS.contains(&name) {
        ViewElement::attribute(name, DEFAULT_PRIORITY)
    } else {
        ViewElement::container(name)
    };
    element.with_attributes(tag.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())))
}

/// Open elements while parsing
#[derive(Default)]
struct TreeBuilder {
    stack: Vec<ViewElement>,
    root: Vec<ViewNode>,
}

impl TreeBuilder {
    fn append(&mut self, node: ViewNode) -> ViewResult<()> {
        match self.stack.last_mut() {
            Some(parent) => parent.append_child(node),
            None => {
                self.root.push(node);
                Ok(())
            }
        }
    }

    fn close_to(&mut self, depth: usize) -> ViewResult<()> {
        while self.stack.len() > depth {
            if let Some(element) = self.stack.pop() {
                self.append(element.into())?;
            }
        }
        Ok(())
    }

    fn in_pre(&self) -> bool {
        self.stack.iter().any(|element| element.name() == "pre")
    }

    fn open(&mut self, element: ViewElement) -> ViewResult<()> {
        // A block start implicitly closes an open paragraph
        if element.is_container() {
            if let Some(depth) = self.stack.iter().rposition(|open| open.name() == "p") {
                if self.stack[depth..].iter().all(|open| open.name() == "p" || open.is_attribute()) {
                    self.close_to(depth)?;
                }
            }
        }
        self.stack.push(element);
        Ok(())
    }

    fn close(&mut self, name: &str, position: usize) -> ViewResult<()> {
        match self.stack.iter().rposition(|open| open.name() == name) {
            Some(depth) => self.close_to(depth),
            None => {
                warn!(tag = name, position, "Dropping unmatched close tag");
                Ok(())
            }
        }
    }

    fn finish(mut self) -> ViewResult<Vec<ViewNode>> {
        self.close_to(0)?;
        Ok(self.root)
    }
}

fn is_whitespace_text(node: &ViewNode) -> bool {
    node.as_text().is_some_and(|text| text.data().chars().all(is_html_space))
}

fn is_block(node: &ViewNode) -> bool {
    node.as_element().is_some_and(ViewElement::is_container)
}

fn trim_edge(children: &mut [ViewNode], at_start: bool) {
    let index = if at_start { Some(0) } else { children.len().checked_sub(1) };
    match index.and_then(|index| children.get_mut(index)) {
        Some(ViewNode::Text(text)) => {
            let trimmed = if at_start {
                text.data().trim_start_matches(is_html_space).to_string()
            } else {
                text.data().trim_end_matches(is_html_space).to_string()
            };
            *text = ViewText::new(trimmed);
        }
        Some(ViewNode::Element(element)) if element.is_attribute() => {
            trim_edge(element.children_mut(), at_start);
            element.normalize();
        }
        _ => {}
    }
}

/// Drop insignificant whitespace below `children`
fn clean_whitespace(children: &mut Vec<ViewNode>, block: bool, preformatted: bool) {
    for child in children.iter_mut() {
        if let ViewNode::Element(element) = child {
            let child_pre = preformatted || element.name() == "pre";
            let child_block = !element.is_attribute();
            clean_whitespace(element.children_mut(), child_block, child_pre);

            let only_filler = matches!(element.children(), [ViewNode::Text(text)] if text.data() == NBSP.to_string());
            if element.is_container() && only_filler {
                element.take_children();
            }
        }
    }
    if preformatted {
        return;
    }

    let len = children.len();
    let keep: Vec<bool> = (0..len)
        .map(|index| {
            if !is_whitespace_text(&children[index]) {
                return true;
            }
            if block && (index == 0 || index + 1 == len) {
                return false;
            }
            let after_block = index > 0 && is_block(&children[index - 1]);
            let before_block = children.get(index + 1).is_some_and(is_block);
            !(after_block || before_block)
        })
        .collect();
    let mut keep = keep.into_iter();
    children.retain(|_| keep.next().unwrap_or(true));

    if block {
        trim_edge(children, true);
        trim_edge(children, false);
    }
    children.retain(|node| !matches!(node, ViewNode::Element(e) if e.is_attribute() && e.is_empty()));
    normalize_texts(children);
}

fn escape_text(text: &str) -> String {
    html_escape::encode_text(text).replace(NBSP, "&nbsp;")
}

fn write_node(node: &ViewNode, out: &mut String) {
    let element = match node {
        ViewNode::Text(text) => {
            out.push_str(&escape_text(text.data()));
            return;
        }
        ViewNode::Element(element) => element,
    };

    out.push('<');
    out.push_str(element.name());
    for (key, value) in element.attribute_entries() {
        out.push(' ');
        out.push_str(&key);
        out.push_str("=\"");
        out.push_str(&html_escape::encode_double_quoted_attribute(&value));
        out.push('"');
    }
    out.push('>');

    match element.kind() {
        ElementKind::Empty => return,
        ElementKind::Raw { html } => out.push_str(html),
        ElementKind::Container if element.is_empty() => out.push_str("&nbsp;"),
        _ => {
            for child in element.children() {
                write_node(child, out);
            }
        }
    }

    out.push_str("</");
    out.push_str(element.name());
    out.push('>');
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlDataProcessor;

impl HtmlDataProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Parse HTML into a detached view fragment
    pub fn to_view(&self, html: &str) -> ViewResult<ViewFragment> {
        let mut builder = TreeBuilder::default();

        for token in lex(html) {
            let token = token.map_err(|error| markup_error(0, error))?;
            let position = token.span.start;
            match token.token {
                MarkupToken::Text(raw) => {
                    let decoded = html_escape::decode_html_entities(raw);
                    let text = if builder.in_pre() {
                        decoded.into_owned()
                    } else {
                        collapse_whitespace(&decoded)
                    };
                    builder.append(ViewText::new(text).into())?;
                }
                MarkupToken::Lt => builder.append(ViewText::new("<").into())?,
                MarkupToken::OpenTag(inner) => {
                    let tag = parse_tag(inner, position)?;
                    let element = create_element(&tag);
                    if tag.self_closing || !element.kind().can_hold_children() {
                        builder.append(element.into())?;
                    } else {
                        builder.open(element)?;
                    }
                }
                MarkupToken::CloseTag(name) => builder.close(&name.to_lowercase(), position)?,
                MarkupToken::Comment(_) | MarkupToken::Declaration(_) | MarkupToken::ProcessingInstruction(_) => {
                    trace!(position, "Skipping markup that has no view form");
                }
            }
        }

        let mut children = builder.finish()?;
        clean_whitespace(&mut children, true, false);
        Ok(ViewFragment::from_nodes(children))
    }

    /// Serialize a view fragment to HTML
    pub fn to_data(&self, fragment: &ViewFragment) -> String {
        let mut out = String::new();
        for node in fragment.children() {
            write_node(node, &mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn round_trip(html: &str) -> String {
        let processor = HtmlDataProcessor::new();
        processor.to_data(&processor.to_view(html).expect("Failed to parse"))
    }

    #[test]
    fn test_inline_tags_become_attribute_elements() {
        let fragment = HtmlDataProcessor::new()
            .to_view("<p>foo <b>bar</b><img src=\"x.png\" alt=\"\"></p>")
            .expect("Failed to parse");

        let paragraph = fragment.children()[0].as_element().expect("Paragraph");
        assert!(paragraph.is_container());
        let bold = paragraph.children()[1].as_element().expect("Bold");
        assert_eq!(bold.priority(), Some(DEFAULT_PRIORITY));
        let image = paragraph.children()[2].as_element().expect("Image");
        assert_eq!(image.kind(), &ElementKind::Empty);
        assert_eq!(image.get_attribute("alt").as_deref(), Some(""));
    }

    #[test]
    fn test_whitespace_is_collapsed_and_trimmed() {
        assert_eq!(round_trip("<p>\n  foo\n  bar  </p>\n<p> </p>"), "<p>foo bar</p><p>&nbsp;</p>");
        assert_eq!(round_trip("<p> <b> foo</b> <i>bar</i> </p>"), "<p><b>foo</b> <i>bar</i></p>");
    }

    #[test]
    fn test_pre_keeps_whitespace() {
        assert_eq!(round_trip("<pre>a\n   b</pre>"), "<pre>a\n   b</pre>");
    }

    #[test]
    fn test_nbsp_filler_parses_to_empty_block() {
        let fragment = HtmlDataProcessor::new().to_view("<p>&nbsp;</p>").expect("Failed to parse");
        let paragraph = fragment.children()[0].as_element().expect("Paragraph");
        assert!(paragraph.is_empty());
        assert_eq!(round_trip("<p>a&nbsp;b</p>"), "<p>a&nbsp;b</p>");
    }

    #[test]
    fn test_entities_are_decoded_and_escaped() {
        let fragment = HtmlDataProcessor::new()
            .to_view(r#"<p title="a &amp; b">x &lt; y</p>"#)
            .expect("Failed to parse");
        let paragraph = fragment.children()[0].as_element().expect("Paragraph");
        assert_eq!(paragraph.get_attribute("title").as_deref(), Some("a & b"));
        assert_eq!(paragraph.text_content(), "x < y");
        assert_eq!(
            HtmlDataProcessor::new().to_data(&fragment),
            r#"<p title="a &amp; b">x &lt; y</p>"#
        );
    }

    #[test]
    fn test_unmatched_and_unclosed_tags() {
        assert_eq!(round_trip("<p>a<br>b</i></p>"), "<p>a<br>b</p>");
        assert_eq!(round_trip("<p>a<p>b"), "<p>a</p><p>b</p>");
        assert_eq!(round_trip("<!DOCTYPE html><p>a<!-- note --></p>"), "<p>a</p>");
    }

    #[test]
    fn test_unterminated_comment_is_an_error() {
        let error = HtmlDataProcessor::new()
            .to_view("<p>a</p><!-- oops")
            .expect_err("Should fail");
        assert!(matches!(error, ViewError::Markup { position: 8, .. }));
    }
}
