use serde::Serialize;

use crate::editing::{NodeId, NodeKind, StepMap, map_span_through};
use crate::parsing::rope::Span;
use crate::parsing::tokenizer::Token;

/// Fieldless markup type, used for exclusion lists and rule lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MarkupTag {
    Strong,
    Em,
    Del,
    CodeSpan,
    Heading,
    Link,
    Image,
    InlineMath,
    FootnoteRef,
    Html,
}

impl MarkupTag {
    pub fn name(self) -> &'static str {
        match self {
            MarkupTag::Strong => "strong",
            MarkupTag::Em => "em",
            MarkupTag::Del => "del",
            MarkupTag::CodeSpan => "codespan",
            MarkupTag::Heading => "heading",
            MarkupTag::Link => "link",
            MarkupTag::Image => "image",
            MarkupTag::InlineMath => "inlinemath",
            MarkupTag::FootnoteRef => "footnoteref",
            MarkupTag::Html => "html",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MarkupKind {
    Strong,
    Em,
    Del,
    CodeSpan,
    Heading {
        level: u8,
    },
    /// `text` is the label as written, or the URL itself for autolinks.
    Link {
        href: String,
        title: String,
        text: String,
    },
    Image {
        href: String,
        title: String,
        alt: String,
    },
    InlineMath {
        expr: String,
    },
    FootnoteRef {
        label: String,
    },
    /// A balanced (or void) raw HTML element. `code` is the exact source from
    /// the opening tag through the closing tag.
    Html {
        code: String,
        style: Option<String>,
        inherited: Vec<MarkupTag>,
    },
}

impl MarkupKind {
    pub fn tag(&self) -> MarkupTag {
        match self {
            MarkupKind::Strong => MarkupTag::Strong,
            MarkupKind::Em => MarkupTag::Em,
            MarkupKind::Del => MarkupTag::Del,
            MarkupKind::CodeSpan => MarkupTag::CodeSpan,
            MarkupKind::Heading { .. } => MarkupTag::Heading,
            MarkupKind::Link { .. } => MarkupTag::Link,
            MarkupKind::Image { .. } => MarkupTag::Image,
            MarkupKind::InlineMath { .. } => MarkupTag::InlineMath,
            MarkupKind::FootnoteRef { .. } => MarkupTag::FootnoteRef,
            MarkupKind::Html { .. } => MarkupTag::Html,
        }
    }
}

/// A recognised syntax span with absolute byte positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Markup {
    pub kind: MarkupKind,
    pub node: NodeId,
    /// Whole span, punctuation included.
    pub context: Span,
    /// Marker sub-spans in document order; always inside `context`.
    pub punctuation: Vec<Span>,
}

impl Markup {
    pub fn tag(&self) -> MarkupTag {
        self.kind.tag()
    }

    /// The rendered text: from the end of the first punctuation span to the
    /// start of the last one. Left-only markers run to the context end.
    pub fn content(&self) -> Span {
        match self.punctuation.as_slice() {
            [] => self.context,
            [only] if only.start == self.context.start => Span::new(only.end, self.context.end),
            [only] => Span::new(self.context.start, only.start),
            [first, .., last] => Span::new(first.end, last.start.max(first.end)),
        }
    }

    pub(crate) fn remap(&mut self, maps: &[StepMap]) {
        self.context = map_span_through(maps, self.context);
        for p in &mut self.punctuation {
            *p = map_span_through(maps, *p);
        }
    }
}

/// Structural type a transform request asks for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransformTarget {
    /// Retag the text block (possibly rewriting its text).
    Node(NodeKind),
    /// Replace the text block by a table.
    Table,
}

/// A pending instruction that the node at `anchor` should become `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralTransformRequest {
    pub target: TransformTarget,
    /// Start of the node in the document, remapped across edits.
    pub anchor: usize,
    /// Node the request was raised for.
    pub node: NodeId,
    /// The token that matched the shortcut, when the rewrite needs its data.
    pub token: Option<Token>,
    /// Code and math fences only promote once the caret sits at the end of
    /// the block text.
    pub requires_caret_at_end: bool,
}

/// Markups plus pending structural transforms for one document revision.
///
/// Never mutated once published; the parse cache swaps in a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseResult {
    pub version: u64,
    pub markups: Vec<Markup>,
    pub transforms: Vec<StructuralTransformRequest>,
}

impl ParseResult {
    /// Whether any part of `span` lies inside a markup of type `tag`.
    pub fn is_inside(&self, span: Span, tag: MarkupTag) -> bool {
        self.markups
            .iter()
            .any(|m| m.tag() == tag && m.context.meets(span))
    }

    pub fn for_node(&self, node: NodeId) -> impl Iterator<Item = &Markup> {
        self.markups.iter().filter(move |m| m.node == node)
    }
}

/// Canonical markup order: by context start, outer before inner.
pub(crate) fn sort_markups(markups: &mut [Markup]) {
    markups.sort_by(|a, b| {
        a.context
            .start
            .cmp(&b.context.start)
            .then(b.context.end.cmp(&a.context.end))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markup(context: (usize, usize), punctuation: &[(usize, usize)]) -> Markup {
        Markup {
            kind: MarkupKind::Strong,
            node: NodeId(0),
            context: Span::new(context.0, context.1),
            punctuation: punctuation.iter().map(|&(s, e)| Span::new(s, e)).collect(),
        }
    }

    #[test]
    fn content_between_outer_punctuation() {
        let m = markup((0, 8), &[(0, 2), (6, 8)]);
        assert_eq!(m.content(), Span::new(2, 6));
    }

    #[test]
    fn content_for_left_only_marker() {
        let m = markup((0, 7), &[(0, 2)]);
        assert_eq!(m.content(), Span::new(2, 7));
    }

    #[test]
    fn content_without_punctuation_is_context() {
        let m = markup((3, 9), &[]);
        assert_eq!(m.content(), Span::new(3, 9));
    }

    #[test]
    fn sort_puts_outer_first() {
        let mut v = vec![markup((2, 4), &[]), markup((0, 3), &[]), markup((2, 8), &[])];
        sort_markups(&mut v);
        let contexts: Vec<_> = v.iter().map(|m| (m.context.start, m.context.end)).collect();
        assert_eq!(contexts, vec![(0, 3), (2, 8), (2, 4)]);
    }
}
