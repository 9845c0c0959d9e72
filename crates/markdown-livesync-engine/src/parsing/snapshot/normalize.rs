use std::fmt::Write;

use crate::editing::{Block, Document, TextBlock};
use crate::parsing::markup::{Markup, MarkupKind, ParseResult, TransformTarget};
use crate::parsing::rope::{Span, preview};

/// Renders blocks, markups (indented by nesting depth) and pending
/// transforms as plain text.
///
/// ```text
/// paragraph #0 0..26 "**bold and *italic* text**"
///   strong 0..26 [0..2 24..26] "bold and *italic* text"
///     em 11..19 [11..12 18..19] "italic"
/// ```
pub fn normalize(doc: &Document, result: &ParseResult) -> String {
    let mut out = String::new();
    for block in doc.blocks() {
        match block {
            Block::Text(t) => write_block(&mut out, doc, result, t, 0),
            Block::Table(table) => {
                let _ = writeln!(out, "table #{} {}", table.id.0, fmt_span(table.span()));
                for cell in table.cells() {
                    write_block(&mut out, doc, result, cell, 1);
                }
            }
        }
    }
    for t in &result.transforms {
        let target = match &t.target {
            TransformTarget::Node(kind) => kind.name(),
            TransformTarget::Table => "table",
        };
        let caret = if t.requires_caret_at_end { " (caret at end)" } else { "" };
        let _ = writeln!(out, "=> {target} @{} #{}{caret}", t.anchor, t.node.0);
    }
    out
}

fn write_block(out: &mut String, doc: &Document, result: &ParseResult, block: &TextBlock, depth: usize) {
    let _ = writeln!(
        out,
        "{}{} #{} {} {:?}",
        "  ".repeat(depth),
        block.kind.name(),
        block.id.0,
        fmt_span(block.span),
        preview(&doc.buffer, block.span, 60)
    );

    let mut open: Vec<Span> = Vec::new();
    for m in result.for_node(block.id) {
        while open.last().is_some_and(|outer| !outer.contains_span(m.context)) {
            open.pop();
        }
        let indent = "  ".repeat(depth + 1 + open.len());
        let _ = writeln!(
            out,
            "{indent}{} {} [{}] {:?}",
            describe(m),
            fmt_span(m.context),
            m.punctuation.iter().map(|p| fmt_span(*p)).collect::<Vec<_>>().join(" "),
            preview(&doc.buffer, m.content(), 40)
        );
        open.push(m.context);
    }
}

fn describe(m: &Markup) -> String {
    match &m.kind {
        MarkupKind::Heading { level } => format!("heading({level})"),
        MarkupKind::Link { href, .. } => format!("link({href})"),
        MarkupKind::Image { href, alt, .. } => format!("image({href}, {alt:?})"),
        MarkupKind::InlineMath { expr } => format!("inlinemath({expr})"),
        MarkupKind::FootnoteRef { label } => format!("footnoteref({label})"),
        MarkupKind::Html {
            style, inherited, ..
        } => {
            let inherited: Vec<&str> = inherited.iter().map(|t| t.name()).collect();
            match style {
                Some(style) => format!("html(style={style:?})"),
                None if inherited.is_empty() => "html".to_string(),
                None => format!("html({})", inherited.join("+")),
            }
        }
        kind => kind.tag().name().to_string(),
    }
}

fn fmt_span(span: Span) -> String {
    format!("{}..{}", span.start, span.end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::cache::full_parse;
    use crate::parsing::snapshot::invariants;
    use markdown_livesync_config::SyntaxConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn nested_markups_are_indented() {
        let doc = Document::from_paragraphs(&["**bold and *italic* text**"]);
        let (result, _) = full_parse(&doc, &SyntaxConfig::default());
        assert_eq!(
            normalize(&doc, &result),
            "paragraph #0 0..26 \"**bold and *italic* text**\"\n\
             \x20 strong 0..26 [0..2 24..26] \"bold and *italic* text\"\n\
             \x20   em 11..19 [11..12 18..19] \"italic\"\n"
        );
    }

    #[test]
    fn check_accepts_resolver_output() {
        let doc = Document::from_paragraphs(&["# A [link](u) and `code`", "~~x~~ $y$ [^n] www.x.io"]);
        let (result, _) = full_parse(&doc, &SyntaxConfig::default());
        invariants::check(&doc, &result);
    }
}
