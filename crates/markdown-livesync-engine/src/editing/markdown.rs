//! Markdown import and export for the host document.
//!
//! Import is line based: each line is classified on its own facts, then a
//! small state machine groups lines into blocks. Headings stay paragraphs
//! whose text keeps its `#` marker; the inline engine styles them.

use std::sync::OnceLock;

use regex::Regex;

use super::document::{Document, DocumentBuilder};
use super::node::{Block, NodeKind, Table, TextBlock};
use crate::parsing::markup::{Markup, MarkupKind, ParseResult};
use crate::parsing::rope::Span;

/// Characters that open inline syntax when written as plain text.
const INLINE_SYNTAX_CHARS: &[char] = &['*', '_', '~', '`', '[', ']', '$', '<'];

/// Local facts about one source line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LineClass<'a> {
    Blank,
    Fence { marker: &'a str, lang: Option<String> },
    MathFence,
    Item { ordered: Option<u64>, width: usize, rest: &'a str },
    Quote { rest: &'a str },
    HtmlStart,
    Heading,
    Text,
}

fn classify(line: &str) -> LineClass<'_> {
    static ITEM_REGEX: OnceLock<Regex> = OnceLock::new();
    static HTML_REGEX: OnceLock<Regex> = OnceLock::new();
    let item_regex = ITEM_REGEX.get_or_init(|| {
        Regex::new(r"^( {0,3})(?:([-+*])|(\d{1,9})[.)])(?: +|$)").expect("Invalid list item regex")
    });
    let html_regex = HTML_REGEX.get_or_init(|| {
        Regex::new(
            r"(?i)^ {0,3}<(?:!--|/?(?:address|article|aside|blockquote|details|dialog|div|dl|fieldset|figcaption|figure|footer|form|h[1-6]|header|hr|li|main|nav|ol|p|pre|section|summary|table|ul)(?:\s|/?>|$))",
        )
        .expect("Invalid HTML block regex")
    });

    let trimmed = line.trim_start_matches(' ');
    let indent = line.len() - trimmed.len();
    if line.trim().is_empty() {
        return LineClass::Blank;
    }
    if indent <= 3 {
        for marker in ["```", "~~~"] {
            if trimmed.starts_with(marker) {
                let run = trimmed.bytes().take_while(|&b| b == marker.as_bytes()[0]).count();
                let lang = trimmed[run..].split_whitespace().next().map(str::to_string);
                return LineClass::Fence {
                    marker: &trimmed[..run],
                    lang,
                };
            }
        }
        if trimmed.trim_end() == "$$" {
            return LineClass::MathFence;
        }
        if let Some(rest) = trimmed.strip_prefix('>') {
            return LineClass::Quote {
                rest: rest.strip_prefix(' ').unwrap_or(rest),
            };
        }
        if trimmed.starts_with('#') {
            let hashes = trimmed.bytes().take_while(|&b| b == b'#').count();
            if hashes <= 6 && trimmed[hashes..].chars().next().is_none_or(|c| c == ' ' || c == '\t') {
                return LineClass::Heading;
            }
        }
    }
    if let Some(caps) = item_regex.captures(line) {
        let width = caps.get(0).map_or(0, |m| m.end());
        let ordered = caps.get(3).and_then(|d| d.as_str().parse().ok());
        if caps.get(2).is_some() || ordered.is_some() {
            return LineClass::Item {
                ordered,
                width,
                rest: &line[width..],
            };
        }
    }
    if html_regex.is_match(line) {
        return LineClass::HtmlStart;
    }
    LineClass::Text
}

fn is_table_delimiter(line: &str) -> bool {
    static DELIMITER_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = DELIMITER_REGEX.get_or_init(|| {
        Regex::new(r"^\s*\|?\s*:?-+:?\s*(?:\|\s*:?-+:?\s*)*\|?\s*$").expect("Invalid table delimiter regex")
    });
    line.contains('|') && re.is_match(line)
}

fn split_row(line: &str) -> Vec<String> {
    let inner = line.trim();
    let inner = inner.strip_prefix('|').unwrap_or(inner);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|c| c.trim().to_string()).collect()
}

#[derive(Debug)]
enum Leaf {
    None,
    Paragraph(Vec<String>),
    Quote(Vec<String>),
    Item {
        ordered: Option<u64>,
        width: usize,
        lines: Vec<String>,
    },
    Fence {
        marker: String,
        lang: Option<String>,
        lines: Vec<String>,
    },
    Math(Vec<String>),
    Html(Vec<String>),
    Table {
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

/// Groups classified lines into document blocks.
struct BlockGrouper {
    leaf: Leaf,
    out: DocumentBuilder,
}

impl BlockGrouper {
    fn new() -> Self {
        Self {
            leaf: Leaf::None,
            out: DocumentBuilder::new(),
        }
    }

    fn push(&mut self, line: &str) {
        let class = classify(line);
        match &mut self.leaf {
            Leaf::Fence { marker, lines, .. } => {
                let closes = matches!(&class, LineClass::Fence { marker: m, lang: None } if m.starts_with(marker.as_str()));
                if closes {
                    self.flush();
                } else {
                    lines.push(line.to_string());
                }
                return;
            }
            Leaf::Math(lines) => {
                if class == LineClass::MathFence {
                    self.flush();
                } else {
                    lines.push(line.to_string());
                }
                return;
            }
            Leaf::Html(lines) if class != LineClass::Blank => {
                lines.push(line.to_string());
                return;
            }
            Leaf::Table { rows, .. } if class == LineClass::Text && line.contains('|') => {
                rows.push(split_row(line));
                return;
            }
            Leaf::Quote(lines) => {
                if let LineClass::Quote { rest } = class {
                    lines.push(rest.to_string());
                    return;
                }
            }
            Leaf::Item { width, lines, .. } => {
                let indent = line.len() - line.trim_start_matches(' ').len();
                if class != LineClass::Blank && indent >= *width {
                    lines.push(line[*width..].to_string());
                    return;
                }
            }
            Leaf::Paragraph(lines) => match class {
                LineClass::Text if lines.len() == 1 && lines[0].contains('|') && is_table_delimiter(line) => {
                    let header = split_row(&lines[0]);
                    self.leaf = Leaf::Table {
                        header,
                        rows: Vec::new(),
                    };
                    return;
                }
                LineClass::Text => {
                    lines.push(line.to_string());
                    return;
                }
                _ => {}
            },
            _ => {}
        }

        self.flush();
        self.open(class, line);
    }

    fn open(&mut self, class: LineClass<'_>, line: &str) {
        self.leaf = match class {
            LineClass::Blank => Leaf::None,
            LineClass::Fence { marker, lang } => Leaf::Fence {
                marker: marker.to_string(),
                lang,
                lines: Vec::new(),
            },
            LineClass::MathFence => Leaf::Math(Vec::new()),
            LineClass::Item {
                ordered,
                width,
                rest,
            } => Leaf::Item {
                ordered,
                width,
                lines: vec![rest.to_string()],
            },
            LineClass::Quote { rest } => Leaf::Quote(vec![rest.to_string()]),
            LineClass::HtmlStart => Leaf::Html(vec![line.to_string()]),
            LineClass::Heading => {
                self.out.text_block(NodeKind::Paragraph, line.trim_start_matches(' '));
                Leaf::None
            }
            LineClass::Text => Leaf::Paragraph(vec![line.to_string()]),
        };
    }

    fn flush(&mut self) {
        match std::mem::replace(&mut self.leaf, Leaf::None) {
            Leaf::None => {}
            Leaf::Paragraph(lines) => self.out.text_block(NodeKind::Paragraph, &lines.join("\n")),
            Leaf::Quote(lines) => self.out.text_block(NodeKind::BlockQuote, &lines.join("\n")),
            Leaf::Item { ordered, lines, .. } => {
                self.out
                    .text_block(NodeKind::ListItem { ordered }, &lines.join("\n"))
            }
            Leaf::Fence { lang, lines, .. } => {
                self.out
                    .text_block(NodeKind::CodeBlock { lang }, &lines.join("\n"))
            }
            Leaf::Math(lines) => self.out.text_block(NodeKind::MathBlock, &lines.join("\n")),
            Leaf::Html(lines) => self.out.text_block(NodeKind::HtmlBlock, &lines.join("\n")),
            Leaf::Table { header, rows } => self.out.table(&header, &rows),
        }
    }

    fn finish(mut self) -> Document {
        self.flush();
        self.out.finish()
    }
}

/// The part of a markup the lexer reads literally: code, math, raw HTML,
/// footnote labels, image text and link destinations.
fn literal_zone(m: &Markup, text: &str, base: usize) -> Option<Span> {
    match (&m.kind, m.punctuation.as_slice()) {
        (
            MarkupKind::CodeSpan
            | MarkupKind::InlineMath { .. }
            | MarkupKind::Html { .. }
            | MarkupKind::FootnoteRef { .. }
            | MarkupKind::Image { .. },
            _,
        ) => Some(m.content()),
        (MarkupKind::Link { .. }, []) => Some(m.context),
        (MarkupKind::Link { .. }, [_, gap, close]) => Some(Span::new(gap.end, close.start)),
        (MarkupKind::Link { .. }, [open, _]) if text.as_bytes().get(open.start.saturating_sub(base)) == Some(&b'<') => {
            Some(m.content())
        }
        _ => None,
    }
}

impl Document {
    /// Builds a document from Markdown source. Never fails: unrecognised
    /// lines become paragraph text.
    pub fn from_markdown(src: &str) -> Self {
        let normalized = src.replace("\r\n", "\n");
        let mut grouper = BlockGrouper::new();
        for line in normalized.lines() {
            grouper.push(line);
        }
        grouper.finish()
    }

    /// Writes the document back out as Markdown, one block at a time.
    pub fn to_markdown(&self) -> String {
        self.write_markdown(|b| self.slice(b.span))
    }

    /// Like [`Document::to_markdown`], but inline text is rebuilt from
    /// `result`: recorded punctuation is written as is, while any other
    /// character that would open inline syntax is backslash-escaped. A
    /// markup missing from `result` therefore serializes as literal text.
    pub fn serialize_with(&self, result: &ParseResult) -> String {
        self.write_markdown(|b| self.rebuild_block_text(b, result))
    }

    fn rebuild_block_text(&self, block: &TextBlock, result: &ParseResult) -> String {
        let text = self.slice(block.span);
        if !block.kind.has_inline_syntax() {
            return text;
        }
        let base = block.span.start;
        let mut verbatim = vec![false; text.len()];
        for m in result.for_node(block.id) {
            let zones = m.punctuation.iter().copied().chain(literal_zone(m, &text, base));
            for zone in zones {
                let start = zone.start.saturating_sub(base).min(text.len());
                let end = zone.end.saturating_sub(base).clamp(start, text.len());
                verbatim[start..end].fill(true);
            }
        }

        let mut out = String::with_capacity(text.len());
        let mut chars = text.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if verbatim[i] {
                out.push(c);
                continue;
            }
            if c == '\\' {
                if let Some(&(_, next)) = chars.peek() {
                    if next.is_ascii_punctuation() {
                        out.push(c);
                        out.push(next);
                        chars.next();
                        continue;
                    }
                }
            }
            if INLINE_SYNTAX_CHARS.contains(&c) {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    fn write_markdown(&self, text_of: impl Fn(&TextBlock) -> String) -> String {
        let mut out = String::new();
        let mut prev: Option<&Block> = None;
        for block in self.blocks() {
            if let Some(prev) = prev {
                out.push_str(separator(prev, block));
            }
            match block {
                Block::Text(t) => write_text_block(&mut out, &t.kind, &text_of(t)),
                Block::Table(table) => write_table(&mut out, table, &text_of),
            }
            prev = Some(block);
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

fn separator(prev: &Block, next: &Block) -> &'static str {
    let is_item = |b: &Block| {
        matches!(
            b,
            Block::Text(TextBlock {
                kind: NodeKind::ListItem { .. },
                ..
            })
        )
    };
    if is_item(prev) && is_item(next) {
        "\n"
    } else {
        "\n\n"
    }
}

fn write_text_block(out: &mut String, kind: &NodeKind, text: &str) {
    match kind {
        NodeKind::Paragraph | NodeKind::HtmlBlock | NodeKind::TableCell { .. } => out.push_str(text),
        NodeKind::ListItem { ordered } => {
            let marker = match ordered {
                Some(n) => format!("{n}. "),
                None => "- ".to_string(),
            };
            let pad = " ".repeat(marker.len());
            for (i, line) in text.split('\n').enumerate() {
                if i == 0 {
                    out.push_str(&marker);
                } else {
                    out.push('\n');
                    out.push_str(&pad);
                }
                out.push_str(line);
            }
        }
        NodeKind::BlockQuote => {
            let quoted: Vec<String> = text
                .split('\n')
                .map(|l| if l.is_empty() { ">".to_string() } else { format!("> {l}") })
                .collect();
            out.push_str(&quoted.join("\n"));
        }
        NodeKind::CodeBlock { lang } => {
            out.push_str("```");
            out.push_str(lang.as_deref().unwrap_or(""));
            out.push('\n');
            if !text.is_empty() {
                out.push_str(text);
                out.push('\n');
            }
            out.push_str("```");
        }
        NodeKind::MathBlock => {
            out.push_str("$$\n");
            if !text.is_empty() {
                out.push_str(text);
                out.push('\n');
            }
            out.push_str("$$");
        }
    }
}

fn write_table(out: &mut String, table: &Table, text_of: &impl Fn(&TextBlock) -> String) {
    let row = |cells: &[TextBlock]| {
        let texts: Vec<String> = cells.iter().map(text_of).collect();
        format!("| {} |", texts.join(" | "))
    };
    out.push_str(&row(&table.header));
    out.push('\n');
    let delimiter = vec!["---"; table.header.len()].join(" | ");
    out.push_str(&format!("| {delimiter} |"));
    for cells in &table.rows {
        out.push('\n');
        out.push_str(&row(cells));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn kinds(doc: &Document) -> Vec<String> {
        doc.blocks()
            .iter()
            .map(|b| match b {
                Block::Text(t) => format!("{}:{}", t.kind.name(), doc.slice(t.span)),
                Block::Table(t) => format!("table:{}x{}", t.header.len(), t.rows.len()),
            })
            .collect()
    }

    #[test]
    fn classifies_block_types() {
        let src = "# Title\n\nSome text\nmore\n\n- one\n- two\n  cont\n\n2. second\n\n> quoted\n> again\n\n```rust\nfn x() {}\n```\n\n$$\nx^2\n$$\n\n<div>\nhi\n</div>\n\n| a | b |\n| --- | --- |\n| 1 | 2 |";
        let doc = Document::from_markdown(src);
        assert_eq!(
            kinds(&doc),
            vec![
                "paragraph:# Title",
                "paragraph:Some text\nmore",
                "bullet_item:one",
                "bullet_item:two\ncont",
                "ordered_item:second",
                "blockquote:quoted\nagain",
                "code_block:fn x() {}",
                "math_block:x^2",
                "html_block:<div>\nhi\n</div>",
                "table:2x1",
            ]
        );
        assert!(doc.layout_is_consistent());
    }

    #[rstest]
    #[case("Plain paragraph\n")]
    #[case("# Heading\n\nText with **bold** and *em*\n")]
    #[case("- a\n- b\n\n1. c\n")]
    #[case("> quote\n>\n> more\n")]
    #[case("```rust\nlet x = 1;\n```\n")]
    #[case("$$\n\\frac{1}{2}\n$$\n")]
    #[case("| h1 | h2 |\n| --- | --- |\n| a | b |\n")]
    fn markdown_round_trips(#[case] src: &str) {
        assert_eq!(Document::from_markdown(src).to_markdown(), src);
    }

    #[test]
    fn empty_source_is_one_empty_paragraph() {
        let doc = Document::from_markdown("");
        assert_eq!(kinds(&doc), vec!["paragraph:"]);
        assert_eq!(doc.to_markdown(), "");
    }

    #[test]
    fn setext_underline_stays_in_paragraph() {
        let doc = Document::from_markdown("Title\n---\n");
        assert_eq!(kinds(&doc), vec!["paragraph:Title\n---"]);
    }

    #[test]
    fn unclosed_fence_runs_to_end() {
        let doc = Document::from_markdown("```\ncode\n\nmore");
        assert_eq!(kinds(&doc), vec!["code_block:code\n\nmore"]);
    }

    #[test]
    fn serializing_without_markups_escapes_inline_syntax() {
        let doc = Document::from_markdown("a *b* [c] c\\_d\n\n```\n*raw*\n```\n");
        assert_eq!(
            doc.serialize_with(&ParseResult::default()),
            "a \\*b\\* \\[c\\] c\\_d\n\n```\n*raw*\n```\n"
        );
    }
}
