//! # Tokenizer Adapter
//!
//! Lexes the text of one block into a nested token tree with block-relative
//! spans. `pulldown-cmark` does the lexing; this module folds its offset
//! events into [`Token`]s:
//!
//! - paragraph, list item and table row wrappers are flattened away
//! - adjacent text is coalesced into one token
//! - block constructs become structural tokens carrying the data a
//!   promotion needs (table cells, list start, fence language, body)
//! - `[^label]` references, bare URLs and `$$` math blocks are layered on
//!   top
//!
//! Tokenizing never fails: anything the lexer does not recognise is text.

use markdown_livesync_config::SyntaxConfig;
use pulldown_cmark::{CodeBlockKind, Event, LinkType, Options, Parser, Tag, TagEnd};

use crate::parsing::inline::{split_autolinks, split_footnotes};
use crate::parsing::rope::Span;

/// How a link or image was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStyle {
    /// `[label](dest "title")`
    Inline,
    /// `[label][ref]`, `[label][]` or `[label]`
    Reference,
    /// `<https://example.com>`
    Angle,
    /// A URL written straight into text, found by
    /// [`split_autolinks`](crate::parsing::inline::split_autolinks).
    Bare,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    SoftBreak,
    HardBreak,
    Strong,
    Em,
    Del,
    CodeSpan,
    InlineMath,
    Heading {
        setext: bool,
    },
    Link {
        href: String,
        title: String,
        style: LinkStyle,
    },
    Image {
        href: String,
        title: String,
        style: LinkStyle,
    },
    FootnoteRef {
        label: String,
    },
    /// One inline HTML tag (or comment).
    Html,
    Table {
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    List {
        ordered: Option<u64>,
    },
    BlockQuote,
    CodeBlock {
        lang: Option<String>,
        body: String,
    },
    MathBlock {
        expr: String,
    },
    HtmlBlock,
    Rule,
}

/// One lexed construct. `span` is relative to the block start and `raw` is
/// the exact source it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub raw: String,
    pub children: Vec<Token>,
}

pub fn options(syntax: &SyntaxConfig) -> Options {
    let mut opts = Options::empty();
    if syntax.tables {
        opts.insert(Options::ENABLE_TABLES);
    }
    if syntax.strikethrough {
        opts.insert(Options::ENABLE_STRIKETHROUGH);
    }
    if syntax.math {
        opts.insert(Options::ENABLE_MATH);
    }
    if syntax.footnotes {
        opts.insert(Options::ENABLE_FOOTNOTES);
    }
    opts
}

struct Frame {
    kind: Option<TokenKind>,
    start: usize,
    children: Vec<Token>,
}

/// Tokenizes the text of one block.
pub fn tokenize(text: &str, syntax: &SyntaxConfig) -> Vec<Token> {
    if syntax.math {
        if let Some(token) = math_block(text) {
            return vec![token];
        }
    }

    let mut stack = vec![Frame {
        kind: None,
        start: 0,
        children: Vec::new(),
    }];
    let mut table_rows: Vec<Vec<String>> = Vec::new();

    for (event, range) in Parser::new_ext(text, options(syntax)).into_offset_iter() {
        let span = Span::new(range.start, range.end);
        match event {
            Event::Start(tag) => {
                if matches!(tag, Tag::TableHead | Tag::TableRow) {
                    table_rows.push(Vec::new());
                }
                stack.push(Frame {
                    kind: start_kind(&tag, &text[range.clone()]),
                    start: range.start,
                    children: Vec::new(),
                });
            }
            Event::End(end) => {
                if stack.len() < 2 {
                    continue;
                }
                if end == TagEnd::TableCell {
                    if let Some(row) = table_rows.last_mut() {
                        row.push(cell_text(&text[range.clone()]));
                    }
                }
                let Some(frame) = stack.pop() else { continue };
                let span = trim_newlines(text, Span::new(frame.start, span.end));
                let token = match frame.kind {
                    None => {
                        push_all(&mut stack, frame.children);
                        continue;
                    }
                    Some(TokenKind::Table { .. }) => {
                        let mut rows = std::mem::take(&mut table_rows).into_iter();
                        let header = rows.next().unwrap_or_default();
                        Token {
                            kind: TokenKind::Table {
                                header,
                                rows: rows.collect(),
                            },
                            span,
                            raw: text[span.start..span.end].to_string(),
                            children: coalesce(text, frame.children),
                        }
                    }
                    Some(TokenKind::CodeBlock { lang, .. }) => {
                        let body: String = frame.children.iter().map(|c| c.raw.as_str()).collect();
                        Token {
                            kind: TokenKind::CodeBlock {
                                lang,
                                body: body.strip_suffix('\n').unwrap_or(&body).to_string(),
                            },
                            span,
                            raw: text[span.start..span.end].to_string(),
                            children: Vec::new(),
                        }
                    }
                    Some(TokenKind::HtmlBlock) => Token {
                        kind: TokenKind::HtmlBlock,
                        span,
                        raw: text[span.start..span.end].to_string(),
                        children: Vec::new(),
                    },
                    Some(kind) => Token {
                        kind,
                        span,
                        raw: text[span.start..span.end].to_string(),
                        children: coalesce(text, frame.children),
                    },
                };
                push(&mut stack, token);
            }
            Event::Text(_) => push(&mut stack, leaf(text, TokenKind::Text, span)),
            Event::Code(_) => push(&mut stack, leaf(text, TokenKind::CodeSpan, span)),
            Event::InlineMath(_) | Event::DisplayMath(_) => {
                push(&mut stack, leaf(text, TokenKind::InlineMath, span))
            }
            Event::Html(_) | Event::InlineHtml(_) => {
                push(&mut stack, leaf(text, TokenKind::Html, span))
            }
            Event::FootnoteReference(label) => push(
                &mut stack,
                leaf(
                    text,
                    TokenKind::FootnoteRef {
                        label: label.to_string(),
                    },
                    span,
                ),
            ),
            Event::SoftBreak => push(&mut stack, leaf(text, TokenKind::SoftBreak, span)),
            Event::HardBreak => push(&mut stack, leaf(text, TokenKind::HardBreak, span)),
            Event::Rule => push(
                &mut stack,
                leaf(text, TokenKind::Rule, trim_newlines(text, span)),
            ),
            _ => {}
        }
    }

    while stack.len() > 1 {
        if let Some(frame) = stack.pop() {
            push_all(&mut stack, frame.children);
        }
    }
    let root = stack.pop().map(|f| f.children).unwrap_or_default();
    let mut tokens = coalesce(text, root);
    if syntax.footnotes {
        tokens = scan_text(tokens, split_footnotes, is_raw);
    }
    if syntax.autolinks {
        tokens = scan_text(tokens, split_autolinks, is_raw_or_link);
    }
    tokens
}

fn start_kind(tag: &Tag<'_>, raw: &str) -> Option<TokenKind> {
    Some(match tag {
        Tag::Strong => TokenKind::Strong,
        Tag::Emphasis => TokenKind::Em,
        Tag::Strikethrough => TokenKind::Del,
        Tag::Heading { .. } => TokenKind::Heading {
            setext: !raw.trim_start().starts_with('#'),
        },
        Tag::Link {
            link_type,
            dest_url,
            title,
            ..
        } => TokenKind::Link {
            href: dest_url.to_string(),
            title: title.to_string(),
            style: link_style(*link_type),
        },
        Tag::Image {
            link_type,
            dest_url,
            title,
            ..
        } => TokenKind::Image {
            href: dest_url.to_string(),
            title: title.to_string(),
            style: link_style(*link_type),
        },
        Tag::Table(_) => TokenKind::Table {
            header: Vec::new(),
            rows: Vec::new(),
        },
        Tag::List(start) => TokenKind::List { ordered: *start },
        Tag::BlockQuote(_) => TokenKind::BlockQuote,
        Tag::CodeBlock(kind) => TokenKind::CodeBlock {
            lang: match kind {
                CodeBlockKind::Fenced(info) => info
                    .split_whitespace()
                    .next()
                    .map(str::to_string),
                CodeBlockKind::Indented => None,
            },
            body: String::new(),
        },
        Tag::HtmlBlock => TokenKind::HtmlBlock,
        _ => return None,
    })
}

fn link_style(link_type: LinkType) -> LinkStyle {
    match link_type {
        LinkType::Inline => LinkStyle::Inline,
        LinkType::Autolink | LinkType::Email => LinkStyle::Angle,
        _ => LinkStyle::Reference,
    }
}

fn leaf(text: &str, kind: TokenKind, span: Span) -> Token {
    Token {
        kind,
        span,
        raw: text[span.start..span.end].to_string(),
        children: Vec::new(),
    }
}

fn push(stack: &mut [Frame], token: Token) {
    if let Some(top) = stack.last_mut() {
        top.children.push(token);
    }
}

fn push_all(stack: &mut [Frame], tokens: Vec<Token>) {
    if let Some(top) = stack.last_mut() {
        top.children.extend(tokens);
    }
}

fn trim_newlines(text: &str, mut span: Span) -> Span {
    let bytes = text.as_bytes();
    while span.end > span.start && matches!(bytes[span.end - 1], b'\n' | b'\r') {
        span.end -= 1;
    }
    span
}

fn cell_text(raw: &str) -> String {
    raw.trim().trim_matches('|').trim().to_string()
}

/// Merges neighbouring text tokens, absorbing any gap between them (escape
/// backslashes the lexer reports no event for).
fn coalesce(text: &str, tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        match out.last_mut() {
            Some(prev) if prev.kind == TokenKind::Text && token.kind == TokenKind::Text => {
                prev.span.end = token.span.end;
                prev.raw = text[prev.span.start..prev.span.end].to_string();
            }
            _ => out.push(token),
        }
    }
    out
}

/// Re-splits every text token with `split`, descending into children unless
/// `opaque` holds for the parent.
fn scan_text(tokens: Vec<Token>, split: fn(Token) -> Vec<Token>, opaque: fn(&TokenKind) -> bool) -> Vec<Token> {
    tokens
        .into_iter()
        .flat_map(|mut token| {
            if token.kind == TokenKind::Text {
                return split(token);
            }
            if !opaque(&token.kind) {
                token.children = scan_text(std::mem::take(&mut token.children), split, opaque);
            }
            vec![token]
        })
        .collect()
}

fn is_raw(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::CodeBlock { .. } | TokenKind::HtmlBlock | TokenKind::MathBlock { .. }
    )
}

fn is_raw_or_link(kind: &TokenKind) -> bool {
    is_raw(kind) || matches!(kind, TokenKind::Link { .. } | TokenKind::Image { .. })
}

/// `$$` on its own, or `$$` fences around a body.
fn math_block(text: &str) -> Option<Token> {
    let trimmed = text.trim_end_matches('\n');
    let expr = match trimmed {
        "$$" | "$$\n$$" => "",
        _ => trimmed.strip_prefix("$$\n")?.strip_suffix("\n$$")?,
    };
    Some(Token {
        kind: TokenKind::MathBlock {
            expr: expr.to_string(),
        },
        span: Span::new(0, trimmed.len()),
        raw: trimmed.to_string(),
        children: Vec::new(),
    })
}
