//! # Range Resolver
//!
//! Walks one block's token tree and produces flat, absolutely positioned
//! [`Markup`]s plus at most one pending structural transform.
//!
//! - Marker spans come from the static [`punctuation::PUNCTUATION`] table;
//!   links and images additionally get their label/destination separator.
//! - Nested tokens are resolved with the enclosing markup types excluded, so
//!   a type is never re-detected inside itself.
//! - Inline HTML is balanced through one [`html::HtmlStack`] per block.
//! - Paragraphs are matched against [`shortcuts::SHORTCUTS`]; HTML blocks
//!   that no longer lex as HTML ask to become paragraphs again.

pub mod html;
pub mod punctuation;
pub mod shortcuts;

use markdown_livesync_config::SyntaxConfig;

use crate::editing::{NodeId, NodeKind};
use crate::parsing::markup::{Markup, MarkupKind, MarkupTag, StructuralTransformRequest, TransformTarget, sort_markups};
use crate::parsing::rope::Span;
use crate::parsing::tokenizer::{LinkStyle, Token, TokenKind, tokenize};
use html::{HtmlElement, HtmlStack, HtmlTag};
use punctuation::{PunctuationRule, heading_level, rule};

/// One text block handed to the resolver.
#[derive(Debug, Clone, Copy)]
pub struct BlockInput<'a> {
    pub id: NodeId,
    pub kind: &'a NodeKind,
    /// Absolute offset of the block text.
    pub start: usize,
    pub text: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockParse {
    pub markups: Vec<Markup>,
    pub transforms: Vec<StructuralTransformRequest>,
    /// Unbalanced HTML tags, left as plain text.
    pub malformed: Vec<Span>,
}

/// Tokenizes and resolves one block.
pub fn resolve_block(block: BlockInput<'_>, syntax: &SyntaxConfig) -> BlockParse {
    match block.kind {
        NodeKind::CodeBlock { .. } | NodeKind::MathBlock => BlockParse::default(),
        NodeKind::HtmlBlock => resolve_html_block(block, syntax),
        NodeKind::Paragraph => {
            let tokens = tokenize(block.text, syntax);
            let mut parse = resolve_tokens(block, &tokens);
            if let Some((shortcut, target, token)) = shortcuts::detect(&tokens, block.text) {
                log::debug!("{:?} matches the {} shortcut", block.id, shortcut.name);
                parse.transforms.push(StructuralTransformRequest {
                    target,
                    anchor: block.start,
                    node: block.id,
                    token: Some(token.clone()),
                    requires_caret_at_end: shortcut.requires_caret_at_end,
                });
            }
            parse
        }
        NodeKind::ListItem { .. } | NodeKind::BlockQuote | NodeKind::TableCell { .. } => {
            resolve_tokens(block, &tokenize(block.text, syntax))
        }
    }
}

/// The whole block renders as one HTML widget while it still lexes as an
/// HTML block; otherwise it asks to be demoted.
fn resolve_html_block(block: BlockInput<'_>, syntax: &SyntaxConfig) -> BlockParse {
    let tokens = tokenize(block.text, syntax);
    if tokens
        .first()
        .is_some_and(|t| t.kind == TokenKind::HtmlBlock && t.span.start == 0)
    {
        return BlockParse {
            markups: vec![Markup {
                kind: MarkupKind::Html {
                    code: block.text.to_string(),
                    style: None,
                    inherited: Vec::new(),
                },
                node: block.id,
                context: Span::new(block.start, block.start + block.text.len()),
                punctuation: Vec::new(),
            }],
            ..BlockParse::default()
        };
    }
    BlockParse {
        transforms: vec![StructuralTransformRequest {
            target: TransformTarget::Node(NodeKind::Paragraph),
            anchor: block.start,
            node: block.id,
            token: None,
            requires_caret_at_end: false,
        }],
        ..BlockParse::default()
    }
}

fn resolve_tokens(block: BlockInput<'_>, tokens: &[Token]) -> BlockParse {
    let mut walker = Walker {
        node: block.id,
        base: block.start,
        html: HtmlStack::new(block.text, block.start),
        markups: Vec::new(),
        malformed: Vec::new(),
    };
    walker.walk(tokens, &mut Vec::new());
    let Walker {
        mut markups,
        mut malformed,
        html,
        ..
    } = walker;
    malformed.extend(html.finish());
    sort_markups(&mut markups);
    BlockParse {
        markups,
        transforms: Vec::new(),
        malformed,
    }
}

struct Walker<'a> {
    node: NodeId,
    base: usize,
    html: HtmlStack<'a>,
    markups: Vec<Markup>,
    malformed: Vec<Span>,
}

impl Walker<'_> {
    fn walk(&mut self, tokens: &[Token], excluded: &mut Vec<MarkupTag>) {
        for token in tokens {
            let context = token.span.offset(self.base);
            match &token.kind {
                TokenKind::Text
                | TokenKind::SoftBreak
                | TokenKind::HardBreak
                | TokenKind::Rule
                | TokenKind::CodeBlock { .. }
                | TokenKind::MathBlock { .. }
                | TokenKind::HtmlBlock => {}
                TokenKind::Table { .. } | TokenKind::List { .. } | TokenKind::BlockQuote => {
                    self.walk(&token.children, excluded)
                }
                TokenKind::Html => {
                    self.html_tag(token, context, excluded);
                    continue;
                }
                _ => self.markup(token, context, excluded),
            }
            if !self.html.is_empty() {
                self.html.absorb(context.end);
            }
        }
    }

    fn markup(&mut self, token: &Token, context: Span, excluded: &mut Vec<MarkupTag>) {
        let Some(kind) = markup_kind(token) else {
            return;
        };
        let tag = kind.tag();
        if excluded.contains(&tag) {
            self.walk(&token.children, excluded);
            return;
        }
        let Some(rule) = rule(tag) else {
            return;
        };
        let punctuation = match &token.kind {
            TokenKind::Link { style, .. } | TokenKind::Image { style, .. } => {
                bracket_punctuation(rule, token, context, *style)
            }
            _ => rule.spans(context, &token.raw),
        };
        self.markups.push(Markup {
            kind,
            node: self.node,
            context,
            punctuation,
        });
        if rule.parse_inside {
            excluded.push(tag);
            self.walk(&token.children, excluded);
            excluded.pop();
        }
    }

    fn html_tag(&mut self, token: &Token, context: Span, excluded: &[MarkupTag]) {
        let Some(tag) = HtmlTag::parse(&token.raw) else {
            return;
        };
        if tag.closing {
            match self.html.close(&tag, context) {
                Ok((element, dropped)) => {
                    self.malformed.extend(dropped);
                    self.push_html(element);
                }
                Err(span) => self.malformed.push(span),
            }
        } else if let Some(element) = self.html.open(tag, context, excluded) {
            self.push_html(element);
        }
    }

    fn push_html(&mut self, element: HtmlElement) {
        self.markups.push(Markup {
            kind: MarkupKind::Html {
                code: element.code,
                style: element.style,
                inherited: element.inherited,
            },
            node: self.node,
            context: element.context,
            punctuation: element.punctuation,
        });
    }
}

fn markup_kind(token: &Token) -> Option<MarkupKind> {
    Some(match &token.kind {
        TokenKind::Strong => MarkupKind::Strong,
        TokenKind::Em => MarkupKind::Em,
        TokenKind::Del => MarkupKind::Del,
        TokenKind::CodeSpan => MarkupKind::CodeSpan,
        TokenKind::Heading { .. } => MarkupKind::Heading {
            level: heading_level(&token.raw),
        },
        TokenKind::Link { href, title, style } => MarkupKind::Link {
            href: href.clone(),
            title: title.clone(),
            text: match style {
                LinkStyle::Inline | LinkStyle::Reference => label_text(token, 1).to_string(),
                LinkStyle::Angle => token.raw.trim_start_matches('<').trim_end_matches('>').to_string(),
                LinkStyle::Bare => token.raw.clone(),
            },
        },
        TokenKind::Image { href, title, .. } => MarkupKind::Image {
            href: href.clone(),
            title: title.clone(),
            alt: label_text(token, 2).to_string(),
        },
        TokenKind::InlineMath => {
            let run = token.raw.bytes().take_while(|&b| b == b'$').count();
            let inner = token
                .raw
                .get(run..token.raw.len().saturating_sub(run))
                .unwrap_or("");
            MarkupKind::InlineMath {
                expr: inner.to_string(),
            }
        }
        TokenKind::FootnoteRef { label } => MarkupKind::FootnoteRef {
            label: label.clone(),
        },
        _ => return None,
    })
}

/// Index into `token.raw` of the `]` closing a link or image label.
fn label_end(token: &Token, open: usize) -> Option<usize> {
    let after_children = token
        .children
        .last()
        .map_or(open, |c| c.span.end.saturating_sub(token.span.start))
        .max(open);
    token
        .raw
        .get(after_children..)?
        .find(']')
        .map(|i| after_children + i)
}

fn label_text(token: &Token, open: usize) -> &str {
    label_end(token, open)
        .and_then(|end| token.raw.get(open..end))
        .unwrap_or("")
}

/// `[`, `](`, `)` for inline links; `[` plus the remainder for reference
/// links; `<`, `>` for angle autolinks; nothing for bare links. Images use
/// the same shapes with `![`.
fn bracket_punctuation(rule: &PunctuationRule, token: &Token, context: Span, style: LinkStyle) -> Vec<Span> {
    let (open, close) = rule.count.resolve(&token.raw);
    match style {
        LinkStyle::Bare => Vec::new(),
        LinkStyle::Angle => vec![
            Span::new(context.start, context.start + 1),
            Span::new(context.end - 1, context.end),
        ],
        LinkStyle::Inline | LinkStyle::Reference => {
            let opening = Span::new(context.start, context.start + open);
            let Some(end) = label_end(token, open) else {
                return vec![opening];
            };
            let bracket = context.start + end;
            if style == LinkStyle::Inline && token.raw[end..].starts_with("](") {
                vec![
                    opening,
                    Span::new(bracket, bracket + 2),
                    Span::new(context.end - close, context.end),
                ]
            } else {
                vec![opening, Span::new(bracket, context.end)]
            }
        }
    }
}
