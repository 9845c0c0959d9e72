use std::sync::OnceLock;

use regex::Regex;

use crate::editing::NodeKind;
use crate::parsing::markup::TransformTarget;
use crate::parsing::tokenizer::{Token, TokenKind};

/// A typed prefix that turns a paragraph into another block type.
pub struct Shortcut {
    pub name: &'static str,
    /// Only fires once the caret sits at the end of the block text.
    pub requires_caret_at_end: bool,
    matches: fn(&Token, &str) -> Option<TransformTarget>,
}

impl std::fmt::Debug for Shortcut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shortcut")
            .field("name", &self.name)
            .field("requires_caret_at_end", &self.requires_caret_at_end)
            .finish()
    }
}

/// Checked in order; the first match wins and the rest are skipped.
pub static SHORTCUTS: [Shortcut; 7] = [
    Shortcut {
        name: "table",
        requires_caret_at_end: false,
        matches: table,
    },
    Shortcut {
        name: "bullet_list",
        requires_caret_at_end: false,
        matches: bullet_list,
    },
    Shortcut {
        name: "ordered_list",
        requires_caret_at_end: false,
        matches: ordered_list,
    },
    Shortcut {
        name: "blockquote",
        requires_caret_at_end: false,
        matches: blockquote,
    },
    Shortcut {
        name: "code_block",
        requires_caret_at_end: true,
        matches: code_block,
    },
    Shortcut {
        name: "math_block",
        requires_caret_at_end: true,
        matches: math_block,
    },
    Shortcut {
        name: "html_block",
        requires_caret_at_end: false,
        matches: html_block,
    },
];

/// Matches the first block token of a paragraph against [`SHORTCUTS`].
pub fn detect<'t>(tokens: &'t [Token], text: &str) -> Option<(&'static Shortcut, TransformTarget, &'t Token)> {
    let first = tokens.first()?;
    if !text[..first.span.start.min(text.len())].trim().is_empty() {
        return None;
    }
    SHORTCUTS
        .iter()
        .find_map(|s| (s.matches)(first, text).map(|target| (s, target, first)))
}

/// Length of a leading list or quote marker including its single space.
pub fn marker_len(text: &str) -> Option<usize> {
    static MARKER_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = MARKER_REGEX.get_or_init(|| {
        Regex::new(r"^ {0,3}(?:[-+*]|\d{1,9}[.)]|>) ").expect("Invalid block marker regex")
    });
    re.find(text).map(|m| m.end())
}

fn table(token: &Token, text: &str) -> Option<TransformTarget> {
    let TokenKind::Table { header, .. } = &token.kind else {
        return None;
    };
    (!header.is_empty() && token.raw.trim() == text.trim()).then_some(TransformTarget::Table)
}

fn bullet_list(token: &Token, text: &str) -> Option<TransformTarget> {
    let TokenKind::List { ordered: None } = token.kind else {
        return None;
    };
    let marker = text.trim_start_matches(' ');
    let bullet = marker.starts_with("- ") || marker.starts_with("* ") || marker.starts_with("+ ");
    (bullet && marker_len(text).is_some())
        .then_some(TransformTarget::Node(NodeKind::ListItem { ordered: None }))
}

fn ordered_list(token: &Token, text: &str) -> Option<TransformTarget> {
    let TokenKind::List { ordered: Some(start) } = token.kind else {
        return None;
    };
    let digits = text.trim_start_matches(' ');
    (digits.starts_with(|c: char| c.is_ascii_digit()) && marker_len(text).is_some())
        .then_some(TransformTarget::Node(NodeKind::ListItem {
            ordered: Some(start),
        }))
}

fn blockquote(token: &Token, text: &str) -> Option<TransformTarget> {
    if token.kind != TokenKind::BlockQuote {
        return None;
    }
    (text.trim_start_matches(' ').starts_with("> ") && marker_len(text).is_some())
        .then_some(TransformTarget::Node(NodeKind::BlockQuote))
}

fn code_block(token: &Token, _text: &str) -> Option<TransformTarget> {
    let TokenKind::CodeBlock { lang, .. } = &token.kind else {
        return None;
    };
    let fence = token.raw.trim_start_matches(' ');
    (fence.starts_with("```") || fence.starts_with("~~~"))
        .then(|| TransformTarget::Node(NodeKind::CodeBlock { lang: lang.clone() }))
}

fn math_block(token: &Token, _text: &str) -> Option<TransformTarget> {
    matches!(token.kind, TokenKind::MathBlock { .. })
        .then_some(TransformTarget::Node(NodeKind::MathBlock))
}

fn html_block(token: &Token, _text: &str) -> Option<TransformTarget> {
    (token.kind == TokenKind::HtmlBlock).then_some(TransformTarget::Node(NodeKind::HtmlBlock))
}
