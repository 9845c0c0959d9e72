use std::sync::OnceLock;

use regex::Regex;

use crate::parsing::rope::Span;
use crate::parsing::tokenizer::{LinkStyle, Token, TokenKind};

/// Splits bare `https://…` and `www.…` URLs out of a text token.
///
/// The lexer only knows `<angle>` autolinks. Trailing sentence punctuation
/// and unbalanced closing parentheses are left outside the link.
pub fn split_autolinks(token: Token) -> Vec<Token> {
    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = URL_REGEX
        .get_or_init(|| Regex::new(r"\b(?:https?://|www\.)[^\s<>]+").expect("Invalid autolink regex"));

    if token.kind != TokenKind::Text || !re.is_match(&token.raw) {
        return vec![token];
    }

    let mut out = Vec::new();
    let mut text_start = 0;
    for m in re.find_iter(&token.raw) {
        let url = trim_trailing(m.as_str());
        if url.ends_with("://") || url.len() <= "www.".len() {
            continue;
        }
        let from = m.start();
        let to = from + url.len();
        push_text(&mut out, &token, text_start, from);
        let span = Span::new(token.span.start + from, token.span.start + to);
        let href = if url.starts_with("www.") {
            format!("http://{url}")
        } else {
            url.to_string()
        };
        out.push(Token {
            kind: TokenKind::Link {
                href,
                title: String::new(),
                style: LinkStyle::Bare,
            },
            span,
            raw: url.to_string(),
            children: vec![Token {
                kind: TokenKind::Text,
                span,
                raw: url.to_string(),
                children: Vec::new(),
            }],
        });
        text_start = to;
    }

    push_text(&mut out, &token, text_start, token.raw.len());
    out
}

fn trim_trailing(mut url: &str) -> &str {
    loop {
        let Some(last) = url.chars().last() else {
            return url;
        };
        let unbalanced_paren = last == ')' && url.matches(')').count() > url.matches('(').count();
        if matches!(last, '.' | ',' | ':' | ';' | '!' | '?' | '*' | '_' | '~' | '\'' | '"') || unbalanced_paren {
            url = &url[..url.len() - last.len_utf8()];
        } else {
            return url;
        }
    }
}

fn push_text(out: &mut Vec<Token>, token: &Token, from: usize, to: usize) {
    if to > from {
        out.push(Token {
            kind: TokenKind::Text,
            span: Span::new(token.span.start + from, token.span.start + to),
            raw: token.raw[from..to].to_string(),
            children: Vec::new(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(raw: &str, start: usize) -> Token {
        Token {
            kind: TokenKind::Text,
            span: Span::new(start, start + raw.len()),
            raw: raw.to_string(),
            children: Vec::new(),
        }
    }

    fn summary(parts: &[Token]) -> Vec<(&str, usize, usize)> {
        parts
            .iter()
            .map(|t| (t.raw.as_str(), t.span.start, t.span.end))
            .collect()
    }

    #[test]
    fn url_splits_surrounding_text() {
        let parts = split_autolinks(text("see https://example.com/x now", 2));
        assert_eq!(
            summary(&parts),
            vec![("see ", 2, 6), ("https://example.com/x", 6, 27), (" now", 27, 31)]
        );
        assert_eq!(
            parts[1].kind,
            TokenKind::Link {
                href: "https://example.com/x".into(),
                title: String::new(),
                style: LinkStyle::Bare,
            }
        );
    }

    #[test]
    fn trailing_punctuation_stays_text() {
        let parts = split_autolinks(text("(at www.a.io/b_(c)), ok.", 0));
        assert_eq!(
            summary(&parts),
            vec![("(at ", 0, 4), ("www.a.io/b_(c)", 4, 18), ("), ok.", 18, 24)]
        );
        assert!(matches!(
            &parts[1].kind,
            TokenKind::Link { href, .. } if href == "http://www.a.io/b_(c)"
        ));
    }

    #[test]
    fn scheme_alone_is_not_a_link() {
        let parts = split_autolinks(text("try https:// or xhttp://a.b", 0));
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].kind, TokenKind::Text);
    }
}
