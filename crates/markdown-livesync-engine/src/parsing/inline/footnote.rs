use super::cursor::Cursor;
use crate::parsing::rope::Span;
use crate::parsing::tokenizer::{Token, TokenKind};

/// Splits `[^label]` footnote references out of a text token.
///
/// The lexer only reports references that have a matching definition in the
/// same input, which a single block rarely has; this scanner picks up the
/// rest. Anything that does not close on the same line stays text.
pub fn split_footnotes(token: Token) -> Vec<Token> {
    if token.kind != TokenKind::Text || !token.raw.contains("[^") {
        return vec![token];
    }

    let mut cur = Cursor::new(&token.raw, token.span.start);
    let mut out = Vec::new();
    let mut text_start = 0;

    while !cur.eof() {
        if cur.starts_with(b"[^") {
            let saved = cur.clone();
            if let Some(label) = try_parse_reference(&mut cur) {
                push_text(&mut out, &token, text_start, saved.i);
                out.push(Token {
                    kind: TokenKind::FootnoteRef { label },
                    span: Span::new(saved.pos(), cur.pos()),
                    raw: cur.since(saved.i).to_string(),
                    children: Vec::new(),
                });
                text_start = cur.i;
                continue;
            }
            cur = saved;
        }
        cur.bump();
    }

    push_text(&mut out, &token, text_start, token.raw.len());
    out
}

fn try_parse_reference(cur: &mut Cursor<'_>) -> Option<String> {
    cur.bump_n(2);
    let label_start = cur.i;
    loop {
        match cur.peek()? {
            b']' => break,
            b'[' | b' ' | b'\t' | b'\n' => return None,
            _ => {
                cur.bump();
            }
        }
    }
    if cur.i == label_start {
        return None;
    }
    let label = cur.since(label_start).to_string();
    cur.bump();
    Some(label)
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
