use std::sync::OnceLock;

use regex::Regex;

use crate::parsing::markup::MarkupTag;
use crate::parsing::rope::Span;

/// Elements that never take a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Wrappers whose `style` attribute is carried instead of inherited marks.
const STYLE_WRAPPERS: &[&str] = &["span", "font", "mark"];

/// Marks an HTML element inherits from the markups around it.
const INHERITABLE: &[MarkupTag] = &[
    MarkupTag::Strong,
    MarkupTag::Em,
    MarkupTag::Del,
    MarkupTag::CodeSpan,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlTag {
    pub name: String,
    pub closing: bool,
    pub self_closing: bool,
    pub style: Option<String>,
}

impl HtmlTag {
    /// Parses one tag such as `<span style="x">`, `</b>` or `<br/>`.
    /// Comments, declarations and anything else return `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        static TAG_REGEX: OnceLock<Regex> = OnceLock::new();
        static STYLE_REGEX: OnceLock<Regex> = OnceLock::new();
        let tag_regex = TAG_REGEX.get_or_init(|| {
            Regex::new(r"^<(/)?([A-Za-z][A-Za-z0-9-]*)(\s[^>]*?)?\s*(/)?>$")
                .expect("Invalid HTML tag regex")
        });
        let style_regex = STYLE_REGEX.get_or_init(|| {
            Regex::new(r#"(?i)\bstyle\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
                .expect("Invalid style attribute regex")
        });

        let caps = tag_regex.captures(raw.trim())?;
        let attrs = caps.get(3).map_or("", |m| m.as_str());
        let style = style_regex
            .captures(attrs)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().to_string());
        Some(Self {
            name: caps[2].to_ascii_lowercase(),
            closing: caps.get(1).is_some(),
            self_closing: caps.get(4).is_some(),
            style,
        })
    }

    pub fn is_void(&self) -> bool {
        self.self_closing || VOID_ELEMENTS.contains(&self.name.as_str())
    }
}

/// Open-tag bookkeeping while a block is resolved.
#[derive(Debug, Clone)]
pub struct HtmlStackEntry {
    pub tag: HtmlTag,
    /// Absolute span of the opening tag.
    pub open: Span,
    pub inherited: Vec<MarkupTag>,
    /// Source seen since the opening tag, nested elements included.
    pub after: String,
}

/// A balanced (or void) element ready to become an `html` markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlElement {
    pub context: Span,
    pub punctuation: Vec<Span>,
    pub code: String,
    pub style: Option<String>,
    pub inherited: Vec<MarkupTag>,
}

/// Balances inline HTML tags across one block.
///
/// Tags may open and close at different nesting depths of the surrounding
/// Markdown, so one stack spans the whole block walk. Source is fed to the
/// innermost open entry as the walk advances; a closed element's code then
/// becomes part of its parent's.
pub struct HtmlStack<'a> {
    text: &'a str,
    base: usize,
    /// Absolute offset up to which source has been handed out.
    cursor: usize,
    entries: Vec<HtmlStackEntry>,
}

impl<'a> HtmlStack<'a> {
    /// `text` is the block text starting at absolute offset `base`.
    pub fn new(text: &'a str, base: usize) -> Self {
        Self {
            text,
            base,
            cursor: base,
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Feeds the source up to absolute `pos` to the innermost open element.
    pub fn absorb(&mut self, pos: usize) {
        if pos <= self.cursor {
            return;
        }
        let seen = self.slice(Span::new(self.cursor, pos));
        if let Some(top) = self.entries.last_mut() {
            top.after.push_str(seen);
        }
        self.cursor = pos;
    }

    /// Handles an opening tag at absolute `span`. Void elements come back
    /// immediately; everything else waits for its close.
    pub fn open(&mut self, tag: HtmlTag, span: Span, enclosing: &[MarkupTag]) -> Option<HtmlElement> {
        self.absorb(span.start);
        self.cursor = self.cursor.max(span.end);
        let inherited: Vec<MarkupTag> = enclosing
            .iter()
            .copied()
            .filter(|t| INHERITABLE.contains(t))
            .collect();
        let entry = HtmlStackEntry {
            tag,
            open: span,
            inherited,
            after: String::new(),
        };
        if entry.tag.is_void() {
            let element = self.element(entry, None);
            self.nest(&element.code);
            return Some(element);
        }
        self.entries.push(entry);
        None
    }

    /// Handles a closing tag at absolute `span`. On a match, returns the
    /// element plus the opening spans of entries left unbalanced above it.
    /// A close with no open partner comes back as `Err(span)` and stays text.
    pub fn close(&mut self, tag: &HtmlTag, span: Span) -> Result<(HtmlElement, Vec<Span>), Span> {
        let Some(idx) = self.entries.iter().rposition(|e| e.tag.name == tag.name) else {
            return Err(span);
        };
        self.absorb(span.start);
        self.cursor = self.cursor.max(span.end);
        let mut dropped = Vec::new();
        while self.entries.len() > idx + 1 {
            let Some(orphan) = self.entries.pop() else {
                break;
            };
            let text = format!("{}{}", self.slice(orphan.open), orphan.after);
            self.nest(&text);
            dropped.push(orphan.open);
        }
        dropped.reverse();
        let Some(entry) = self.entries.pop() else {
            return Err(span);
        };
        let element = self.element(entry, Some(span));
        self.nest(&element.code);
        Ok((element, dropped))
    }

    /// Opening tags that never closed.
    pub fn finish(self) -> Vec<Span> {
        self.entries.into_iter().map(|e| e.open).collect()
    }

    fn nest(&mut self, code: &str) {
        if let Some(top) = self.entries.last_mut() {
            top.after.push_str(code);
        }
    }

    fn element(&self, entry: HtmlStackEntry, close: Option<Span>) -> HtmlElement {
        let end = close.map_or(entry.open.end, |c| c.end);
        let context = Span::new(entry.open.start, end);
        let code = match close {
            Some(c) => format!(
                "{}{}{}",
                self.slice(entry.open),
                entry.after,
                self.slice(c)
            ),
            None => self.slice(entry.open).to_string(),
        };
        let (style, inherited) = if STYLE_WRAPPERS.contains(&entry.tag.name.as_str())
            && entry.tag.style.is_some()
        {
            (entry.tag.style, Vec::new())
        } else {
            (None, entry.inherited)
        };
        HtmlElement {
            context,
            punctuation: std::iter::once(entry.open).chain(close).collect(),
            code,
            style,
            inherited,
        }
    }

    fn slice(&self, span: Span) -> &'a str {
        let start = span.start.saturating_sub(self.base).min(self.text.len());
        let end = span.end.saturating_sub(self.base).clamp(start, self.text.len());
        self.text.get(start..end).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tag(raw: &str) -> HtmlTag {
        HtmlTag::parse(raw).unwrap()
    }

    #[test]
    fn parses_tag_shapes() {
        assert_eq!(
            tag("<span style=\"color: red\">"),
            HtmlTag {
                name: "span".into(),
                closing: false,
                self_closing: false,
                style: Some("color: red".into()),
            }
        );
        assert!(tag("</B>").closing);
        assert_eq!(tag("</B>").name, "b");
        assert!(tag("<br/>").is_void());
        assert!(tag("<img src='a.png'>").is_void());
        assert!(HtmlTag::parse("<!-- note -->").is_none());
    }

    #[test]
    fn balanced_pair_reconstructs_source() {
        let text = "x <u>under <i>it</i></u>";
        let mut stack = HtmlStack::new(text, 100);
        assert!(stack.open(tag("<u>"), Span::new(102, 105), &[]).is_none());
        assert!(stack.open(tag("<i>"), Span::new(111, 114), &[]).is_none());
        let (inner, dropped) = stack.close(&tag("</i>"), Span::new(116, 120)).unwrap();
        assert!(dropped.is_empty());
        assert_eq!(inner.code, "<i>it</i>");
        let (outer, _) = stack.close(&tag("</u>"), Span::new(120, 124)).unwrap();
        assert_eq!(outer.code, "<u>under <i>it</i></u>");
        assert_eq!(outer.context, Span::new(102, 124));
        assert_eq!(outer.punctuation, vec![Span::new(102, 105), Span::new(120, 124)]);
        assert!(stack.finish().is_empty());
    }

    #[test]
    fn style_wrapper_keeps_style_others_inherit() {
        let text = "<span style='a'>x</span><b>y</b>";
        let enclosing = [MarkupTag::Strong, MarkupTag::Link];
        let mut stack = HtmlStack::new(text, 0);
        stack.open(tag("<span style='a'>"), Span::new(0, 16), &enclosing);
        let (span_el, _) = stack.close(&tag("</span>"), Span::new(17, 24)).unwrap();
        assert_eq!(span_el.style.as_deref(), Some("a"));
        assert!(span_el.inherited.is_empty());

        stack.open(tag("<b>"), Span::new(24, 27), &enclosing);
        let (b_el, _) = stack.close(&tag("</b>"), Span::new(28, 32)).unwrap();
        assert_eq!(b_el.style, None);
        assert_eq!(b_el.inherited, vec![MarkupTag::Strong]);
    }

    #[test]
    fn void_element_emits_without_close() {
        let mut stack = HtmlStack::new("a<br>b", 0);
        let el = stack.open(tag("<br>"), Span::new(1, 5), &[]).unwrap();
        assert_eq!(el.code, "<br>");
        assert_eq!(el.punctuation, vec![Span::new(1, 5)]);
        assert!(stack.is_empty());
    }

    #[test]
    fn unbalanced_tags_are_reported() {
        let mut stack = HtmlStack::new("<b><i>x</b></s>", 0);
        stack.open(tag("<b>"), Span::new(0, 3), &[]);
        stack.open(tag("<i>"), Span::new(3, 6), &[]);
        let (el, dropped) = stack.close(&tag("</b>"), Span::new(7, 11)).unwrap();
        assert_eq!(el.code, "<b><i>x</b>");
        assert_eq!(dropped, vec![Span::new(3, 6)]);
        assert_eq!(stack.close(&tag("</s>"), Span::new(11, 15)), Err(Span::new(11, 15)));
    }

    #[test]
    fn nested_wrappers_accumulate_inner_code() {
        let text = "<u><b>a<br>b</b><i>c</i></u>";
        let mut stack = HtmlStack::new(text, 0);
        stack.open(tag("<u>"), Span::new(0, 3), &[]);
        stack.open(tag("<b>"), Span::new(3, 6), &[]);
        stack.absorb(7);
        let br = stack.open(tag("<br>"), Span::new(7, 11), &[]).unwrap();
        assert_eq!(br.code, "<br>");
        stack.absorb(12);
        let (b, _) = stack.close(&tag("</b>"), Span::new(12, 16)).unwrap();
        assert_eq!(b.code, "<b>a<br>b</b>");
        stack.open(tag("<i>"), Span::new(16, 19), &[]);
        let (i, _) = stack.close(&tag("</i>"), Span::new(20, 24)).unwrap();
        assert_eq!(i.code, "<i>c</i>");
        let (u, _) = stack.close(&tag("</u>"), Span::new(24, 28)).unwrap();
        assert_eq!(u.code, text);
    }

    #[test]
    fn absorbing_twice_does_not_repeat_text() {
        let mut stack = HtmlStack::new("<s>abc</s>", 0);
        stack.open(tag("<s>"), Span::new(0, 3), &[]);
        stack.absorb(5);
        stack.absorb(4);
        stack.absorb(6);
        let (s, _) = stack.close(&tag("</s>"), Span::new(6, 10)).unwrap();
        assert_eq!(s.code, "<s>abc</s>");
    }
}
