use crate::parsing::markup::MarkupTag;
use crate::parsing::rope::Span;

/// How many marker bytes sit on each side of a token.
#[derive(Clone, Copy)]
pub enum Count {
    Fixed(usize),
    Asymmetric(usize, usize),
    /// Counts read off the token's raw text.
    Derived(fn(&str) -> (usize, usize)),
}

impl Count {
    pub fn resolve(&self, raw: &str) -> (usize, usize) {
        match *self {
            Count::Fixed(n) => (n, n),
            Count::Asymmetric(l, r) => (l, r),
            Count::Derived(f) => f(raw),
        }
    }
}

impl std::fmt::Debug for Count {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Count::Fixed(n) => write!(f, "Fixed({n})"),
            Count::Asymmetric(l, r) => write!(f, "Asymmetric({l}, {r})"),
            Count::Derived(_) => f.write_str("Derived"),
        }
    }
}

#[derive(Debug)]
pub struct PunctuationRule {
    pub tag: MarkupTag,
    pub count: Count,
    /// Resolve nested tokens inside this one.
    pub parse_inside: bool,
    /// Marker has no closing counterpart.
    pub left_only: bool,
}

/// Punctuation metadata per markup type. Links and images only take their
/// outer counts from here; the label/destination separator is found by the
/// resolver. Raw HTML is balanced by the tag stack instead.
pub static PUNCTUATION: [PunctuationRule; 9] = [
    PunctuationRule {
        tag: MarkupTag::Strong,
        count: Count::Fixed(2),
        parse_inside: true,
        left_only: false,
    },
    PunctuationRule {
        tag: MarkupTag::Em,
        count: Count::Fixed(1),
        parse_inside: true,
        left_only: false,
    },
    PunctuationRule {
        tag: MarkupTag::Del,
        count: Count::Derived(tilde_run),
        parse_inside: true,
        left_only: false,
    },
    PunctuationRule {
        tag: MarkupTag::CodeSpan,
        count: Count::Derived(backtick_run),
        parse_inside: false,
        left_only: false,
    },
    PunctuationRule {
        tag: MarkupTag::Heading,
        count: Count::Derived(heading_marker),
        parse_inside: true,
        left_only: true,
    },
    PunctuationRule {
        tag: MarkupTag::Link,
        count: Count::Asymmetric(1, 1),
        parse_inside: true,
        left_only: false,
    },
    PunctuationRule {
        tag: MarkupTag::Image,
        count: Count::Asymmetric(2, 1),
        parse_inside: false,
        left_only: false,
    },
    PunctuationRule {
        tag: MarkupTag::InlineMath,
        count: Count::Derived(dollar_run),
        parse_inside: false,
        left_only: false,
    },
    PunctuationRule {
        tag: MarkupTag::FootnoteRef,
        count: Count::Asymmetric(2, 1),
        parse_inside: false,
        left_only: false,
    },
];

pub fn rule(tag: MarkupTag) -> Option<&'static PunctuationRule> {
    PUNCTUATION.iter().find(|r| r.tag == tag)
}

impl PunctuationRule {
    /// Opening and (unless left-only) closing marker spans at the edges of
    /// `context`. Markers that would overlap are dropped from the right.
    pub fn spans(&self, context: Span, raw: &str) -> Vec<Span> {
        let (left, right) = self.count.resolve(raw);
        let left = left.min(context.len());
        let mut out = Vec::with_capacity(2);
        if left > 0 {
            out.push(Span::new(context.start, context.start + left));
        }
        if !self.left_only && right > 0 && left + right <= context.len() {
            out.push(Span::new(context.end - right, context.end));
        }
        out
    }
}

fn run_of(raw: &str, marker: u8) -> usize {
    raw.bytes().take_while(|&b| b == marker).count()
}

fn tilde_run(raw: &str) -> (usize, usize) {
    let n = run_of(raw, b'~').clamp(1, 2);
    (n, n)
}

fn backtick_run(raw: &str) -> (usize, usize) {
    let n = run_of(raw, b'`');
    (n, n)
}

fn dollar_run(raw: &str) -> (usize, usize) {
    let n = run_of(raw, b'$');
    (n, n)
}

/// `#` run plus the blanks after it; nothing for setext headings.
fn heading_marker(raw: &str) -> (usize, usize) {
    let indent = raw.len() - raw.trim_start_matches(' ').len();
    let hashes = run_of(&raw[indent..], b'#');
    if hashes == 0 {
        return (0, 0);
    }
    let blanks = raw[indent + hashes..]
        .bytes()
        .take_while(|b| matches!(b, b' ' | b'\t'))
        .count();
    (indent + hashes + blanks, 0)
}

/// ATX level from the `#` run; setext level from the underline.
pub fn heading_level(raw: &str) -> u8 {
    let hashes = run_of(raw.trim_start_matches(' '), b'#');
    let level = if hashes > 0 {
        hashes
    } else if raw
        .lines()
        .last()
        .is_some_and(|l| l.trim_start().starts_with('='))
    {
        1
    } else {
        2
    };
    level.clamp(1, 6) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(MarkupTag::Strong, "**x**", vec![(0, 2), (3, 5)])]
    #[case(MarkupTag::Em, "_x_", vec![(0, 1), (2, 3)])]
    #[case(MarkupTag::Del, "~x~", vec![(0, 1), (2, 3)])]
    #[case(MarkupTag::Del, "~~x~~", vec![(0, 2), (3, 5)])]
    #[case(MarkupTag::CodeSpan, "``a`b``", vec![(0, 2), (5, 7)])]
    #[case(MarkupTag::InlineMath, "$x$", vec![(0, 1), (2, 3)])]
    #[case(MarkupTag::Heading, "### Title", vec![(0, 4)])]
    #[case(MarkupTag::Heading, "Title\n===", vec![])]
    #[case(MarkupTag::FootnoteRef, "[^1]", vec![(0, 2), (3, 4)])]
    fn marker_spans(#[case] tag: MarkupTag, #[case] raw: &str, #[case] expected: Vec<(usize, usize)>) {
        let rule = rule(tag).unwrap();
        let spans: Vec<_> = rule
            .spans(Span::new(0, raw.len()), raw)
            .into_iter()
            .map(|s| (s.start, s.end))
            .collect();
        assert_eq!(spans, expected);
    }

    #[rstest]
    #[case("# a", 1)]
    #[case("###### a", 6)]
    #[case("####### a", 6)]
    #[case("a\n===", 1)]
    #[case("a\n---", 2)]
    fn heading_levels(#[case] raw: &str, #[case] level: u8) {
        assert_eq!(heading_level(raw), level);
    }

    #[test]
    fn overlapping_markers_keep_the_left_one() {
        let rule = rule(MarkupTag::Strong).unwrap();
        assert_eq!(rule.spans(Span::new(4, 7), "***"), vec![Span::new(4, 6)]);
    }

    #[test]
    fn every_table_entry_is_unique() {
        let mut tags: Vec<_> = PUNCTUATION.iter().map(|r| r.tag).collect();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), PUNCTUATION.len());
    }
}
