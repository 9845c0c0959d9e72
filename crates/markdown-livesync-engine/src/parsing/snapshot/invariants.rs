use crate::editing::Document;
use crate::parsing::markup::ParseResult;

/// Panics with a description of the first violated invariant.
pub fn check(doc: &Document, result: &ParseResult) {
    let n = doc.len();
    for m in &result.markups {
        assert!(
            m.context.start <= m.context.end && m.context.end <= n,
            "markup context out of bounds: {:?} (document len: {})",
            m.context,
            n
        );
        let Some(owner) = doc.block(m.node) else {
            panic!("markup {:?} refers to unknown node {:?}", m.context, m.node);
        };
        assert!(
            owner.block.span.contains_span(m.context),
            "markup {:?} crosses the boundary of block {:?}",
            m.context,
            owner.block.span
        );
        for p in &m.punctuation {
            assert!(
                m.context.contains_span(*p),
                "punctuation {:?} not contained in context {:?}",
                p,
                m.context
            );
        }
        for pair in m.punctuation.windows(2) {
            assert!(
                pair[0].end <= pair[1].start,
                "punctuation spans overlap or are out of order: {:?}",
                m.punctuation
            );
        }
        if let Some(first) = m.punctuation.first() {
            assert_eq!(
                first.start, m.context.start,
                "opening punctuation must start the context of {:?}",
                m.kind
            );
        }
        if m.punctuation.len() > 1 {
            let last = m.punctuation[m.punctuation.len() - 1];
            assert_eq!(
                last.end, m.context.end,
                "closing punctuation must end the context of {:?}",
                m.kind
            );
        }
    }

    for pair in result.markups.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            a.context.start < b.context.start
                || (a.context.start == b.context.start && a.context.end >= b.context.end),
            "markups not in canonical order: {:?} before {:?}",
            a.context,
            b.context
        );
    }
}
