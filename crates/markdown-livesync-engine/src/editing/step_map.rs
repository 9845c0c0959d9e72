use xi_rope::delta::{DeltaElement, Transformer};
use xi_rope::{Delta, RopeInfo};

use crate::parsing::rope::Span;

/// Which side of an insertion at exactly this position a mapped position
/// lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Before,
    After,
}

/// Position remapping produced by one transaction step.
///
/// A thin wrapper over the step's `xi_rope` delta; structural steps that keep
/// the text unchanged carry an identity delta.
#[derive(Clone)]
pub struct StepMap {
    delta: Delta<RopeInfo>,
}

impl std::fmt::Debug for StepMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepMap")
            .field("base_len", &self.delta.base_len)
            .field("changed", &self.changed())
            .finish()
    }
}

impl StepMap {
    pub fn new(delta: Delta<RopeInfo>) -> Self {
        Self { delta }
    }

    /// Identity map over a document of `len` bytes.
    pub fn identity(len: usize) -> Self {
        Self::new(xi_rope::delta::Builder::new(len).build())
    }

    pub fn delta(&self) -> &Delta<RopeInfo> {
        &self.delta
    }

    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        let mut transformer = Transformer::new(&self.delta);
        transformer.transform(pos, assoc == Assoc::After)
    }

    /// Maps a span so that insertions at its start push it forward and
    /// insertions at its end stay outside it. A span whose contents were
    /// deleted collapses to an empty span instead of inverting.
    pub fn map_span(&self, span: Span) -> Span {
        let start = self.map(span.start, Assoc::After);
        let end = self.map(span.end, Assoc::Before);
        if span.is_empty() || end < start {
            Span::new(start, start)
        } else {
            Span::new(start, end)
        }
    }

    /// The edited region in post-step coordinates, or `None` for an identity
    /// map. Pure deletions report an empty span at the deletion point.
    pub fn changed(&self) -> Option<Span> {
        let mut old_pos = 0usize;
        let mut new_pos = 0usize;
        let mut changed: Option<Span> = None;
        let mut note = |sp: Span| {
            changed = Some(match changed {
                Some(c) => Span::new(c.start.min(sp.start), c.end.max(sp.end)),
                None => sp,
            });
        };

        for el in &self.delta.els {
            match el {
                DeltaElement::Copy(from, to) => {
                    if *from > old_pos {
                        note(Span::new(new_pos, new_pos));
                    }
                    new_pos += to - from;
                    old_pos = *to;
                }
                DeltaElement::Insert(inserted) => {
                    note(Span::new(new_pos, new_pos + inserted.len()));
                    new_pos += inserted.len();
                }
            }
        }
        if old_pos < self.delta.base_len {
            note(Span::new(new_pos, new_pos));
        }
        changed
    }
}

/// Maps a position through a sequence of step maps in order.
pub fn map_through(maps: &[StepMap], pos: usize, assoc: Assoc) -> usize {
    maps.iter().fold(pos, |p, m| m.map(p, assoc))
}

/// Maps a span through a sequence of step maps in order.
pub fn map_span_through(maps: &[StepMap], span: Span) -> Span {
    maps.iter().fold(span, |s, m| m.map_span(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use xi_rope::Rope;
    use xi_rope::delta::Builder;

    fn replace(len: usize, range: std::ops::Range<usize>, text: &str) -> StepMap {
        let mut builder = Builder::new(len);
        builder.replace(range, Rope::from(text));
        StepMap::new(builder.build())
    }

    #[test]
    fn insertion_respects_assoc() {
        let map = replace(10, 4..4, "abc");
        assert_eq!(map.map(4, Assoc::Before), 4);
        assert_eq!(map.map(4, Assoc::After), 7);
        assert_eq!(map.map(2, Assoc::After), 2);
        assert_eq!(map.map(8, Assoc::Before), 11);
    }

    #[test]
    fn span_does_not_grow_at_its_end() {
        let map = replace(10, 6..6, "xx");
        assert_eq!(map.map_span(Span::new(2, 6)), Span::new(2, 6));
        assert_eq!(map.map_span(Span::new(6, 9)), Span::new(8, 11));
    }

    #[test]
    fn deleted_span_collapses() {
        let map = replace(10, 2..8, "");
        assert_eq!(map.map_span(Span::new(3, 5)), Span::new(2, 2));
        assert_eq!(map.map_span(Span::new(0, 9)), Span::new(0, 3));
    }

    #[test]
    fn changed_reports_new_coordinates() {
        assert_eq!(replace(10, 2..4, "abc").changed(), Some(Span::new(2, 5)));
        assert_eq!(replace(10, 2..4, "").changed(), Some(Span::new(2, 2)));
        assert_eq!(replace(10, 8..10, "").changed(), Some(Span::new(8, 8)));
        assert_eq!(StepMap::identity(10).changed(), None);
    }

    #[test]
    fn maps_compose_in_order() {
        let maps = vec![replace(10, 0..0, "ab"), replace(12, 12..12, "c")];
        assert_eq!(map_through(&maps, 5, Assoc::After), 7);
        assert_eq!(map_span_through(&maps, Span::new(0, 10)), Span::new(2, 12));
    }
}
