use super::step_map::{Assoc, StepMap};
use crate::parsing::rope::Span;

/// Current selection as byte offsets; `anchor == head` is a caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
}

impl Selection {
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    pub fn caret(pos: usize) -> Self {
        Self {
            anchor: pos,
            head: pos,
        }
    }

    pub fn from(&self) -> usize {
        self.anchor.min(self.head)
    }

    pub fn to(&self) -> usize {
        self.anchor.max(self.head)
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    pub fn span(&self) -> Span {
        Span::new(self.from(), self.to())
    }

    /// Selection after an edit: both ends follow text typed at their position.
    pub fn map(&self, map: &StepMap) -> Self {
        Self {
            anchor: map.map(self.anchor, Assoc::After),
            head: map.map(self.head, Assoc::After),
        }
    }

    pub(crate) fn clamp(&self, len: usize) -> Self {
        Self {
            anchor: self.anchor.min(len),
            head: self.head.min(len),
        }
    }

    /// The "near" test: either end inside `context`, the selection covering
    /// `context`, or `context` covering the selection. All closed intervals.
    pub fn is_near(&self, context: Span) -> bool {
        let sel = self.span();
        context.touches(self.anchor)
            || context.touches(self.head)
            || sel.contains_span(context)
            || context.contains_span(sel)
    }
}
