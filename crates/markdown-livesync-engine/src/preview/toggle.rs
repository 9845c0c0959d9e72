use std::collections::BTreeSet;

use super::decorations::DecorationSet;
use crate::editing::{Document, Selection};
use crate::parsing::rope::Span;

/// Decorations that changed state, by index into the current set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToggleDiff {
    pub revealed: Vec<usize>,
    pub hidden: Vec<usize>,
}

impl ToggleDiff {
    pub fn is_empty(&self) -> bool {
        self.revealed.is_empty() && self.hidden.is_empty()
    }
}

/// Owns the hidden/revealed partition of the toggleable decorations.
///
/// Only decorations inside the active scope (the blocks, or table cells,
/// under the selection ends) are looked at; everything else stays hidden.
#[derive(Debug, Default)]
pub struct ToggleManager {
    revealed: BTreeSet<usize>,
}

impl ToggleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_revealed(&self, index: usize) -> bool {
        self.revealed.contains(&index)
    }

    pub fn revealed(&self) -> &BTreeSet<usize> {
        &self.revealed
    }

    /// Recomputes the partition after the selection moved and returns the
    /// symmetric difference with the previous one.
    pub fn update(&mut self, doc: &Document, set: &DecorationSet, selection: Selection) -> ToggleDiff {
        let next = near_selection(doc, set, selection);
        let diff = ToggleDiff {
            revealed: next.difference(&self.revealed).copied().collect(),
            hidden: self.revealed.difference(&next).copied().collect(),
        };
        self.revealed = next;
        diff
    }

    /// Starts over for a new decoration generation; old indices are
    /// meaningless, so the diff lists only what is revealed now.
    pub fn reset(&mut self, doc: &Document, set: &DecorationSet, selection: Selection) -> ToggleDiff {
        self.revealed = near_selection(doc, set, selection);
        ToggleDiff {
            revealed: self.revealed.iter().copied().collect(),
            hidden: Vec::new(),
        }
    }
}

fn active_scope(doc: &Document, selection: Selection) -> Option<Span> {
    let from = doc.scope_at(selection.from())?;
    let to = doc.scope_at(selection.to())?;
    Some(Span::new(from.start, to.end.max(from.end)))
}

fn near_selection(doc: &Document, set: &DecorationSet, selection: Selection) -> BTreeSet<usize> {
    let Some(scope) = active_scope(doc, selection) else {
        return BTreeSet::new();
    };
    set.indices_in(scope)
        .filter(|&i| {
            set.get(i).is_some_and(|d| {
                d.is_toggleable() && scope.contains_span(d.range) && selection.is_near(d.context)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::cache::full_parse;
    use crate::preview::{DecorationSynthesizer, PlainRenderer};
    use markdown_livesync_config::{PreviewConfig, SyntaxConfig};
    use pretty_assertions::assert_eq;

    fn setup(paragraphs: &[&str]) -> (Document, DecorationSet) {
        let doc = Document::from_paragraphs(paragraphs);
        let (result, _) = full_parse(&doc, &SyntaxConfig::default());
        let mut synth = DecorationSynthesizer::new(Box::new(PlainRenderer), PreviewConfig::default());
        (doc, synth.synthesize(&result).0)
    }

    #[test]
    fn caret_inside_reveals_only_that_markup() {
        let (doc, set) = setup(&["*a* *b*"]);
        let mut toggle = ToggleManager::new();
        let diff = toggle.update(&doc, &set, Selection::caret(5));
        let starts: Vec<usize> = diff.revealed.iter().map(|&i| set.get(i).unwrap().range.start).collect();
        assert_eq!(starts, vec![4, 6]);
        assert!(diff.hidden.is_empty());
    }

    #[test]
    fn moving_out_restores_partition() {
        let (doc, set) = setup(&["plain **bold** end"]);
        let mut toggle = ToggleManager::new();
        toggle.update(&doc, &set, Selection::caret(0));
        let before = toggle.revealed().clone();

        let into = toggle.update(&doc, &set, Selection::caret(8));
        let out = toggle.update(&doc, &set, Selection::caret(0));

        assert_eq!(into.revealed, out.hidden);
        assert_eq!(toggle.revealed(), &before);
    }

    #[test]
    fn other_blocks_stay_hidden() {
        let (doc, set) = setup(&["**a**", "**b**"]);
        let mut toggle = ToggleManager::new();
        toggle.update(&doc, &set, Selection::caret(5));
        assert!(
            toggle
                .revealed()
                .iter()
                .all(|&i| set.get(i).unwrap().range.end <= 5)
        );
        assert_eq!(toggle.revealed().len(), 2);
    }

    #[test]
    fn selection_covering_markup_reveals_it() {
        let (doc, set) = setup(&["x *a* y"]);
        let mut toggle = ToggleManager::new();
        let diff = toggle.update(&doc, &set, Selection::new(0, 7));
        assert_eq!(diff.revealed.len(), 2);
    }
}
