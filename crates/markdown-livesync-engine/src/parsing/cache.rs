use std::sync::Arc;

use markdown_livesync_config::SyntaxConfig;

use crate::diagnostics::Diagnostic;
use crate::editing::{Assoc, BlockRef, ChangeSet, Document, NodeId, Touched, map_through};
use crate::parsing::markup::{Markup, ParseResult, StructuralTransformRequest, sort_markups};
use crate::parsing::resolver::{BlockInput, resolve_block};
use crate::parsing::rope::Span;

/// How much of the document an update reparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReparseScope {
    Blocks(Vec<NodeId>),
    /// The table containing an ambiguous edit.
    Ancestor(NodeId),
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheUpdate {
    pub scope: ReparseScope,
    pub reparsed: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Owns the current [`ParseResult`] and keeps it in step with the document.
///
/// Each update remaps the previous result through the edit's step maps,
/// drops what the edit touched and re-resolves only the touched blocks. The
/// published result is replaced wholesale, so readers holding an `Arc` keep a
/// consistent snapshot.
pub struct ParseCache {
    current: Arc<ParseResult>,
    syntax: SyntaxConfig,
}

impl ParseCache {
    /// Starts from a full parse of `doc`.
    pub fn new(doc: &Document, syntax: SyntaxConfig) -> Self {
        Self::with_update(doc, syntax).0
    }

    /// Like [`ParseCache::new`], also reporting what the initial parse found.
    pub fn with_update(doc: &Document, syntax: SyntaxConfig) -> (Self, CacheUpdate) {
        let (result, diagnostics) = full_parse(doc, &syntax);
        let update = CacheUpdate {
            scope: ReparseScope::Full,
            reparsed: doc.text_blocks().len(),
            diagnostics,
        };
        let cache = Self {
            current: Arc::new(result),
            syntax,
        };
        (cache, update)
    }

    pub fn current(&self) -> Arc<ParseResult> {
        Arc::clone(&self.current)
    }

    pub fn syntax(&self) -> &SyntaxConfig {
        &self.syntax
    }

    /// Reparses everything, e.g. after the grammar switches changed.
    pub fn reset(&mut self, doc: &Document, syntax: SyntaxConfig) -> CacheUpdate {
        self.syntax = syntax;
        let (result, diagnostics) = full_parse(doc, &self.syntax);
        let reparsed = doc.text_blocks().len();
        self.current = Arc::new(result);
        CacheUpdate {
            scope: ReparseScope::Full,
            reparsed,
            diagnostics,
        }
    }

    /// Brings the cache up to date with `doc` after `changes` were applied.
    pub fn update(&mut self, doc: &Document, changes: &ChangeSet) -> CacheUpdate {
        let Some((scope, touched)) = touched_blocks(doc, &changes.touched) else {
            let mut update = self.reset(doc, self.syntax.clone());
            update
                .diagnostics
                .insert(0, Diagnostic::PositionMappingInconsistency { ancestor: None });
            log::debug!("full reparse at version {}", doc.version());
            return update;
        };

        let mut markups: Vec<Markup> = self.current.markups.clone();
        let mut transforms: Vec<StructuralTransformRequest> = self.current.transforms.clone();
        for m in &mut markups {
            m.remap(&changes.maps);
        }
        for t in &mut transforms {
            t.anchor = map_through(&changes.maps, t.anchor, Assoc::Before);
        }

        let ranges: Vec<Span> = touched.iter().map(|b| b.block.span).collect();
        let is_touched = |pos: usize| ranges.iter().any(|r| r.touches(pos));
        markups.retain(|m| !is_touched(m.context.start));
        transforms.retain(|t| !is_touched(t.anchor));

        let mut diagnostics = Vec::new();
        if let ReparseScope::Ancestor(id) = scope {
            diagnostics.push(Diagnostic::PositionMappingInconsistency { ancestor: Some(id) });
        }
        let reparsed = touched.len();
        resolve_into(doc, &touched, &self.syntax, &mut markups, &mut transforms, &mut diagnostics);
        sort_markups(&mut markups);
        transforms.sort_by_key(|t| t.anchor);

        log::debug!(
            "reparsed {reparsed} block(s) at version {} ({:?})",
            doc.version(),
            scope
        );
        self.current = Arc::new(ParseResult {
            version: doc.version(),
            markups,
            transforms,
        });
        CacheUpdate {
            scope,
            reparsed,
            diagnostics,
        }
    }

    /// Hands out the pending transform requests and publishes a result
    /// without them.
    pub fn take_transforms(&mut self) -> Vec<StructuralTransformRequest> {
        if self.current.transforms.is_empty() {
            return Vec::new();
        }
        let mut next = ParseResult::clone(&self.current);
        let taken = std::mem::take(&mut next.transforms);
        self.current = Arc::new(next);
        taken
    }
}

/// Parses every text block of `doc` from scratch.
pub fn full_parse(doc: &Document, syntax: &SyntaxConfig) -> (ParseResult, Vec<Diagnostic>) {
    let blocks = doc.text_blocks();
    let mut markups = Vec::new();
    let mut transforms = Vec::new();
    let mut diagnostics = Vec::new();
    resolve_into(doc, &blocks, syntax, &mut markups, &mut transforms, &mut diagnostics);
    sort_markups(&mut markups);
    transforms.sort_by_key(|t| t.anchor);
    (
        ParseResult {
            version: doc.version(),
            markups,
            transforms,
        },
        diagnostics,
    )
}

fn resolve_into(
    doc: &Document,
    blocks: &[BlockRef<'_>],
    syntax: &SyntaxConfig,
    markups: &mut Vec<Markup>,
    transforms: &mut Vec<StructuralTransformRequest>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for b in blocks {
        let text = doc.slice(b.block.span);
        let parse = resolve_block(
            BlockInput {
                id: b.block.id,
                kind: &b.block.kind,
                start: b.block.span.start,
                text: &text,
            },
            syntax,
        );
        markups.extend(parse.markups);
        transforms.extend(parse.transforms);
        diagnostics.extend(parse.malformed.into_iter().map(|span| Diagnostic::MalformedSyntax {
            node: b.block.id,
            span,
        }));
    }
}

/// Text blocks an edit touched, or `None` when only a full reparse is safe.
fn touched_blocks<'d>(doc: &'d Document, touched: &[Touched]) -> Option<(ReparseScope, Vec<BlockRef<'d>>)> {
    let mut ids = Vec::new();
    let mut ancestor = None;
    for t in touched {
        match *t {
            Touched::Block(id) => ids.push(id),
            Touched::Ambiguous { ancestor: Some(id) } if ancestor.is_none_or(|a| a == id) => {
                ancestor = Some(id)
            }
            Touched::Ambiguous { .. } => return None,
        }
    }

    let mut blocks: Vec<BlockRef<'d>> = Vec::new();
    if let Some(id) = ancestor {
        let table = doc.table(id)?;
        blocks.extend(doc.text_blocks().into_iter().filter(|b| b.table == Some(table.id)));
    }
    for id in &ids {
        if blocks.iter().any(|b| b.block.id == *id) {
            continue;
        }
        blocks.push(doc.block(*id)?);
    }

    let scope = match ancestor {
        Some(id) => ReparseScope::Ancestor(id),
        None => {
            let mut ids: Vec<NodeId> = blocks.iter().map(|b| b.block.id).collect();
            ids.dedup();
            ReparseScope::Blocks(ids)
        }
    };
    Some((scope, blocks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::{Selection, Step, Transaction};
    use crate::parsing::markup::MarkupTag;
    use pretty_assertions::assert_eq;

    fn doc(paragraphs: &[&str]) -> Document {
        Document::from_paragraphs(paragraphs)
    }

    fn syntax() -> SyntaxConfig {
        SyntaxConfig::default()
    }

    #[test]
    fn single_block_edit_matches_full_parse() {
        let mut d = doc(&["**a** and *b*", "plain", "`c` ~~d~~"]);
        let mut cache = ParseCache::new(&d, syntax());

        let changes = d.apply(&Transaction::new().insert(10, "**x** ")).unwrap();
        let update = cache.update(&d, &changes);

        assert_eq!(update.scope, ReparseScope::Blocks(vec![NodeId(0)]));
        assert_eq!(update.reparsed, 1);
        assert_eq!(*cache.current(), full_parse(&d, &syntax()).0);
    }

    #[test]
    fn untouched_blocks_are_remapped_not_reparsed() {
        let mut d = doc(&["one", "**two**"]);
        let mut cache = ParseCache::new(&d, syntax());
        let before = cache.current().markups[0].clone();

        let changes = d.apply(&Transaction::new().insert(0, "abc")).unwrap();
        cache.update(&d, &changes);

        let after = &cache.current().markups[0];
        assert_eq!(after.context, before.context.offset(3));
        assert_eq!(after.punctuation[1], before.punctuation[1].offset(3));
    }

    #[test]
    fn split_falls_back_to_full_reparse() {
        let mut d = doc(&["*a* *b*"]);
        let mut cache = ParseCache::new(&d, syntax());
        let changes = d
            .apply(&Transaction::new().step(Step::SplitBlock { at: 3 }))
            .unwrap();
        let update = cache.update(&d, &changes);

        assert_eq!(update.scope, ReparseScope::Full);
        assert_eq!(
            update.diagnostics[0],
            Diagnostic::PositionMappingInconsistency { ancestor: None }
        );
        assert_eq!(*cache.current(), full_parse(&d, &syntax()).0);
        assert_eq!(cache.current().markups.len(), 2);
    }

    #[test]
    fn table_edit_reparses_the_table_only() {
        let mut d = doc(&["x", "*keep*"]);
        d.apply(&Transaction::new().step(Step::ReplaceWithTable {
            node: NodeId(0),
            header: vec!["**h**".into()],
            rows: vec![vec!["c".into()]],
        }))
        .unwrap();
        let mut cache = ParseCache::new(&d, syntax());
        let cell = d.text_blocks()[1].block.span;

        let changes = d
            .apply(&Transaction::new().insert(cell.end, "*!*"))
            .unwrap();
        let update = cache.update(&d, &changes);
        assert!(matches!(update.scope, ReparseScope::Blocks(_)));
        assert_eq!(*cache.current(), full_parse(&d, &syntax()).0);
    }

    #[test]
    fn split_in_table_cell_reparses_the_table_as_ancestor() {
        let mut d = doc(&["x", "*keep*"]);
        d.apply(&Transaction::new().step(Step::ReplaceWithTable {
            node: NodeId(0),
            header: vec!["**h**".into(), "b".into()],
            rows: vec![vec!["c *d*".into(), "e".into()]],
        }))
        .unwrap();
        let mut cache = ParseCache::new(&d, syntax());
        let cell = d.text_blocks()[2];
        let (at, table) = (cell.block.span.start + 2, cell.table.unwrap());

        let changes = d
            .apply(&Transaction::new().step(Step::SplitBlock { at }))
            .unwrap();
        let update = cache.update(&d, &changes);

        assert_eq!(update.scope, ReparseScope::Ancestor(table));
        assert_eq!(update.reparsed, 6);
        assert_eq!(
            update.diagnostics,
            vec![Diagnostic::PositionMappingInconsistency {
                ancestor: Some(table)
            }]
        );
        assert_eq!(*cache.current(), full_parse(&d, &syntax()).0);
        let em_cell = d.text_blocks()[4].block.span;
        assert!(
            cache
                .current()
                .markups
                .iter()
                .any(|m| m.tag() == MarkupTag::Em && m.context == em_cell)
        );
    }

    #[test]
    fn transforms_are_taken_once() {
        let mut d = doc(&["text"]);
        let mut cache = ParseCache::new(&d, syntax());
        d.set_selection(Selection::caret(0));
        let changes = d.apply(&Transaction::new().insert(0, "- ")).unwrap();
        cache.update(&d, &changes);

        let before = cache.current();
        assert_eq!(cache.take_transforms().len(), 1);
        assert!(cache.take_transforms().is_empty());
        assert!(cache.current().transforms.is_empty());
        assert_eq!(before.transforms.len(), 1);
    }
}
