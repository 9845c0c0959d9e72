use std::collections::{BTreeMap, HashSet};

use markdown_livesync_config::PromotionConfig;

use crate::diagnostics::Diagnostic;
use crate::editing::{Document, NodeId, NodeKind, Origin, Step, TextBlock, Transaction};
use crate::parsing::markup::{StructuralTransformRequest, TransformTarget};
use crate::parsing::resolver::shortcuts::marker_len;
use crate::parsing::rope::Span;
use crate::parsing::tokenizer::TokenKind;

/// One batched rewrite for the pending requests of an update cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionPlan {
    pub transaction: Transaction,
    /// Request keys the transaction applies.
    pub applied: Vec<(NodeId, TransformTarget)>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Rewrites blocks whose text now classifies as a different block type.
///
/// Every request is consumed by [`Promoter::plan`], whether it turns into
/// steps or is dropped. A `(node, target)` pair is applied at most once
/// between two calls to [`Promoter::begin_dispatch`].
#[derive(Debug)]
pub struct Promoter {
    config: PromotionConfig,
    applied: HashSet<(NodeId, TransformTarget)>,
}

impl Promoter {
    pub fn new(config: PromotionConfig) -> Self {
        Self {
            config,
            applied: HashSet::new(),
        }
    }

    pub fn config(&self) -> &PromotionConfig {
        &self.config
    }

    /// Forgets which requests were applied; called once per user edit.
    pub fn begin_dispatch(&mut self) {
        self.applied.clear();
    }

    pub fn plan(&mut self, doc: &Document, requests: Vec<StructuralTransformRequest>) -> PromotionPlan {
        let mut plan = PromotionPlan {
            transaction: Transaction::new().with_origin(Origin::Promoter),
            applied: Vec::new(),
            diagnostics: Vec::new(),
        };
        if !self.config.enabled {
            if !requests.is_empty() {
                log::debug!("promotion disabled, dropping {} request(s)", requests.len());
            }
            return plan;
        }

        let mut by_anchor: BTreeMap<usize, Vec<StructuralTransformRequest>> = BTreeMap::new();
        for request in requests {
            by_anchor.entry(request.anchor).or_default().push(request);
        }

        let mut only_retags = true;
        // Descending anchors keep earlier positions valid while later blocks change.
        for (anchor, mut group) in by_anchor.into_iter().rev() {
            let Some(request) = group.pop() else {
                continue;
            };
            if !group.is_empty() {
                let discarded: Vec<TransformTarget> = group.into_iter().map(|r| r.target).collect();
                log::warn!(
                    "{} promotion requests at {anchor}; applying {:?}, discarding {:?}",
                    discarded.len() + 1,
                    request.target,
                    discarded
                );
                plan.diagnostics.push(Diagnostic::PromotionConflict {
                    anchor,
                    applied: request.target.clone(),
                    discarded,
                });
            }

            let Some(block) = doc.block_at(anchor).filter(|b| b.table.is_none()).map(|b| b.block) else {
                log::debug!("no top-level block at {anchor}, dropping {:?}", request.target);
                continue;
            };
            if is_satisfied(block, &request.target) {
                continue;
            }
            let key = (block.id, request.target.clone());
            if self.applied.contains(&key) {
                log::debug!("{key:?} already applied this cycle");
                continue;
            }
            if request.requires_caret_at_end && doc.selection().head != block.span.end {
                continue;
            }
            let Some(steps) = steps_for(doc, block, &request) else {
                continue;
            };
            only_retags &= steps.iter().all(|s| matches!(s, Step::SetKind { .. }));
            log::debug!("promoting {:?} to {:?}", block.id, request.target);
            plan.transaction.steps.extend(steps);
            self.applied.insert(key.clone());
            plan.applied.push(key);
        }

        if only_retags && !plan.transaction.is_empty() {
            plan.transaction.selection = Some(doc.selection());
        }
        plan
    }
}

fn is_satisfied(block: &TextBlock, target: &TransformTarget) -> bool {
    match target {
        TransformTarget::Node(kind) => &block.kind == kind,
        TransformTarget::Table => false,
    }
}

fn steps_for(doc: &Document, block: &TextBlock, request: &StructuralTransformRequest) -> Option<Vec<Step>> {
    let node = block.id;
    match (&request.target, request.token.as_ref().map(|t| &t.kind)) {
        (TransformTarget::Table, Some(TokenKind::Table { header, rows })) => Some(vec![Step::ReplaceWithTable {
            node,
            header: header.clone(),
            rows: rows.clone(),
        }]),
        (TransformTarget::Table, _) => None,
        (TransformTarget::Node(kind), token) => {
            let mut steps = vec![Step::SetKind {
                node,
                kind: kind.clone(),
            }];
            match (kind, token) {
                (NodeKind::ListItem { .. } | NodeKind::BlockQuote, _) => {
                    let text = doc.slice(block.span);
                    let marker = marker_len(&text)?;
                    steps.push(Step::ReplaceText {
                        range: Span::new(block.span.start, block.span.start + marker),
                        text: String::new(),
                    });
                }
                (NodeKind::CodeBlock { .. }, Some(TokenKind::CodeBlock { body, .. })) => {
                    steps.push(replace_block_text(block, body));
                }
                (NodeKind::MathBlock, Some(TokenKind::MathBlock { expr })) => {
                    steps.push(replace_block_text(block, expr));
                }
                (NodeKind::CodeBlock { .. } | NodeKind::MathBlock, _) => return None,
                _ => {}
            }
            Some(steps)
        }
    }
}

fn replace_block_text(block: &TextBlock, text: &str) -> Step {
    Step::ReplaceText {
        range: block.span,
        text: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::{Block, Selection};
    use crate::parsing::cache::full_parse;
    use markdown_livesync_config::SyntaxConfig;
    use pretty_assertions::assert_eq;

    fn requests(doc: &Document) -> Vec<StructuralTransformRequest> {
        full_parse(doc, &SyntaxConfig::default()).0.transforms
    }

    fn promote(doc: &mut Document) -> PromotionPlan {
        let mut promoter = Promoter::new(PromotionConfig::default());
        let plan = promoter.plan(doc, requests(doc));
        doc.apply(&plan.transaction).unwrap();
        plan
    }

    fn kinds(doc: &Document) -> Vec<&'static str> {
        doc.text_blocks().iter().map(|b| b.block.kind.name()).collect()
    }

    #[test]
    fn bullet_marker_becomes_list_item() {
        let mut doc = Document::from_paragraphs(&["- "]);
        doc.set_selection(Selection::caret(0));
        let plan = promote(&mut doc);
        assert_eq!(plan.transaction.origin, Origin::Promoter);
        assert_eq!(kinds(&doc), vec!["bullet_item"]);
        assert_eq!(doc.text(), "");
    }

    #[test]
    fn quote_keeps_text_after_marker() {
        let mut doc = Document::from_paragraphs(&["> said"]);
        promote(&mut doc);
        assert_eq!(kinds(&doc), vec!["blockquote"]);
        assert_eq!(doc.text(), "said");
    }

    #[test]
    fn code_fence_waits_for_caret_at_end() {
        let mut doc = Document::from_paragraphs(&["```rust"]);
        doc.set_selection(Selection::caret(3));
        let plan = promote(&mut doc);
        assert!(plan.transaction.is_empty());

        doc.set_selection(Selection::caret(7));
        promote(&mut doc);
        assert_eq!(
            doc.text_blocks()[0].block.kind,
            NodeKind::CodeBlock {
                lang: Some("rust".into())
            }
        );
        assert_eq!(doc.text(), "");
    }

    #[test]
    fn html_retag_restores_selection() {
        let mut doc = Document::from_paragraphs(&["<div>"]);
        doc.set_selection(Selection::new(1, 3));
        let plan = promote(&mut doc);
        assert_eq!(plan.transaction.selection, Some(Selection::new(1, 3)));
        assert_eq!(kinds(&doc), vec!["html_block"]);
        assert_eq!(doc.selection(), Selection::new(1, 3));
    }

    #[test]
    fn table_replaces_paragraph() {
        let mut doc = Document::from_paragraphs(&["before", "| a | b |\n| - | - |\n| 1 | 2 |"]);
        promote(&mut doc);
        let Block::Table(table) = &doc.blocks()[1] else {
            panic!("expected a table, got {:?}", doc.blocks()[1]);
        };
        let cells: Vec<String> = table.cells().map(|c| doc.slice(c.span)).collect();
        assert_eq!(cells, vec!["a", "b", "1", "2"]);
        assert!(doc.layout_is_consistent());
    }

    #[test]
    fn satisfied_requests_make_no_edits() {
        let mut doc = Document::from_paragraphs(&["- x", "> y", "plain"]);
        promote(&mut doc);
        let second = promote(&mut doc);
        assert!(second.transaction.is_empty());
    }

    #[test]
    fn same_key_applies_once_per_dispatch() {
        let mut doc = Document::from_paragraphs(&["<p>"]);
        let mut promoter = Promoter::new(PromotionConfig::default());
        let reqs = requests(&doc);
        let first = promoter.plan(&doc, reqs.clone());
        assert_eq!(first.applied.len(), 1);

        let again = promoter.plan(&doc, reqs.clone());
        assert!(again.transaction.is_empty());

        promoter.begin_dispatch();
        doc.apply(&first.transaction).unwrap();
        assert!(promoter.plan(&doc, reqs).transaction.is_empty());
    }

    #[test]
    fn conflicting_requests_keep_the_last() {
        let doc = Document::from_paragraphs(&["> x"]);
        let mut reqs = requests(&doc);
        let mut other = reqs[0].clone();
        other.target = TransformTarget::Node(NodeKind::HtmlBlock);
        reqs.insert(0, other);

        let mut promoter = Promoter::new(PromotionConfig::default());
        let plan = promoter.plan(&doc, reqs);
        assert_eq!(
            plan.diagnostics,
            vec![Diagnostic::PromotionConflict {
                anchor: 0,
                applied: TransformTarget::Node(NodeKind::BlockQuote),
                discarded: vec![TransformTarget::Node(NodeKind::HtmlBlock)],
            }]
        );
        assert_eq!(plan.applied.len(), 1);
    }

    #[test]
    fn disabled_promoter_drops_everything() {
        let doc = Document::from_paragraphs(&["- x"]);
        let mut promoter = Promoter::new(PromotionConfig {
            enabled: false,
            ..PromotionConfig::default()
        });
        assert!(promoter.plan(&doc, requests(&doc)).transaction.is_empty());
    }
}
