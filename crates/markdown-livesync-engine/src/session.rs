use std::sync::Arc;

use markdown_livesync_config::Config;

use crate::diagnostics::Diagnostic;
use crate::editing::{Document, Selection, Transaction};
use crate::error::DocumentError;
use crate::parsing::cache::ParseCache;
use crate::parsing::markup::{MarkupTag, ParseResult};
use crate::preview::{
    DecorationSet, DecorationSynthesizer, PlainRenderer, RenderCollaborator, ToggleDiff, ToggleManager,
};
use crate::promoter::Promoter;

/// What one dispatched edit did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Document version after the edit and every promotion it triggered.
    pub version: u64,
    /// Promoter batches applied.
    pub passes: usize,
    /// Requests turned into rewrites across all passes.
    pub promotions: usize,
    /// Text blocks re-resolved across all passes.
    pub reparsed: usize,
    /// Decorations revealed for the new generation.
    pub toggled: ToggleDiff,
}

/// Runs the update cycle for one document.
///
/// `dispatch` applies an edit, reparses what it touched, and then lets the
/// promoter rewrite blocks until no request is left, a pass produces no
/// edit, or the pass budget runs out. Decorations and the toggle partition
/// are rebuilt once the loop has settled.
pub struct LiveSession {
    doc: Document,
    config: Config,
    cache: ParseCache,
    synthesizer: DecorationSynthesizer,
    decorations: DecorationSet,
    toggle: ToggleManager,
    promoter: Promoter,
    diagnostics: Vec<Diagnostic>,
}

impl LiveSession {
    pub fn new(doc: Document, config: Config) -> Self {
        Self::with_renderer(doc, config, Box::new(PlainRenderer))
    }

    pub fn from_markdown(src: &str, config: Config) -> Self {
        Self::new(Document::from_markdown(src), config)
    }

    pub fn with_renderer(doc: Document, config: Config, renderer: Box<dyn RenderCollaborator>) -> Self {
        let (cache, initial) = ParseCache::with_update(&doc, config.syntax.clone());
        let mut session = Self {
            synthesizer: DecorationSynthesizer::new(renderer, config.preview.clone()),
            promoter: Promoter::new(config.promotion.clone()),
            doc,
            config,
            cache,
            decorations: DecorationSet::default(),
            toggle: ToggleManager::new(),
            diagnostics: Vec::new(),
        };
        session.record(initial.diagnostics);
        session.settle(initial.reparsed);
        session
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn parse_result(&self) -> Arc<ParseResult> {
        self.cache.current()
    }

    pub fn decorations(&self) -> &DecorationSet {
        &self.decorations
    }

    pub fn toggle(&self) -> &ToggleManager {
        &self.toggle
    }

    /// Diagnostics from the last dispatch (or from loading).
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Whether the selection lies inside a markup of type `tag`.
    pub fn is_inside(&self, tag: MarkupTag) -> bool {
        self.cache.current().is_inside(self.doc.selection().span(), tag)
    }

    /// Applies `tx` and runs the update cycle. A rejected transaction
    /// leaves the session untouched.
    pub fn dispatch(&mut self, tx: &Transaction) -> Result<UpdateReport, DocumentError> {
        let changes = self.doc.apply(tx)?;
        self.diagnostics.clear();
        self.promoter.begin_dispatch();

        let update = self.cache.update(&self.doc, &changes);
        self.record(update.diagnostics);
        Ok(self.settle(update.reparsed))
    }

    /// Moves the selection; only the toggle partition changes.
    pub fn set_selection(&mut self, selection: Selection) -> ToggleDiff {
        self.doc.set_selection(selection);
        self.toggle
            .update(&self.doc, &self.decorations, self.doc.selection())
    }

    fn settle(&mut self, mut reparsed: usize) -> UpdateReport {
        let mut passes = 0;
        let mut promotions = 0;
        loop {
            let requests = self.cache.take_transforms();
            if requests.is_empty() {
                break;
            }
            if passes >= self.config.promotion.max_passes {
                log::warn!(
                    "promotion budget of {} pass(es) exhausted, dropping {} request(s)",
                    self.config.promotion.max_passes,
                    requests.len()
                );
                break;
            }
            let plan = self.promoter.plan(&self.doc, requests);
            self.record(plan.diagnostics);
            if plan.transaction.is_empty() {
                break;
            }
            let changes = match self.doc.apply(&plan.transaction) {
                Ok(changes) => changes,
                Err(err) => {
                    log::warn!("promotion rejected: {err}");
                    break;
                }
            };
            passes += 1;
            promotions += plan.applied.len();
            let update = self.cache.update(&self.doc, &changes);
            reparsed += update.reparsed;
            self.record(update.diagnostics);
        }

        let (decorations, diagnostics) = self.synthesizer.synthesize(&self.cache.current());
        self.decorations = decorations;
        self.record(diagnostics);
        let toggled = self
            .toggle
            .reset(&self.doc, &self.decorations, self.doc.selection());

        UpdateReport {
            version: self.doc.version(),
            passes,
            promotions,
            reparsed,
            toggled,
        }
    }

    fn record(&mut self, diagnostics: Vec<Diagnostic>) {
        for d in &diagnostics {
            log::debug!("{d}");
        }
        self.diagnostics.extend(diagnostics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::NodeKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn load_settles_promotions() {
        let session = LiveSession::new(Document::from_paragraphs(&["> quoted"]), Config::default());
        assert_eq!(
            session.document().text_blocks()[0].block.kind,
            NodeKind::BlockQuote
        );
        assert!(session.parse_result().transforms.is_empty());
    }

    #[test]
    fn rejected_edit_leaves_session_untouched() {
        let mut session = LiveSession::from_markdown("a\n\nb", Config::default());
        let version = session.document().version();
        let err = session
            .dispatch(&Transaction::new().insert(99, "x"))
            .unwrap_err();
        assert!(matches!(err, DocumentError::RangeOutOfBounds { .. }));
        assert_eq!(session.document().version(), version);
    }

    #[test]
    fn is_inside_follows_selection() {
        let mut session = LiveSession::from_markdown("a **bold** b", Config::default());
        session.set_selection(Selection::caret(5));
        assert!(session.is_inside(MarkupTag::Strong));
        session.set_selection(Selection::caret(0));
        assert!(!session.is_inside(MarkupTag::Strong));
    }

    #[test]
    fn zero_pass_budget_drops_requests() {
        let mut config = Config::default();
        config.promotion.max_passes = 0;
        let mut session = LiveSession::new(Document::new(), config);
        let report = session.dispatch(&Transaction::new().insert(0, "- ")).unwrap();
        assert_eq!(report.passes, 0);
        assert_eq!(session.document().text(), "- ");
        assert!(session.parse_result().transforms.is_empty());
    }
}
