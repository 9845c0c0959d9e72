use std::collections::HashMap;
use std::ops::Range;

use markdown_livesync_config::PreviewConfig;

use super::render::RenderCollaborator;
use crate::diagnostics::Diagnostic;
use crate::error::RenderError;
use crate::parsing::markup::{Markup, MarkupKind, MarkupTag, ParseResult};
use crate::parsing::rope::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Math,
    Html,
    Image,
    Link,
    Footnote,
}

/// How a decorated range is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualClass {
    Strong,
    Em,
    Del,
    Code,
    Heading(u8),
    /// Link label.
    Link,
    Image,
    Math,
    Footnote,
    Html,
    Punctuation(MarkupTag),
    HeadingPunctuation(u8),
    LinkDestination,
    Widget(WidgetKind),
}

/// Rendered replacement for a source range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Widget {
    pub kind: WidgetKind,
    pub source: String,
    pub rendered: String,
}

/// One visual range derived from a markup.
///
/// Content decorations are always applied. Toggleable decorations
/// (`revealed` is set) start hidden: punctuation is not drawn, widgets draw
/// `widget.rendered` in place of the source. The toggle manager flips them
/// to their revealed form near the selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
    pub range: Span,
    pub class: VisualClass,
    pub hidden: bool,
    pub revealed: Option<VisualClass>,
    pub widget: Option<Widget>,
    /// Index of the owning markup in the `ParseResult`.
    pub owner: usize,
    /// Context of the owning markup.
    pub context: Span,
}

impl Decoration {
    pub fn is_toggleable(&self) -> bool {
        self.revealed.is_some()
    }
}

/// All decorations of one `ParseResult`, ordered by range start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecorationSet {
    pub version: u64,
    decorations: Vec<Decoration>,
}

impl DecorationSet {
    pub fn len(&self) -> usize {
        self.decorations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorations.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Decoration> {
        self.decorations.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decoration> {
        self.decorations.iter()
    }

    /// Indices of decorations whose range starts inside `scope` (closed).
    pub fn indices_in(&self, scope: Span) -> Range<usize> {
        let lo = self.decorations.partition_point(|d| d.range.start < scope.start);
        let hi = self.decorations.partition_point(|d| d.range.start <= scope.end);
        lo..hi.max(lo)
    }

    /// Decorations covering byte `pos` (half open).
    pub fn at(&self, pos: usize) -> impl Iterator<Item = (usize, &Decoration)> {
        self.decorations
            .iter()
            .enumerate()
            .take_while(move |(_, d)| d.range.start <= pos)
            .filter(move |(_, d)| pos < d.range.end)
    }
}

type Rendered = Result<String, RenderError>;

/// Turns a [`ParseResult`] into a [`DecorationSet`].
///
/// Widget renders are memoised by `(kind, source)`; entries unused by a
/// generation are dropped.
pub struct DecorationSynthesizer {
    renderer: Box<dyn RenderCollaborator>,
    config: PreviewConfig,
    memo: HashMap<(WidgetKind, String), Rendered>,
}

impl DecorationSynthesizer {
    pub fn new(renderer: Box<dyn RenderCollaborator>, config: PreviewConfig) -> Self {
        Self {
            renderer,
            config,
            memo: HashMap::new(),
        }
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    /// Number of memoised widget renders.
    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    pub fn synthesize(&mut self, result: &ParseResult) -> (DecorationSet, Vec<Diagnostic>) {
        let mut previous = std::mem::take(&mut self.memo);
        let mut decorations = Vec::new();
        let mut diagnostics = Vec::new();

        for (owner, m) in result.markups.iter().enumerate() {
            let mut emit = Emitter {
                out: &mut decorations,
                owner,
                context: m.context,
            };
            emit_markup(&mut emit, m);

            if !self.config.reveal_widgets {
                continue;
            }
            let Some((kind, source)) = widget_source(m) else {
                continue;
            };
            let key = (kind, source);
            let rendered = match previous.remove(&key) {
                Some(hit) => hit,
                None => self.render(m),
            };
            let shown = match &rendered {
                Ok(text) => text.clone(),
                Err(err) => {
                    diagnostics.push(Diagnostic::RenderCollaboratorFailure {
                        collaborator: err.collaborator,
                        message: err.message.clone(),
                    });
                    html_escape::encode_text(&key.1).into_owned()
                }
            };
            emit.toggle(
                m.context,
                VisualClass::Widget(kind),
                content_class(m),
                Some(Widget {
                    kind,
                    source: key.1.clone(),
                    rendered: shown,
                }),
            );
            self.memo.insert(key, rendered);
        }

        decorations.sort_by_key(|d| d.range.start);
        (
            DecorationSet {
                version: result.version,
                decorations,
            },
            diagnostics,
        )
    }

    fn render(&self, m: &Markup) -> Rendered {
        let rendered = match &m.kind {
            MarkupKind::InlineMath { expr } => self.renderer.render_math(expr),
            MarkupKind::Html { code, .. } => self.renderer.render_html(code),
            MarkupKind::Image { href, alt, .. } => self.renderer.render_image(href, alt),
            MarkupKind::Link { href, text, .. } => self.renderer.render_link(href, text),
            MarkupKind::FootnoteRef { label } => self.renderer.resolve_footnote(label),
            _ => Ok(String::new()),
        };
        if let Err(err) = &rendered {
            log::warn!("{err}; showing source at {}..{}", m.context.start, m.context.end);
        }
        rendered
    }
}

struct Emitter<'a> {
    out: &'a mut Vec<Decoration>,
    owner: usize,
    context: Span,
}

impl Emitter<'_> {
    fn content(&mut self, range: Span, class: VisualClass) {
        if range.is_empty() {
            return;
        }
        self.out.push(Decoration {
            range,
            class,
            hidden: false,
            revealed: None,
            widget: None,
            owner: self.owner,
            context: self.context,
        });
    }

    fn toggle(&mut self, range: Span, class: VisualClass, revealed: VisualClass, widget: Option<Widget>) {
        if range.is_empty() {
            return;
        }
        self.out.push(Decoration {
            range,
            class,
            hidden: true,
            revealed: Some(revealed),
            widget,
            owner: self.owner,
            context: self.context,
        });
    }
}

fn content_class(m: &Markup) -> VisualClass {
    match &m.kind {
        MarkupKind::Strong => VisualClass::Strong,
        MarkupKind::Em => VisualClass::Em,
        MarkupKind::Del => VisualClass::Del,
        MarkupKind::CodeSpan => VisualClass::Code,
        MarkupKind::Heading { level } => VisualClass::Heading(*level),
        MarkupKind::Link { .. } => VisualClass::Link,
        MarkupKind::Image { .. } => VisualClass::Image,
        MarkupKind::InlineMath { .. } => VisualClass::Math,
        MarkupKind::FootnoteRef { .. } => VisualClass::Footnote,
        MarkupKind::Html { .. } => VisualClass::Html,
    }
}

fn inherited_class(tag: MarkupTag) -> Option<VisualClass> {
    match tag {
        MarkupTag::Strong => Some(VisualClass::Strong),
        MarkupTag::Em => Some(VisualClass::Em),
        MarkupTag::Del => Some(VisualClass::Del),
        MarkupTag::CodeSpan => Some(VisualClass::Code),
        _ => None,
    }
}

fn emit_markup(emit: &mut Emitter<'_>, m: &Markup) {
    let punctuation_class = match &m.kind {
        MarkupKind::Heading { level } => VisualClass::HeadingPunctuation(*level),
        kind => VisualClass::Punctuation(kind.tag()),
    };

    match (&m.kind, m.punctuation.as_slice()) {
        (MarkupKind::Link { .. } | MarkupKind::Image { .. }, [open, gap, close]) => {
            emit.content(Span::new(open.end, gap.start), content_class(m));
            emit.toggle(
                Span::new(gap.end, close.start),
                VisualClass::LinkDestination,
                VisualClass::LinkDestination,
                None,
            );
        }
        (MarkupKind::Html { inherited, .. }, _) => {
            emit.content(m.content(), VisualClass::Html);
            for class in inherited.iter().copied().filter_map(inherited_class) {
                emit.content(m.content(), class);
            }
        }
        _ => emit.content(m.content(), content_class(m)),
    }

    for p in &m.punctuation {
        emit.toggle(*p, punctuation_class, punctuation_class, None);
    }
}

fn widget_source(m: &Markup) -> Option<(WidgetKind, String)> {
    match &m.kind {
        MarkupKind::InlineMath { expr } => Some((WidgetKind::Math, expr.clone())),
        MarkupKind::Html { code, .. } => Some((WidgetKind::Html, code.clone())),
        MarkupKind::Image { href, alt, .. } => Some((WidgetKind::Image, format!("![{alt}]({href})"))),
        MarkupKind::Link { href, text, .. } => Some((WidgetKind::Link, format!("[{text}]({href})"))),
        MarkupKind::FootnoteRef { label } => Some((WidgetKind::Footnote, format!("[^{label}]"))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::Document;
    use crate::parsing::cache::full_parse;
    use crate::preview::render::PlainRenderer;
    use markdown_livesync_config::SyntaxConfig;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::rc::Rc;

    fn decorate(text: &str) -> DecorationSet {
        let doc = Document::from_paragraphs(&[text]);
        let (result, _) = full_parse(&doc, &SyntaxConfig::default());
        let mut synth = DecorationSynthesizer::new(Box::new(PlainRenderer), PreviewConfig::default());
        synth.synthesize(&result).0
    }

    fn summary(set: &DecorationSet) -> Vec<(usize, usize, VisualClass, bool)> {
        set.iter()
            .map(|d| (d.range.start, d.range.end, d.class, d.hidden))
            .collect()
    }

    #[test]
    fn strong_gets_content_and_hidden_punctuation() {
        let set = decorate("**ab**");
        let p = VisualClass::Punctuation(MarkupTag::Strong);
        assert_eq!(
            summary(&set),
            vec![(0, 2, p, true), (2, 4, VisualClass::Strong, false), (4, 6, p, true)]
        );
        assert!(set.iter().filter(|d| d.hidden).all(|d| d.revealed == Some(p)));
    }

    #[test]
    fn heading_punctuation_uses_level_class() {
        let set = decorate("## Title");
        assert_eq!(
            summary(&set),
            vec![
                (0, 3, VisualClass::HeadingPunctuation(2), true),
                (3, 8, VisualClass::Heading(2), false),
            ]
        );
    }

    #[test]
    fn link_label_styled_destination_hidden() {
        let set = decorate("[go](http://x)");
        let classes: Vec<_> = set.iter().map(|d| (d.range.start, d.range.end, d.class)).collect();
        let p = VisualClass::Punctuation(MarkupTag::Link);
        assert_eq!(
            classes,
            vec![
                (0, 1, p),
                (0, 14, VisualClass::Widget(WidgetKind::Link)),
                (1, 3, VisualClass::Link),
                (3, 5, p),
                (5, 13, VisualClass::LinkDestination),
                (13, 14, p),
            ]
        );
    }

    #[test]
    fn inline_math_becomes_widget() {
        let set = decorate("a $x^2$ b");
        let widget = set.iter().find_map(|d| d.widget.as_ref()).unwrap();
        assert_eq!(widget.kind, WidgetKind::Math);
        assert_eq!(widget.rendered, "x^2");
    }

    #[test]
    fn widgets_disabled_by_config() {
        let doc = Document::from_paragraphs(&["$x$"]);
        let (result, _) = full_parse(&doc, &SyntaxConfig::default());
        let mut synth = DecorationSynthesizer::new(
            Box::new(PlainRenderer),
            PreviewConfig {
                reveal_widgets: false,
            },
        );
        let (set, _) = synth.synthesize(&result);
        assert!(set.iter().all(|d| d.widget.is_none()));
    }

    struct Counting(Rc<Cell<usize>>);

    impl RenderCollaborator for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn render_math(&self, expr: &str) -> Result<String, RenderError> {
            self.0.set(self.0.get() + 1);
            Ok(expr.to_uppercase())
        }
        fn render_html(&self, _: &str) -> Result<String, RenderError> {
            Err(RenderError::new("counting", "no html"))
        }
        fn render_image(&self, _: &str, _: &str) -> Result<String, RenderError> {
            Ok(String::new())
        }
        fn render_link(&self, _: &str, text: &str) -> Result<String, RenderError> {
            Ok(text.to_string())
        }
        fn resolve_footnote(&self, label: &str) -> Result<String, RenderError> {
            Err(RenderError::new("counting", format!("unknown footnote {label}")))
        }
    }

    #[test]
    fn renders_are_memoised_and_failures_fall_back() {
        let calls = Rc::new(Cell::new(0));
        let mut synth = DecorationSynthesizer::new(Box::new(Counting(calls.clone())), PreviewConfig::default());
        let doc = Document::from_paragraphs(&["$a$ <b>x</b>"]);
        let (result, _) = full_parse(&doc, &SyntaxConfig::default());

        let (set, diagnostics) = synth.synthesize(&result);
        synth.synthesize(&result);
        assert_eq!(calls.get(), 1);
        assert_eq!(synth.memo_len(), 2);

        assert_eq!(
            diagnostics,
            vec![Diagnostic::RenderCollaboratorFailure {
                collaborator: "counting",
                message: "no html".into(),
            }]
        );
        let html = set
            .iter()
            .filter_map(|d| d.widget.as_ref())
            .find(|w| w.kind == WidgetKind::Html)
            .unwrap();
        assert_eq!(html.rendered, "&lt;b&gt;x&lt;/b&gt;");
    }

    #[test]
    fn links_and_footnotes_become_widgets() {
        let set = decorate("see https://a.io and [^n]");
        let widgets: Vec<_> = set
            .iter()
            .filter_map(|d| d.widget.as_ref().map(|w| (d.range.start, d.range.end, w.kind, w.rendered.as_str())))
            .collect();
        assert_eq!(
            widgets,
            vec![
                (4, 16, WidgetKind::Link, "https://a.io"),
                (21, 25, WidgetKind::Footnote, "[n]"),
            ]
        );
        assert!(set.iter().filter(|d| d.widget.is_some()).all(|d| d.hidden));
    }

    #[test]
    fn unresolved_footnote_falls_back_to_source() {
        let mut synth = DecorationSynthesizer::new(
            Box::new(Counting(Rc::new(Cell::new(0)))),
            PreviewConfig::default(),
        );
        let doc = Document::from_paragraphs(&["note[^x]"]);
        let (result, _) = full_parse(&doc, &SyntaxConfig::default());
        let (set, diagnostics) = synth.synthesize(&result);
        assert_eq!(
            diagnostics,
            vec![Diagnostic::RenderCollaboratorFailure {
                collaborator: "counting",
                message: "unknown footnote x".into(),
            }]
        );
        let widget = set.iter().find_map(|d| d.widget.as_ref()).unwrap();
        assert_eq!(widget.kind, WidgetKind::Footnote);
        assert_eq!(widget.rendered, "[^x]");
    }

    #[test]
    fn scope_lookup_by_range_start() {
        let set = decorate("*a* and *b*");
        let range = set.indices_in(Span::new(8, 11));
        assert!(range.clone().all(|i| set.get(i).unwrap().range.start >= 8));
        assert_eq!(range.len(), 3);
    }
}
