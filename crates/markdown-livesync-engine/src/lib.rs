pub mod diagnostics;
pub mod editing;
pub mod error;
pub mod parsing;
pub mod preview;
pub mod promoter;
pub mod session;

// Re-export key types for easier usage
pub use diagnostics::Diagnostic;
pub use editing::{Document, NodeId, NodeKind, Selection, Step, Transaction};
pub use error::{DocumentError, RenderError};
pub use parsing::{Markup, MarkupKind, MarkupTag, ParseResult, StructuralTransformRequest, TransformTarget};
pub use preview::{
    Decoration, DecorationSet, PlainRenderer, RenderCollaborator, ToggleDiff, VisualClass, Widget, WidgetKind,
};
pub use promoter::{PromotionPlan, Promoter};
pub use session::{LiveSession, UpdateReport};
