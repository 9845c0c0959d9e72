//! # Live Preview
//!
//! Everything between a `ParseResult` and what the editor draws:
//!
//! - **`decorations`**: markups → content styles, hideable punctuation and
//!   widget replacements ([`DecorationSynthesizer`])
//! - **`render`**: the [`RenderCollaborator`] seam for math, HTML and image
//!   widgets, plus the built-in [`PlainRenderer`]
//! - **`toggle`**: the selection-driven hidden/revealed partition
//!   ([`ToggleManager`])

pub mod decorations;
pub mod render;
pub mod toggle;

pub use decorations::{
    Decoration, DecorationSet, DecorationSynthesizer, VisualClass, Widget, WidgetKind,
};
pub use render::{PlainRenderer, RenderCollaborator};
pub use toggle::{ToggleDiff, ToggleManager};
