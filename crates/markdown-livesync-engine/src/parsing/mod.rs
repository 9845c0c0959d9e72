//! # Incremental Inline Syntax Engine
//!
//! Block text flows through three stages:
//!
//! 1. **`tokenizer`**: one block's text → nested [`Token`] tree
//! 2. **`resolver`**: token tree → absolutely positioned [`Markup`]s and
//!    pending [`StructuralTransformRequest`]s
//! 3. **`cache`**: keeps the current [`ParseResult`] valid across edits by
//!    remapping it through step maps and re-resolving only touched blocks
//!
//! `inline` holds the byte-cursor scanners layered over the lexer, `rope`
//! the span and buffer helpers shared with the host document, and
//! `snapshot` the invariant checks and text rendering used by tests.

pub mod cache;
pub mod inline;
pub mod markup;
pub mod resolver;
pub mod rope;
pub mod snapshot;
pub mod tokenizer;

pub use cache::{CacheUpdate, ParseCache, ReparseScope, full_parse};
pub use markup::{
    Markup, MarkupKind, MarkupTag, ParseResult, StructuralTransformRequest, TransformTarget,
};
pub use resolver::{BlockInput, BlockParse, resolve_block};
pub use tokenizer::{LinkStyle, Token, TokenKind, tokenize};
