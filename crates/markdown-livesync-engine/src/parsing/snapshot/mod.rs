//! # Snapshot Testing Support
//!
//! Utilities for testing the resolver and parse cache via snapshot assertions
//! and invariant checks.
//!
//! ## Modules
//!
//! - **`normalize`**: Renders a document plus its `ParseResult` as stable,
//!   indented text for `insta` snapshots
//! - **`invariants`**: Runtime checks for resolver correctness (markups inside
//!   their block, punctuation inside context and at its edges, canonical order)
//!
//! ## Testing Strategy
//!
//! Parsing behavior is pinned by snapshot tests rather than a separate formal
//! grammar. Snapshots show every markup's tag, context, punctuation and the
//! pending structural transforms.

pub mod invariants;
pub mod normalize;

pub use invariants::check as invariants;
pub use normalize::normalize;
