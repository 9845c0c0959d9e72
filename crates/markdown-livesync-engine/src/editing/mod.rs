/*!
 * # Host Document
 *
 * The rich-document model the live-preview engine runs against.
 *
 * ## Architecture Overview
 *
 * ### 1. Single Source of Truth: xi-rope Buffer
 * - Every text block's plain text lives in one **`xi_rope::Rope`**
 * - Blocks address their text by byte span; one `\n` separates consecutive
 *   blocks and belongs to neither
 * - Tables are top-level nodes whose cells are ordinary text blocks
 *
 * ### 2. Transaction-Based Editing
 * - All edits are **`Step`**s batched into a **`Transaction`**
 * - A transaction applies all-or-nothing and reports one **`StepMap`** per step
 * - Step maps wrap the step's `xi_rope::Delta`; positions computed against
 *   an older revision are carried forward with `map`/`map_span`
 *
 * ### 3. Stable Node Ids
 * - Every node has a `NodeId` that survives edits; split-off and rebuilt
 *   nodes get fresh ids
 * - Each step reports which node it touched, or that it cannot be pinned to
 *   one node (split, join, table rebuild)
 *
 * ## Module Structure
 *
 * - **`document`**: `Document`, block queries and `apply`
 * - **`node`**: `NodeId`, `NodeKind`, `TextBlock`, `Table`, `Block`
 * - **`transaction`**: `Step`, `Transaction`, `Touched`, `ChangeSet`
 * - **`step_map`**: `StepMap` and position remapping
 * - **`selection`**: `Selection` and the proximity ("near") test
 * - **`markdown`**: Markdown import/export
 *
 * ## Usage Pattern
 *
 * ```rust
 * use markdown_livesync_engine::editing::*;
 *
 * let mut doc = Document::from_markdown("# Title\n\nSome *text*");
 * let changes = doc.apply(&Transaction::new().insert(0, "#")).unwrap();
 * assert_eq!(changes.maps.len(), 1);
 * assert_eq!(doc.to_markdown(), "## Title\n\nSome *text*\n");
 * ```
 */

pub mod document;
pub mod markdown;
pub mod node;
pub mod selection;
pub mod step_map;
pub mod transaction;

pub use document::Document;
pub use node::{Block, BlockRef, NodeId, NodeKind, Table, TextBlock};
pub use selection::Selection;
pub use step_map::{Assoc, StepMap, map_span_through, map_through};
pub use transaction::{ChangeSet, Origin, Step, Touched, Transaction};
