use thiserror::Error;

use crate::editing::NodeId;
use crate::parsing::rope::Span;

/// Rejections from the host document's transaction API.
///
/// A rejected transaction leaves the document untouched: steps run against a
/// working copy that is only committed when every step succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("Unknown node: {0:?}")]
    UnknownNode(NodeId),

    #[error("Range {range:?} is outside the document (length {len})")]
    RangeOutOfBounds { range: Span, len: usize },

    #[error("Range {0:?} crosses a block boundary")]
    RangeCrossesBlocks(Span),

    #[error("Cannot split at {0}: position is not inside a top-level text block")]
    InvalidSplit(usize),

    #[error("Node {0:?} has no previous text block to join with")]
    NothingToJoin(NodeId),

    #[error("Node {0:?} cannot take that kind")]
    InvalidKind(NodeId),

    #[error("A table needs at least one header cell")]
    EmptyTable,
}

/// Failure reported by an external render collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{collaborator} renderer failed: {message}")]
pub struct RenderError {
    pub collaborator: &'static str,
    pub message: String,
}

impl RenderError {
    pub fn new(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self {
            collaborator,
            message: message.into(),
        }
    }
}
