use std::fmt;

use crate::editing::NodeId;
use crate::parsing::markup::TransformTarget;
use crate::parsing::rope::Span;

/// Non-fatal conditions observed during an update cycle.
///
/// None of these stop the pipeline; each is logged where it happens and
/// collected on the session so callers can inspect the last cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Syntax that could not be balanced and was left as plain text.
    MalformedSyntax { node: NodeId, span: Span },
    /// An edit could not be attributed to a single block; the smallest
    /// containing ancestor (`None`: the whole document) was reparsed.
    PositionMappingInconsistency { ancestor: Option<NodeId> },
    /// Several transform requests targeted one anchor; only the last was
    /// applied.
    PromotionConflict {
        anchor: usize,
        applied: TransformTarget,
        discarded: Vec<TransformTarget>,
    },
    /// A render collaborator failed and the raw source is shown instead.
    RenderCollaboratorFailure {
        collaborator: &'static str,
        message: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MalformedSyntax { node, span } => {
                write!(f, "unbalanced syntax in {node:?} at {}..{}", span.start, span.end)
            }
            Diagnostic::PositionMappingInconsistency { ancestor: Some(id) } => {
                write!(f, "ambiguous edit, reparsed {id:?}")
            }
            Diagnostic::PositionMappingInconsistency { ancestor: None } => {
                f.write_str("ambiguous edit, reparsed the whole document")
            }
            Diagnostic::PromotionConflict {
                anchor,
                applied,
                discarded,
            } => write!(
                f,
                "{} conflicting promotions at {anchor}; applied {applied:?}",
                discarded.len() + 1
            ),
            Diagnostic::RenderCollaboratorFailure {
                collaborator,
                message,
            } => write!(f, "{collaborator} renderer failed: {message}"),
        }
    }
}
