use super::node::{NodeId, NodeKind};
use super::selection::Selection;
use super::step_map::StepMap;
use crate::parsing::rope::Span;

/// One primitive document change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Replace bytes inside a single text block.
    ReplaceText { range: Span, text: String },
    /// Retag a top-level text block, keeping its text.
    SetKind { node: NodeId, kind: NodeKind },
    /// Split the top-level text block containing `at` into two. Inside a
    /// table cell this opens a new row below instead.
    SplitBlock { at: usize },
    /// Merge a top-level text block into the text block before it.
    JoinBackward { node: NodeId },
    /// Replace a top-level text block by a table built from cell texts.
    ReplaceWithTable {
        node: NodeId,
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

/// Who issued a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    User,
    Promoter,
}

/// An ordered batch of steps applied atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub steps: Vec<Step>,
    /// Explicit selection to install after the steps; `None` maps the old one.
    pub selection: Option<Selection>,
    pub origin: Origin,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            selection: None,
            origin: Origin::User,
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn insert(self, at: usize, text: impl Into<String>) -> Self {
        self.step(Step::ReplaceText {
            range: Span::new(at, at),
            text: text.into(),
        })
    }

    pub fn delete(self, range: Span) -> Self {
        self.step(Step::ReplaceText {
            range,
            text: String::new(),
        })
    }

    pub fn replace(self, range: Span, text: impl Into<String>) -> Self {
        self.step(Step::ReplaceText {
            range,
            text: text.into(),
        })
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

/// What a step touched, for incremental reparsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Touched {
    /// The change stayed inside one text block.
    Block(NodeId),
    /// The change cannot be attributed to a single block. `ancestor` is the
    /// smallest container holding it; `None` means the whole document.
    Ambiguous { ancestor: Option<NodeId> },
}

/// Result of applying a transaction.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    pub maps: Vec<StepMap>,
    pub touched: Vec<Touched>,
    pub origin: Origin,
    pub version: u64,
}
