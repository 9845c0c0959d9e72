use serde::Serialize;

use crate::parsing::rope::Span;

/// Stable identifier of a document node. Survives every edit that keeps the
/// node alive; split-off and newly built nodes get fresh ids.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct NodeId(pub u64);

/// Structural type of a text block.
///
/// Headings are not a node type: a heading is a paragraph whose text still
/// carries its `#` marker, styled through a heading markup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Paragraph,
    /// `ordered` carries the start number of an ordered list.
    ListItem { ordered: Option<u64> },
    BlockQuote,
    CodeBlock { lang: Option<String> },
    MathBlock,
    HtmlBlock,
    TableCell { header: bool },
}

impl NodeKind {
    /// Blocks whose text is inline Markdown. Code and math blocks are raw
    /// zones; HTML blocks are only lexed to detect demotion.
    pub fn has_inline_syntax(&self) -> bool {
        matches!(
            self,
            NodeKind::Paragraph
                | NodeKind::ListItem { .. }
                | NodeKind::BlockQuote
                | NodeKind::TableCell { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Paragraph => "paragraph",
            NodeKind::ListItem { ordered: None } => "bullet_item",
            NodeKind::ListItem { ordered: Some(_) } => "ordered_item",
            NodeKind::BlockQuote => "blockquote",
            NodeKind::CodeBlock { .. } => "code_block",
            NodeKind::MathBlock => "math_block",
            NodeKind::HtmlBlock => "html_block",
            NodeKind::TableCell { header: true } => "table_header",
            NodeKind::TableCell { header: false } => "table_cell",
        }
    }
}

/// A leaf node holding plain text; `span` addresses its text in the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub id: NodeId,
    pub kind: NodeKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub id: NodeId,
    pub header: Vec<TextBlock>,
    pub rows: Vec<Vec<TextBlock>>,
}

impl Table {
    /// Cells in buffer order: header first, then rows.
    pub fn cells(&self) -> impl Iterator<Item = &TextBlock> {
        self.header.iter().chain(self.rows.iter().flatten())
    }

    pub(crate) fn cells_mut(&mut self) -> impl Iterator<Item = &mut TextBlock> {
        self.header.iter_mut().chain(self.rows.iter_mut().flatten())
    }

    /// Span from the first cell's start to the last cell's end.
    pub fn span(&self) -> Span {
        let mut cells = self.cells();
        let first = cells.next().map(|c| c.span).unwrap_or_default();
        let last = self.cells().last().map(|c| c.span).unwrap_or(first);
        Span::new(first.start, last.end)
    }
}

/// A top-level document node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Text(TextBlock),
    Table(Table),
}

impl Block {
    pub fn id(&self) -> NodeId {
        match self {
            Block::Text(t) => t.id,
            Block::Table(t) => t.id,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Block::Text(t) => t.span,
            Block::Table(t) => t.span(),
        }
    }
}

/// A text block together with the table that owns it, if any.
#[derive(Debug, Clone, Copy)]
pub struct BlockRef<'a> {
    pub block: &'a TextBlock,
    pub table: Option<NodeId>,
}
