use xi_rope::Rope;
use xi_rope::delta::Builder;

use super::node::{Block, BlockRef, NodeId, NodeKind, Table, TextBlock};
use super::selection::Selection;
use super::step_map::StepMap;
use super::transaction::{ChangeSet, Step, Touched, Transaction};
use crate::error::DocumentError;
use crate::parsing::rope::{Span, slice_to_string};

/// The rich-document host the live-preview core runs against.
///
/// ## Layout
///
/// - One `xi_rope::Rope` holds the text of every text block.
/// - Consecutive text blocks (table cells included) are separated by a single
///   `\n` that belongs to no block; intra-block line breaks are `\n`s inside
///   a block's span.
/// - The first block starts at 0 and the last one ends at the buffer end, so
///   a document always has at least one (possibly empty) text block.
///
/// ## Editing
///
/// Every change goes through [`Document::apply`] with a [`Transaction`].
/// Steps run against a working copy that only replaces `self` once every
/// step succeeded, so a failing step never leaves a half-rewritten document.
/// Each step yields a [`StepMap`] for remapping positions computed against
/// the previous revision.
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) buffer: Rope,
    pub(crate) blocks: Vec<Block>,
    pub(crate) selection: Selection,
    pub(crate) version: u64,
    pub(crate) next_id: u64,
}

impl Document {
    /// An empty document: one empty paragraph.
    pub fn new() -> Self {
        DocumentBuilder::new().finish()
    }

    /// Builds a document from plain paragraph texts, one block each.
    pub fn from_paragraphs<S: AsRef<str>>(paragraphs: &[S]) -> Self {
        let mut builder = DocumentBuilder::new();
        for p in paragraphs {
            builder.text_block(NodeKind::Paragraph, p.as_ref());
        }
        builder.finish()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.len() == 0
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whole buffer text, block separators included.
    pub fn text(&self) -> String {
        self.buffer.to_string()
    }

    pub fn slice(&self, span: Span) -> String {
        slice_to_string(&self.buffer, span)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Moves the selection without editing; positions are clamped.
    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection.clamp(self.len());
    }

    /// Every text block in buffer order, table cells included.
    pub fn text_blocks(&self) -> Vec<BlockRef<'_>> {
        let mut out = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Text(t) => out.push(BlockRef {
                    block: t,
                    table: None,
                }),
                Block::Table(table) => out.extend(table.cells().map(|c| BlockRef {
                    block: c,
                    table: Some(table.id),
                })),
            }
        }
        out
    }

    pub fn block(&self, id: NodeId) -> Option<BlockRef<'_>> {
        self.text_blocks().into_iter().find(|b| b.block.id == id)
    }

    pub fn table(&self, id: NodeId) -> Option<&Table> {
        self.blocks.iter().find_map(|b| match b {
            Block::Table(t) if t.id == id => Some(t),
            _ => None,
        })
    }

    /// The text block whose closed span contains `pos`.
    pub fn block_at(&self, pos: usize) -> Option<BlockRef<'_>> {
        self.text_blocks()
            .into_iter()
            .find(|b| b.block.span.touches(pos))
    }

    /// Span the preview treats as "the active block" for `pos`: the table
    /// cell when inside a table, otherwise the text block.
    pub fn scope_at(&self, pos: usize) -> Option<Span> {
        self.block_at(pos).map(|b| b.block.span)
    }

    /// Applies a transaction atomically.
    pub fn apply(&mut self, tx: &Transaction) -> Result<ChangeSet, DocumentError> {
        let mut work = self.clone();
        let mut maps = Vec::with_capacity(tx.steps.len());
        let mut touched = Vec::with_capacity(tx.steps.len());
        let mut selection = self.selection;

        for step in &tx.steps {
            let (map, t) = work.apply_step(step)?;
            selection = selection.map(&map);
            maps.push(map);
            touched.push(t);
        }

        work.selection = tx.selection.unwrap_or(selection).clamp(work.len());
        work.version += 1;
        *self = work;

        Ok(ChangeSet {
            maps,
            touched,
            origin: tx.origin,
            version: self.version,
        })
    }

    fn apply_step(&mut self, step: &Step) -> Result<(StepMap, Touched), DocumentError> {
        match step {
            Step::ReplaceText { range, text } => self.replace_text(*range, text),
            Step::SetKind { node, kind } => self.set_kind(*node, kind),
            Step::SplitBlock { at } => self.split_block(*at),
            Step::JoinBackward { node } => self.join_backward(*node),
            Step::ReplaceWithTable { node, header, rows } => {
                self.replace_with_table(*node, header, rows)
            }
        }
    }

    fn replace_text(&mut self, range: Span, text: &str) -> Result<(StepMap, Touched), DocumentError> {
        let len = self.len();
        if range.start > range.end || range.end > len {
            return Err(DocumentError::RangeOutOfBounds { range, len });
        }
        let (id, old) = self
            .text_blocks()
            .into_iter()
            .find(|b| b.block.span.contains_span(range))
            .map(|b| (b.block.id, b.block.span))
            .ok_or(DocumentError::RangeCrossesBlocks(range))?;

        let map = self.edit_buffer(range, text);
        let diff = text.len() as isize - range.len() as isize;
        for tb in self.text_blocks_mut() {
            if tb.id == id {
                tb.span.end = tb.span.end.saturating_add_signed(diff);
            } else if tb.span.start > old.end {
                tb.span = shift(tb.span, diff);
            }
        }
        Ok((map, Touched::Block(id)))
    }

    fn set_kind(&mut self, node: NodeId, kind: &NodeKind) -> Result<(StepMap, Touched), DocumentError> {
        if matches!(kind, NodeKind::TableCell { .. }) {
            return Err(DocumentError::InvalidKind(node));
        }
        let len = self.len();
        let idx = self.top_level_text_index(node)?;
        if let Block::Text(t) = &mut self.blocks[idx] {
            t.kind = kind.clone();
        }
        Ok((StepMap::identity(len), Touched::Block(node)))
    }

    fn split_block(&mut self, at: usize) -> Result<(StepMap, Touched), DocumentError> {
        if let Some((idx, row, col)) = self.cell_at(at) {
            return Ok(self.split_cell(idx, row, col, at));
        }
        let idx = self
            .blocks
            .iter()
            .position(|b| matches!(b, Block::Text(t) if t.span.touches(at)))
            .ok_or(DocumentError::InvalidSplit(at))?;
        let Block::Text(current) = &self.blocks[idx] else {
            return Err(DocumentError::InvalidSplit(at));
        };
        let (kind, old) = (current.kind.clone(), current.span);

        let map = self.edit_buffer(Span::new(at, at), "\n");
        for tb in self.text_blocks_mut() {
            if tb.span.start > old.end {
                tb.span = shift(tb.span, 1);
            }
        }
        if let Block::Text(t) = &mut self.blocks[idx] {
            t.span.end = at;
        }
        let id = self.alloc_id();
        self.blocks.insert(
            idx + 1,
            Block::Text(TextBlock {
                id,
                kind,
                span: Span::new(at + 1, old.end + 1),
            }),
        );
        Ok((map, Touched::Ambiguous { ancestor: None }))
    }

    /// Table index, row (`None` for the header) and column of the cell
    /// containing `at`.
    fn cell_at(&self, at: usize) -> Option<(usize, Option<usize>, usize)> {
        self.blocks.iter().enumerate().find_map(|(idx, block)| {
            let Block::Table(table) = block else {
                return None;
            };
            let column = |cells: &[TextBlock]| cells.iter().position(|c| c.span.touches(at));
            if let Some(col) = column(&table.header) {
                return Some((idx, None, col));
            }
            table
                .rows
                .iter()
                .enumerate()
                .find_map(|(r, cells)| column(cells).map(|col| (idx, Some(r), col)))
        })
    }

    /// Splitting inside a cell opens a new body row below the cell's row;
    /// the text after `at` moves to the same column of that row.
    fn split_cell(&mut self, idx: usize, row: Option<usize>, col: usize, at: usize) -> (StepMap, Touched) {
        let Block::Table(table) = &self.blocks[idx] else {
            return (StepMap::identity(self.len()), Touched::Ambiguous { ancestor: None });
        };
        let table_id = table.id;
        let cells = match row {
            Some(r) => &table.rows[r],
            None => &table.header,
        };
        let (cell_id, cell) = (cells[col].id, cells[col].span);
        let row_end = cells.last().map_or(cell.end, |c| c.span.end);
        let width = cells.len();
        let tail = self.slice(Span::new(at, cell.end));

        let mut new_row_text = String::new();
        let mut new_row = Vec::with_capacity(width);
        let mut pos = row_end - tail.len();
        for i in 0..width {
            let content = if i == col { tail.as_str() } else { "" };
            new_row_text.push('\n');
            new_row_text.push_str(content);
            pos += 1;
            let id = self.alloc_id();
            new_row.push(TextBlock {
                id,
                kind: NodeKind::TableCell { header: false },
                span: Span::new(pos, pos + content.len()),
            });
            pos += content.len();
        }

        let map = self.edit_buffer_many(&[(Span::new(at, cell.end), ""), (Span::new(row_end, row_end), &new_row_text)]);
        let removed = tail.len() as isize;
        for tb in self.text_blocks_mut() {
            if tb.id == cell_id {
                tb.span.end = at;
            } else if tb.span.start > row_end {
                tb.span = shift(tb.span, width as isize);
            } else if tb.span.start > cell.end {
                tb.span = shift(tb.span, -removed);
            }
        }
        if let Block::Table(table) = &mut self.blocks[idx] {
            table.rows.insert(row.map_or(0, |r| r + 1), new_row);
        }
        (
            map,
            Touched::Ambiguous {
                ancestor: Some(table_id),
            },
        )
    }

    fn join_backward(&mut self, node: NodeId) -> Result<(StepMap, Touched), DocumentError> {
        let idx = self.top_level_text_index(node)?;
        let prev = match idx.checked_sub(1).map(|i| &self.blocks[i]) {
            Some(Block::Text(prev)) => prev.span,
            _ => return Err(DocumentError::NothingToJoin(node)),
        };
        let current = self.blocks[idx].span();

        let map = self.edit_buffer(Span::new(prev.end, current.start), "");
        let removed = (current.start - prev.end) as isize;
        for tb in self.text_blocks_mut() {
            if tb.span.start > current.end {
                tb.span = shift(tb.span, -removed);
            }
        }
        if let Block::Text(p) = &mut self.blocks[idx - 1] {
            p.span.end = current.end - removed as usize;
        }
        self.blocks.remove(idx);
        Ok((map, Touched::Ambiguous { ancestor: None }))
    }

    fn replace_with_table(
        &mut self,
        node: NodeId,
        header: &[String],
        rows: &[Vec<String>],
    ) -> Result<(StepMap, Touched), DocumentError> {
        if header.is_empty() {
            return Err(DocumentError::EmptyTable);
        }
        let idx = self.top_level_text_index(node)?;
        let old = self.blocks[idx].span();

        let (text, table) = layout_table(old.start, header, rows, &mut self.next_id);
        let table_id = table.id;
        let map = self.edit_buffer(old, &text);
        let diff = text.len() as isize - old.len() as isize;
        for tb in self.text_blocks_mut() {
            if tb.span.start > old.end {
                tb.span = shift(tb.span, diff);
            }
        }
        self.blocks[idx] = Block::Table(table);
        Ok((
            map,
            Touched::Ambiguous {
                ancestor: Some(table_id),
            },
        ))
    }

    fn top_level_text_index(&self, node: NodeId) -> Result<usize, DocumentError> {
        if let Some(idx) = self
            .blocks
            .iter()
            .position(|b| matches!(b, Block::Text(t) if t.id == node))
        {
            return Ok(idx);
        }
        if self.block(node).is_some() || self.table(node).is_some() {
            Err(DocumentError::InvalidKind(node))
        } else {
            Err(DocumentError::UnknownNode(node))
        }
    }

    fn edit_buffer(&mut self, range: Span, text: &str) -> StepMap {
        self.edit_buffer_many(&[(range, text)])
    }

    /// Applies non-overlapping edits, given in buffer order, as one delta.
    fn edit_buffer_many(&mut self, edits: &[(Span, &str)]) -> StepMap {
        let mut builder = Builder::new(self.len());
        for (range, text) in edits {
            if range.is_empty() && text.is_empty() {
                continue;
            }
            builder.replace(range.start..range.end, Rope::from(*text));
        }
        let delta = builder.build();
        self.buffer = delta.apply(&self.buffer);
        StepMap::new(delta)
    }

    fn text_blocks_mut(&mut self) -> Vec<&mut TextBlock> {
        let mut out = Vec::new();
        for block in &mut self.blocks {
            match block {
                Block::Text(t) => out.push(t),
                Block::Table(t) => out.extend(t.cells_mut()),
            }
        }
        out
    }

    fn alloc_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Checks the buffer/block layout described on [`Document`].
    pub fn layout_is_consistent(&self) -> bool {
        let blocks = self.text_blocks();
        let Some(first) = blocks.first() else {
            return false;
        };
        if first.block.span.start != 0 {
            return false;
        }
        for pair in blocks.windows(2) {
            let (a, b) = (pair[0].block.span, pair[1].block.span);
            if a.start > a.end || b.start != a.end + 1 || self.slice(Span::new(a.end, b.start)) != "\n"
            {
                return false;
            }
        }
        blocks
            .last()
            .is_some_and(|last| last.block.span.end == self.len())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn shift(span: Span, diff: isize) -> Span {
    Span::new(
        span.start.saturating_add_signed(diff),
        span.end.saturating_add_signed(diff),
    )
}

/// Lays out table cells starting at `start`: the returned text is the cell
/// texts joined by block separators, header row first.
fn layout_table(
    start: usize,
    header: &[String],
    rows: &[Vec<String>],
    next_id: &mut u64,
) -> (String, Table) {
    let mut alloc = || {
        let id = NodeId(*next_id);
        *next_id += 1;
        id
    };
    let width = header.len();
    let mut text = String::new();
    let cell = |content: &str, header: bool, text: &mut String, id: NodeId| {
        let cell_start = start + text.len();
        text.push_str(content);
        TextBlock {
            id,
            kind: NodeKind::TableCell { header },
            span: Span::new(cell_start, cell_start + content.len()),
        }
    };

    let table_id = alloc();
    let mut head_cells = Vec::with_capacity(width);
    for (i, content) in header.iter().enumerate() {
        if i > 0 {
            text.push('\n');
        }
        head_cells.push(cell(content, true, &mut text, alloc()));
    }
    let mut body = Vec::with_capacity(rows.len());
    for row in rows {
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            text.push('\n');
            let content = row.get(i).map(String::as_str).unwrap_or("");
            cells.push(cell(content, false, &mut text, alloc()));
        }
        body.push(cells);
    }

    (
        text,
        Table {
            id: table_id,
            header: head_cells,
            rows: body,
        },
    )
}

/// Accumulates blocks into a fresh document.
pub(crate) struct DocumentBuilder {
    text: String,
    blocks: Vec<Block>,
    next_id: u64,
}

impl DocumentBuilder {
    pub(crate) fn new() -> Self {
        Self {
            text: String::new(),
            blocks: Vec::new(),
            next_id: 0,
        }
    }

    fn separate(&mut self) {
        if !self.blocks.is_empty() {
            self.text.push('\n');
        }
    }

    pub(crate) fn text_block(&mut self, kind: NodeKind, content: &str) {
        self.separate();
        let start = self.text.len();
        self.text.push_str(content);
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.blocks.push(Block::Text(TextBlock {
            id,
            kind,
            span: Span::new(start, self.text.len()),
        }));
    }

    pub(crate) fn table(&mut self, header: &[String], rows: &[Vec<String>]) {
        if header.is_empty() {
            return;
        }
        self.separate();
        let (text, table) = layout_table(self.text.len(), header, rows, &mut self.next_id);
        self.text.push_str(&text);
        self.blocks.push(Block::Table(table));
    }

    pub(crate) fn finish(mut self) -> Document {
        if self.blocks.is_empty() {
            self.text_block(NodeKind::Paragraph, "");
        }
        Document {
            buffer: Rope::from(self.text.as_str()),
            blocks: self.blocks,
            selection: Selection::default(),
            version: 0,
            next_id: self.next_id,
        }
    }
}
