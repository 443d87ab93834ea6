//! Table nesting.
//!
//! RTF has no table groups: a paragraph belongs to a table when its state
//! says `\intbl` (depth 1) or `\itapN`. Each paragraph boundary compares the
//! declared depth with the tables currently open and opens or closes
//! `Table > TableBody > Row > Cell` chains to match. Cell and row marks
//! close the innermost pending cell or row. The column grid and cell spans
//! are derived from the row definitions once the document is complete.

use super::reader::RtfToXamlReader;
use crate::common::error::Result;
use crate::document::{DocumentNode, DocumentNodeType};
use std::collections::HashMap;

impl<'a> RtfToXamlReader<'a> {
    /// Make the number of open tables equal the declared depth, moving the
    /// paragraph at `para` into the innermost cell. Returns the paragraph's
    /// new index.
    pub(super) fn reconcile_tables(&mut self, para: usize) -> Result<usize> {
        let want = self.stack.top().table_depth();
        let have = self.doc.count_pending(DocumentNodeType::Table);
        if want == 0 && have == 0 {
            return Ok(para);
        }

        let tail = self.doc.detach_from(para);
        if have > want {
            let tables: Vec<usize> = self
                .doc
                .pending_chain()
                .into_iter()
                .filter(|&i| self.doc[i].kind == DocumentNodeType::Table)
                .collect();
            self.close_scope(tables[want]);
            if want > 0 {
                self.ensure_row_and_cell();
            }
        } else {
            if have < want {
                self.close_stray_lists();
            }
            if have > 0 {
                self.ensure_row_and_cell();
            }
            for _ in have..want {
                for kind in [
                    DocumentNodeType::Table,
                    DocumentNodeType::TableBody,
                    DocumentNodeType::Row,
                    DocumentNodeType::Cell,
                ] {
                    self.push_block(kind);
                }
            }
        }

        let index = self.doc.len();
        self.doc.reattach(tail);
        Ok(index)
    }

    /// Open the body, row and cell of the innermost table where missing.
    fn ensure_row_and_cell(&mut self) {
        let Some(mut parent) = self.doc.last_pending(DocumentNodeType::Table) else {
            return;
        };
        for kind in [
            DocumentNodeType::TableBody,
            DocumentNodeType::Row,
            DocumentNodeType::Cell,
        ] {
            parent = match self.doc.last_pending(kind).filter(|&i| i > parent) {
                Some(existing) => existing,
                None => self.push_block(kind),
            };
        }
    }

    /// A table is starting: an open list outside every cell cannot hold it.
    fn close_stray_lists(&mut self) {
        let floor = self.doc.last_pending(DocumentNodeType::Cell);
        let first = self
            .doc
            .pending_chain()
            .into_iter()
            .find(|&i| self.doc[i].kind == DocumentNodeType::List && floor.is_none_or(|c| i > c));
        if let Some(list) = first {
            self.close_scope(list);
        }
    }

    pub(super) fn push_block(&mut self, kind: DocumentNodeType) -> usize {
        let format = self.stack.top().block_only();
        self.doc.push(DocumentNode::new(kind, format))
    }

    /// Close the node at `index` and everything still open inside it.
    pub(super) fn close_scope(&mut self, index: usize) {
        self.doc.close_at(index);
        let in_open_field = self.open_fields > 0
            && self.doc.iter().take(index).any(|n| {
                n.kind == DocumentNodeType::FieldBegin && !n.is_matched()
            });
        if !in_open_field {
            self.doc.coalesce_children(index);
        }
    }

    /// `\cell` / `\nestcell`.
    pub(super) fn handle_cell(&mut self) -> Result<()> {
        if self.stack.top().table_depth() == 0 {
            self.stack.top_mut().in_table = true;
        }
        let depth = self.stack.top().table_depth();
        if self.inline_run_start().is_some() || self.doc.count_pending(DocumentNodeType::Cell) < depth
        {
            self.handle_para()?;
        }
        match self.doc.last_pending(DocumentNodeType::Cell) {
            Some(cell) => {
                self.close_scope(cell);
                Ok(())
            },
            None => self.absorb("cell end outside a table"),
        }
    }

    /// `\row` / `\nestrow`.
    pub(super) fn handle_row(&mut self) -> Result<()> {
        if self.doc.last_pending(DocumentNodeType::Row).is_none()
            && self.stack.top().table_depth() == 0
        {
            return self.absorb("row end outside a table");
        }
        if self.inline_run_start().is_some() {
            self.handle_cell()?;
        }
        match self.doc.last_pending(DocumentNodeType::Row) {
            Some(row) => {
                self.close_scope(row);
                self.doc[row].format.row_format = self.stack.top().row_format.clone();
                Ok(())
            },
            None => self.absorb("row end outside a table"),
        }
    }

    /// Derive column widths, cell positions and spans from the row
    /// definitions, folding merged continuation cells into their owners.
    pub(super) fn finalize_tables(&mut self) {
        let tables: Vec<usize> = self
            .doc
            .iter()
            .enumerate()
            .filter(|(_, n)| n.kind == DocumentNodeType::Table)
            .map(|(i, _)| i)
            .collect();
        for table in tables.into_iter().rev() {
            self.finalize_table(table);
        }
    }

    fn finalize_table(&mut self, table: usize) {
        let rows: Vec<usize> = self
            .doc
            .children(Some(table))
            .into_iter()
            .filter(|&b| self.doc[b].kind == DocumentNodeType::TableBody)
            .flat_map(|b| self.doc.children(Some(b)))
            .filter(|&r| self.doc[r].kind == DocumentNodeType::Row)
            .collect();

        let mut bounds: Vec<i64> = Vec::new();
        for &row in &rows {
            let def = &self.doc[row].format.row_format;
            bounds.push(def.left);
            bounds.extend(def.cells.iter().map(|c| c.cellx));
        }
        bounds.sort_unstable();
        bounds.dedup();
        self.doc[table].columns = bounds.windows(2).map(|w| w[1] - w[0]).collect();

        let mut removals: Vec<usize> = Vec::new();
        // Column -> cell that started a vertical merge there
        let mut owners: HashMap<u32, usize> = HashMap::new();
        for &row in &rows {
            let def = self.doc[row].format.row_format.clone();
            let cells: Vec<usize> = self
                .doc
                .children(Some(row))
                .into_iter()
                .filter(|&c| self.doc[c].kind == DocumentNodeType::Cell)
                .collect();

            let mut left = def.left;
            let mut next_col: u32 = 0;
            let mut previous: Option<usize> = None;
            for (k, &cell) in cells.iter().enumerate() {
                let cell_def = def.cells.get(k).cloned();
                let (col, span) = match &cell_def {
                    Some(cd) => {
                        let from = bounds.iter().position(|&b| b == left);
                        let to = bounds.iter().position(|&b| b == cd.cellx);
                        left = cd.cellx;
                        match (from, to) {
                            (Some(f), Some(t)) if t > f => (f as u32, (t - f) as u32),
                            _ => (next_col, 1),
                        }
                    },
                    None => (next_col, 1),
                };
                next_col = col + span;

                let node = &mut self.doc[cell];
                node.column_index = col;
                node.col_span = span;
                if let Some(mut cd) = cell_def {
                    if cd.padding == [0; 4] {
                        cd.padding = def.padding;
                    }
                    node.format.cell = cd;
                } else {
                    node.format.cell.padding = def.padding;
                }

                let cd = self.doc[cell].format.cell.clone();
                if cd.hmerge_cont
                    && let Some(prev) = previous
                {
                    self.doc[prev].col_span += span;
                    removals.push(cell);
                    continue;
                }
                if cd.vmerge_cont {
                    if let Some(&owner) = owners.get(&col) {
                        self.doc[owner].row_span += 1;
                        removals.push(cell);
                        previous = Some(cell);
                        continue;
                    }
                } else if cd.vmerge_first {
                    owners.insert(col, cell);
                } else {
                    owners.remove(&col);
                }
                previous = Some(cell);
            }
        }

        removals.sort_unstable();
        for cell in removals.into_iter().rev() {
            let count = self.doc.subtree_end(cell) - cell;
            self.doc.excise(cell, count);
        }
    }
}
