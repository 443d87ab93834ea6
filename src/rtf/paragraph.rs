//! Paragraph boundaries.
//!
//! Inline content accumulates under the innermost open container until a
//! `\par` (or a cell, row or document end) wraps the trailing inline run in
//! a closed paragraph. The paragraph boundary is where table and list
//! nesting are reconciled with the format state.

use super::reader::RtfToXamlReader;
use crate::common::error::Result;
use crate::document::{DocumentNode, DocumentNodeArray, DocumentNodeType, NodeFlags};

impl<'a> RtfToXamlReader<'a> {
    /// First node of the trailing inline run of the open container, if
    /// there is one. The scan stops at a field begin whose field is still
    /// open.
    pub(super) fn inline_run_start(&self) -> Option<usize> {
        self.doc.trailing_inline_start(self.doc.open_container(), |node| {
            node.kind != DocumentNodeType::FieldBegin || node.is_matched()
        })
    }

    /// `\par`: close the trailing inline run into a paragraph, then bring
    /// table and list nesting in line with the current state.
    pub(super) fn handle_para(&mut self) -> Result<()> {
        let top = self.stack.top();
        if !top.dest.is_content() || top.hidden {
            return Ok(());
        }
        let node = DocumentNode::new(DocumentNodeType::Paragraph, top.block_only());
        let parent = self.doc.open_container();
        let start = self.inline_run_start().unwrap_or(self.doc.len());
        self.doc.insert_node(start, node, parent);
        self.doc.close_at(start);
        self.doc.coalesce_children(start);

        let para = self.reconcile_tables(start)?;
        self.reconcile_lists(para)
    }

    pub(super) fn wrap_stray_inlines(&mut self) {
        wrap_stray_inlines(&mut self.doc);
    }
}

/// Wrap inline runs that sit directly in a block container in closed
/// paragraphs. The root is only touched when it already holds block
/// content.
pub(crate) fn wrap_stray_inlines(doc: &mut DocumentNodeArray) {
    let mut containers: Vec<Option<usize>> = vec![None];
    containers.extend(
        doc.iter()
            .enumerate()
            .filter(|(_, n)| {
                matches!(
                    n.kind,
                    DocumentNodeType::ListItem | DocumentNodeType::Cell | DocumentNodeType::Section
                )
            })
            .map(|(i, _)| Some(i)),
    );

    // Later containers first: insertions never shift an unvisited index.
    for container in containers.into_iter().rev() {
        let children = doc.children(container);
        if container.is_none() && !children.iter().any(|&c| doc[c].kind.is_block()) {
            continue;
        }

        let mut runs = Vec::new();
        let mut i = 0;
        while i < children.len() {
            if !doc[children[i]].kind.is_inline() {
                i += 1;
                continue;
            }
            let first = children[i];
            while i < children.len() && doc[children[i]].kind.is_inline() {
                i += 1;
            }
            runs.push((first, doc.subtree_end(children[i - 1])));
        }

        for (start, end) in runs.into_iter().rev() {
            let mut para = DocumentNode::new(DocumentNodeType::Paragraph, doc[start].format.block_only());
            para.flags.remove(NodeFlags::PENDING);
            para.child_count = end - start;
            doc.insert_node(start, para, container);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FormatState;
    use crate::rtf::reader::tests::decode;

    #[test]
    fn test_paragraph_wraps_trailing_run_only() {
        let (doc, _) = decode(br"{\rtf1 a\par b{\b c}\par}");
        let top: Vec<_> = doc.children(None);
        assert_eq!(top.len(), 2);
        let second = top[1];
        assert_eq!(doc.children(Some(second)).len(), 2);
        assert_eq!(doc[second + 1].content, "b");
        assert_eq!(doc[second + 2].content, "c");
    }

    #[test]
    fn test_empty_paragraphs_kept() {
        let (doc, xaml) = decode(br"{\rtf1 a\par\par}");
        assert_eq!(doc.children(None).len(), 2);
        assert!(xaml.contains("<Paragraph/>"));
    }

    #[test]
    fn test_page_break_only_closes_pending_text() {
        let (doc, _) = decode(br"{\rtf1 a\page\page b\par}");
        assert_eq!(doc.children(None).len(), 2);
    }

    #[test]
    fn test_hidden_par_ignored() {
        let (doc, _) = decode(br"{\rtf1 a{\v \par}b\par}");
        assert_eq!(doc.children(None).len(), 1);
        assert_eq!(doc[1].content, "ab");
    }

    #[test]
    fn test_wrap_stray_inlines_in_list_item() {
        let mut doc = DocumentNodeArray::new();
        let state = FormatState::default();
        doc.push(DocumentNode::new(DocumentNodeType::List, state.clone()));
        doc.push(DocumentNode::new(DocumentNodeType::ListItem, state.clone()));
        doc.push(DocumentNode::text("x", state.clone()));
        doc.push(DocumentNode::leaf(DocumentNodeType::LineBreak, state.clone()));
        doc.close_all();
        wrap_stray_inlines(&mut doc);
        assert_eq!(doc[2].kind, DocumentNodeType::Paragraph);
        assert_eq!(doc[2].child_count, 2);
        assert_eq!(doc[0].child_count, 4);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_inline_only_root_left_alone() {
        let mut doc = DocumentNodeArray::new();
        doc.push(DocumentNode::text("x", FormatState::default()));
        doc.close_all();
        wrap_stray_inlines(&mut doc);
        assert_eq!(doc.len(), 1);
    }
}
