//! Flat document tree.
//!
//! Nodes live in one ordered vector. A closed node at `i` with
//! `child_count = c` owns `(i, i + c]`; a pending container owns every node
//! after it. Each node records its nesting depth, and the array keeps the
//! chain of pending containers, so the open container and the parent of a
//! node inside it are found without scanning. Inserting or excising nodes
//! adjusts the `child_count` of closed ancestors and the depth of the nodes
//! that change level.

use super::node::{DocumentNode, DocumentNodeType, NodeFlags};
use smallvec::SmallVec;
use std::ops::{Index, IndexMut};

/// Ancestor chain, innermost first.
pub type Ancestors = SmallVec<[usize; 8]>;

#[derive(Debug, Clone, Default)]
pub struct DocumentNodeArray {
    nodes: Vec<DocumentNode>,
    /// Pending containers, outermost first. Entry `k` has depth `k`.
    open: Vec<usize>,
}

impl DocumentNodeArray {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&DocumentNode> {
        self.nodes.get(index)
    }

    #[inline]
    pub fn last(&self) -> Option<&DocumentNode> {
        self.nodes.last()
    }

    #[inline]
    pub fn nodes(&self) -> &[DocumentNode] {
        &self.nodes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocumentNode> {
        self.nodes.iter()
    }

    /// Number of descendants of the node at `index`.
    pub fn descendant_count(&self, index: usize) -> usize {
        let node = &self.nodes[index];
        if node.kind.is_leaf() {
            0
        } else if node.is_pending() {
            self.nodes.len() - index - 1
        } else {
            node.child_count
        }
    }

    /// One past the last descendant of `index`.
    #[inline]
    pub fn subtree_end(&self, index: usize) -> usize {
        index + 1 + self.descendant_count(index)
    }

    #[inline]
    fn child_depth(&self, parent: Option<usize>) -> u32 {
        parent.map_or(0, |p| self.nodes[p].depth + 1)
    }

    #[inline]
    fn is_open_container(node: &DocumentNode) -> bool {
        !node.kind.is_leaf() && node.is_pending()
    }

    /// Parent of `index`; for `index == len()` the container a pushed node
    /// would land in.
    pub fn parent_of(&self, index: usize) -> Option<usize> {
        let Some(node) = self.nodes.get(index) else {
            return self.open_container();
        };
        let depth = node.depth;
        if depth == 0 {
            return None;
        }
        if let Some(&open) = self.open.get(depth as usize - 1)
            && open < index
            && self.nodes[open].depth + 1 == depth
        {
            return Some(open);
        }
        // Closed parent: the nearest preceding node one level up.
        (0..index).rev().find(|&j| self.nodes[j].depth < depth)
    }

    /// `index` followed by its ancestors, innermost first.
    fn chain_from(&self, index: Option<usize>) -> Ancestors {
        let mut chain = Ancestors::new();
        let mut cursor = index;
        while let Some(i) = cursor {
            chain.push(i);
            cursor = self.parent_of(i);
        }
        chain
    }

    pub fn ancestors(&self, index: usize) -> Ancestors {
        self.chain_from(self.parent_of(index))
    }

    /// Innermost pending container, which receives newly pushed nodes.
    #[inline]
    pub fn open_container(&self) -> Option<usize> {
        self.open.last().copied()
    }

    /// Pending containers, outermost first.
    pub fn pending_chain(&self) -> Ancestors {
        self.open.iter().copied().collect()
    }

    /// Direct children of `index`, or top-level nodes for `None`.
    pub fn children(&self, index: Option<usize>) -> Vec<usize> {
        let (mut j, end) = match index {
            Some(i) => (i + 1, self.subtree_end(i)),
            None => (0, self.nodes.len()),
        };
        let mut out = Vec::new();
        while j < end {
            out.push(j);
            j = self.subtree_end(j);
        }
        out
    }

    /// First child of the trailing run of inline children of `index` (the
    /// top level for `None`) that `accept` lets through.
    ///
    /// The scan runs backwards and stops at the first block node, at any
    /// depth: inline containers only hold inline content, so a block marks
    /// the end of the previous block sibling.
    pub fn trailing_inline_start(
        &self,
        index: Option<usize>,
        accept: impl Fn(&DocumentNode) -> bool,
    ) -> Option<usize> {
        let (lo, end) = match index {
            Some(i) => (i + 1, self.subtree_end(i)),
            None => (0, self.nodes.len()),
        };
        let depth = self.child_depth(index);
        let mut start = None;
        for j in (lo..end).rev() {
            let node = &self.nodes[j];
            if !node.kind.is_inline() {
                break;
            }
            if node.depth == depth {
                if !accept(node) {
                    break;
                }
                start = Some(j);
            }
        }
        start
    }

    /// Nearest earlier sibling of `index` matching `pred`.
    pub fn previous_sibling(
        &self,
        index: usize,
        pred: impl Fn(&DocumentNode) -> bool,
    ) -> Option<usize> {
        let depth = self.nodes.get(index)?.depth;
        for j in (0..index).rev() {
            let node = &self.nodes[j];
            if node.depth < depth {
                return None;
            }
            if node.depth == depth && pred(node) {
                return Some(j);
            }
        }
        None
    }

    /// Append a node, closing a trailing pending text run first.
    pub fn push(&mut self, mut node: DocumentNode) -> usize {
        if let Some(last) = self.nodes.last_mut()
            && last.kind == DocumentNodeType::Text
            && last.is_pending()
        {
            last.flags.remove(NodeFlags::PENDING);
        }
        node.depth = self.child_depth(self.open_container());
        let index = self.nodes.len();
        if Self::is_open_container(&node) {
            self.open.push(index);
        }
        self.nodes.push(node);
        index
    }

    fn close_single(&mut self, index: usize) {
        let len = self.nodes.len();
        let was_open = Self::is_open_container(&self.nodes[index]);
        let node = &mut self.nodes[index];
        node.child_count = if node.kind.is_leaf() { 0 } else { len - index - 1 };
        node.flags.remove(NodeFlags::PENDING);
        if was_open && let Ok(pos) = self.open.binary_search(&index) {
            self.open.remove(pos);
        }
    }

    /// A pending leaf can only be the trailing text run.
    fn close_trailing_leaf(&mut self, after: Option<usize>) {
        if let Some(last) = self.nodes.len().checked_sub(1)
            && after.is_none_or(|a| last > a)
            && self.nodes[last].kind.is_leaf()
            && self.nodes[last].is_pending()
        {
            self.close_single(last);
        }
    }

    /// Close the node at `index`, closing its pending descendants first.
    pub fn close_at(&mut self, index: usize) {
        self.close_trailing_leaf(Some(index));
        while let Some(&j) = self.open.last() {
            if j <= index {
                break;
            }
            self.close_single(j);
        }
        self.close_single(index);
    }

    /// Close every pending node.
    pub fn close_all(&mut self) {
        self.close_trailing_leaf(None);
        while let Some(&j) = self.open.last() {
            self.close_single(j);
        }
    }

    /// Insert `node` at `index` as a child of `parent`.
    ///
    /// The node may already carry a `child_count` covering the nodes that
    /// follow the insertion point; a pending container covers all of them.
    pub fn insert_node(&mut self, index: usize, mut node: DocumentNode, parent: Option<usize>) {
        let chain = self.chain_from(parent);
        node.depth = self.child_depth(parent);
        let opens = Self::is_open_container(&node);
        let covered = if opens {
            self.nodes.len() - index
        } else {
            node.child_count.min(self.nodes.len() - index)
        };
        for wrapped in &mut self.nodes[index..index + covered] {
            wrapped.depth += 1;
        }
        for j in &mut self.open {
            if *j >= index {
                *j += 1;
            }
        }
        if opens {
            let pos = self.open.partition_point(|&j| j < index);
            self.open.insert(pos, index);
        }
        self.nodes.insert(index, node);
        for a in chain {
            if !self.nodes[a].is_pending() {
                self.nodes[a].child_count += 1;
            }
        }
    }

    /// Remove `count` nodes starting at `index`.
    ///
    /// The range must consist of whole subtrees.
    pub fn excise(&mut self, index: usize, count: usize) {
        if count == 0 || index >= self.nodes.len() {
            return;
        }
        let count = count.min(self.nodes.len() - index);
        let chain = self.ancestors(index);
        self.nodes.drain(index..index + count);
        self.open.retain(|&j| j < index || j >= index + count);
        for j in &mut self.open {
            if *j >= index + count {
                *j -= count;
            }
        }
        for a in chain {
            let node = &mut self.nodes[a];
            if !node.is_pending() {
                node.child_count = node.child_count.saturating_sub(count);
            }
        }
    }

    /// Remove a container, promoting its children to its parent.
    pub fn unwrap_at(&mut self, index: usize) {
        let chain = self.ancestors(index);
        let end = self.subtree_end(index);
        for child in &mut self.nodes[index + 1..end] {
            child.depth = child.depth.saturating_sub(1);
        }
        self.open.retain(|&j| j != index);
        for j in &mut self.open {
            if *j > index {
                *j -= 1;
            }
        }
        self.nodes.remove(index);
        for a in chain {
            let node = &mut self.nodes[a];
            if !node.is_pending() {
                node.child_count = node.child_count.saturating_sub(1);
            }
        }
    }

    /// Take every node from `index` to the end.
    pub fn detach_from(&mut self, index: usize) -> Vec<DocumentNode> {
        let count = self.nodes.len().saturating_sub(index);
        if count == 0 {
            return Vec::new();
        }
        let chain = self.ancestors(index);
        let tail: Vec<_> = self.nodes.drain(index..).collect();
        self.open.retain(|&j| j < index);
        for a in chain {
            let node = &mut self.nodes[a];
            if !node.is_pending() {
                node.child_count = node.child_count.saturating_sub(count);
            }
        }
        tail
    }

    /// Append previously detached nodes under the current open container.
    pub fn reattach(&mut self, tail: Vec<DocumentNode>) {
        let count = tail.len();
        let parent = self.open_container();
        let chain = self.chain_from(parent);
        let base = self.child_depth(parent);
        let old_base = tail.iter().map(|n| n.depth).min().unwrap_or(0);
        for mut node in tail {
            node.depth = node.depth - old_base + base;
            if Self::is_open_container(&node) {
                self.open.push(self.nodes.len());
            }
            self.nodes.push(node);
        }
        for a in chain {
            if !self.nodes[a].is_pending() {
                self.nodes[a].child_count += count;
            }
        }
    }

    /// Whether the text node at `index` can absorb its next sibling.
    fn can_coalesce(&self, index: usize) -> bool {
        let (Some(a), Some(b)) = (self.nodes.get(index), self.nodes.get(index + 1)) else {
            return false;
        };
        if a.kind != DocumentNodeType::Text
            || b.kind != DocumentNodeType::Text
            || a.is_pending()
            || b.is_pending()
            || a.flags != b.flags
            || a.format.dest != b.format.dest
            || !a.format.char_format_eq(&b.format)
        {
            return false;
        }
        // Adjacent at the same depth after a leaf: same parent.
        a.depth == b.depth
    }

    /// Merge the text node at `index` with its next sibling if both render
    /// identically.
    pub fn coalesce_pair(&mut self, index: usize) -> bool {
        if !self.can_coalesce(index) {
            return false;
        }
        let next = std::mem::take(&mut self.nodes[index + 1].content);
        self.nodes[index].content.push_str(&next);
        self.excise(index + 1, 1);
        true
    }

    /// Coalesce adjacent text siblings within `[start, end)`.
    pub fn coalesce_range(&mut self, start: usize, end: usize) {
        let mut end = end.min(self.nodes.len());
        let mut j = start;
        while j + 1 < end {
            if self.coalesce_pair(j) {
                end -= 1;
            } else {
                j += 1;
            }
        }
    }

    /// Coalesce the descendants of a closed node.
    pub fn coalesce_children(&mut self, index: usize) {
        let end = self.subtree_end(index);
        self.coalesce_range(index + 1, end);
    }

    pub fn coalesce_all(&mut self) {
        self.coalesce_range(0, self.nodes.len());
    }

    /// Number of pending nodes of `kind`.
    pub fn count_pending(&self, kind: DocumentNodeType) -> usize {
        if kind.is_leaf() {
            return usize::from(self.nodes.last().is_some_and(|n| n.kind == kind && n.is_pending()));
        }
        self.open.iter().filter(|&&j| self.nodes[j].kind == kind).count()
    }

    /// Innermost pending node of `kind`.
    pub fn last_pending(&self, kind: DocumentNodeType) -> Option<usize> {
        if kind.is_leaf() {
            let last = self.nodes.len().checked_sub(1)?;
            let node = &self.nodes[last];
            return (node.kind == kind && node.is_pending()).then_some(last);
        }
        self.open.iter().rev().copied().find(|&j| self.nodes[j].kind == kind)
    }

    /// Check the structural invariants: leaves own nothing, closed ranges stay
    /// inside the array and nest properly, children sit one level below their
    /// parent and no closed node contains a pending one.
    pub fn validate(&self) -> Result<(), String> {
        let len = self.nodes.len();
        for (i, node) in self.nodes.iter().enumerate() {
            if node.kind.is_leaf() {
                if node.child_count != 0 {
                    return Err(format!("leaf node {} owns {} children", i, node.child_count));
                }
                continue;
            }
            if node.is_pending() {
                continue;
            }
            let end = i + node.child_count;
            if end >= len && node.child_count > 0 {
                return Err(format!("node {} range ends past the array", i));
            }
            let mut j = i + 1;
            while j <= end {
                let child = &self.nodes[j];
                if child.is_pending() {
                    return Err(format!("closed node {} contains pending node {}", i, j));
                }
                if child.depth != node.depth + 1 {
                    return Err(format!("node {} is not one level below its parent {}", j, i));
                }
                let child_end = j + self.descendant_count(j);
                if child_end > end {
                    return Err(format!("node {} overlaps the end of its parent {}", j, i));
                }
                j = child_end + 1;
            }
        }
        Ok(())
    }
}

impl Index<usize> for DocumentNodeArray {
    type Output = DocumentNode;

    #[inline]
    fn index(&self, index: usize) -> &DocumentNode {
        &self.nodes[index]
    }
}

impl IndexMut<usize> for DocumentNodeArray {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut DocumentNode {
        &mut self.nodes[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::format::FormatState;
    use proptest::prelude::*;

    fn node(kind: DocumentNodeType) -> DocumentNode {
        DocumentNode::new(kind, FormatState::default())
    }

    fn text(s: &str) -> DocumentNode {
        DocumentNode::text(s, FormatState::default())
    }

    #[test]
    fn test_pending_container_owns_tail() {
        let mut doc = DocumentNodeArray::new();
        let p = doc.push(node(DocumentNodeType::Paragraph));
        let t = doc.push(text("a"));
        assert_eq!(doc.parent_of(t), Some(p));
        doc.close_at(p);
        assert_eq!(doc[p].child_count, 1);
        assert!(!doc[t].is_pending());
        let after = doc.push(text("b"));
        assert_eq!(doc.parent_of(after), None);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_push_closes_trailing_text() {
        let mut doc = DocumentNodeArray::new();
        doc.push(text("a"));
        doc.push(text("b"));
        assert!(!doc[0].is_pending());
        assert!(doc[1].is_pending());
    }

    #[test]
    fn test_pending_leaf_is_not_a_container() {
        let mut doc = DocumentNodeArray::new();
        doc.push(node(DocumentNodeType::FieldBegin));
        let t = doc.push(text("x"));
        assert_eq!(doc.parent_of(t), None);
    }

    #[test]
    fn test_insert_adjusts_closed_ancestors() {
        let mut doc = DocumentNodeArray::new();
        let p = doc.push(node(DocumentNodeType::Paragraph));
        doc.push(text("a"));
        doc.push(text("b"));
        doc.close_at(p);
        let mut link = node(DocumentNodeType::Hyperlink);
        link.flags.remove(NodeFlags::PENDING);
        link.child_count = 2;
        doc.insert_node(1, link, Some(p));
        assert_eq!(doc[p].child_count, 3);
        assert_eq!(doc.parent_of(2), Some(1));
        assert!(doc.validate().is_ok());

        doc.unwrap_at(1);
        assert_eq!(doc[p].child_count, 2);
        assert_eq!(doc.parent_of(1), Some(p));
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_excise_and_detach() {
        let mut doc = DocumentNodeArray::new();
        let s = doc.push(node(DocumentNodeType::Section));
        let p = doc.push(node(DocumentNodeType::Paragraph));
        doc.push(text("a"));
        doc.push(text("b"));
        doc.close_at(s);
        assert_eq!(doc[s].child_count, 3);
        doc.excise(3, 1);
        assert_eq!(doc[s].child_count, 2);
        assert_eq!(doc[p].child_count, 1);

        let tail = doc.detach_from(p);
        assert_eq!(tail.len(), 2);
        assert_eq!(doc[s].child_count, 0);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_detach_reattach_under_open_container() {
        let mut doc = DocumentNodeArray::new();
        let table = doc.push(node(DocumentNodeType::Table));
        let p = doc.push(node(DocumentNodeType::Paragraph));
        doc.push(text("x"));
        doc.close_at(p);
        let tail = doc.detach_from(p);
        doc.close_at(table);
        doc.reattach(tail);
        assert_eq!(doc[table].child_count, 0);
        assert_eq!(doc.parent_of(1), None);
        assert_eq!(doc.children(None), vec![0, 1]);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_children() {
        let mut doc = DocumentNodeArray::new();
        let l = doc.push(node(DocumentNodeType::List));
        let i1 = doc.push(node(DocumentNodeType::ListItem));
        doc.push(node(DocumentNodeType::Paragraph));
        doc.close_at(i1);
        let i2 = doc.push(node(DocumentNodeType::ListItem));
        doc.close_at(l);
        assert_eq!(doc.children(Some(l)), vec![i1, i2]);
    }

    #[test]
    fn test_coalesce_respects_parent_boundary() {
        let mut doc = DocumentNodeArray::new();
        let p = doc.push(node(DocumentNodeType::Paragraph));
        doc.push(text("a"));
        doc.close_at(p);
        doc.push(text("b"));
        doc.close_all();
        doc.coalesce_all();
        assert_eq!(doc.len(), 3);
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let mut doc = DocumentNodeArray::new();
        let p = doc.push(node(DocumentNodeType::Paragraph));
        doc.push(text("a"));
        doc.close_at(p);
        doc[p].child_count = 5;
        assert!(doc.validate().is_err());
    }

    #[test]
    fn test_open_stack_tracks_pending_containers() {
        let mut doc = DocumentNodeArray::new();
        let list = doc.push(node(DocumentNodeType::List));
        let item = doc.push(node(DocumentNodeType::ListItem));
        let p = doc.push(node(DocumentNodeType::Paragraph));
        let t = doc.push(text("a"));
        assert_eq!(doc.pending_chain().to_vec(), vec![list, item, p]);
        assert_eq!(doc.open_container(), Some(p));
        assert_eq!(doc[t].depth, 3);
        assert_eq!(doc.parent_of(t), Some(p));

        doc.close_at(item);
        assert_eq!(doc.pending_chain().to_vec(), vec![list]);
        assert_eq!(doc.last_pending(DocumentNodeType::ListItem), None);
        assert_eq!(doc.count_pending(DocumentNodeType::List), 1);
        let next = doc.push(node(DocumentNodeType::ListItem));
        assert_eq!(doc[next].depth, 1);
        assert_eq!(doc.parent_of(next), Some(list));

        doc.close_all();
        assert!(doc.pending_chain().is_empty());
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_insert_pending_container_deepens_tail() {
        let mut doc = DocumentNodeArray::new();
        let s = doc.push(node(DocumentNodeType::Section));
        doc.push(node(DocumentNodeType::Paragraph));
        doc.push(text("a"));
        doc.insert_node(1, node(DocumentNodeType::Hyperlink), Some(s));
        assert_eq!(doc.pending_chain().to_vec(), vec![0, 1, 2]);
        assert_eq!((doc[2].depth, doc[3].depth), (2, 3));
        assert_eq!(doc.parent_of(3), Some(2));
        doc.close_all();
        assert_eq!(doc[1].child_count, 2);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_reattach_rebases_depth() {
        let mut doc = DocumentNodeArray::new();
        let table = doc.push(node(DocumentNodeType::Table));
        let cell = doc.push(node(DocumentNodeType::Cell));
        let p = doc.push(node(DocumentNodeType::Paragraph));
        doc.push(text("x"));
        let tail = doc.detach_from(p);
        assert_eq!(doc.pending_chain().to_vec(), vec![table, cell]);

        doc.close_at(cell);
        doc.reattach(tail);
        assert_eq!((doc[2].depth, doc[3].depth), (1, 2));
        assert_eq!(doc.pending_chain().to_vec(), vec![table, 2]);
        assert_eq!(doc.parent_of(3), Some(2));

        doc.excise(3, 1);
        assert_eq!(doc.pending_chain().to_vec(), vec![table, 2]);
        doc.close_all();
        assert_eq!(doc.children(Some(table)), vec![cell, 2]);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_trailing_inline_start_and_previous_sibling() {
        let mut doc = DocumentNodeArray::new();
        let p = doc.push(node(DocumentNodeType::Paragraph));
        doc.push(text("a"));
        doc.close_at(p);
        let b = doc.push(text("b"));
        let link = doc.push(node(DocumentNodeType::Hyperlink));
        doc.push(text("c"));
        assert_eq!(doc.trailing_inline_start(None, |_| true), Some(b));
        assert_eq!(doc.trailing_inline_start(Some(link), |_| true), Some(link + 1));
        assert_eq!(
            doc.trailing_inline_start(None, |n| n.kind != DocumentNodeType::Hyperlink),
            None
        );

        doc.close_all();
        assert_eq!(doc.previous_sibling(link, |n| n.kind == DocumentNodeType::Paragraph), Some(p));
        assert_eq!(doc.previous_sibling(link + 1, |n| n.kind == DocumentNodeType::Text), None);
    }

    #[test]
    fn test_validate_rejects_wrong_depth() {
        let mut doc = DocumentNodeArray::new();
        let p = doc.push(node(DocumentNodeType::Paragraph));
        doc.push(text("a"));
        doc.close_at(p);
        doc[1].depth = 3;
        assert!(doc.validate().is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_coalesce_is_associative(a in "[a-z]{0,8}", b in "[a-z]{0,8}", c in "[a-z]{0,8}", left_first in any::<bool>()) {
            let mut doc = DocumentNodeArray::new();
            let p = doc.push(node(DocumentNodeType::Paragraph));
            doc.push(text(&a));
            doc.push(text(&b));
            doc.push(text(&c));
            doc.close_at(p);
            if left_first {
                prop_assert!(doc.coalesce_pair(1));
                prop_assert!(doc.coalesce_pair(1));
            } else {
                prop_assert!(doc.coalesce_pair(2));
                prop_assert!(doc.coalesce_pair(1));
            }
            prop_assert_eq!(doc.len(), 2);
            prop_assert_eq!(doc[p].child_count, 1);
            prop_assert_eq!(&doc[1].content, &format!("{a}{b}{c}"));
            // Idempotent once merged.
            prop_assert!(!doc.coalesce_pair(1));
        }
    }
}
