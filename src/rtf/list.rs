//! List nesting.
//!
//! A list paragraph carries its list membership as state: `\lsN\ilvlK`
//! (override table) or old-style `\pnlvlN`. At each paragraph boundary the
//! chain of lists the paragraph asks for ("want") is compared with the lists
//! currently open ("have"); the longest matching prefix stays open, deeper
//! lists are closed and missing ones are opened.
//!
//! For `\lsN` paragraphs every level of "want" is resolved through the
//! override and list tables. The paragraph's own level must come from the
//! same override as the open list; outer levels only need the same list
//! definition, so overrides that reformat a nested level of one definition
//! still nest under its lists.

use super::reader::RtfToXamlReader;
use crate::common::error::Result;
use crate::document::{DocumentNode, DocumentNodeType, FormatState, MarkerStyle};

/// Identity of one list level, as compared between open and wanted lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct ListEntry {
    pub marker: MarkerStyle,
    /// Override index, 0 for old-style numbering
    pub ils: i64,
    /// List definition behind the override, if the override exists
    pub list_id: Option<i64>,
    /// Default start index of the level
    pub start: i64,
    /// One-shot start index from the override; always opens a new list
    pub restart: Option<i64>,
}

impl ListEntry {
    fn same_definition(&self, other: &Self) -> bool {
        match (self.list_id, other.list_id) {
            (Some(a), Some(b)) => a == b,
            _ => self.ils == other.ils,
        }
    }
}

/// Length of the prefix of `want` that the open lists in `have` already
/// satisfy. A continuation paragraph matches whatever is open.
pub(super) fn matched_prefix(have: &[ListEntry], want: &[ListEntry], is_continue: bool) -> usize {
    if is_continue {
        return have.len().min(want.len());
    }
    let own = want.len().saturating_sub(1);
    have.iter()
        .zip(want)
        .enumerate()
        .take_while(|&(depth, (h, w))| {
            let (same_list, same_marker) = if depth == own {
                (h.ils == w.ils, h.marker == w.marker)
            } else {
                // Whitespace list text hides an outer list's marker, not its level.
                (h.same_definition(w), h.marker == w.marker || h.marker == MarkerStyle::Hidden)
            };
            same_marker && same_list && h.start == w.start && w.restart.is_none()
        })
        .count()
}

impl<'a> RtfToXamlReader<'a> {
    /// Open lists that are not inside a table cell opened after them.
    fn open_lists(&self) -> Vec<usize> {
        let floor = self.doc.last_pending(DocumentNodeType::Cell);
        self.doc
            .pending_chain()
            .into_iter()
            .filter(|&i| {
                self.doc[i].kind == DocumentNodeType::List && floor.is_none_or(|c| i > c)
            })
            .collect()
    }

    fn entry_of(&self, node: &DocumentNode) -> ListEntry {
        let ils = node.format.ils;
        ListEntry {
            marker: node.format.marker,
            ils,
            list_id: self.list_id_of(ils),
            start: node.format.start_index,
            restart: None,
        }
    }

    fn list_id_of(&self, ils: i64) -> Option<i64> {
        if ils > 0 { self.tables.overrides.get(ils).map(|o| o.list_id) } else { None }
    }

    /// Bring open lists in line with the list state of the paragraph at
    /// `para`, moving it into the right list item.
    pub(super) fn reconcile_lists(&mut self, para: usize) -> Result<()> {
        let hide_marker = std::mem::take(&mut self.marker_is_whitespace);
        let state = self.stack.top().clone();
        let lists = self.open_lists();
        let have: Vec<ListEntry> = lists.iter().map(|&i| self.entry_of(&self.doc[i])).collect();

        let level = usize::try_from(state.list_level()).unwrap_or(0);
        let target = if state.is_continue && level == 0 { have.len() } else { level };

        let mut want: Vec<ListEntry> = Vec::with_capacity(target);
        for depth in 0..target {
            // Old-style numbering only describes its own level.
            let inherit = state.is_continue || (state.ils <= 0 && depth + 1 < target);
            if inherit && let Some(&open) = have.get(depth) {
                want.push(open);
                continue;
            }
            let consume = !state.is_continue && depth + 1 == target;
            want.push(self.resolve_level(&state, depth, consume));
        }
        if hide_marker && let Some(last) = want.last_mut() {
            last.marker = MarkerStyle::Hidden;
        }
        if want.is_empty() && lists.is_empty() {
            return Ok(());
        }

        let matched = matched_prefix(&have, &want, state.is_continue);
        let mut continuation = None;
        if matched == 0 && !want.is_empty() {
            continuation = self.continued_start(para, &want[..1]);
        }

        self.ensure_list_and_item(para, &lists, &want, matched, continuation, state.is_continue);
        Ok(())
    }

    /// When the paragraph restarts a list that an earlier, already closed
    /// sibling list was showing, numbering carries on where that one ended.
    fn continued_start(&self, para: usize, first: &[ListEntry]) -> Option<i64> {
        let previous = self
            .doc
            .previous_sibling(para, |n| n.kind == DocumentNodeType::List)?;
        let node = &self.doc[previous];
        if matched_prefix(&[self.entry_of(node)], first, false) != 1 || node.format.marker.is_bullet() {
            return None;
        }
        let base = if node.list_start >= 0 { node.list_start } else { node.format.start_index.max(1) };
        let items = self
            .doc
            .children(Some(previous))
            .into_iter()
            .filter(|&c| self.doc[c].kind == DocumentNodeType::ListItem)
            .count();
        Some(base + items as i64)
    }

    /// Marker and start index of list level `ilvl` for this paragraph.
    fn resolve_level(&mut self, state: &FormatState, ilvl: usize, consume: bool) -> ListEntry {
        if state.ils <= 0 {
            return ListEntry {
                marker: state.marker,
                ils: 0,
                list_id: None,
                start: if state.start_index > 0 { state.start_index } else { 1 },
                restart: None,
            };
        }
        let Some(entry) = self.tables.overrides.get(state.ils) else {
            return ListEntry {
                marker: state.marker,
                ils: state.ils,
                list_id: None,
                start: 1,
                restart: None,
            };
        };
        let list_id = entry.list_id;
        let level = entry
            .level(ilvl)
            .or_else(|| self.tables.lists.get(list_id).and_then(|l| l.level(ilvl as i64)))
            .copied()
            .unwrap_or_default();
        let restart = if consume {
            self.tables
                .overrides
                .get_mut(state.ils)
                .and_then(|o| o.start_override.take())
        } else {
            None
        };
        ListEntry {
            marker: level.marker,
            ils: state.ils,
            list_id: Some(list_id),
            start: level.start_at,
            restart,
        }
    }

    fn ensure_list_and_item(
        &mut self,
        para: usize,
        lists: &[usize],
        want: &[ListEntry],
        matched: usize,
        continuation: Option<i64>,
        is_continue: bool,
    ) {
        let tail = self.doc.detach_from(para);
        if let Some(&first_stale) = lists.get(matched) {
            self.close_scope(first_stale);
        }

        if want.len() > matched {
            if matched > 0 {
                let outer = lists[matched - 1];
                if self.pending_item_of(outer).is_none() {
                    self.push_block(DocumentNodeType::ListItem);
                }
            }
            for (k, entry) in want[matched..].iter().enumerate() {
                let mut format = self.stack.top().block_only();
                format.marker = entry.marker;
                format.ils = entry.ils;
                format.start_index = entry.start;
                format.ilvl = (matched + k) as i64;
                let mut list = DocumentNode::new(DocumentNodeType::List, format.clone());
                if let Some(start) = entry.restart {
                    list.list_start = start;
                } else if k == 0 && let Some(start) = continuation {
                    list.list_start = start;
                }
                self.doc.push(list);
                self.doc.push(DocumentNode::new(DocumentNodeType::ListItem, format));
            }
        } else if let Some(&innermost) = want.len().checked_sub(1).and_then(|i| lists.get(i)) {
            match self.pending_item_of(innermost) {
                Some(_) if is_continue => {},
                Some(item) => {
                    self.close_scope(item);
                    self.push_block(DocumentNodeType::ListItem);
                },
                None => {
                    self.push_block(DocumentNodeType::ListItem);
                },
            }
        }

        self.doc.reattach(tail);
    }

    fn pending_item_of(&self, list: usize) -> Option<usize> {
        self.doc
            .last_pending(DocumentNodeType::ListItem)
            .filter(|&item| item > list && self.doc.parent_of(item) == Some(list))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentNodeType::*;
    use crate::document::MAX_LIST_DEPTH;
    use crate::rtf::reader::tests::decode;
    use proptest::prelude::*;

    const HEADER: &str = r"{\*\listtable{\list\listid1{\listlevel\levelnfc23\levelstartat1}{\listlevel\levelnfc4\levelstartat1}}{\list\listid2{\listlevel\levelnfc0\levelstartat1}}}{\*\listoverridetable{\listoverride\listid1\ls1}{\listoverride\listid2\ls2}}";

    fn with_header(body: &str) -> Vec<u8> {
        format!(r"{{\rtf1{}{}}}", HEADER, body).into_bytes()
    }

    fn count(doc: &crate::document::DocumentNodeArray, kind: crate::document::DocumentNodeType) -> usize {
        doc.iter().filter(|n| n.kind == kind).count()
    }

    #[test]
    fn test_consecutive_items_share_list() {
        let (doc, _) = decode(&with_header(r"\pard\ls1 a\par\pard\ls1 b\par"));
        assert_eq!(count(&doc, List), 1);
        assert_eq!(count(&doc, ListItem), 2);
        assert_eq!(doc[0].format.marker, MarkerStyle::Disc);
    }

    #[test]
    fn test_nested_level() {
        let (doc, xaml) = decode(&with_header(r"\pard\ls1 a\par\pard\ls1\ilvl1 b\par\pard\ls1 c\par"));
        assert_eq!(count(&doc, List), 2);
        assert_eq!(count(&doc, ListItem), 3);
        let inner = (0..doc.len()).filter(|&i| doc[i].kind == List).nth(1).unwrap();
        assert_eq!(doc[inner].format.marker, MarkerStyle::LowerLatin);
        assert_eq!(doc.ancestors(inner).len(), 2);
        assert!(xaml.contains(r#"MarkerStyle="LowerLatin""#));
    }

    #[test]
    fn test_different_override_opens_new_list() {
        let (doc, _) = decode(&with_header(r"\pard\ls1 a\par\pard\ls2 b\par"));
        assert_eq!(doc.children(None).len(), 2);
        assert_eq!(count(&doc, List), 2);
    }

    #[test]
    fn test_numbering_continues_after_interruption() {
        let (doc, xaml) = decode(&with_header(r"\pard\ls2 a\par\pard\ls2 b\par\pard plain\par\pard\ls2 c\par"));
        let lists: Vec<usize> = (0..doc.len()).filter(|&i| doc[i].kind == List).collect();
        assert_eq!(lists.len(), 2);
        assert_eq!(doc[lists[1]].list_start, 3);
        assert!(xaml.contains(r#"StartIndex="3""#));
    }

    #[test]
    fn test_whitespace_list_text_hides_marker() {
        let (doc, xaml) = decode(&with_header(r"\pard{\listtext\tab}\ls1 a\par"));
        assert_eq!(doc[0].format.marker, MarkerStyle::Hidden);
        assert!(xaml.contains(r#"MarkerStyle="None""#));
    }

    #[test]
    fn test_nested_level_under_hidden_marker() {
        let (doc, _) = decode(&with_header(r"\pard{\listtext\tab}\ls1 a\par\pard\ls1\ilvl1 b\par"));
        assert_eq!(doc.children(None).len(), 1);
        assert_eq!(count(&doc, List), 2);
        assert_eq!(doc[0].format.marker, MarkerStyle::Hidden);
    }

    #[test]
    fn test_continue_paragraph_joins_item() {
        let (doc, _) = decode(br"{\rtf1{\*\pn\pnlvlblt}a\par{\*\pn\pnlvlcont}more\par}");
        assert_eq!(count(&doc, ListItem), 1);
        assert_eq!(count(&doc, Paragraph), 2);
    }

    #[test]
    fn test_list_closed_by_table() {
        let (doc, _) = decode(&with_header(r"\pard\ls1 a\par\pard\intbl x\cell\row"));
        let top = doc.children(None);
        assert_eq!(top.len(), 2);
        assert_eq!(doc[top[1]].kind, Table);
    }

    #[test]
    fn test_outer_levels_resolved_from_the_paragraph_override() {
        let (doc, _) = decode(&with_header(r"\pard\ls1 a\par\pard\ls2\ilvl1 b\par"));
        let top = doc.children(None);
        assert_eq!(top.len(), 2);
        assert_eq!(doc[top[0]].format.marker, MarkerStyle::Disc);
        assert_eq!(doc[top[1]].format.marker, MarkerStyle::Decimal);
        assert_eq!(count(&doc, List), 3);
        assert!(doc.validate().is_ok());
    }

    const REFORMAT: &str = r"{\*\listtable{\list\listid1{\listlevel\levelnfc23\levelstartat1}{\listlevel\levelnfc4\levelstartat1}}}{\*\listoverridetable{\listoverride\listid1\listoverridecount0\ls1}{\listoverride\listid1\listoverridecount9{\lfolevel}{\lfolevel\listoverrideformat{\listlevel\levelnfc1\levelstartat1}}\ls3}{\listoverride\listid1\listoverridecount1{\lfolevel\listoverridestartat\levelstartat5}\ls4}}";

    #[test]
    fn test_reformatted_level_nests_under_same_definition() {
        let input = format!(
            r"{{\rtf1{}\pard\ls1 a\par\pard\ls1\ilvl1 b\par\pard\ls1 c\par\pard\ls3\ilvl1 d\par}}",
            REFORMAT
        );
        let (doc, xaml) = decode(input.as_bytes());
        assert_eq!(doc.children(None).len(), 1);
        assert_eq!(count(&doc, List), 3);
        assert_eq!(count(&doc, ListItem), 4);
        let lists: Vec<usize> = (0..doc.len()).filter(|&i| doc[i].kind == List).collect();
        assert_eq!(doc[lists[1]].format.marker, MarkerStyle::LowerLatin);
        assert_eq!(doc[lists[2]].format.marker, MarkerStyle::UpperRoman);
        assert_eq!(doc.ancestors(lists[2]).len(), 2);
        assert!(xaml.contains(r#"MarkerStyle="UpperRoman""#));
    }

    #[test]
    fn test_start_override_opens_one_new_list() {
        let input = format!(
            r"{{\rtf1{}\pard\ls1 a\par\pard\ls4 b\par\pard\ls4 c\par}}",
            REFORMAT
        );
        let (doc, xaml) = decode(input.as_bytes());
        let lists: Vec<usize> = (0..doc.len()).filter(|&i| doc[i].kind == List).collect();
        assert_eq!(lists.len(), 2);
        assert_eq!(doc[lists[1]].list_start, 5);
        assert_eq!(doc.children(Some(lists[1])).len(), 2);
        assert!(xaml.contains(r#"StartIndex="5""#));
    }

    #[test]
    fn test_numbering_continues_for_nested_restart() {
        let (doc, xaml) =
            decode(&with_header(r"\pard\ls2 a\par\pard\ls2 b\par\pard plain\par\pard\ls2\ilvl1 c\par"));
        let top = doc.children(None);
        assert_eq!(top.len(), 3);
        assert_eq!(doc[top[2]].kind, List);
        assert_eq!(doc[top[2]].list_start, 3);
        let inner = (top[2] + 1..doc.len()).find(|&i| doc[i].kind == List).unwrap();
        assert!(doc[inner].list_start < 0);
        assert_eq!(doc.ancestors(inner).len(), 2);
        assert_eq!(xaml.matches("StartIndex=").count(), 1);
        assert!(xaml.contains(r#"StartIndex="3""#));
    }

    #[test]
    fn test_lists_inside_table_cells() {
        let (doc, _) = decode(&with_header(
            r"\trowd\cellx1000\cellx2000\pard\intbl\ls1 a\par\pard\intbl\ls1 b\cell\pard\intbl\ls1 c\cell\row\pard\ls1 d\par",
        ));
        let lists: Vec<usize> = (0..doc.len()).filter(|&i| doc[i].kind == List).collect();
        assert_eq!(lists.len(), 3);
        for &list in &lists[..2] {
            let parent = doc.parent_of(list).unwrap();
            assert_eq!(doc[parent].kind, Cell);
        }
        assert_eq!(doc.children(Some(lists[0])).len(), 2);
        assert_eq!(doc.children(Some(lists[1])).len(), 1);
        assert_eq!(doc.parent_of(lists[2]), None);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_old_style_nested_level_keeps_outer_list() {
        let (doc, _) = decode(br"{\rtf1{\*\pn\pnlvl1\pndec}a\par{\*\pn\pnlvl2\pnlcltr}b\par}");
        assert_eq!(doc.children(None).len(), 1);
        let lists: Vec<usize> = (0..doc.len()).filter(|&i| doc[i].kind == List).collect();
        assert_eq!(lists.len(), 2);
        assert_eq!(doc[lists[0]].format.marker, MarkerStyle::Decimal);
        assert_eq!(doc[lists[1]].format.marker, MarkerStyle::LowerLatin);
    }

    #[test]
    fn test_old_style_level_is_bounded() {
        let (doc, _) = decode(br"{\rtf1{\*\pn\pnlvl100000000000}a\par}");
        assert_eq!(count(&doc, List), MAX_LIST_DEPTH as usize);
        assert_eq!(count(&doc, Paragraph), 1);
        assert!(doc.validate().is_ok());

        let mut package = crate::images::MemoryImagePackage::new();
        let options = crate::options::ConvertOptions::default().with_strict(true);
        let input = br"{\rtf1{\*\pn\pnlvl100000000000}a\par}";
        let mut reader = crate::rtf::RtfToXamlReader::new(input, &mut package, &options);
        assert!(matches!(reader.process(), Err(crate::common::error::Error::Rejected(_))));
    }

    fn entry(marker: u8, ils: i64, start: i64) -> ListEntry {
        let marker = match marker % 3 {
            0 => MarkerStyle::Disc,
            1 => MarkerStyle::Decimal,
            _ => MarkerStyle::LowerRoman,
        };
        ListEntry { marker, ils, list_id: Some(ils), start, restart: None }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_matched_prefix_bounds(
            have in proptest::collection::vec((0u8..3, 0i64..3, 1i64..3), 0..6),
            want in proptest::collection::vec((0u8..3, 0i64..3, 1i64..3), 0..6),
            is_continue in any::<bool>(),
        ) {
            let have: Vec<_> = have.into_iter().map(|(m, i, s)| entry(m, i, s)).collect();
            let want: Vec<_> = want.into_iter().map(|(m, i, s)| entry(m, i, s)).collect();
            let matched = matched_prefix(&have, &want, is_continue);
            prop_assert!(matched <= have.len().min(want.len()));
            if !is_continue && !have.is_empty() && !want.is_empty() && have[0].marker != want[0].marker {
                prop_assert_eq!(matched, 0);
            }
        }
    }
}
