//! List tables for a markup-built tree.
//!
//! Markup lists carry their marker and start index on the `List` element;
//! RTF wants a `\listtable` of level templates and a `\listoverridetable`
//! that paragraphs reference by `\lsN`. Every top-level list becomes one
//! list definition, its levels taken from the first list met at each nesting
//! depth. Each distinct chain of (marker, start) pairs below it gets its own
//! override; levels that differ from the definition are carried by the
//! override's `\lfolevel` entries.

use crate::document::{DocumentNodeArray, DocumentNodeType, MarkerStyle};
use crate::rtf::tables::{List, ListLevel, ListOverride, LookupTables};

/// Default indent per nesting level, in twips.
pub const LIST_INDENT: i64 = 360;
const MAX_LEVELS: usize = 9;

/// Parent index of every node of a closed tree.
fn parents(doc: &DocumentNodeArray) -> Vec<Option<usize>> {
    let mut out = vec![None; doc.len()];
    let mut open: Vec<(usize, usize)> = Vec::new();
    for (i, slot) in out.iter_mut().enumerate() {
        while open.last().is_some_and(|&(_, end)| i >= end) {
            open.pop();
        }
        *slot = open.last().map(|&(p, _)| p);
        let end = doc.subtree_end(i);
        if end > i + 1 {
            open.push((i, end));
        }
    }
    out
}

/// Assign override indices, build the list tables, fold list margins into
/// paragraph indents and compute item labels.
pub fn synthesize(doc: &mut DocumentNodeArray, tables: &mut LookupTables) {
    let parents = parents(doc);

    // Innermost-first List ancestors of every node, including itself for lists.
    let list_chain = |i: usize| -> Vec<usize> {
        let mut chain = Vec::new();
        let mut cursor = Some(i);
        while let Some(j) = cursor {
            if doc[j].kind == DocumentNodeType::List {
                chain.push(j);
            }
            cursor = parents[j];
        }
        chain
    };

    let level_of = |i: usize| ListLevel {
        marker: doc[i].format.marker,
        start_at: doc[i].format.start_index.max(1),
    };

    let mut top_level: Vec<usize> = Vec::new();
    let mut templates: Vec<Vec<ListLevel>> = Vec::new();
    // (top-level ordinal, levels of the chain; None for the definition itself)
    let mut overrides: Vec<(usize, Option<Vec<ListLevel>>)> = Vec::new();
    let mut ils_of = vec![0i64; doc.len()];
    let mut assignments: Vec<(usize, i64, i64)> = Vec::with_capacity(doc.len());
    for i in 0..doc.len() {
        let chain = list_chain(i);
        let (Some(&innermost), Some(&outermost)) = (chain.first(), chain.last()) else {
            continue;
        };
        let depth = chain.len() - 1;
        if doc[i].kind == DocumentNodeType::List {
            let ordinal = match top_level.iter().position(|&t| t == outermost) {
                Some(pos) => pos,
                None => {
                    top_level.push(outermost);
                    templates.push(Vec::new());
                    overrides.push((top_level.len() - 1, None));
                    top_level.len() - 1
                },
            };
            let defined = &mut templates[ordinal];
            if depth == defined.len() && depth < MAX_LEVELS {
                defined.push(level_of(i));
            }
            let chain_levels: Vec<ListLevel> =
                chain.iter().rev().take(MAX_LEVELS).map(|&j| level_of(j)).collect();
            let key = if defined.starts_with(&chain_levels) { None } else { Some(chain_levels) };
            let position = match overrides.iter().position(|(o, k)| *o == ordinal && *k == key) {
                Some(pos) => pos,
                None => {
                    overrides.push((ordinal, key));
                    overrides.len() - 1
                },
            };
            ils_of[i] = position as i64 + 1;
        }
        assignments.push((i, ils_of[innermost], depth.min(MAX_LEVELS - 1) as i64));
    }

    for (k, levels) in templates.iter().enumerate() {
        let mut list = List::new(k as i64 + 1);
        list.levels = levels.clone();
        tables.lists.add(list);
    }
    for (k, (ordinal, key)) in overrides.into_iter().enumerate() {
        let mut entry = ListOverride::new(ordinal as i64 + 1);
        entry.index = k as i64 + 1;
        if let Some(chain_levels) = key {
            let defined = &templates[ordinal];
            entry.levels = chain_levels
                .into_iter()
                .enumerate()
                .map(|(depth, level)| (defined.get(depth) != Some(&level)).then_some(level))
                .collect();
        }
        tables.overrides.add(entry);
    }

    let mut indents: Vec<(usize, i64, i64)> = Vec::new();
    for &(i, _, ilvl) in &assignments {
        if doc[i].kind != DocumentNodeType::Paragraph {
            continue;
        }
        let mut inherited = 0;
        let mut cursor = parents[i];
        while let Some(j) = cursor {
            if matches!(doc[j].kind, DocumentNodeType::List | DocumentNodeType::ListItem) {
                inherited += doc[j].format.li;
            }
            cursor = parents[j];
        }
        let own = &doc[i].format;
        let (li, fi) = if inherited == 0 && own.li == 0 {
            let fi = if own.fi == 0 { -LIST_INDENT } else { own.fi };
            (LIST_INDENT * (ilvl + 1), fi)
        } else {
            (own.li + inherited, own.fi)
        };
        indents.push((i, li, fi));
    }

    for (i, ils, ilvl) in assignments {
        let format = &mut doc[i].format;
        format.ils = ils;
        format.ilvl = ilvl;
    }
    for (i, li, fi) in indents {
        let format = &mut doc[i].format;
        format.li = li;
        format.fi = fi;
    }

    assign_labels(doc);
}

fn assign_labels(doc: &mut DocumentNodeArray) {
    let lists: Vec<usize> = (0..doc.len())
        .filter(|&i| doc[i].kind == DocumentNodeType::List)
        .collect();
    for list in lists {
        let marker = doc[list].format.marker;
        let start = if doc[list].list_start >= 0 {
            doc[list].list_start
        } else {
            doc[list].format.start_index.max(1)
        };
        let items: Vec<usize> = doc
            .children(Some(list))
            .into_iter()
            .filter(|&c| doc[c].kind == DocumentNodeType::ListItem)
            .collect();
        for (n, item) in items.into_iter().enumerate() {
            doc[item].list_label = Some(list_label(marker, start + n as i64));
        }
    }
}

/// Label text of item number `n` under `marker`.
pub fn list_label(marker: MarkerStyle, n: i64) -> String {
    match marker {
        MarkerStyle::None | MarkerStyle::Hidden => String::new(),
        MarkerStyle::Disc => "\u{2022}".to_string(),
        MarkerStyle::Circle => "\u{25CB}".to_string(),
        MarkerStyle::Square => "\u{25AA}".to_string(),
        MarkerStyle::Box => "\u{25A1}".to_string(),
        MarkerStyle::Decimal => format!("{}.", n),
        MarkerStyle::LowerLatin => format!("{}.", alpha(n)),
        MarkerStyle::UpperLatin => format!("{}.", alpha(n).to_ascii_uppercase()),
        MarkerStyle::LowerRoman => format!("{}.", roman(n).to_ascii_lowercase()),
        MarkerStyle::UpperRoman => format!("{}.", roman(n)),
    }
}

/// `a`..`z`, then `aa`, `bb`, ...
fn alpha(n: i64) -> String {
    if n < 1 {
        return n.to_string();
    }
    let letter = (b'a' + ((n - 1) % 26) as u8) as char;
    let repeat = ((n - 1) / 26 + 1) as usize;
    std::iter::repeat_n(letter, repeat).collect()
}

fn roman(n: i64) -> String {
    const NUMERALS: [(i64, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    if !(1..4000).contains(&n) {
        return n.to_string();
    }
    let mut rest = n;
    let mut out = String::new();
    for (value, numeral) in NUMERALS {
        while rest >= value {
            out.push_str(numeral);
            rest -= value;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ConvertOptions;
    use crate::xaml::builder::build_tree;
    use proptest::prelude::*;

    fn build(xaml: &str) -> (DocumentNodeArray, LookupTables) {
        build_tree(xaml, &ConvertOptions::default()).unwrap()
    }

    fn find(doc: &DocumentNodeArray, kind: DocumentNodeType) -> Vec<usize> {
        (0..doc.len()).filter(|&i| doc[i].kind == kind).collect()
    }

    #[test]
    fn test_labels() {
        assert_eq!(list_label(MarkerStyle::Decimal, 3), "3.");
        assert_eq!(list_label(MarkerStyle::LowerLatin, 28), "bb.");
        assert_eq!(list_label(MarkerStyle::UpperLatin, 1), "A.");
        assert_eq!(list_label(MarkerStyle::LowerRoman, 14), "xiv.");
        assert_eq!(list_label(MarkerStyle::UpperRoman, 1994), "MCMXCIV.");
        assert_eq!(list_label(MarkerStyle::Disc, 5), "\u{2022}");
        assert_eq!(list_label(MarkerStyle::Hidden, 1), "");
    }

    #[test]
    fn test_one_override_per_top_level_list() {
        let (doc, tables) = build(
            r#"<Section><List MarkerStyle="Decimal" StartIndex="3"><ListItem><Paragraph><Run>a</Run></Paragraph><List MarkerStyle="LowerLatin"><ListItem><Paragraph><Run>b</Run></Paragraph></ListItem></List></ListItem></List><List><ListItem><Paragraph><Run>c</Run></Paragraph></ListItem></List></Section>"#,
        );
        assert_eq!(tables.lists.lists().len(), 2);
        assert_eq!(tables.overrides.overrides().len(), 2);
        let first = tables.lists.get(1).unwrap();
        assert_eq!(first.levels.len(), 2);
        assert_eq!(first.levels[0].marker, MarkerStyle::Decimal);
        assert_eq!(first.levels[0].start_at, 3);
        assert_eq!(first.levels[1].marker, MarkerStyle::LowerLatin);

        let paragraphs = find(&doc, DocumentNodeType::Paragraph);
        let (a, b, c) = (&doc[paragraphs[0]].format, &doc[paragraphs[1]].format, &doc[paragraphs[2]].format);
        assert_eq!((a.ils, a.ilvl), (1, 0));
        assert_eq!((b.ils, b.ilvl), (1, 1));
        assert_eq!((c.ils, c.ilvl), (2, 0));
        assert_eq!((a.li, a.fi), (360, -360));
        assert_eq!(b.li, 720);

        let items = find(&doc, DocumentNodeType::ListItem);
        assert_eq!(doc[items[0]].list_label.as_deref(), Some("3."));
        assert_eq!(doc[items[1]].list_label.as_deref(), Some("a."));
        assert_eq!(doc[items[2]].list_label.as_deref(), Some("\u{2022}"));
    }

    #[test]
    fn test_sibling_nested_lists_get_own_override() {
        let (doc, tables) = build(concat!(
            r#"<List MarkerStyle="Decimal">"#,
            r#"<ListItem><Paragraph><Run>a</Run></Paragraph><List MarkerStyle="LowerLatin"><ListItem><Paragraph><Run>b</Run></Paragraph></ListItem></List></ListItem>"#,
            r#"<ListItem><Paragraph><Run>c</Run></Paragraph><List MarkerStyle="UpperRoman"><ListItem><Paragraph><Run>d</Run></Paragraph></ListItem></List></ListItem>"#,
            r#"<ListItem><Paragraph><Run>e</Run></Paragraph><List MarkerStyle="UpperRoman"><ListItem><Paragraph><Run>f</Run></Paragraph></ListItem></List></ListItem>"#,
            r#"</List>"#,
        ));
        assert_eq!(tables.lists.lists().len(), 1);
        assert_eq!(tables.overrides.overrides().len(), 2);
        assert!(tables.overrides.get(1).unwrap().levels.is_empty());
        let roman = tables.overrides.get(2).unwrap();
        assert_eq!(roman.list_id, 1);
        assert_eq!(roman.level(0), None);
        assert_eq!(roman.level(1).map(|l| l.marker), Some(MarkerStyle::UpperRoman));

        let placement: Vec<(i64, i64)> = find(&doc, DocumentNodeType::Paragraph)
            .into_iter()
            .map(|p| (doc[p].format.ils, doc[p].format.ilvl))
            .collect();
        assert_eq!(placement, [(1, 0), (1, 1), (1, 0), (2, 1), (1, 0), (2, 1)]);
    }

    #[test]
    fn test_explicit_margins_are_merged() {
        let (doc, _) = build(
            r#"<List Margin="10,0,0,0" Padding="20,0,0,0"><ListItem><Paragraph Margin="8,0,0,0" TextIndent="-4"><Run>a</Run></Paragraph></ListItem></List>"#,
        );
        let para = find(&doc, DocumentNodeType::Paragraph)[0];
        assert_eq!(doc[para].format.li, 150 + 300 + 120);
        assert_eq!(doc[para].format.fi, -60);
    }

    #[test]
    fn test_parents_of_closed_tree() {
        let (doc, _) = build("<List><ListItem><Paragraph><Run>a</Run></Paragraph></ListItem></List>");
        assert_eq!(parents(&doc), [None, Some(0), Some(1), Some(2)]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_roman_round_trip_length(n in 1i64..4000) {
            let numeral = roman(n);
            prop_assert!(!numeral.is_empty());
            prop_assert!(numeral.chars().all(|c| "MDCLXVI".contains(c)));
        }

        #[test]
        fn prop_alpha_repeats_one_letter(n in 1i64..500) {
            let label = alpha(n);
            let first = label.chars().next().unwrap();
            prop_assert!(label.chars().all(|c| c == first));
            prop_assert_eq!(label.len() as i64, (n - 1) / 26 + 1);
        }
    }
}
