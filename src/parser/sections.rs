use std::sync::LazyLock;

use regex::Regex;

use crate::dom::PageNode;
use crate::parser::headings::Heading;
use crate::parser::tables::{self, Subject};

static SGPA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)sgpa\s*[:\-]?\s*=?\s*([\d.]+)").unwrap());
static CGPA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)cgpa\s*[:\-]?\s*=?\s*([\d.]+)").unwrap());

/// One raw appearance of a semester on the page: everything between a
/// heading and the next one. The same label can appear several times
/// (header plus footer summary); the aggregator merges them.
#[derive(Debug, Clone)]
pub struct RawSection {
    pub label: String,
    pub subjects: Vec<Subject>,
    pub sgpa: String,
    pub cgpa: String,
}

/// Slice the element list into contiguous ranges between successive
/// headings and collect each range's tables and GPA mentions. With zero
/// headings the whole document becomes one implicit section labeled "1".
pub fn collect(nodes: &[PageNode], heads: &[Heading]) -> Vec<RawSection> {
    if heads.is_empty() {
        return vec![section_of("1", nodes)];
    }

    heads
        .iter()
        .enumerate()
        .map(|(i, head)| {
            let end = heads.get(i + 1).map_or(nodes.len(), |next| next.idx);
            section_of(&head.label, &nodes[head.idx..end])
        })
        .collect()
}

fn section_of(label: &str, nodes: &[PageNode]) -> RawSection {
    let subjects = nodes
        .iter()
        .filter_map(|n| n.table.as_deref())
        .flat_map(tables::parse_table)
        .collect();

    let text = nodes
        .iter()
        .map(|n| n.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    RawSection {
        label: label.to_string(),
        subjects,
        sgpa: capture(&SGPA_RE, &text),
        cgpa: capture(&CGPA_RE, &text),
    }
}

fn capture(re: &Regex, text: &str) -> String {
    re.captures(text)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default()
}
