use std::sync::LazyLock;

use regex::Regex;

use crate::dom::PageNode;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\s)(?:semester|sem)\b[\s:\-]*([ivx]+|\d+)").unwrap());
static SEM_COMPACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsem\b\s*[-:.]?\s*([ivx\d]+)").unwrap());
static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:semester|sem)\s*[:\-.]?\s*([ivx\d]+)").unwrap());
static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static ROMAN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)[IVXLCDM]+").unwrap());

/// Sort key for labels the ranker cannot interpret; places them last.
pub const UNRANKED: i32 = 999;

/// A semester boundary: position in the flattened element list plus the
/// extracted label.
#[derive(Debug, Clone)]
pub struct Heading {
    pub idx: usize,
    pub label: String,
}

/// Primary rule: "semester"/"sem" followed by a Roman numeral or integer.
pub fn is_semester_heading(text: &str) -> bool {
    HEADING_RE.is_match(text) || SEM_COMPACT_RE.is_match(text)
}

/// Looser rule applied only when the primary rule matched nothing on the
/// whole page. Bare "semester" mentions count here.
fn is_loose_heading(text: &str) -> bool {
    SEM_COMPACT_RE.is_match(text) || text.to_lowercase().contains("semester")
}

/// Capture the numeral after the semester keyword, uppercased. Falls back
/// to the full heading text; label normalization at merge time still
/// dedups exact repeats.
pub fn extract_label(text: &str) -> String {
    match LABEL_RE.captures(text) {
        Some(caps) => caps[1].to_uppercase(),
        None => text.to_string(),
    }
}

/// Find every semester heading in document order. Wrapper elements whose
/// text repeats a heading match too; the aggregator merges those repeats.
pub fn detect(nodes: &[PageNode]) -> Vec<Heading> {
    let scan = |pred: fn(&str) -> bool| -> Vec<Heading> {
        nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.text.is_empty() && pred(&n.text))
            .map(|(idx, n)| Heading {
                idx,
                label: extract_label(&n.text),
            })
            .collect()
    };

    let heads = scan(is_semester_heading);
    if !heads.is_empty() {
        return heads;
    }
    scan(is_loose_heading)
}

/// Numeric interpretation of a semester label for sorting: Arabic digits
/// win, then a Roman numeral substring, else [`UNRANKED`].
pub fn rank_key(label: &str) -> i32 {
    if let Some(m) = DIGITS_RE.find(label) {
        return m.as_str().parse().unwrap_or(UNRANKED);
    }
    if let Some(m) = ROMAN_RE.find(label) {
        return roman_value(m.as_str());
    }
    UNRANKED
}

fn roman_value(s: &str) -> i32 {
    let values: Vec<i32> = s
        .to_uppercase()
        .chars()
        .map(|c| match c {
            'I' => 1,
            'V' => 5,
            'X' => 10,
            'L' => 50,
            'C' => 100,
            'D' => 500,
            'M' => 1000,
            _ => 0,
        })
        .collect();

    let mut total = 0;
    for (i, v) in values.iter().enumerate() {
        // subtractive notation: smaller value before a larger one subtracts
        if values.get(i + 1).is_some_and(|next| next > v) {
            total -= v;
        } else {
            total += v;
        }
    }
    total
}
