use std::sync::LazyLock;

use regex::Regex;

use crate::dom::PageNode;
use crate::parser::text::normalize;

static NAME_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bname\b\s*[:\-]\s*(.+)").unwrap());
static ROLL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:hall\s*ticket(?:\s*no\.?)?|hallticket|roll\s*no(?:\.|umber)?|rno|register\s*no|reg\s*no)\s*[:\-]?\s*([A-Za-z0-9\-/]+)",
    )
    .unwrap()
});

/// Tags worth scanning for labeled identity fields.
const TEXT_TAGS: &[&str] = &[
    "td", "th", "div", "p", "span", "b", "strong", "center", "font", "h1", "h2", "h3",
];

/// Page-heading words that rule a heading out as a student name.
const IGNORE_WORDS: &[&str] = &[
    "college",
    "university",
    "institute",
    "technology",
    "engineering",
    "autonomous",
    "grade",
    "marks",
    "result",
    "memorandum",
    "sheet",
    "mvrs",
    "semester",
    "branch",
    "date",
    "page",
    "controller",
    "examinations",
];

/// Best-effort name and roll-number search, independent of the semester
/// pipeline. Labeled patterns first; if no name label matched anywhere,
/// fall back to the first plausible h1-h3 heading (multi-word, digit-free,
/// not institutional boilerplate). Either field may come back empty.
pub fn extract_identity(nodes: &[PageNode]) -> (String, String) {
    let mut name = String::new();
    let mut roll = String::new();

    for node in nodes.iter().filter(|n| TEXT_TAGS.contains(&n.tag.as_str())) {
        if name.is_empty() {
            if let Some(caps) = NAME_LABEL_RE.captures(&node.text) {
                let candidate = trim_name(&normalize(&caps[1]));
                if candidate.chars().count() > 1
                    && !candidate.starts_with(['<', '>', '=', '≥', '≤'])
                {
                    name = candidate;
                }
            }
        }
        if roll.is_empty() {
            if let Some(caps) = ROLL_RE.captures(&node.text) {
                roll = caps[1].to_string();
            }
        }
        if !name.is_empty() && !roll.is_empty() {
            break;
        }
    }

    if name.is_empty() {
        name = heading_name(nodes).unwrap_or_default();
    }
    (name, roll)
}

/// Cut a labeled capture down to the name itself: stop at brackets, at
/// the first digit-leading token (roll numbers glued onto the same line)
/// and at the next label's colon.
fn trim_name(raw: &str) -> String {
    let head = match raw.find(['(', '[']) {
        Some(i) => &raw[..i],
        None => raw,
    };

    let mut kept = Vec::new();
    for token in head.split_whitespace() {
        if token.chars().next().is_some_and(|c| c.is_ascii_digit()) || token.contains(':') {
            break;
        }
        kept.push(token);
    }
    kept.join(" ")
}

fn heading_name(nodes: &[PageNode]) -> Option<String> {
    nodes
        .iter()
        .filter(|n| matches!(n.tag.as_str(), "h1" | "h2" | "h3"))
        .map(|n| n.text.as_str())
        .find(|text| {
            let lower = text.to_lowercase();
            !text.is_empty()
                && !text.chars().any(|c| c.is_ascii_digit())
                && text.contains(' ')
                && text.chars().count() > 3
                && !IGNORE_WORDS.iter().any(|w| lower.contains(w))
        })
        .map(|text| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_name_and_roll() {
        let nodes = vec![
            PageNode::text("td", "Name : RAVI KUMAR"),
            PageNode::text("td", "Hall Ticket No: 21AB1234"),
        ];
        let (name, roll) = extract_identity(&nodes);
        assert_eq!(name, "RAVI KUMAR");
        assert_eq!(roll, "21AB1234");
    }

    #[test]
    fn roll_label_variants() {
        for label in [
            "Roll No",
            "Roll Number",
            "RNO",
            "Register No",
            "Reg No:",
            "Hall Ticket No :",
        ] {
            let nodes = vec![PageNode::text("div", &format!("{label} 20XY0099"))];
            let (_, roll) = extract_identity(&nodes);
            assert_eq!(roll, "20XY0099", "label {label:?}");
        }
    }

    #[test]
    fn name_capture_stops_at_glued_roll_number() {
        let nodes = vec![PageNode::text(
            "td",
            "Name: RAVI KUMAR 21AB1234 Branch: CSE",
        )];
        let (name, _) = extract_identity(&nodes);
        assert_eq!(name, "RAVI KUMAR");
    }

    #[test]
    fn name_capture_stops_at_next_label() {
        let nodes = vec![PageNode::text("td", "Name - ANITA RAO Father: K RAO")];
        let (name, _) = extract_identity(&nodes);
        assert_eq!(name, "ANITA RAO");
    }

    #[test]
    fn comparison_prefixed_captures_are_rejected() {
        let nodes = vec![PageNode::text("td", "Name : ≥90 Superior")];
        let (name, _) = extract_identity(&nodes);
        assert_eq!(name, "");
    }

    #[test]
    fn heading_fallback_skips_institutional_names() {
        let nodes = vec![
            PageNode::text("h1", "MVRS College of Engineering"),
            PageNode::text("h2", "Memorandum of Marks"),
            PageNode::text("h2", "RAVI KUMAR"),
        ];
        let (name, _) = extract_identity(&nodes);
        assert_eq!(name, "RAVI KUMAR");
    }

    #[test]
    fn heading_fallback_rejects_numeric_and_single_word() {
        let nodes = vec![
            PageNode::text("h2", "Batch 2021"),
            PageNode::text("h3", "Notice"),
        ];
        let (name, roll) = extract_identity(&nodes);
        assert_eq!(name, "");
        assert_eq!(roll, "");
    }
}
