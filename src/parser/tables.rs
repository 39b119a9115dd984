use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One row of academic record. Every field stays string-encoded to
/// preserve source formatting; consumers parse numerics on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub subject_code: String,
    pub subject_name: String,
    pub grade: String,
    pub grade_point: String,
    pub credit: String,
    pub status: String,
    pub points: String,
}

impl Subject {
    /// Dedup identity within a semester.
    pub fn key(&self) -> (String, String) {
        (self.subject_code.clone(), self.subject_name.clone())
    }
}

/// Column-name to cell-index map built from a detected header row.
/// Applies to all following rows of the same table until a later row
/// re-detects as a header and resets it.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    pub code: Option<usize>,
    pub name: Option<usize>,
    pub grade_point: Option<usize>,
    pub total: Option<usize>,
    pub status: Option<usize>,
    pub points: Option<usize>,
    pub grade: Option<usize>,
    pub credits: Option<usize>,
}

const HEADER_TOKENS: &[&str] = &["subject", "code", "internal", "external", "grade", "credit"];

/// Classify a row as a header row. First match wins per cell, checked
/// top to bottom; "point" must be tested before the bare "grade" test so
/// "Grade Points" lands on `points`, not `grade`.
pub fn detect_header(cells: &[String]) -> Option<HeaderMap> {
    let joined = cells.join(" ").to_lowercase();
    if !HEADER_TOKENS.iter().any(|t| joined.contains(t)) {
        return None;
    }

    let mut map = HeaderMap::default();
    for (idx, cell) in cells.iter().enumerate() {
        let h = cell.to_lowercase();
        if h.contains("code") {
            map.code = Some(idx);
        } else if h.contains("subject") {
            map.name = Some(idx);
        } else if h.contains("internal") || h.contains("external") {
            // marks-breakup columns: claimed here so "total" below cannot
            // pick them up, but subject records never carry them
        } else if h.contains("grade point") || h.contains("gradepoint") || h == "gp" {
            map.grade_point = Some(idx);
        } else if h.contains("total") {
            map.total = Some(idx);
        } else if h.contains("status") || h.contains("result") || h.contains("remarks") {
            map.status = Some(idx);
        } else if h.contains("point") {
            map.points = Some(idx);
        } else if h.contains("grade") {
            map.grade = Some(idx);
        } else if h.contains("credit") {
            map.credits = Some(idx);
        }
    }
    Some(map)
}

/// Map a raw cell array to a subject record. With a header map, fields
/// read by mapped index (grade point falls back to the total column when
/// unmapped) and the row is kept only if code or name survived. Without
/// one, positional fallback applies: seven-column layout at >= 6 cells,
/// minimal code/name/credit at 3-5 cells.
pub fn map_row(cells: &[String], header: Option<&HeaderMap>) -> Option<Subject> {
    if cells.iter().filter(|c| !c.is_empty()).count() < 2 {
        return None;
    }

    let at = |i: Option<usize>| -> String {
        i.and_then(|i| cells.get(i)).cloned().unwrap_or_default()
    };

    match header {
        Some(h) => {
            let subject = Subject {
                subject_code: at(h.code),
                subject_name: at(h.name),
                grade_point: if h.grade_point.is_some() {
                    at(h.grade_point)
                } else {
                    at(h.total)
                },
                grade: at(h.grade),
                status: at(h.status),
                credit: at(h.credits),
                points: at(h.points),
            };
            if subject.subject_code.is_empty() && subject.subject_name.is_empty() {
                None
            } else {
                Some(subject)
            }
        }
        None if cells.len() >= 6 => Some(Subject {
            subject_code: cells[0].clone(),
            subject_name: cells[1].clone(),
            grade_point: cells[2].clone(),
            grade: cells[3].clone(),
            status: cells[4].clone(),
            credit: cells[5].clone(),
            points: cells.get(6).cloned().unwrap_or_default(),
        }),
        None if cells.len() >= 3 => Some(Subject {
            subject_code: cells[0].clone(),
            subject_name: cells[1].clone(),
            credit: cells[2].clone(),
            ..Subject::default()
        }),
        None => None,
    }
}

static OPERATOR_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[<>≥≤=]|&gt;|&lt;|&ge;|&le;)").unwrap());
static LEGEND_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:range|class awarded|letter grade|grade points)").unwrap());
static BARE_INT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());

const GRADE_DESCRIPTORS: &[&str] = &[
    "superior",
    "excellent",
    "very good",
    "good",
    "average",
    "pass",
    "fail",
    "withdrawn",
    "incomplete",
    "absent",
];

/// Recognize grading-scale legend rows, comparison-operator rows and
/// descriptor-only rows that share `<table>` markup with real subjects.
pub fn is_noise_row(code: &str, name: &str) -> bool {
    if code.is_empty() && name.is_empty() {
        return true;
    }
    if OPERATOR_PREFIX_RE.is_match(code) {
        return true;
    }
    if LEGEND_LABEL_RE.is_match(code) || LEGEND_LABEL_RE.is_match(name) {
        return true;
    }
    let low_code = code.to_lowercase();
    let low_name = name.to_lowercase();
    if low_code.contains("range in which") || low_name.contains("range in which") {
        return true;
    }
    if GRADE_DESCRIPTORS.contains(&low_name.as_str()) {
        return true;
    }
    // single grade-point value next to a short descriptor, e.g. "10 | Superior"
    if BARE_INT_RE.is_match(code)
        && name.chars().count() < 20
        && GRADE_DESCRIPTORS.iter().any(|d| low_name.contains(d))
    {
        return true;
    }
    if (code == "-" || code == "–") && low_name.contains("absent") {
        return true;
    }
    false
}

/// Run classifier, mapper and noise filter over one table's rows.
/// Intra-table duplicates survive here; the aggregator dedups per
/// semester.
pub fn parse_table(rows: &[Vec<String>]) -> Vec<Subject> {
    let mut header: Option<HeaderMap> = None;
    let mut subjects = Vec::new();

    for cells in rows {
        if let Some(map) = detect_header(cells) {
            header = Some(map);
            continue;
        }
        let Some(subject) = map_row(cells, header.as_ref()) else {
            continue;
        };
        if is_noise_row(&subject.subject_code, &subject.subject_name) {
            continue;
        }
        subjects.push(subject);
    }
    subjects
}
