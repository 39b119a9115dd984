pub mod aggregate;
pub mod headings;
pub mod sections;
pub mod student;
pub mod tables;
pub mod text;

use serde::{Deserialize, Serialize};

use crate::dom::{self, PageNode};
pub use tables::Subject;

/// One academic term after merging. Subjects keep first-encountered
/// order with (code, name) duplicates removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Semester {
    pub semester: String,
    pub sgpa: String,
    pub cgpa: String,
    pub subjects: Vec<Subject>,
}

/// The normalized transcript for one PIN. Semesters are sorted ascending
/// by parsed semester number; unparseable labels sort last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub student_name: String,
    pub roll_number: String,
    pub semesters: Vec<Semester>,
}

impl Transcript {
    /// Zero semesters and no identity fields: the query matched nothing
    /// on the portal. Callers report this, they do not store it.
    pub fn is_not_found(&self) -> bool {
        self.semesters.is_empty() && self.student_name.is_empty() && self.roll_number.is_empty()
    }

    pub fn subject_count(&self) -> usize {
        self.semesters.iter().map(|s| s.subjects.len()).sum()
    }
}

/// Extraction pipeline over a flattened page snapshot: identity side
/// search, heading detection, section partitioning with per-section table
/// scan, label-keyed aggregation, rank sort, derived-points completion.
/// Pure and synchronous; data-shape irregularities degrade to empty
/// fields, never to an error.
pub fn extract(nodes: &[PageNode]) -> Transcript {
    let (student_name, roll_number) = student::extract_identity(nodes);
    let heads = headings::detect(nodes);
    let raw = sections::collect(nodes, &heads);
    let mut semesters = aggregate::aggregate(raw);
    aggregate::complete_points(&mut semesters);

    Transcript {
        student_name,
        roll_number,
        semesters,
    }
}

/// Convenience entry point for statically parsed HTML.
pub fn extract_html(html: &str) -> Transcript {
    extract(&dom::snapshot_from_html(html))
}

// ── Tests ──
