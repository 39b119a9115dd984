use anyhow::Result;

use crate::parser::Transcript;

const CSV_HEADER: &[&str] = &[
    "Semester",
    "SubjectCode",
    "SubjectName",
    "Grade",
    "GradePoint",
    "Credit",
    "Status",
];

/// Pretty JSON in the documented camelCase shape.
pub fn to_json(transcript: &Transcript) -> Result<String> {
    Ok(serde_json::to_string_pretty(transcript)?)
}

/// One CSV row per subject, semester label repeated, every cell quoted
/// with doubled embedded quotes.
pub fn to_csv(transcript: &Transcript) -> String {
    let mut rows = vec![CSV_HEADER
        .iter()
        .map(|h| quote(h))
        .collect::<Vec<_>>()
        .join(",")];

    for semester in &transcript.semesters {
        for subject in &semester.subjects {
            let cells = [
                semester.semester.as_str(),
                subject.subject_code.as_str(),
                subject.subject_name.as_str(),
                subject.grade.as_str(),
                subject.grade_point.as_str(),
                subject.credit.as_str(),
                subject.status.as_str(),
            ];
            rows.push(
                cells
                    .iter()
                    .map(|c| quote(c))
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }
    }
    rows.join("\n")
}

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}
