use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::parser::headings::rank_key;
use crate::parser::sections::RawSection;
use crate::parser::text::normalize;
use crate::parser::Semester;

static LABEL_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:sem|semester|^)\s*[:\-.]?\s*([ivx\d]+)").unwrap());

/// Strip a label to its bare numeral token so "Semester 3" (mid-page
/// heading) and "Sem - 3" (footer summary) land on the same merge key.
fn merge_key(label: &str) -> String {
    let key = normalize(label);
    match LABEL_KEY_RE.captures(&key) {
        Some(caps) => caps[1].to_uppercase(),
        None => key,
    }
}

/// Merge raw semester appearances by normalized label, dedup subjects on
/// (code, name) preserving first-seen order, keep the first non-empty
/// SGPA/CGPA, drop sections that carry nothing, and sort ascending by
/// rank key (stable, so unrankable labels keep encounter order).
pub fn aggregate(raw: Vec<RawSection>) -> Vec<Semester> {
    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, Semester> = HashMap::new();

    for section in raw {
        let key = merge_key(&section.label);
        if key.is_empty() {
            continue;
        }

        let mut seen = HashSet::new();
        let incoming: Vec<_> = section
            .subjects
            .into_iter()
            .filter(|s| seen.insert(s.key()))
            .collect();

        match merged.get_mut(&key) {
            None => {
                order.push(key.clone());
                merged.insert(
                    key.clone(),
                    Semester {
                        semester: key,
                        sgpa: section.sgpa,
                        cgpa: section.cgpa,
                        subjects: incoming,
                    },
                );
            }
            Some(existing) => {
                if existing.subjects.is_empty() && !incoming.is_empty() {
                    existing.subjects = incoming;
                } else {
                    let mut have: HashSet<_> =
                        existing.subjects.iter().map(|s| s.key()).collect();
                    for subject in incoming {
                        if have.insert(subject.key()) {
                            existing.subjects.push(subject);
                        }
                    }
                }
                // footer repeats must not overwrite values already found
                if existing.sgpa.is_empty() && !section.sgpa.is_empty() {
                    existing.sgpa = section.sgpa;
                }
                if existing.cgpa.is_empty() && !section.cgpa.is_empty() {
                    existing.cgpa = section.cgpa;
                }
            }
        }
    }

    let mut semesters: Vec<Semester> = order
        .into_iter()
        .filter_map(|key| merged.remove(&key))
        .filter(|s| !s.subjects.is_empty() || !s.sgpa.is_empty() || !s.cgpa.is_empty())
        .collect();
    semesters.sort_by_key(|s| rank_key(&s.semester));
    semesters
}

/// Fill missing `points` as gradePoint x credit, two decimal places.
/// Pre-existing non-empty values are never overwritten.
pub fn complete_points(semesters: &mut [Semester]) {
    for semester in semesters {
        for subject in &mut semester.subjects {
            if !subject.points.is_empty() {
                continue;
            }
            if let (Some(gp), Some(credit)) =
                (parse_num(&subject.grade_point), parse_num(&subject.credit))
            {
                subject.points = format!("{:.2}", gp * credit);
            }
        }
    }
}

fn parse_num(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tables::Subject;

    fn subject(code: &str, name: &str, gp: &str, credit: &str) -> Subject {
        Subject {
            subject_code: code.to_string(),
            subject_name: name.to_string(),
            grade_point: gp.to_string(),
            credit: credit.to_string(),
            ..Subject::default()
        }
    }

    fn section(label: &str, subjects: Vec<Subject>, sgpa: &str, cgpa: &str) -> RawSection {
        RawSection {
            label: label.to_string(),
            subjects,
            sgpa: sgpa.to_string(),
            cgpa: cgpa.to_string(),
        }
    }

    #[test]
    fn merge_keys_strip_semester_prefixes() {
        assert_eq!(merge_key("Semester 3"), "3");
        assert_eq!(merge_key("Sem - 3"), "3");
        assert_eq!(merge_key("sem:iii"), "III");
        assert_eq!(merge_key("3"), "3");
        assert_eq!(merge_key("Overall Summary"), "Overall Summary");
    }

    #[test]
    fn footer_summary_merges_into_heading_section() {
        // mid-page heading with subjects, footer repeat with only a CGPA
        let raw = vec![
            section(
                "Semester 3",
                vec![subject("CS301", "Operating Systems", "9", "4")],
                "8.4",
                "",
            ),
            section("Sem - 3", vec![], "", "7.9"),
        ];
        let semesters = aggregate(raw);
        assert_eq!(semesters.len(), 1);
        assert_eq!(semesters[0].semester, "3");
        assert_eq!(semesters[0].subjects.len(), 1);
        assert_eq!(semesters[0].sgpa, "8.4");
        assert_eq!(semesters[0].cgpa, "7.9");
    }

    #[test]
    fn empty_first_appearance_is_replaced_wholesale() {
        let raw = vec![
            section("Semester 2", vec![], "7.1", ""),
            section(
                "2",
                vec![subject("CS201", "Data Structures", "8", "4")],
                "",
                "",
            ),
        ];
        let semesters = aggregate(raw);
        assert_eq!(semesters.len(), 1);
        assert_eq!(semesters[0].subjects.len(), 1);
        assert_eq!(semesters[0].sgpa, "7.1");
    }

    #[test]
    fn later_values_never_overwrite() {
        let raw = vec![
            section("1", vec![subject("A", "B", "", "")], "8.0", "8.0"),
            section("Sem 1", vec![subject("A", "B", "", "")], "1.0", "1.0"),
        ];
        let semesters = aggregate(raw);
        assert_eq!(semesters[0].sgpa, "8.0");
        assert_eq!(semesters[0].cgpa, "8.0");
        assert_eq!(semesters[0].subjects.len(), 1);
    }

    #[test]
    fn subjects_dedup_on_code_name_pair() {
        let raw = vec![section(
            "1",
            vec![
                subject("CS101", "Programming", "9", "4"),
                subject("CS101", "Programming", "9", "4"),
                subject("CS101", "Programming Lab", "9", "2"),
            ],
            "",
            "",
        )];
        let semesters = aggregate(raw);
        assert_eq!(semesters[0].subjects.len(), 2);
    }

    #[test]
    fn union_of_two_appearances() {
        let raw = vec![
            section("Sem 4", vec![subject("A1", "Alpha", "", "")], "", ""),
            section(
                "Semester 4",
                vec![subject("A1", "Alpha", "", ""), subject("B2", "Beta", "", "")],
                "",
                "",
            ),
        ];
        let semesters = aggregate(raw);
        assert_eq!(semesters.len(), 1);
        let names: Vec<_> = semesters[0]
            .subjects
            .iter()
            .map(|s| s.subject_name.as_str())
            .collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);
    }

    #[test]
    fn pure_noise_sections_are_dropped() {
        let raw = vec![
            section("Semester 1", vec![subject("X", "Y", "", "")], "", ""),
            section("semester", vec![], "", ""),
        ];
        let semesters = aggregate(raw);
        assert_eq!(semesters.len(), 1);
    }

    #[test]
    fn sorted_by_rank_with_unrankable_last() {
        let raw = vec![
            section("II", vec![subject("A", "A", "", "")], "", ""),
            section("IV", vec![subject("B", "B", "", "")], "", ""),
            section("I", vec![subject("C", "C", "", "")], "", ""),
        ];
        let labels: Vec<_> = aggregate(raw)
            .into_iter()
            .map(|s| s.semester)
            .collect();
        assert_eq!(labels, vec!["I", "II", "IV"]);
    }

    #[test]
    fn derived_points_two_decimals() {
        let mut semesters = vec![Semester {
            semester: "1".to_string(),
            sgpa: String::new(),
            cgpa: String::new(),
            subjects: vec![
                subject("CS101", "Programming", "9", "4"),
                subject("EC102", "Circuits", "7.5", "3"),
                subject("HS103", "English", "", "2"),
            ],
        }];
        complete_points(&mut semesters);
        assert_eq!(semesters[0].subjects[0].points, "36.00");
        assert_eq!(semesters[0].subjects[1].points, "22.50");
        assert_eq!(semesters[0].subjects[2].points, "");
    }

    #[test]
    fn existing_points_are_kept() {
        let mut semesters = vec![Semester {
            semester: "1".to_string(),
            sgpa: String::new(),
            cgpa: String::new(),
            subjects: vec![{
                let mut s = subject("CS101", "Programming", "9", "4");
                s.points = "35".to_string();
                s
            }],
        }];
        complete_points(&mut semesters);
        assert_eq!(semesters[0].subjects[0].points, "35");
    }

    #[test]
    fn nonnumeric_junk_is_stripped_before_parsing() {
        let mut semesters = vec![Semester {
            semester: "1".to_string(),
            sgpa: String::new(),
            cgpa: String::new(),
            subjects: vec![subject("CS101", "Programming", "9*", " 4 ")],
        }];
        complete_points(&mut semesters);
        assert_eq!(semesters[0].subjects[0].points, "36.00");
    }
}
