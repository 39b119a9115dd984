/// Collapse whitespace runs (newlines and tabs included) to single spaces
/// and trim. Applied to every text extraction before any regex matching.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
