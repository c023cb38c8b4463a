/// Canonical form used for name comparison: invisible characters stripped, whitespace
/// trimmed and collapsed, case folded.
pub(crate) fn normalize_name(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}', '\u{00a0}'], " ");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_lowercase()
}

/// Header form used for column detection.
pub(crate) fn normalize_header(value: &str) -> String {
    normalize_name(value).replace(['_', '-'], " ")
}
