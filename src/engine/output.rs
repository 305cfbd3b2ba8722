/// Compare sandbox output against the challenge's expected output, which may
/// hold several accepted answers separated by `|`; matching any one of them
/// is a pass. An empty expectation means output is not graded.
pub fn matches(actual: &str, expected_spec: &str) -> bool {
    let options: Vec<&str> = expected_spec
        .split('|')
        .map(str::trim)
        .filter(|opt| !opt.is_empty())
        .collect();
    if options.is_empty() {
        return true;
    }

    let actual_norm = normalize_lines(actual);
    let actual_compact = strip_whitespace(&actual_norm);

    options.iter().any(|option| {
        let expected_norm = normalize_lines(option);
        if actual_norm == expected_norm {
            return true;
        }
        actual_compact == strip_whitespace(&expected_norm)
    })
}

/// Trim every line and drop blank ones, so trailing newlines and indentation
/// differences never fail a submission.
fn normalize_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
