//! Heuristic parsing of work-unit output.
//!
//! None of this is authoritative. Changed resources only feed the carryover
//! prompt and the no-progress counter; test and lint summaries are recorded
//! in history for the operator.

use std::sync::LazyLock;

use regex::Regex;

const PATH: &str = r"[a-zA-Z0-9_/.-]+\.[a-zA-Z0-9]+";

static CHANGE_VERB_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:modified|changed|updated|created|edits? to|changes? to)\s+({PATH})"
    ))
    .expect("change verb pattern is valid")
});

static FILE_LABEL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)(?:file|files|path|paths):\s*({PATH})")).expect("file label pattern is valid")
});

static BARE_PATH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-zA-Z0-9_/.-]+/[a-zA-Z0-9_.-]+\.[a-zA-Z0-9]+)").expect("bare path pattern is valid")
});

static HEADING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+:").expect("heading pattern is valid"));

static TEST_SUMMARY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Tests|Test Results|Validation):\s*(?:Pass|Fail|Passed|Failed|\d+ passed)")
        .expect("test summary pattern is valid")
});

static LINT_TOOL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"lint|eslint|tsc|clippy").expect("lint tool pattern is valid"));

static PASS_FAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)pass|fail").expect("pass/fail pattern is valid"));

/// Returns true if `output` contains the completion token. An empty token never matches.
pub fn contains_completion(output: &str, token: &str) -> bool {
    !token.is_empty() && output.contains(token)
}

/// Paths the output claims were changed, in first-seen order without duplicates.
///
/// Anything containing `..` is dropped.
pub fn extract_changed_resources(output: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();

    for pattern in [&*CHANGE_VERB_PATTERN, &*FILE_LABEL_PATTERN, &*BARE_PATH_PATTERN] {
        for caps in pattern.captures_iter(output) {
            let Some(path) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if path.contains("..") || found.iter().any(|p| p == path) {
                continue;
            }
            found.push(path.to_string());
        }
    }

    found
}

/// A `RAN_COMMANDS:` block, or failing that a one-line test summary.
pub fn extract_test_results(output: &str) -> Option<String> {
    if let Some(start) = output.find("RAN_COMMANDS:") {
        let rest = &output[start..];
        let mut end = rest.len();
        let mut offset = 0;
        for (i, line) in rest.split('\n').enumerate() {
            if i > 0 && HEADING_PATTERN.is_match(line) {
                // stop before the newline that opens the next heading
                end = offset - 1;
                break;
            }
            offset += line.len() + 1;
        }
        return Some(rest[..end].trim().to_string());
    }

    TEST_SUMMARY_PATTERN.find(output).map(|m| m.as_str().to_string())
}

/// The first line naming a lint tool together with a pass/fail verdict.
pub fn extract_lint_results(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| LINT_TOOL_PATTERN.is_match(line) && PASS_FAIL_PATTERN.is_match(line))
        .map(|line| line.trim().to_string())
}

/// Notes recorded for a successful iteration.
///
/// The raw output is kept whole; consumers bound it to their own limits.
pub fn output_notes(output: &str, completion_found: bool, token: &str) -> String {
    if completion_found {
        format!("Completion token found: {}", token)
    } else {
        output.to_string()
    }
}
