// Submission scoring: pass/fail summary, feedback text and a rough
// time-complexity guess read off the submitted code.
//
// Test outcomes come from the client. Nothing here re-runs the code.

use mockview_core::model::SessionResult;
use serde::{Deserialize, Serialize};

/// Outcome of one test case as reported by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    #[serde(default)]
    pub name: Option<String>,
    pub passed: bool,
    #[serde(default)]
    pub input: Option<serde_json::Value>,
    #[serde(default)]
    pub expected: Option<serde_json::Value>,
    #[serde(default)]
    pub actual: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Build the frozen result for a submission.
pub fn evaluate(code: &str, results: &[TestResult], hints_used: u32) -> SessionResult {
    let total_tests = results.len() as u32;
    let passed_count = results.iter().filter(|r| r.passed).count() as u32;
    let passed = total_tests > 0 && passed_count == total_tests;
    let complexity = guess_complexity(code);
    let feedback = feedback(code, results, passed_count, total_tests, hints_used, &complexity);

    SessionResult {
        passed_count,
        total_tests,
        passed,
        feedback,
        complexity,
    }
}

fn feedback(
    code: &str,
    results: &[TestResult],
    passed_count: u32,
    total_tests: u32,
    hints_used: u32,
    complexity: &str,
) -> String {
    let mut parts = Vec::new();

    if code.trim().is_empty() {
        parts.push("No code was submitted.".to_string());
    }

    if total_tests == 0 {
        parts.push("No test results were reported, so the solution could not be scored.".into());
    } else if passed_count == total_tests {
        parts.push(format!("All {total_tests} tests passed. Nice work!"));
    } else if passed_count == 0 {
        parts.push(format!(
            "None of the {total_tests} tests passed. Re-read the prompt and trace the first example by hand."
        ));
    } else {
        let failing: Vec<String> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.passed)
            .map(|(i, r)| r.name.clone().unwrap_or_else(|| format!("test {}", i + 1)))
            .collect();
        parts.push(format!(
            "{passed_count} of {total_tests} tests passed. Failing: {}.",
            failing.join(", ")
        ));
    }

    if results.iter().any(|r| r.error.is_some()) {
        parts.push("Some tests raised errors; check for runtime exceptions.".into());
    }

    if !code.trim().is_empty() {
        parts.push(format!("Estimated time complexity: {complexity}."));
    }

    match hints_used {
        0 => {}
        1 => parts.push("You used 1 hint.".into()),
        n => parts.push(format!("You used {n} hints.")),
    }

    parts.join(" ")
}

// ---------------------------------------------------------------------------
// Complexity guess
// ---------------------------------------------------------------------------

/// Array methods that walk every element through a callback.
const CALLBACK_METHODS: &[&str] = &[
    "forEach", "map", "filter", "reduce", "reduceRight", "some", "every", "find", "findIndex",
    "flatMap",
];

/// Array/string methods that scan linearly without a callback.
const SCAN_METHODS: &[&str] = &["includes", "indexOf", "lastIndexOf"];

/// Guess the time complexity of JavaScript-like `code` from its loop
/// nesting. Sorting at nesting depth of at most one reads as `O(n log n)`.
pub fn guess_complexity(code: &str) -> String {
    let code = strip_comments_and_strings(code);
    let depth = max_loop_depth(&code);
    let sorts = code.contains(".sort(");

    match depth {
        0 if sorts => "O(n log n)".into(),
        0 => "O(1)".into(),
        1 if sorts => "O(n log n)".into(),
        1 => "O(n)".into(),
        d => format!("O(n^{d})"),
    }
}

/// Replace comments with spaces and string/template literal contents with
/// nothing, so keywords inside them are not counted.
fn strip_comments_and_strings(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match (c, next) {
            ('/', Some('/')) => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            ('/', Some('*')) => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
                out.push(' ');
            }
            ('"' | '\'' | '`', _) => {
                i += 1;
                while i < chars.len() && chars[i] != c {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
                out.push(c);
                out.push(c);
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// An open `{` or `(` and how many loop levels it opened.
#[derive(Clone, Copy)]
struct Group {
    paren: bool,
    loops: usize,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn max_loop_depth(code: &str) -> usize {
    let chars: Vec<char> = code.chars().collect();
    let mut stack: Vec<Group> = Vec::new();
    // Loop keywords seen whose body has not opened yet.
    let mut pending_loops = 0usize;
    let mut pending_callback = false;
    let mut max_depth = 0usize;
    let mut i = 0;

    let depth = |stack: &[Group]| stack.iter().map(|g| g.loops).sum::<usize>();

    while i < chars.len() {
        let c = chars[i];

        if is_ident_char(c) && !c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let after_dot = start > 0 && chars[start - 1] == '.';

            pending_callback = after_dot && CALLBACK_METHODS.contains(&word.as_str());
            if !after_dot && matches!(word.as_str(), "for" | "while" | "do") {
                pending_loops += 1;
            } else if after_dot && SCAN_METHODS.contains(&word.as_str()) {
                max_depth = max_depth.max(depth(&stack) + pending_loops + 1);
            }
            continue;
        }

        match c {
            '{' => {
                // Braces directly inside a loop header are destructuring.
                let in_header = stack.last().is_some_and(|g| g.paren);
                let loops = if in_header { 0 } else { std::mem::take(&mut pending_loops) };
                stack.push(Group { paren: false, loops });
            }
            '(' => {
                let loops = usize::from(std::mem::take(&mut pending_callback));
                stack.push(Group { paren: true, loops });
            }
            '}' | ')' => {
                stack.pop();
            }
            ';' if pending_loops > 0 && !stack.last().is_some_and(|g| g.paren) => {
                // Loops with a single-statement body.
                max_depth = max_depth.max(depth(&stack) + pending_loops);
                pending_loops = 0;
            }
            c if !c.is_whitespace() => pending_callback = false,
            _ => {}
        }

        max_depth = max_depth.max(depth(&stack));
        i += 1;
    }

    max_depth
}
