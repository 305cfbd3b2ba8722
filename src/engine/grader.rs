use std::{sync::Arc, time::Duration};

use regex::Regex;

use crate::engine::{
    metrics::MetricsRegistry,
    models::{Challenge, Verdict},
    output,
    sandbox::SandboxBackend,
    syntax,
};

const MAX_HINTS: usize = 3;

/// Grades executable submissions: syntax check, sandboxed run (with the
/// challenge's optional test harness appended), output comparison, then the
/// declared keyword checklist. Stages run strictly in that order and the
/// first failure is terminal; resubmission is the only retry mechanism.
pub struct ExecutionGrader {
    sandbox: Arc<dyn SandboxBackend>,
    timeout: Duration,
    metrics: Arc<MetricsRegistry>,
}

impl ExecutionGrader {
    pub fn new(
        sandbox: impl SandboxBackend + 'static,
        timeout: Duration,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            sandbox: Arc::new(sandbox),
            timeout,
            metrics,
        }
    }

    pub async fn grade(&self, challenge: &Challenge, submission: &str) -> Verdict {
        let cleaned = strip_code_fences(submission);

        if let Err(issue) = syntax::check(&cleaned) {
            self.metrics.syntax_rejected();
            tracing::debug!(line = issue.line, "submission rejected before execution");
            return Verdict::fail(
                vec!["fix syntax errors before submitting".to_string()],
                vec![issue.message],
                "Syntax must be valid before grading.",
            );
        }

        let to_run = match challenge.test_harness.as_deref() {
            Some(harness) if !harness.trim().is_empty() => format!("{cleaned}\n{harness}"),
            _ => cleaned.clone(),
        };
        let outcome = self.sandbox.run(&to_run, self.timeout).await;
        tracing::debug!(
            backend = self.sandbox.name(),
            duration_ms = outcome.duration_ms,
            clean = outcome.exited_cleanly,
            "sandbox run finished"
        );
        if !outcome.exited_cleanly {
            if outcome.timed_out {
                self.metrics.timed_out();
            }
            return Verdict::fail(
                vec!["code did not run".to_string()],
                vec![outcome.combined_output.clone()],
                "Fix runtime errors and try again.",
            )
            .with_output(outcome.combined_output);
        }

        if let Some(expected) = challenge.expected_output.as_deref() {
            if !output::matches(&outcome.combined_output, expected) {
                // The hint stays nonspecific so the expected text is not
                // leaked back to the player.
                return Verdict::fail(
                    vec!["output does not match the expected result".to_string()],
                    vec!["Check loop bounds, conditions, and printed values.".to_string()],
                    "The code runs but produces the wrong output.",
                )
                .with_output(outcome.combined_output);
            }
        }

        if challenge.solution_keywords.is_empty() {
            return Verdict::pass("Answer received.").with_output(outcome.combined_output);
        }

        let normalized = normalize_submission(submission);
        let missing: Vec<String> = challenge
            .solution_keywords
            .iter()
            .filter(|keyword| !keyword_present(keyword, submission, &normalized))
            .cloned()
            .collect();

        if missing.is_empty() {
            Verdict::pass("This checker looks for key ideas, not perfect syntax.")
                .with_output(outcome.combined_output)
        } else {
            let hints = keyword_hints(&missing);
            Verdict::fail(
                missing,
                hints,
                "This checker looks for key ideas, not perfect syntax.",
            )
            .with_output(outcome.combined_output)
        }
    }
}

/// Plain keywords are substring-checked against the folded submission;
/// `re:`-prefixed keywords are full regexes run against the raw text so
/// case-sensitive patterns stay possible.
fn keyword_present(keyword: &str, raw: &str, normalized: &str) -> bool {
    if let Some(pattern) = keyword.strip_prefix("re:") {
        return match Regex::new(pattern) {
            Ok(re) => re.is_match(raw),
            Err(err) => {
                tracing::debug!(pattern, error = %err, "unusable keyword pattern");
                false
            }
        };
    }
    normalized.contains(&keyword.to_lowercase())
}

/// Lowercase, squash everything outside [a-z0-9_] to spaces, collapse runs.
fn normalize_submission(text: &str) -> String {
    let folded = text.to_lowercase();
    let replaced: String = folded
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                ' '
            }
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop Markdown fence marker lines so pasted ```python blocks grade like
/// plain source.
fn strip_code_fences(text: &str) -> String {
    if !text.contains("```") {
        return text.to_string();
    }
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn keyword_hints(missing: &[String]) -> Vec<String> {
    let has = |needle: &str| missing.iter().any(|m| m == needle);
    let mut hints = Vec::new();
    if has("if") || has("else") {
        hints.push("Check the decision logic (if/else) for the condition.".to_string());
    }
    if has("for") || has("while") || has("range") {
        hints.push("Review the loop structure and make sure it runs correctly.".to_string());
    }
    if has("print") {
        hints.push("Make sure the output line prints the correct value.".to_string());
    }
    if has("append") {
        hints.push("Check how items are added to the list.".to_string());
    }
    if has("return") {
        hints.push("Make sure the function returns the correct result.".to_string());
    }
    if has("break") {
        hints.push("Consider whether the loop should stop when a condition is met.".to_string());
    }
    if hints.is_empty() {
        hints.push("Re-check variable names, operators, and indentation.".to_string());
    }
    hints.truncate(MAX_HINTS);
    hints
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    };

    use async_trait::async_trait;

    use super::ExecutionGrader;
    use crate::engine::{
        models::{Challenge, ChallengeKind, DifficultyLevel},
        sandbox::{RunOutcome, SandboxBackend},
    };

    struct MockSandbox {
        outcome: RunOutcome,
        invoked: Arc<AtomicBool>,
        sources: Arc<Mutex<Vec<String>>>,
    }

    impl MockSandbox {
        fn returning(combined_output: &str, exited_cleanly: bool) -> Self {
            Self {
                outcome: RunOutcome {
                    combined_output: combined_output.to_string(),
                    exited_cleanly,
                    timed_out: false,
                    duration_ms: 1,
                },
                invoked: Arc::new(AtomicBool::new(false)),
                sources: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl SandboxBackend for MockSandbox {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn run(&self, source: &str, _timeout: Duration) -> RunOutcome {
            self.invoked.store(true, Ordering::SeqCst);
            self.sources.lock().unwrap().push(source.to_string());
            self.outcome.clone()
        }
    }

    fn challenge(expected_output: Option<&str>, keywords: &[&str]) -> Challenge {
        Challenge {
            id: "beginner-sum".to_string(),
            level: DifficultyLevel::Beginner,
            kind: ChallengeKind::Python,
            title: "Sum".to_string(),
            prompt: "Fix the bug so the program prints the sum.".to_string(),
            reference_code: "print(1+1)".to_string(),
            expected_behavior: "Prints 2.".to_string(),
            expected_output: expected_output.map(str::to_string),
            test_harness: None,
            solution_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            required_constructs: None,
        }
    }

    fn grader_with(mock: MockSandbox) -> (ExecutionGrader, Arc<AtomicBool>, Arc<Mutex<Vec<String>>>) {
        let invoked = mock.invoked.clone();
        let sources = mock.sources.clone();
        (
            ExecutionGrader::new(
                mock,
                Duration::from_secs(5),
                Arc::new(crate::engine::metrics::MetricsRegistry::new()),
            ),
            invoked,
            sources,
        )
    }

    #[tokio::test]
    async fn syntax_failure_never_reaches_the_sandbox() {
        let (grader, invoked, _) = grader_with(MockSandbox::returning("", true));
        let verdict = grader
            .grade(&challenge(Some("2"), &[]), "if True\n    print(2)")
            .await;
        assert!(!verdict.passed);
        assert_eq!(verdict.missing, vec!["fix syntax errors before submitting"]);
        assert!(verdict.hints[0].contains("SyntaxError"));
        assert!(verdict.hints[0].contains("line"));
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn correct_output_passes() {
        let (grader, _, _) = grader_with(MockSandbox::returning("2\n", true));
        let verdict = grader.grade(&challenge(Some("2"), &[]), "print(1+1)").await;
        assert!(verdict.passed);
        assert!(verdict.missing.is_empty());
        assert_eq!(verdict.raw_output.as_deref(), Some("2\n"));
    }

    #[tokio::test]
    async fn harness_is_appended_before_execution() {
        let (grader, _, sources) = grader_with(MockSandbox::returning("0\n5\n", true));
        let mut ch = challenge(Some("0\n5"), &[]);
        ch.test_harness = Some("print(safe_divide(10, 0))\nprint(safe_divide(10, 2))".to_string());
        let verdict = grader
            .grade(&ch, "def safe_divide(a, b):\n    return 0 if b == 0 else a // b")
            .await;
        assert!(verdict.passed);
        let ran = sources.lock().unwrap();
        assert!(ran[0].ends_with("print(safe_divide(10, 2))"));
    }

    #[tokio::test]
    async fn runtime_failure_surfaces_raw_output_verbatim() {
        let trace = "Traceback (most recent call last):\nNameError: name 'totl' is not defined\n";
        let (grader, _, _) = grader_with(MockSandbox::returning(trace, false));
        let verdict = grader
            .grade(&challenge(Some("12"), &[]), "total = 7 + 5\nprint(totl)")
            .await;
        assert!(!verdict.passed);
        assert_eq!(verdict.missing, vec!["code did not run"]);
        assert_eq!(verdict.hints, vec![trace.to_string()]);
    }

    #[tokio::test]
    async fn output_mismatch_hint_does_not_leak_expected_text() {
        let (grader, _, _) = grader_with(MockSandbox::returning("7\n", true));
        let verdict = grader.grade(&challenge(Some("6"), &[]), "print(7)").await;
        assert!(!verdict.passed);
        assert_eq!(verdict.missing, vec!["output does not match the expected result"]);
        assert!(!verdict.hints.iter().any(|h| h.contains('6')));
    }

    #[tokio::test]
    async fn keyword_gap_fails_despite_correct_output() {
        let (grader, _, _) = grader_with(MockSandbox::returning("2\n", true));
        let verdict = grader
            .grade(&challenge(Some("2"), &["for", "if", "print"]), "print(2)")
            .await;
        assert!(!verdict.passed);
        assert_eq!(verdict.missing, vec!["for", "if"]);
        assert_eq!(verdict.hints.len(), 2);
    }

    #[tokio::test]
    async fn regex_keywords_match_the_raw_submission() {
        let (grader, _, _) = grader_with(MockSandbox::returning("1\n2\n3\n", true));
        let verdict = grader
            .grade(
                &challenge(None, &["re:range\\(1,\\s*4\\)"]),
                "for i in range(1, 4):\n    print(i)",
            )
            .await;
        assert!(verdict.passed);
    }

    #[tokio::test]
    async fn fenced_submissions_are_unwrapped() {
        let (grader, _, sources) = grader_with(MockSandbox::returning("2\n", true));
        let verdict = grader
            .grade(&challenge(Some("2"), &[]), "```python\nprint(1+1)\n```")
            .await;
        assert!(verdict.passed);
        assert_eq!(sources.lock().unwrap()[0], "print(1+1)");
    }
}
