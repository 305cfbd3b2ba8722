use crate::engine::{
    models::Verdict,
    requirements::{self, RequirementTag},
};

const MAX_HINTS: usize = 3;

/// Lexical pass/fail grading for submissions that cannot be executed
/// (pseudocode). Never runs code; checks that each required construct has at
/// least one textual marker in the submission.
pub struct StructuralGrader;

impl StructuralGrader {
    /// `checklist` overrides prompt derivation when the challenge pre-declares
    /// its required constructs.
    pub fn grade(
        prompt: &str,
        submission: &str,
        checklist: Option<&[RequirementTag]>,
    ) -> Verdict {
        let tags = match checklist {
            Some(tags) => tags.to_vec(),
            None => requirements::derive(prompt),
        };
        // No trigger matched the prompt: pass trivially rather than fail on
        // evidence nobody asked for.
        if tags.is_empty() {
            return Verdict::pass("No specific constructs required; answer received.");
        }

        let folded = submission.to_lowercase();
        let mut missing = Vec::new();
        let mut hints: Vec<String> = Vec::new();
        for tag in tags {
            if tag.satisfied_by(&folded) {
                continue;
            }
            missing.push(tag.description().to_string());
            let hint = tag.hint().to_string();
            if hints.len() < MAX_HINTS && !hints.contains(&hint) {
                hints.push(hint);
            }
        }

        if missing.is_empty() {
            Verdict::pass("All required constructs are present.")
        } else {
            Verdict::fail(
                missing,
                hints,
                "This checker looks for key ideas, not perfect syntax.",
            )
        }
    }
}
