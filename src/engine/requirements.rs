use serde::{Deserialize, Serialize};

/// Construct evidence a prompt can demand from a submission. Derived from a
/// fixed trigger table, so false positives and negatives are expected and
/// tolerated downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementTag {
    Input,
    Output,
    Conditional,
    Loop,
    Function,
    Return,
    List,
    String,
    EvenOddWords,
    HotWord,
    ApcspWord,
}

impl RequirementTag {
    pub fn description(self) -> &'static str {
        match self {
            RequirementTag::Input => "Read a value as input",
            RequirementTag::Output => "Display or print a result",
            RequirementTag::Conditional => "Branch with a conditional (IF/ELSE)",
            RequirementTag::Loop => "Repeat with a loop",
            RequirementTag::Function => "Define a function or procedure",
            RequirementTag::Return => "Return a result",
            RequirementTag::List => "Use a list",
            RequirementTag::String => "Work with a string value",
            RequirementTag::EvenOddWords => "Cover both EVEN and ODD outcomes",
            RequirementTag::HotWord => "Use the literal word \"Hot\"",
            RequirementTag::ApcspWord => "Compare against the literal word \"APCSP\"",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            RequirementTag::Input => "Start by reading the value with INPUT before you use it.",
            RequirementTag::Output => "Use DISPLAY (or PRINT) to show the result.",
            RequirementTag::Conditional => {
                "Check the condition with IF, and cover the other case with ELSE."
            }
            RequirementTag::Loop => "Use FOR, WHILE, or REPEAT to go through the values.",
            RequirementTag::Function => "Wrap the logic in FUNCTION ... END FUNCTION.",
            RequirementTag::Return => "RETURN the computed value at the end.",
            RequirementTag::List => "Keep the values in a list and APPEND as you go.",
            RequirementTag::String => "Treat the value as text when comparing or building it.",
            RequirementTag::EvenOddWords => {
                "Output \"EVEN\" in one branch and \"ODD\" in the other."
            }
            RequirementTag::HotWord => "Display \"Hot\" when the condition holds.",
            RequirementTag::ApcspWord => "Compare the word against \"APCSP\" exactly.",
        }
    }

    /// Lexical evidence for the tag in a case-folded submission.
    pub fn satisfied_by(self, folded: &str) -> bool {
        match self {
            RequirementTag::Input => folded.contains("input"),
            RequirementTag::Output => any_of(folded, &["display", "print", "output"]),
            RequirementTag::Conditional => any_of(folded, &["if", "otherwise", "else"]),
            RequirementTag::Loop => any_of(folded, &["for", "while", "repeat"]),
            RequirementTag::Function => any_of(folded, &["function", "procedure", "def"]),
            RequirementTag::Return => folded.contains("return"),
            RequirementTag::List => any_of(folded, &["list", "append", "["]),
            RequirementTag::String => folded.contains("string") || folded.contains('"'),
            RequirementTag::EvenOddWords => folded.contains("even") && folded.contains("odd"),
            RequirementTag::HotWord => folded.contains("hot"),
            RequirementTag::ApcspWord => folded.contains("apcsp"),
        }
    }
}

/// Derive the required-construct tags from a free-text challenge prompt.
/// Fixed substring triggers over a case-folded, whitespace-collapsed copy;
/// stable output order.
pub fn derive(prompt: &str) -> Vec<RequirementTag> {
    let p = normalize_prompt(prompt);
    let mut tags = Vec::new();

    if p.contains("input") {
        tags.push(RequirementTag::Input);
    }
    if any_of(&p, &["display", "output", "print"]) {
        tags.push(RequirementTag::Output);
    }
    if any_of(&p, &["if", "otherwise", "else"]) {
        tags.push(RequirementTag::Conditional);
    }
    if any_of(&p, &["for ", "from", "times", "1 to", "1.."]) {
        tags.push(RequirementTag::Loop);
    }
    if any_of(&p, &["write ", "return"]) {
        tags.push(RequirementTag::Function);
    }
    if p.contains("return") {
        tags.push(RequirementTag::Return);
    }
    if p.contains("list") {
        tags.push(RequirementTag::List);
    }
    if p.contains("string") {
        tags.push(RequirementTag::String);
    }
    if p.contains("\"even\"") || (p.contains(" even ") && p.contains("odd")) {
        tags.push(RequirementTag::EvenOddWords);
    }
    if p.contains("\"hot\"") {
        tags.push(RequirementTag::HotWord);
    }
    if p.contains("\"apcsp\"") {
        tags.push(RequirementTag::ApcspWord);
    }

    tags
}

fn normalize_prompt(prompt: &str) -> String {
    prompt
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn any_of(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::{RequirementTag, derive};

    #[test]
    fn iteration_prompt_yields_loop_and_output() {
        let tags = derive("Display all numbers from 1 to 5.");
        assert!(tags.contains(&RequirementTag::Output));
        assert!(tags.contains(&RequirementTag::Loop));
    }

    #[test]
    fn function_prompt_yields_function_and_return() {
        let tags = derive("Write IsPrime(n) that returns true if n is prime, else false.");
        assert!(tags.contains(&RequirementTag::Function));
        assert!(tags.contains(&RequirementTag::Return));
        assert!(tags.contains(&RequirementTag::Conditional));
    }

    #[test]
    fn dual_polarity_words_trigger_single_literal_tag() {
        let tags = derive("Input n and display \"EVEN\" if n is even, otherwise \"ODD\".");
        assert_eq!(
            tags.iter()
                .filter(|t| **t == RequirementTag::EvenOddWords)
                .count(),
            1
        );
    }

    #[test]
    fn unmatched_prompt_yields_no_tags() {
        assert!(derive("Describe your favorite color.").is_empty());
    }

    #[test]
    fn derivation_is_deterministic() {
        let prompt = "Input a list and display each string, otherwise return nothing.";
        assert_eq!(derive(prompt), derive(prompt));
    }

    #[test]
    fn tags_keep_a_stable_order() {
        let tags = derive("Input n and display the result, else print 0, for 3 times.");
        assert_eq!(
            tags,
            vec![
                RequirementTag::Input,
                RequirementTag::Output,
                RequirementTag::Conditional,
                RequirementTag::Loop,
            ]
        );
    }
}
