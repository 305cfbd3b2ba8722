use dashmap::DashMap;
use rand::seq::SliceRandom;

use crate::engine::models::{Challenge, ChallengeKind, DifficultyLevel};
use crate::engine::requirements::RequirementTag;

/// Immutable challenge content, seeded once at startup. Challenges are
/// read-only afterward; grading state lives in the ledger, never here.
pub struct ChallengeBank {
    by_id: DashMap<String, Challenge>,
    by_level: DashMap<DifficultyLevel, Vec<String>>,
}

impl ChallengeBank {
    pub fn seeded() -> Self {
        let bank = Self {
            by_id: DashMap::new(),
            by_level: DashMap::new(),
        };
        for challenge in seed_challenges() {
            bank.insert(challenge);
        }
        let total = bank.by_id.len();
        for level in DifficultyLevel::ALL {
            let count = bank
                .by_level
                .get(&level)
                .map(|ids| ids.len())
                .unwrap_or(0);
            tracing::info!(%level, count, total, "challenge inventory");
        }
        bank
    }

    fn insert(&self, challenge: Challenge) {
        self.by_level
            .entry(challenge.level)
            .or_default()
            .push(challenge.id.clone());
        self.by_id.insert(challenge.id.clone(), challenge);
    }

    pub fn get(&self, id: &str) -> Option<Challenge> {
        self.by_id.get(id).map(|entry| entry.value().clone())
    }

    pub fn random_for_level(&self, level: DifficultyLevel) -> Option<Challenge> {
        let ids = self.by_level.get(&level)?;
        let chosen = ids.choose(&mut rand::thread_rng())?.clone();
        drop(ids);
        self.get(&chosen)
    }
}

struct PythonSeed {
    title: &'static str,
    prompt: &'static str,
    buggy_code: &'static str,
    expected_behavior: &'static str,
    expected_output: &'static str,
    test_harness: Option<&'static str>,
    keywords: &'static [&'static str],
}

fn python_challenge(level: DifficultyLevel, seed: PythonSeed) -> Challenge {
    Challenge {
        id: slug(level, seed.title),
        level,
        kind: ChallengeKind::Python,
        title: seed.title.to_string(),
        prompt: seed.prompt.to_string(),
        reference_code: seed.buggy_code.to_string(),
        expected_behavior: seed.expected_behavior.to_string(),
        expected_output: Some(seed.expected_output.to_string()),
        test_harness: seed.test_harness.map(str::to_string),
        solution_keywords: seed.keywords.iter().map(|k| k.to_string()).collect(),
        required_constructs: None,
    }
}

fn pseudocode_challenge(
    level: DifficultyLevel,
    title: &str,
    prompt: &str,
    required_constructs: Option<Vec<RequirementTag>>,
) -> Challenge {
    Challenge {
        id: slug(level, title),
        level,
        kind: ChallengeKind::Pseudocode,
        title: title.to_string(),
        prompt: prompt.to_string(),
        reference_code: String::new(),
        expected_behavior: "Write pseudocode that follows the prompt. \
Logic matters more than exact syntax."
            .to_string(),
        expected_output: None,
        test_harness: None,
        solution_keywords: Vec::new(),
        required_constructs,
    }
}

fn slug(level: DifficultyLevel, title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let compact = cleaned
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    format!("{level}-{compact}")
}

fn seed_challenges() -> Vec<Challenge> {
    let mut challenges = Vec::new();

    for seed in beginner_python() {
        challenges.push(python_challenge(DifficultyLevel::Beginner, seed));
    }
    for seed in intermediate_python() {
        challenges.push(python_challenge(DifficultyLevel::Intermediate, seed));
    }
    for seed in hard_python() {
        challenges.push(python_challenge(DifficultyLevel::Hard, seed));
    }

    challenges.push(pseudocode_challenge(
        DifficultyLevel::Beginner,
        "Count To Five",
        "Display all numbers from 1 to 5.",
        None,
    ));
    challenges.push(pseudocode_challenge(
        DifficultyLevel::Beginner,
        "Adult Or Minor",
        "Input age and display \"Adult\" if age >= 18, else \"Minor\".",
        None,
    ));
    challenges.push(pseudocode_challenge(
        DifficultyLevel::Beginner,
        "Even Or Odd",
        "Input n and display \"EVEN\" if n is even, otherwise \"ODD\".",
        None,
    ));
    challenges.push(pseudocode_challenge(
        DifficultyLevel::Intermediate,
        "Sum To Ten",
        "Display the sum of numbers from 1 to 10.",
        None,
    ));
    challenges.push(pseudocode_challenge(
        DifficultyLevel::Intermediate,
        "Filter Large Values",
        "Given list L, build list M containing only values greater than 10.",
        Some(vec![
            RequirementTag::Loop,
            RequirementTag::Conditional,
            RequirementTag::List,
        ]),
    ));
    challenges.push(pseudocode_challenge(
        DifficultyLevel::Hard,
        "Count Matches",
        "Write CountMatches(L, target) that returns how many elements equal target.",
        None,
    ));

    challenges
}

fn beginner_python() -> Vec<PythonSeed> {
    vec![
        PythonSeed {
            title: "Missing Colon",
            prompt: "Fix the bug so the program prints 'Adult' if age >= 18, otherwise 'Minor'.",
            buggy_code: "age = 16\nif age >= 18\n    print(\"Adult\")\nelse:\n    print(\"Minor\")",
            expected_behavior: "Submit corrected Python code only. Output should be 'Minor' for age 16.",
            expected_output: "Minor",
            test_harness: None,
            keywords: &["if", "else", "print"],
        },
        PythonSeed {
            title: "Equality Check",
            prompt: "Fix the bug so the program prints 'Win' when score equals 10.",
            buggy_code: "score = 10\nif score = 10:\n    print(\"Win\")",
            expected_behavior: "Submit corrected Python code only. Output should be 'Win' when score is 10.",
            expected_output: "Win",
            test_harness: None,
            keywords: &["if", "print"],
        },
        PythonSeed {
            title: "String Join",
            prompt: "Fix the bug so the program prints 'Hi, Ana'.",
            buggy_code: "name = \"Ana\"\nprint(\"Hi, \" + Name)",
            expected_behavior: "Submit corrected Python code only. Output should be 'Hi, Ana'.",
            expected_output: "Hi, Ana",
            test_harness: None,
            keywords: &["print"],
        },
        PythonSeed {
            title: "Indentation",
            prompt: "Fix the bug so the program prints numbers 1 to 3.",
            buggy_code: "for i in range(1, 4):\nprint(i)",
            expected_behavior: "Submit corrected Python code only. Output should be 1, 2, 3 on separate lines.",
            expected_output: "1\n2\n3",
            test_harness: None,
            keywords: &["for", "range", "print"],
        },
        PythonSeed {
            title: "Variable Name",
            prompt: "Fix the bug so the program displays the total.",
            buggy_code: "total = 7 + 5\nprint(totl)",
            expected_behavior: "Submit corrected Python code only. Output should be 12.",
            expected_output: "12",
            test_harness: None,
            keywords: &["print"],
        },
        PythonSeed {
            title: "List Index",
            prompt: "Fix the bug so the program prints the first item in the list.",
            buggy_code: "items = [\"apple\", \"banana\"]\nprint(items[1])",
            expected_behavior: "Submit corrected Python code only. Output should be 'apple'.",
            expected_output: "apple",
            test_harness: None,
            keywords: &["print"],
        },
    ]
}

fn intermediate_python() -> Vec<PythonSeed> {
    vec![
        PythonSeed {
            title: "Count Evens",
            prompt: "Fix the bug so the program counts even numbers and prints the count.",
            buggy_code: "nums = [2, 3, 4, 5]\ncount = 0\nfor n in nums:\n    if n % 2 = 0:\n        count += 1\nprint(count)",
            expected_behavior: "Submit corrected Python code only. Output should be 2.",
            expected_output: "2",
            test_harness: None,
            keywords: &["for", "if", "print"],
        },
        PythonSeed {
            title: "Sum List",
            prompt: "Fix the bug so the program sums all numbers in the list.",
            buggy_code: "nums = [1, 2, 3]\nTotal = 0\nfor i in range(len(nums)):\n    total += nums[i]\nprint(total)",
            expected_behavior: "Submit corrected Python code only. Output should be 6.",
            expected_output: "6",
            test_harness: None,
            keywords: &["for", "print"],
        },
        PythonSeed {
            title: "Find Max",
            prompt: "Fix the bug so the program prints the largest number in the list.",
            buggy_code: "nums = [3, 9, 4]\nmax_num = 0\nfor n in nums:\n    if n < max_num:\n        max_num = n\nprint(max_num)",
            expected_behavior: "Submit corrected Python code only. Output should be 9.",
            expected_output: "9",
            test_harness: None,
            keywords: &["for", "if", "print"],
        },
        PythonSeed {
            title: "Average",
            prompt: "Fix the bug so the program prints the average of the list.",
            buggy_code: "nums = [4, 6, 8]\ntotal = 0\nfor n in nums:\n    total += n\naverage = total / 2\nprint(average)",
            expected_behavior: "Submit corrected Python code only. Output should be 6.",
            expected_output: "6|6.0",
            test_harness: None,
            keywords: &["for", "print"],
        },
        PythonSeed {
            title: "Filter Positives",
            prompt: "Fix the bug so the program builds a list of only positive numbers.",
            buggy_code: "nums = [-1, 2, -3, 4]\npositives = []\nfor n in nums:\n    if n > 0:\n        positives.append = n\nprint(positives)",
            expected_behavior: "Submit corrected Python code only. Output should be [2, 4].",
            expected_output: "[2, 4]",
            test_harness: None,
            keywords: &["for", "if", "append", "print"],
        },
        PythonSeed {
            title: "Loop Bounds",
            prompt: "Fix the bug so the program prints numbers 0 to 4.",
            buggy_code: "for i in range(1, 5):\n    print(i)",
            expected_behavior: "Submit corrected Python code only. Output should be 0,1,2,3,4.",
            expected_output: "0\n1\n2\n3\n4",
            test_harness: None,
            keywords: &["for", "print", "re:range\\((0,\\s*)?5\\)"],
        },
    ]
}

fn hard_python() -> Vec<PythonSeed> {
    vec![
        PythonSeed {
            title: "Inventory Tally",
            prompt: "Fix the bug so the program sums quantities by item name and prints totals.",
            buggy_code: "items = [(\"pen\", 2), (\"pen\", 3), (\"book\", 1)]\ncounts = {}\nfor name, qty in items:\n    counts[name] = qty\nprint(counts)",
            expected_behavior: "Submit corrected Python code only. Output should be {'pen': 5, 'book': 1}.",
            expected_output: "{'pen': 5, 'book': 1}|{'book': 1, 'pen': 5}",
            test_harness: None,
            keywords: &["for", "print", "counts"],
        },
        PythonSeed {
            title: "Safe Divide",
            prompt: "Fix the bug so safe_divide returns 0 when divisor is 0, else returns the division.",
            buggy_code: "def safe_divide(a, b):\n    if b == 0:\n        return a / b\n    return 0",
            expected_behavior: "Submit corrected Python code only. safe_divide(10, 0) returns 0; safe_divide(10, 2) returns 5.",
            expected_output: "0\n5|0\n5.0",
            test_harness: Some("print(safe_divide(10, 0))\nprint(safe_divide(10, 2))"),
            keywords: &["if", "return"],
        },
        PythonSeed {
            title: "Order Status",
            prompt: "Fix the bug so orders with total >= 50 are labeled 'free shipping'.",
            buggy_code: "orders = [25, 50, 75]\nlabels = []\nfor total in orders:\n    if total > 50:\n        labels.append(\"free shipping\")\n    else:\n        labels.append(\"standard\")\nprint(labels)",
            expected_behavior: "Submit corrected Python code only. Output should be ['standard', 'free shipping', 'free shipping'].",
            expected_output: "['standard', 'free shipping', 'free shipping']",
            test_harness: None,
            keywords: &["for", "if", "else", "append", "print"],
        },
        PythonSeed {
            title: "Stop On Error",
            prompt: "Fix the bug so the loop stops when it hits 'ERROR'.",
            buggy_code: "events = [\"OK\", \"ERROR\", \"OK\"]\nfor e in events:\n    if e == \"ERROR\":\n        continue\n    print(e)",
            expected_behavior: "Submit corrected Python code only. Output should be only 'OK' once and stop at ERROR.",
            expected_output: "OK",
            test_harness: None,
            keywords: &["for", "if", "break"],
        },
        PythonSeed {
            title: "Running Total",
            prompt: "Fix the bug so the program outputs the running total list.",
            buggy_code: "nums = [1, 2, 3]\nresult = []\nfor n in nums:\n    total = 0\n    total += n\n    result.append(total)\nprint(result)",
            expected_behavior: "Submit corrected Python code only. Output should be [1, 3, 6].",
            expected_output: "[1, 3, 6]",
            test_harness: None,
            keywords: &["for", "append", "print"],
        },
        PythonSeed {
            title: "Email Checker",
            prompt: "Fix the bug so the program prints 'valid' only when the string contains '@' and '.'.",
            buggy_code: "email = \"student@example.com\"\nif \"@\" in email or \".\" in email:\n    print(\"valid\")\nelse:\n    print(\"invalid\")",
            expected_behavior: "Submit corrected Python code only. Output should be 'valid' only when both symbols are present.",
            expected_output: "valid",
            test_harness: None,
            keywords: &["if", "else", "print"],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::ChallengeBank;
    use crate::engine::models::{ChallengeKind, DifficultyLevel};

    #[test]
    fn every_level_has_both_challenge_kinds() {
        let bank = ChallengeBank::seeded();
        for level in DifficultyLevel::ALL {
            let python = bank
                .by_id
                .iter()
                .filter(|e| e.level == level && e.kind == ChallengeKind::Python)
                .count();
            let pseudocode = bank
                .by_id
                .iter()
                .filter(|e| e.level == level && e.kind == ChallengeKind::Pseudocode)
                .count();
            assert!(python > 0 && pseudocode > 0, "level {level} is missing a kind");
        }
    }

    #[test]
    fn random_pick_respects_the_requested_level() {
        let bank = ChallengeBank::seeded();
        for _ in 0..10 {
            let challenge = bank.random_for_level(DifficultyLevel::Hard).unwrap();
            assert_eq!(challenge.level, DifficultyLevel::Hard);
        }
    }

    #[test]
    fn seed_ids_are_unique_and_resolvable() {
        let bank = ChallengeBank::seeded();
        let total = bank.by_id.len();
        assert_eq!(total, 24);
        for entry in bank.by_id.iter() {
            assert_eq!(bank.get(entry.key()).unwrap().id, *entry.key());
        }
    }

    #[test]
    fn pseudocode_challenges_are_not_output_checked() {
        let bank = ChallengeBank::seeded();
        let challenge = bank.get("beginner-count-to-five").unwrap();
        assert_eq!(challenge.kind, ChallengeKind::Pseudocode);
        assert!(challenge.expected_output.is_none());
        assert!(challenge.solution_keywords.is_empty());
    }

    #[test]
    fn debug_challenges_hide_answers_in_the_public_view() {
        let bank = ChallengeBank::seeded();
        let challenge = bank.get("beginner-missing-colon").unwrap();
        let view = serde_json::to_value(crate::engine::models::ChallengeView::from(&challenge))
            .unwrap();
        assert!(view.get("expected_output").is_none());
        assert!(view.get("solution_keywords").is_none());
        assert!(view.get("test_harness").is_none());
    }
}
