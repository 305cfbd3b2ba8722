use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::requirements::RequirementTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyLevel {
    Beginner,
    Intermediate,
    Hard,
}

impl DifficultyLevel {
    pub const ALL: [DifficultyLevel; 3] = [
        DifficultyLevel::Beginner,
        DifficultyLevel::Intermediate,
        DifficultyLevel::Hard,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DifficultyLevel::Beginner => "Beginner",
            DifficultyLevel::Intermediate => "Intermediate",
            DifficultyLevel::Hard => "Hard",
        }
    }

    pub fn focus(self) -> &'static str {
        match self {
            DifficultyLevel::Beginner => "Basic syntax and simple logic",
            DifficultyLevel::Intermediate => "Loops, lists, and conditionals",
            DifficultyLevel::Hard => "Multiple concepts and real-world style problems",
        }
    }

    pub fn badge_name(self) -> &'static str {
        match self {
            DifficultyLevel::Beginner => "Debug Beginner",
            DifficultyLevel::Intermediate => "Debug Intermediate",
            DifficultyLevel::Hard => "Debug Hard",
        }
    }

    pub fn badge_id(self) -> u32 {
        match self {
            DifficultyLevel::Beginner => 1,
            DifficultyLevel::Intermediate => 2,
            DifficultyLevel::Hard => 3,
        }
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DifficultyLevel::Beginner => "beginner",
            DifficultyLevel::Intermediate => "intermediate",
            DifficultyLevel::Hard => "hard",
        };
        f.write_str(name)
    }
}

impl FromStr for DifficultyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "beginner" => Ok(DifficultyLevel::Beginner),
            "2" | "intermediate" => Ok(DifficultyLevel::Intermediate),
            "3" | "hard" => Ok(DifficultyLevel::Hard),
            other => Err(format!("unsupported level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    Python,
    Pseudocode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub level: DifficultyLevel,
    pub kind: ChallengeKind,
    pub title: String,
    pub prompt: String,
    pub reference_code: String,
    pub expected_behavior: String,
    pub expected_output: Option<String>,
    pub test_harness: Option<String>,
    #[serde(default)]
    pub solution_keywords: Vec<String>,
    pub required_constructs: Option<Vec<RequirementTag>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChallengeView {
    pub id: String,
    pub level: DifficultyLevel,
    pub kind: ChallengeKind,
    pub title: String,
    pub prompt: String,
    pub reference_code: String,
    pub expected_behavior: String,
}

impl From<&Challenge> for ChallengeView {
    fn from(challenge: &Challenge) -> Self {
        Self {
            id: challenge.id.clone(),
            level: challenge.level,
            kind: challenge.kind,
            title: challenge.title.clone(),
            prompt: challenge.prompt.clone(),
            reference_code: challenge.reference_code.clone(),
            expected_behavior: challenge.expected_behavior.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub missing: Vec<String>,
    pub hints: Vec<String>,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}

impl Verdict {
    pub fn pass(notes: impl Into<String>) -> Self {
        Self {
            passed: true,
            missing: Vec::new(),
            hints: Vec::new(),
            notes: notes.into(),
            raw_output: None,
        }
    }

    pub fn fail(missing: Vec<String>, hints: Vec<String>, notes: impl Into<String>) -> Self {
        Self {
            passed: false,
            missing,
            hints,
            notes: notes.into(),
            raw_output: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.raw_output = Some(output.into());
        self
    }
}

pub type PlayerId = u64;

#[derive(Debug, Clone, Serialize)]
pub struct HintUsageRecord {
    pub player_id: PlayerId,
    pub level: DifficultyLevel,
    pub challenge_id: String,
    pub hints_used: u32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AttemptRecord {
    pub attempts: u32,
    pub passes: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct BadgeEarnedRecord {
    pub player_id: PlayerId,
    pub badge_id: u32,
    pub badge_name: String,
    pub level: DifficultyLevel,
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    pub challenge_id: String,
    pub source_text: String,
    #[serde(default)]
    pub player_id: Option<PlayerId>,
}

#[derive(Debug, Serialize)]
pub struct GradeResponse {
    pub success: bool,
    pub challenge_id: String,
    pub level: DifficultyLevel,
    pub passed: bool,
    pub missing: Vec<String>,
    pub hints: Vec<String>,
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct HintRequest {
    pub player_id: PlayerId,
    pub level: String,
    pub challenge_id: String,
}

#[derive(Debug, Serialize)]
pub struct HintResponse {
    pub success: bool,
    pub hint: String,
    pub remaining_hints: u32,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub player_id: PlayerId,
    pub level: String,
    pub attempts: u32,
    pub passed: bool,
}

#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<BadgeEarnedRecord>,
}

#[derive(Debug, Serialize)]
pub struct LevelInfo {
    pub level: DifficultyLevel,
    pub label: &'static str,
    pub focus: &'static str,
    pub badge: &'static str,
}
