use std::path::PathBuf;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::engine::models::{
    AttemptRecord, BadgeEarnedRecord, DifficultyLevel, HintUsageRecord, PlayerId,
};

pub const HINT_CAP: u32 = 3;

pub const HINT_LIMIT_MESSAGE: &str = "Hint limit reached. You can still try on your own, \
but using all 3 hints means no badge for this level.";

const COACH_HINTS: [&str; HINT_CAP as usize] = [
    "Focus on one small change at a time. Check the condition, operator, or indentation first.",
    "Look for the single line that controls the decision or loop; if the behavior is wrong, \
the bug is likely in the condition or the update line.",
    "Read the code top to bottom and track how the values change each line. \
The fix should make the behavior match the description.",
];

#[derive(Hash, PartialEq, Eq, Clone)]
struct HintKey {
    player_id: PlayerId,
    level: DifficultyLevel,
    challenge_id: String,
}

#[derive(Debug)]
pub enum BadgeDecision {
    Awarded {
        record: BadgeEarnedRecord,
        first_time: bool,
    },
    Vetoed,
}

/// Per-player bookkeeping: hint consumption (hard cap of 3 per
/// player/level/challenge), attempt counters, and earned badges. The ledger
/// is the only writer of these records; badge awards can additionally be
/// appended to a JSONL audit file.
pub struct Ledger {
    hints: DashMap<HintKey, HintUsageRecord>,
    attempts: DashMap<(PlayerId, DifficultyLevel), AttemptRecord>,
    badges: DashMap<(PlayerId, u32), BadgeEarnedRecord>,
    audit_path: Option<PathBuf>,
    audit_lock: Mutex<()>,
}

impl Ledger {
    pub fn new(audit_path: Option<PathBuf>) -> Self {
        Self {
            hints: DashMap::new(),
            attempts: DashMap::new(),
            badges: DashMap::new(),
            audit_path,
            audit_lock: Mutex::new(()),
        }
    }

    /// Hand out the next coaching hint for this (player, level, challenge),
    /// or the fixed limit message once all 3 are spent. Calls beyond the cap
    /// never increment the counter and never report negative remaining.
    pub fn consume_hint(
        &self,
        player_id: PlayerId,
        level: DifficultyLevel,
        challenge_id: &str,
    ) -> (String, u32) {
        let key = HintKey {
            player_id,
            level,
            challenge_id: challenge_id.to_string(),
        };
        let mut record = self.hints.entry(key).or_insert_with(|| HintUsageRecord {
            player_id,
            level,
            challenge_id: challenge_id.to_string(),
            hints_used: 0,
            updated_at: Utc::now(),
        });

        if record.hints_used >= HINT_CAP {
            return (HINT_LIMIT_MESSAGE.to_string(), 0);
        }

        record.hints_used += 1;
        record.updated_at = Utc::now();
        let text = COACH_HINTS[(record.hints_used - 1) as usize];
        (text.to_string(), HINT_CAP - record.hints_used)
    }

    /// Hint count of the most recently touched usage record for the level.
    /// This is the badge-veto input.
    pub fn hints_used_for_level(&self, player_id: PlayerId, level: DifficultyLevel) -> u32 {
        self.hints
            .iter()
            .filter(|entry| entry.player_id == player_id && entry.level == level)
            .max_by_key(|entry| entry.updated_at)
            .map(|entry| entry.hints_used)
            .unwrap_or(0)
    }

    pub fn record_attempt(&self, player_id: PlayerId, level: DifficultyLevel, passed: bool) {
        let mut record = self.attempts.entry((player_id, level)).or_default();
        record.attempts += 1;
        if passed {
            record.passes += 1;
        }
        tracing::info!(player_id, %level, passed, attempts = record.attempts, "attempt recorded");
    }

    /// Upsert the badge row for a completed level, unless the player burned
    /// all hints for that level. A repeat completion overwrites attempts and
    /// timestamp rather than inserting a second row.
    pub async fn award_badge(
        &self,
        player_id: PlayerId,
        level: DifficultyLevel,
        attempts: u32,
    ) -> BadgeDecision {
        if self.hints_used_for_level(player_id, level) >= HINT_CAP {
            tracing::info!(player_id, %level, "badge vetoed, hint cap reached");
            return BadgeDecision::Vetoed;
        }

        let record = BadgeEarnedRecord {
            player_id,
            badge_id: level.badge_id(),
            badge_name: level.badge_name().to_string(),
            level,
            attempts,
            timestamp: Utc::now(),
        };
        let first_time = self
            .badges
            .insert((player_id, level.badge_id()), record.clone())
            .is_none();
        self.append_audit(&record).await;
        BadgeDecision::Awarded { record, first_time }
    }

    pub fn progress(&self, player_id: PlayerId) -> Vec<BadgeEarnedRecord> {
        let mut earned: Vec<BadgeEarnedRecord> = self
            .badges
            .iter()
            .filter(|entry| entry.player_id == player_id)
            .map(|entry| entry.value().clone())
            .collect();
        earned.sort_by_key(|record| record.timestamp);
        earned
    }

    async fn append_audit(&self, record: &BadgeEarnedRecord) {
        let Some(path) = &self.audit_path else {
            return;
        };
        let _guard = self.audit_lock.lock().await;
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(_) => return,
        };
        let mut options = tokio::fs::OpenOptions::new();
        options.create(true).append(true);
        if let Ok(mut file) = options.open(path).await {
            let _ = tokio::io::AsyncWriteExt::write_all(&mut file, line.as_bytes()).await;
            let _ = tokio::io::AsyncWriteExt::write_all(&mut file, b"\n").await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BadgeDecision, HINT_LIMIT_MESSAGE, Ledger};
    use crate::engine::models::DifficultyLevel;

    const LEVEL: DifficultyLevel = DifficultyLevel::Beginner;

    #[test]
    fn three_real_hints_then_the_fixed_limit_message() {
        let ledger = Ledger::new(None);
        let (first, r1) = ledger.consume_hint(7, LEVEL, "ch-a");
        let (second, r2) = ledger.consume_hint(7, LEVEL, "ch-a");
        let (third, r3) = ledger.consume_hint(7, LEVEL, "ch-a");
        assert_eq!((r1, r2, r3), (2, 1, 0));
        assert_ne!(first, second);
        assert_ne!(second, third);

        let (fourth, r4) = ledger.consume_hint(7, LEVEL, "ch-a");
        let (fifth, r5) = ledger.consume_hint(7, LEVEL, "ch-a");
        assert_eq!(fourth, HINT_LIMIT_MESSAGE);
        assert_eq!(fifth, HINT_LIMIT_MESSAGE);
        assert_eq!((r4, r5), (0, 0));
        assert_eq!(ledger.hints_used_for_level(7, LEVEL), 3);
    }

    #[test]
    fn hint_counters_are_scoped_per_challenge() {
        let ledger = Ledger::new(None);
        ledger.consume_hint(7, LEVEL, "ch-a");
        let (_, remaining) = ledger.consume_hint(7, LEVEL, "ch-b");
        assert_eq!(remaining, 2);
    }

    #[test]
    fn level_veto_reads_the_most_recent_record() {
        let ledger = Ledger::new(None);
        ledger.consume_hint(7, LEVEL, "ch-a");
        for _ in 0..3 {
            ledger.consume_hint(7, LEVEL, "ch-b");
        }
        assert_eq!(ledger.hints_used_for_level(7, LEVEL), 3);
    }

    #[tokio::test]
    async fn badge_is_vetoed_after_a_spent_hint_cap() {
        let ledger = Ledger::new(None);
        for _ in 0..3 {
            ledger.consume_hint(7, LEVEL, "ch-a");
        }
        assert!(matches!(
            ledger.award_badge(7, LEVEL, 2).await,
            BadgeDecision::Vetoed
        ));
        assert!(ledger.progress(7).is_empty());
    }

    #[tokio::test]
    async fn repeat_awards_upsert_a_single_row() {
        let ledger = Ledger::new(None);
        let first = ledger.award_badge(7, LEVEL, 4).await;
        assert!(matches!(
            first,
            BadgeDecision::Awarded { first_time: true, .. }
        ));
        let second = ledger.award_badge(7, LEVEL, 1).await;
        assert!(matches!(
            second,
            BadgeDecision::Awarded { first_time: false, .. }
        ));
        let earned = ledger.progress(7);
        assert_eq!(earned.len(), 1);
        assert_eq!(earned[0].attempts, 1);
    }

    #[tokio::test]
    async fn hints_on_one_level_do_not_veto_another() {
        let ledger = Ledger::new(None);
        for _ in 0..3 {
            ledger.consume_hint(7, DifficultyLevel::Hard, "ch-z");
        }
        assert!(matches!(
            ledger.award_badge(7, LEVEL, 1).await,
            BadgeDecision::Awarded { .. }
        ));
    }

    #[test]
    fn failed_attempts_only_bump_counters() {
        let ledger = Ledger::new(None);
        ledger.record_attempt(7, LEVEL, false);
        ledger.record_attempt(7, LEVEL, true);
        let record = ledger.attempts.get(&(7, LEVEL)).unwrap();
        assert_eq!(record.attempts, 2);
        assert_eq!(record.passes, 1);
    }
}
