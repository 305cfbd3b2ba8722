use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    graded_total: AtomicU64,
    passed_total: AtomicU64,
    failed_total: AtomicU64,
    syntax_rejected_total: AtomicU64,
    timed_out_total: AtomicU64,
    ai_verdicts_total: AtomicU64,
    ai_fallback_total: AtomicU64,
    hints_served_total: AtomicU64,
    badges_awarded_total: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graded(&self, passed: bool) {
        self.graded_total.fetch_add(1, Ordering::Relaxed);
        if passed {
            self.passed_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn syntax_rejected(&self) {
        self.syntax_rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn timed_out(&self) {
        self.timed_out_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ai_verdict(&self) {
        self.ai_verdicts_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ai_fallback(&self) {
        self.ai_fallback_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hint_served(&self) {
        self.hints_served_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn badge_awarded(&self) {
        self.badges_awarded_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn render_prometheus(&self) -> String {
        format!(
            concat!(
                "# TYPE grading_graded_total counter\n",
                "grading_graded_total {}\n",
                "# TYPE grading_passed_total counter\n",
                "grading_passed_total {}\n",
                "# TYPE grading_failed_total counter\n",
                "grading_failed_total {}\n",
                "# TYPE grading_syntax_rejected_total counter\n",
                "grading_syntax_rejected_total {}\n",
                "# TYPE grading_timed_out_total counter\n",
                "grading_timed_out_total {}\n",
                "# TYPE grading_ai_verdicts_total counter\n",
                "grading_ai_verdicts_total {}\n",
                "# TYPE grading_ai_fallback_total counter\n",
                "grading_ai_fallback_total {}\n",
                "# TYPE grading_hints_served_total counter\n",
                "grading_hints_served_total {}\n",
                "# TYPE grading_badges_awarded_total counter\n",
                "grading_badges_awarded_total {}\n"
            ),
            self.graded_total.load(Ordering::Relaxed),
            self.passed_total.load(Ordering::Relaxed),
            self.failed_total.load(Ordering::Relaxed),
            self.syntax_rejected_total.load(Ordering::Relaxed),
            self.timed_out_total.load(Ordering::Relaxed),
            self.ai_verdicts_total.load(Ordering::Relaxed),
            self.ai_fallback_total.load(Ordering::Relaxed),
            self.hints_served_total.load(Ordering::Relaxed),
            self.badges_awarded_total.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::MetricsRegistry;

    #[test]
    fn pass_and_fail_split_the_graded_counter() {
        let metrics = MetricsRegistry::new();
        metrics.graded(true);
        metrics.graded(false);
        metrics.graded(false);
        let rendered = metrics.render_prometheus();
        assert!(rendered.contains("grading_graded_total 3"));
        assert!(rendered.contains("grading_passed_total 1"));
        assert!(rendered.contains("grading_failed_total 2"));
    }
}
