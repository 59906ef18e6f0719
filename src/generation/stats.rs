//! Generation statistics
//!
//! Purely observational: nothing in here is read back by the accept/reject
//! path.

use serde::{Deserialize, Serialize};

use crate::core::config::GenerationConfig;
use crate::core::types::FamilyId;
use crate::generation::rejection::{Acceptance, RejectionReason};

/// One counter per rejection reason
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionCounts {
    pub degenerate: u64,
    pub outside: u64,
    pub enclosed: u64,
    pub short_intersection: u64,
    pub close_to_node: u64,
    pub close_to_edge: u64,
    pub close_to_intersection: u64,
    pub triple_intersection: u64,
}

impl RejectionCounts {
    fn slot(&mut self, reason: RejectionReason) -> &mut u64 {
        match reason {
            RejectionReason::Degenerate => &mut self.degenerate,
            RejectionReason::Outside => &mut self.outside,
            RejectionReason::Enclosed => &mut self.enclosed,
            RejectionReason::ShortIntersection => &mut self.short_intersection,
            RejectionReason::CloseToNode => &mut self.close_to_node,
            RejectionReason::CloseToEdge => &mut self.close_to_edge,
            RejectionReason::CloseToIntersection => &mut self.close_to_intersection,
            RejectionReason::TripleIntersection => &mut self.triple_intersection,
        }
    }

    pub fn record(&mut self, reason: RejectionReason) {
        *self.slot(reason) += 1;
    }

    pub fn get(&self, reason: RejectionReason) -> u64 {
        match reason {
            RejectionReason::Degenerate => self.degenerate,
            RejectionReason::Outside => self.outside,
            RejectionReason::Enclosed => self.enclosed,
            RejectionReason::ShortIntersection => self.short_intersection,
            RejectionReason::CloseToNode => self.close_to_node,
            RejectionReason::CloseToEdge => self.close_to_edge,
            RejectionReason::CloseToIntersection => self.close_to_intersection,
            RejectionReason::TripleIntersection => self.triple_intersection,
        }
    }

    pub fn total(&self) -> u64 {
        RejectionReason::ALL.iter().map(|r| self.get(*r)).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FamilyStats {
    pub name: String,
    pub accepted: u64,
    /// Rejected candidates (each re-translation counts)
    pub rejected: u64,
    /// Family members given up after exhausting their re-translations
    pub discarded: u64,
    /// Count-mode quota
    pub expected: Option<usize>,
    pub stagnated: bool,
    pub p32: f64,
    pub p32_target: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub families: Vec<FamilyStats>,
    pub rejections: RejectionCounts,
    pub accepted_total: u64,
    pub rejected_total: u64,
    /// Candidates evaluated, re-translations included
    pub attempts: u64,
    pub retranslated: u64,
    pub truncated: u64,
    pub intersections_shortened: u64,
    /// Summed intersection length before shrink repair, accepted shapes only
    pub original_length: f64,
    /// Length removed by shrink repair
    pub discarded_length: f64,
    pub global_retries: u32,
    /// User shapes accepted, also counted in `accepted_total`
    pub user_accepted: u64,
    /// User shapes rejected, also counted in `rejected_total`
    pub user_rejected: u64,
}

impl Stats {
    /// Average rejections per accepted shape
    pub fn rejects_per_accept(&self) -> f64 {
        if self.accepted_total == 0 {
            return 0.0;
        }
        self.rejected_total as f64 / self.accepted_total as f64
    }
}

pub struct StatsTracker {
    stats: Stats,
}

impl StatsTracker {
    pub fn new(config: &GenerationConfig) -> Self {
        let quotas = config.family_quotas();
        let families = config
            .families
            .iter()
            .enumerate()
            .map(|(i, f)| FamilyStats {
                name: f.name.clone(),
                expected: quotas.as_ref().map(|q| q[i]),
                p32_target: f.p32_target,
                ..FamilyStats::default()
            })
            .collect();
        Self {
            stats: Stats {
                families,
                ..Stats::default()
            },
        }
    }

    fn family(&mut self, family: FamilyId) -> Option<&mut FamilyStats> {
        self.stats.families.get_mut(family.index())
    }

    pub fn record_attempt(&mut self, retranslated: bool) {
        self.stats.attempts += 1;
        if retranslated {
            self.stats.retranslated += 1;
        }
    }

    pub fn record_accept(&mut self, family: FamilyId, acceptance: &Acceptance, truncated: bool) {
        self.stats.accepted_total += 1;
        if truncated {
            self.stats.truncated += 1;
        }
        self.stats.intersections_shortened += acceptance.shortened_count() as u64;
        let original = acceptance.original_length();
        self.stats.original_length += original;
        self.stats.discarded_length += original - acceptance.retained_length();
        if family.is_user() {
            self.stats.user_accepted += 1;
        } else if let Some(f) = self.family(family) {
            f.accepted += 1;
        }
    }

    pub fn record_reject(&mut self, family: FamilyId, reason: RejectionReason) {
        self.stats.rejected_total += 1;
        self.stats.rejections.record(reason);
        if family.is_user() {
            self.stats.user_rejected += 1;
        } else if let Some(f) = self.family(family) {
            f.rejected += 1;
        }
    }

    pub fn record_discard(&mut self, family: FamilyId) {
        if let Some(f) = self.family(family) {
            f.discarded += 1;
        }
    }

    pub fn mark_stagnated(&mut self, family: FamilyId) {
        if let Some(f) = self.family(family) {
            f.stagnated = true;
        }
    }

    pub fn record_global_retry(&mut self) {
        self.stats.global_retries += 1;
    }

    pub fn set_p32(&mut self, family: FamilyId, p32: f64) {
        if let Some(f) = self.family(family) {
            f.p32 = p32;
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn snapshot(&self) -> Stats {
        self.stats.clone()
    }

    /// Roll back to `snapshot`, keeping the global retry count
    pub fn restore(&mut self, snapshot: Stats) {
        let retries = self.stats.global_retries;
        self.stats = snapshot;
        self.stats.global_retries = retries;
    }

    pub fn finish(self) -> Stats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_counts_sum_to_rejected() {
        let mut tracker = StatsTracker::new(&GenerationConfig::default());
        let reasons = [
            RejectionReason::ShortIntersection,
            RejectionReason::Outside,
            RejectionReason::ShortIntersection,
            RejectionReason::TripleIntersection,
        ];
        for reason in reasons {
            tracker.record_attempt(false);
            tracker.record_reject(FamilyId(0), reason);
        }
        tracker.record_attempt(true);
        tracker.record_accept(FamilyId(0), &Acceptance::default(), false);

        let stats = tracker.finish();
        assert_eq!(stats.rejections.total(), stats.rejected_total);
        assert_eq!(stats.rejections.get(RejectionReason::ShortIntersection), 2);
        assert_eq!(stats.attempts, 5);
        assert_eq!(stats.retranslated, 1);
        assert_eq!(stats.families[0].rejected, 4);
        assert_eq!(stats.families[0].expected, Some(50));
        assert!((stats.rejects_per_accept() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_restore_keeps_retry_count() {
        let mut tracker = StatsTracker::new(&GenerationConfig::default());
        let snapshot = tracker.snapshot();
        tracker.record_reject(FamilyId(0), RejectionReason::Degenerate);
        tracker.record_global_retry();
        tracker.restore(snapshot);
        assert_eq!(tracker.stats().rejected_total, 0);
        assert_eq!(tracker.stats().global_retries, 1);
    }

    #[test]
    fn test_user_shapes_counted_apart() {
        let mut tracker = StatsTracker::new(&GenerationConfig::default());
        tracker.record_accept(FamilyId::USER, &Acceptance::default(), false);
        tracker.record_reject(FamilyId::USER, RejectionReason::Outside);
        let stats = tracker.finish();
        assert_eq!(stats.accepted_total, 1);
        assert_eq!(stats.rejected_total, 1);
        assert_eq!((stats.user_accepted, stats.user_rejected), (1, 1));
        assert_eq!(stats.families[0].accepted, 0);
        assert_eq!(stats.families[0].rejected, 0);
    }
}
