//! Per-domain summary counts.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::contract::{DecisionContract, DecisionStatus, Severity};
use crate::lifecycle::effective_status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DecisionSummary {
    pub total: usize,
    pub open: usize,
    pub in_progress: usize,
    pub decided: usize,
    /// Critical decisions still awaiting an outcome.
    pub critical: usize,
    /// Open decisions whose deadline has passed.
    pub overdue: usize,
}

impl AddAssign for DecisionSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.total += rhs.total;
        self.open += rhs.open;
        self.in_progress += rhs.in_progress;
        self.decided += rhs.decided;
        self.critical += rhs.critical;
        self.overdue += rhs.overdue;
    }
}

/// Count decisions as they look at `now` (expired snoozes count as open).
pub fn summarize<'a, I>(decisions: I, now: OffsetDateTime) -> DecisionSummary
where
    I: IntoIterator<Item = &'a DecisionContract>,
{
    let mut s = DecisionSummary::default();
    for d in decisions {
        let status = effective_status(d, now);
        s.total += 1;
        match status {
            DecisionStatus::Open => {
                s.open += 1;
                if now > d.deadline_at {
                    s.overdue += 1;
                }
            }
            DecisionStatus::InProgress => s.in_progress += 1,
            DecisionStatus::Decided => s.decided += 1,
            _ => {}
        }
        if d.severity == Severity::Critical && !status.is_terminal() {
            s.critical += 1;
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{decision, NOW};
    use time::Duration;

    #[test]
    fn counts_by_status() {
        let mut open_overdue = decision("a", "SKU-1");
        open_overdue.deadline_at = NOW - Duration::hours(1);
        open_overdue.severity = Severity::Critical;

        let mut open_future = decision("b", "SKU-2");
        open_future.deadline_at = NOW + Duration::hours(1);

        let mut working = decision("c", "SKU-3");
        working.status = DecisionStatus::InProgress;
        working.deadline_at = NOW - Duration::hours(5);

        let mut done = decision("d", "SKU-4");
        done.status = DecisionStatus::Decided;
        done.severity = Severity::Critical;

        let mut woke = decision("e", "SKU-5");
        woke.status = DecisionStatus::Snoozed;
        woke.snoozed_until = Some(NOW - Duration::minutes(1));
        woke.deadline_at = NOW - Duration::hours(1);

        let s = summarize(&[open_overdue, open_future, working, done, woke], NOW);
        assert_eq!(
            s,
            DecisionSummary {
                total: 5,
                open: 3,
                in_progress: 1,
                decided: 1,
                critical: 1,
                overdue: 2,
            }
        );
    }

    #[test]
    fn summaries_add() {
        let mut a = DecisionSummary {
            total: 1,
            open: 1,
            ..Default::default()
        };
        a += DecisionSummary {
            total: 2,
            decided: 2,
            ..Default::default()
        };
        assert_eq!(a.total, 3);
        assert_eq!(a.open, 1);
        assert_eq!(a.decided, 2);
    }
}
