//! Sweep report: what happened to every quote in one run.
//!
//! The report is built incrementally by the sweeper, one `ItemOutcome` per
//! quote, and sorted on `finish` so its content does not depend on the order
//! in which quotes were processed.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::errors::{DeadlineField, EvaluationError, TransitionError, TransitionStep};
use super::ids::{QuoteId, SweepId};

/// The result of processing one quote.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// Expired, cancelled and annotated.
    Transitioned,

    /// Expired, but the transition failed at some step.
    TransitionFailed(TransitionError),

    /// Not a candidate (future/no deadline, or already cancelled).
    NotExpired,

    /// A deadline field could not be parsed; skipped.
    Unevaluable(EvaluationError),

    /// Already cancelled past its deadline without the expiration note; note added.
    Reconciled,

    /// As `Reconciled`, but appending the note failed again.
    ReconcileFailed(TransitionError),
}

/// A quote skipped because its deadline could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnevaluableQuote {
    pub quote_id: QuoteId,
    pub field: DeadlineField,
    pub raw: String,
    pub reason: String,
}

/// An expired quote whose transition did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTransition {
    pub quote_id: QuoteId,
    pub step: TransitionStep,
    pub reason: String,
}

impl From<&TransitionError> for FailedTransition {
    fn from(err: &TransitionError) -> Self {
        Self {
            quote_id: err.quote_id().clone(),
            step: err.step(),
            reason: err.cause().to_string(),
        }
    }
}

/// Summary of one sweep run.
///
/// Invariant: `expired == transitioned + failures.len()`.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub sweep_id: SweepId,
    pub today: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Quotes in the snapshot.
    pub total: usize,
    /// Quotes the policy judged expired (transition attempted).
    pub expired: usize,
    pub transitioned: usize,
    pub not_expired: usize,
    pub reconciled: usize,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unevaluable: Vec<UnevaluableQuote>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailedTransition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reconcile_failures: Vec<FailedTransition>,
}

impl SweepReport {
    pub fn new(sweep_id: SweepId, today: NaiveDate, started_at: DateTime<Utc>) -> Self {
        Self {
            sweep_id,
            today,
            started_at,
            finished_at: None,
            total: 0,
            expired: 0,
            transitioned: 0,
            not_expired: 0,
            reconciled: 0,
            unevaluable: Vec::new(),
            failures: Vec::new(),
            reconcile_failures: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: ItemOutcome) {
        self.total += 1;
        match outcome {
            ItemOutcome::Transitioned => {
                self.expired += 1;
                self.transitioned += 1;
            }
            ItemOutcome::TransitionFailed(err) => {
                self.expired += 1;
                self.failures.push(FailedTransition::from(&err));
            }
            ItemOutcome::NotExpired => self.not_expired += 1,
            ItemOutcome::Unevaluable(err) => self.unevaluable.push(UnevaluableQuote {
                reason: err.source.to_string(),
                quote_id: err.quote_id,
                field: err.field,
                raw: err.raw,
            }),
            ItemOutcome::Reconciled => self.reconciled += 1,
            ItemOutcome::ReconcileFailed(err) => {
                self.reconcile_failures.push(FailedTransition::from(&err));
            }
        }
    }

    /// Seal the report. Entry lists are sorted by quote id.
    pub fn finish(mut self, finished_at: DateTime<Utc>) -> Self {
        self.unevaluable.sort_by(|a, b| a.quote_id.cmp(&b.quote_id));
        self.failures.sort_by(|a, b| a.quote_id.cmp(&b.quote_id));
        self.reconcile_failures
            .sort_by(|a, b| a.quote_id.cmp(&b.quote_id));
        self.finished_at = Some(finished_at);
        self
    }

    /// Quotes cancelled in this run that still lack the expiration note.
    pub fn partial_failures(&self) -> impl Iterator<Item = &FailedTransition> {
        self.failures
            .iter()
            .filter(|f| f.step == TransitionStep::NoteAppend)
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
            || !self.unevaluable.is_empty()
            || !self.reconcile_failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StoreError;
    use ulid::Ulid;

    fn report() -> SweepReport {
        SweepReport::new(
            SweepId::from_ulid(Ulid::new()),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            Utc::now(),
        )
    }

    fn note_failure(id: &str) -> TransitionError {
        TransitionError::NoteAppend {
            quote_id: QuoteId::new(id),
            source: StoreError::Timeout,
        }
    }

    #[test]
    fn expired_counts_successes_and_failures() {
        let mut r = report();
        r.record(ItemOutcome::Transitioned);
        r.record(ItemOutcome::TransitionFailed(note_failure("B")));
        r.record(ItemOutcome::TransitionFailed(TransitionError::StatusUpdate {
            quote_id: QuoteId::new("A"),
            source: StoreError::Timeout,
        }));
        r.record(ItemOutcome::NotExpired);

        assert_eq!(r.total, 4);
        assert_eq!(r.expired, 3);
        assert_eq!(r.transitioned, 1);
        assert_eq!(r.failures.len(), 2);
        assert_eq!(r.expired, r.transitioned + r.failures.len());
        assert_eq!(r.partial_failures().count(), 1);
    }

    #[test]
    fn finish_sorts_entries() {
        let mut r = report();
        r.record(ItemOutcome::TransitionFailed(note_failure("C")));
        r.record(ItemOutcome::TransitionFailed(note_failure("A")));
        r.record(ItemOutcome::TransitionFailed(note_failure("B")));
        let r = r.finish(Utc::now());

        let ids: Vec<_> = r.failures.iter().map(|f| f.quote_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert!(r.finished_at.is_some());
    }

    #[test]
    fn reconciliation_does_not_count_as_expired() {
        let mut r = report();
        r.record(ItemOutcome::Reconciled);
        r.record(ItemOutcome::ReconcileFailed(note_failure("X")));
        assert_eq!(r.expired, 0);
        assert_eq!(r.reconciled, 1);
        assert_eq!(r.reconcile_failures.len(), 1);
        assert!(r.has_failures());
    }

    #[test]
    fn empty_report_serializes_without_entry_lists() {
        let r = report().finish(Utc::now());
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["total"], 0);
        assert!(json.get("failures").is_none());
        assert!(json["sweep_id"].as_str().unwrap().starts_with("sweep-"));
    }
}
