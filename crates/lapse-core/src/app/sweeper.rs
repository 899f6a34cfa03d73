//! Sweeper - 期限切れスイープのオーケストレーション
//!
//! # フロー
//! 1. `QuoteStore::list_quotes()` でスナップショット取得（失敗したら run 全体を中止）
//! 2. 各クオートに ExpirationPolicy を適用
//! 3. 期限切れなら TransitionExecutor に委譲
//! 4. クオートごとの結果を SweepReport に記録（1 件の失敗が他に影響しない）

use std::sync::Arc;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::executor::TransitionExecutor;
use crate::domain::{ExpirationPolicy, ItemOutcome, Quote, SweepError, SweepReport};
use crate::ports::{Clock, IdGenerator, QuoteStore};

/// Tuning knobs of a sweep.
#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// Quotes processed concurrently. 1 means strictly sequential.
    pub concurrency: usize,

    /// Add the expiration note to cancelled, lapsed quotes that lack it.
    pub reconcile_missing_notes: bool,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            reconcile_missing_notes: false,
        }
    }
}

/// Runs one sweep per call. Overlapping calls are refused.
pub struct Sweeper {
    store: Arc<dyn QuoteStore>,
    policy: Arc<dyn ExpirationPolicy>,
    executor: TransitionExecutor,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    options: SweepOptions,
    running: Mutex<()>,
}

impl Sweeper {
    pub fn new(
        store: Arc<dyn QuoteStore>,
        policy: Arc<dyn ExpirationPolicy>,
        executor: TransitionExecutor,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        options: SweepOptions,
    ) -> Self {
        Self {
            store,
            policy,
            executor,
            clock,
            ids,
            options,
            running: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &SweepOptions {
        &self.options
    }

    /// Sweep using the clock's current date.
    pub async fn run(&self) -> Result<SweepReport, SweepError> {
        self.run_for(self.clock.today()).await
    }

    /// Sweep as if today were `today`.
    ///
    /// Only a failed snapshot fetch (or an overlapping run) is an error; every
    /// per-quote failure ends up in the report.
    pub async fn run_for(&self, today: NaiveDate) -> Result<SweepReport, SweepError> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("sweep requested while another sweep is running; skipping");
            return Err(SweepError::AlreadyRunning);
        };

        let sweep_id = self.ids.generate_sweep_id();
        let span = info_span!("sweep", sweep_id = %sweep_id, today = %today);
        self.sweep(SweepReport::new(sweep_id, today, self.clock.now()))
            .instrument(span)
            .await
    }

    async fn sweep(&self, mut report: SweepReport) -> Result<SweepReport, SweepError> {
        let today = report.today;
        info!("sweep started");

        let quotes = self.store.list_quotes().await.map_err(|e| {
            error!(error = %e, "failed to fetch quote snapshot; sweep aborted");
            SweepError::Fetch(e)
        })?;

        if quotes.is_empty() {
            info!("quote snapshot is empty; nothing to do");
            return Ok(report.finish(self.clock.now()));
        }
        debug!(quotes = quotes.len(), "quote snapshot fetched");

        let outcomes: Vec<ItemOutcome> = stream::iter(quotes)
            .map(|quote| self.process(quote, today))
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            report.record(outcome);
        }
        let report = report.finish(self.clock.now());

        if report.has_failures() {
            warn!(
                total = report.total,
                expired = report.expired,
                transitioned = report.transitioned,
                failed = report.failures.len(),
                unevaluable = report.unevaluable.len(),
                reconciled = report.reconciled,
                "sweep finished with failures"
            );
        } else {
            info!(
                total = report.total,
                expired = report.expired,
                transitioned = report.transitioned,
                reconciled = report.reconciled,
                "sweep finished"
            );
        }
        Ok(report)
    }

    async fn process(&self, quote: Quote, today: NaiveDate) -> ItemOutcome {
        match self.policy.is_expired(&quote, today) {
            Err(err) => {
                warn!(
                    quote_id = %quote.id,
                    field = %err.field,
                    raw = %err.raw,
                    error = %err.source,
                    "cannot evaluate quote deadline; skipping"
                );
                ItemOutcome::Unevaluable(err)
            }
            Ok(true) => match self.executor.transition(&quote.id).await {
                Ok(()) => {
                    info!(quote_id = %quote.id, "quote expired and cancelled");
                    ItemOutcome::Transitioned
                }
                Err(err) => {
                    error!(
                        quote_id = %quote.id,
                        step = %err.step(),
                        partial = err.is_partial(),
                        error = %err.cause(),
                        "quote transition failed"
                    );
                    ItemOutcome::TransitionFailed(err)
                }
            },
            Ok(false) if self.needs_reconciliation(&quote, today) => {
                match self.executor.annotate(&quote.id).await {
                    Ok(()) => {
                        info!(quote_id = %quote.id, "missing expiration note added");
                        ItemOutcome::Reconciled
                    }
                    Err(err) => {
                        error!(
                            quote_id = %quote.id,
                            error = %err.cause(),
                            "failed to add missing expiration note"
                        );
                        ItemOutcome::ReconcileFailed(err)
                    }
                }
            }
            Ok(false) => ItemOutcome::NotExpired,
        }
    }

    /// Cancelled, past its deadline, and without the expiration note.
    fn needs_reconciliation(&self, quote: &Quote, today: NaiveDate) -> bool {
        self.options.reconcile_missing_notes
            && quote.state.is_cancelled()
            && !quote.has_note(self.executor.actor(), self.executor.note_text())
            && matches!(self.policy.has_lapsed(quote, today), Ok(true))
    }
}
