//! Match engine: drives the strategy cascade for each record and picks a winner.
//!
//! Per record the engine issues queries in order, scores every distinct
//! candidate, and stops early once a candidate clears the early-stop bar.
//! The best candidate is accepted when it reaches the acceptance threshold.
//! Records are independent, so batches run in parallel on the rayon pool.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::config::MatchConfig;
use crate::input::InputRow;
use crate::models::{LocalTrackRecord, MatchResult, MatchState, RecordOutcome, ScoreBreakdown};
use crate::normalize::Normalizer;
use crate::provider::{ProviderError, SearchProvider};
use crate::scoring::score;
use crate::strategy::strategies_for;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("fatal provider error on row {row_index}: {reason}")]
    ProviderFatal { row_index: usize, reason: String },
    #[error("matching cancelled")]
    Cancelled,
}

pub struct MatchEngine<P> {
    provider: P,
    config: MatchConfig,
    normalizer: Normalizer,
}

impl<P: SearchProvider> MatchEngine<P> {
    pub fn new(provider: P, config: MatchConfig) -> Self {
        let normalizer = Normalizer::from_config(&config);
        Self {
            provider,
            config,
            normalizer,
        }
    }

    /// Match a single record with no outside cancellation.
    pub fn match_record(&self, record: LocalTrackRecord) -> Result<MatchResult, EngineError> {
        self.match_record_with_cancel(record, &AtomicBool::new(false))
    }

    /// Match a single record. A fatal provider error raises `cancel` so sibling
    /// workers stop issuing queries.
    pub fn match_record_with_cancel(
        &self,
        record: LocalTrackRecord,
        cancel: &AtomicBool,
    ) -> Result<MatchResult, EngineError> {
        let strategies = strategies_for(
            &record,
            &self.normalizer,
            self.config.max_strategies,
            self.config.search_limit,
        );
        let early_stop_at = self.config.effective_early_stop_threshold();

        let mut state = MatchState::Pending;
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut audit: Vec<ScoreBreakdown> = Vec::new();
        let mut best_so_far = f64::NEG_INFINITY;
        let mut strategies_issued = 0;
        let mut strategies_failed = 0;
        let mut duplicates_skipped = 0;
        let mut stopped_early = false;

        for (index, query) in strategies.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                return Err(EngineError::Cancelled);
            }
            if state == MatchState::Pending {
                log::trace!("[MATCH] row {} searching", record.row_index);
                state = MatchState::Searching;
            }
            strategies_issued += 1;

            let candidates = match self.provider.search(query) {
                Ok(candidates) => candidates,
                Err(ProviderError::Transient(reason)) => {
                    strategies_failed += 1;
                    log::warn!(
                        "[SEARCH] row {} {} failed, continuing: {}",
                        record.row_index,
                        query.kind,
                        reason
                    );
                    Vec::new()
                }
                Err(ProviderError::Fatal(reason)) => {
                    cancel.store(true, Ordering::Relaxed);
                    log::error!(
                        "[SEARCH] row {} {} fatal: {}",
                        record.row_index,
                        query.kind,
                        reason
                    );
                    return Err(EngineError::ProviderFatal {
                        row_index: record.row_index,
                        reason,
                    });
                }
            };

            for candidate in candidates {
                if !seen.insert(candidate.id.clone()) {
                    duplicates_skipped += 1;
                    continue;
                }
                let breakdown = score(
                    &record,
                    &candidate,
                    &self.config,
                    &self.normalizer,
                    query.kind,
                    index,
                );
                log::trace!(
                    "[SCORE] row {} {} '{} - {}' = {:.1}",
                    record.row_index,
                    query.kind,
                    candidate.artist,
                    candidate.title,
                    breakdown.final_score
                );
                best_so_far = best_so_far.max(breakdown.final_score);
                audit.push(breakdown);
            }

            let more_remaining = index + 1 < strategies.len();
            if self.config.early_stop && more_remaining && best_so_far >= early_stop_at {
                stopped_early = true;
                break;
            }
        }
        let best = select_best(&audit);
        let best_score = best.map(|i| audit[i].final_score);
        let chosen = best.filter(|&i| audit[i].final_score >= self.config.acceptance_threshold);
        let state = if chosen.is_some() {
            MatchState::Found
        } else {
            MatchState::Exhausted
        };

        log::info!(
            "[MATCH] row {} '{} - {}': {:?} best={} candidates={} strategies={}",
            record.row_index,
            record.artist,
            record.title,
            state,
            best_score.map_or_else(|| "-".to_string(), |s| format!("{:.1}", s)),
            audit.len(),
            strategies_issued
        );

        Ok(MatchResult {
            record,
            state,
            chosen,
            best_score,
            audit,
            strategies_issued,
            strategies_failed,
            duplicates_skipped,
            stopped_early,
        })
    }

    /// Match every row in parallel, preserving input order.
    ///
    /// Rows that failed input validation become `Unprocessed` outcomes.
    /// `on_done` runs once per finished row, from worker threads. A fatal
    /// provider error stops the batch and is returned as the error.
    pub fn run_batch<F>(
        &self,
        rows: Vec<InputRow>,
        cancel: &AtomicBool,
        on_done: F,
    ) -> Result<Vec<RecordOutcome>, EngineError>
    where
        F: Fn(&RecordOutcome) + Sync + Send,
    {
        let fatal: Mutex<Option<EngineError>> = Mutex::new(None);

        let outcomes: Vec<Option<RecordOutcome>> = rows
            .into_par_iter()
            .map(|row| {
                if cancel.load(Ordering::Relaxed) {
                    return None;
                }
                let outcome = match row {
                    Err(err) => RecordOutcome::Unprocessed {
                        row_index: err.row_index,
                        reason: err.reason,
                        raw: err.raw,
                    },
                    Ok(record) => match self.match_record_with_cancel(record, cancel) {
                        Ok(result) => RecordOutcome::Matched(result),
                        Err(EngineError::Cancelled) => return None,
                        Err(err) => {
                            cancel.store(true, Ordering::Relaxed);
                            if let Ok(mut slot) = fatal.lock() {
                                if slot.is_none() {
                                    *slot = Some(err);
                                }
                            }
                            return None;
                        }
                    },
                };
                on_done(&outcome);
                Some(outcome)
            })
            .collect();

        if let Some(err) = fatal.into_inner().ok().flatten() {
            return Err(err);
        }
        outcomes
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(EngineError::Cancelled)
    }
}

/// Ordering between two scored candidates; `Greater` means `a` is preferred.
///
/// Higher score wins, then the earlier strategy, then the duration closer to
/// the local one (a known difference beats an unknown one).
fn preference(a: &ScoreBreakdown, b: &ScoreBreakdown) -> CmpOrdering {
    a.final_score
        .total_cmp(&b.final_score)
        .then_with(|| b.strategy_index.cmp(&a.strategy_index))
        .then_with(|| match (a.duration_diff_seconds, b.duration_diff_seconds) {
            (Some(da), Some(db)) => db.total_cmp(&da),
            (Some(_), None) => CmpOrdering::Greater,
            (None, Some(_)) => CmpOrdering::Less,
            (None, None) => CmpOrdering::Equal,
        })
}

/// Index of the preferred candidate; the first one seen wins a full tie.
pub fn select_best(audit: &[ScoreBreakdown]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, breakdown) in audit.iter().enumerate() {
        match best {
            Some(b) if preference(breakdown, &audit[b]) != CmpOrdering::Greater => {}
            _ => best = Some(i),
        }
    }
    best
}
