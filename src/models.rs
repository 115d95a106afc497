//! Core data models for catalog matching.
//!
//! This module contains the record, candidate, breakdown and result types
//! that flow through the matching pipeline, plus run statistics.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::strategy::StrategyKind;

// ============================================================================
// Local Models
// ============================================================================

/// Opaque pass-through columns from the input row, in their original order.
pub type ExtraColumns = Map<String, Value>;

/// A track entry from the curated local catalog.
/// Artist and title are guaranteed non-empty by the input reader.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalTrackRecord {
    pub row_index: usize,
    pub artist: String,
    pub title: String,
    pub album: String, // May be empty
    pub year: Option<i32>,
    pub duration_raw: Option<String>, // As given in the input, for reporting
    pub duration_seconds: Option<f64>, // None when missing or unparsable
    pub album_artist: Option<String>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub extra: ExtraColumns,
}

impl LocalTrackRecord {
    /// Minimal record with only the required fields set.
    pub fn new(row_index: usize, artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            row_index,
            artist: artist.into(),
            title: title.into(),
            album: String::new(),
            year: None,
            duration_raw: None,
            duration_seconds: None,
            album_artist: None,
            track_number: None,
            disc_number: None,
            extra: ExtraColumns::new(),
        }
    }

    pub fn has_album(&self) -> bool {
        !self.album.trim().is_empty()
    }

    /// Album artist for grouping; falls back to nothing rather than the artist
    /// so rows without one sort first.
    pub fn album_artist_key(&self) -> Option<&str> {
        self.album_artist
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

// ============================================================================
// Remote Models
// ============================================================================

/// Track returned by a search provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateTrack {
    pub id: String, // Remote identifier, used for deduplication
    pub artist: String,
    pub title: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub album_artist: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub release_year: Option<i32>,
    #[serde(default)]
    pub track_number: Option<u32>,
    #[serde(default)]
    pub disc_number: Option<u32>,
    #[serde(default)]
    pub url: String,
}

// ============================================================================
// Scoring Models
// ============================================================================

/// A labelled signed contribution applied after the weighted base.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Adjustment {
    pub label: &'static str,
    pub delta: f64,
}

/// Complete, explainable score for one (local record, candidate) pair.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreBreakdown {
    pub candidate: CandidateTrack,
    pub strategy: StrategyKind,
    pub strategy_index: usize, // Position in the record's strategy list

    pub title_similarity: f64,
    pub artist_similarity: f64,
    pub album_similarity: f64,
    pub duration_score: f64,
    pub duration_diff_seconds: Option<f64>,

    /// Weighted mean of the four sub-scores, 0-100.
    pub weighted_base: f64,
    pub year_penalty: f64,
    pub album_artist_bonus: f64,
    pub track_disc_bonus: f64,
    pub live_mismatch_penalty: f64,
    /// Every non-zero penalty/bonus in application order.
    pub adjustments: Vec<Adjustment>,

    pub rejection: Option<String>,
    pub final_score: f64,
}

// ============================================================================
// Match Results
// ============================================================================

/// Per-record state machine: Pending -> Searching -> (Found | Exhausted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    Pending,
    Searching,
    Found,
    Exhausted,
}

impl MatchState {
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchState::Found | MatchState::Exhausted)
    }
}

/// Terminal result for one local record.
#[derive(Clone, Debug)]
pub struct MatchResult {
    pub record: LocalTrackRecord,
    pub state: MatchState,
    /// Index into `audit` of the accepted candidate, if any.
    pub chosen: Option<usize>,
    /// Best score seen, even when below threshold. None when nothing was scored.
    pub best_score: Option<f64>,
    /// Every distinct candidate scored for this record, in discovery order.
    pub audit: Vec<ScoreBreakdown>,
    pub strategies_issued: usize,
    pub strategies_failed: usize,
    pub duplicates_skipped: usize,
    pub stopped_early: bool,
}

impl MatchResult {
    pub fn found(&self) -> bool {
        self.state == MatchState::Found
    }

    pub fn chosen_breakdown(&self) -> Option<&ScoreBreakdown> {
        self.chosen.and_then(|i| self.audit.get(i))
    }

    pub fn chosen_candidate(&self) -> Option<&CandidateTrack> {
        self.chosen_breakdown().map(|b| &b.candidate)
    }
}

/// Outcome for one input row. Every row produces exactly one.
#[derive(Clone, Debug)]
pub enum RecordOutcome {
    Matched(MatchResult),
    Unprocessed { row_index: usize, reason: String, raw: ExtraColumns },
}

impl RecordOutcome {
    pub fn row_index(&self) -> usize {
        match self {
            RecordOutcome::Matched(result) => result.record.row_index,
            RecordOutcome::Unprocessed { row_index, .. } => *row_index,
        }
    }
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Run statistics for instrumentation.
#[derive(Default, Debug, Clone, Serialize)]
pub struct MatchingStats {
    pub total_records: usize,
    pub matched: usize,
    pub not_found: usize,
    pub unprocessed: usize,

    pub strategies_issued: usize,
    pub strategies_failed: usize,
    pub candidates_scored: usize,
    pub duplicates_skipped: usize,
    pub early_stops: usize,

    // Which strategy surfaced the accepted candidate
    pub matched_via_artist_title_album: usize,
    pub matched_via_artist_title_year: usize,
    pub matched_via_artist_title: usize,
    pub matched_via_free_text: usize,
    pub matched_via_title_only: usize,

    pub elapsed_seconds: f64,
}

impl MatchingStats {
    /// Aggregate statistics over a finished batch.
    pub fn from_outcomes(outcomes: &[RecordOutcome]) -> Self {
        let mut stats = Self::default();
        for outcome in outcomes {
            stats.record(outcome);
        }
        stats
    }

    pub fn record(&mut self, outcome: &RecordOutcome) {
        self.total_records += 1;
        let result = match outcome {
            RecordOutcome::Unprocessed { .. } => {
                self.unprocessed += 1;
                return;
            }
            RecordOutcome::Matched(result) => result,
        };

        self.strategies_issued += result.strategies_issued;
        self.strategies_failed += result.strategies_failed;
        self.candidates_scored += result.audit.len();
        self.duplicates_skipped += result.duplicates_skipped;
        if result.stopped_early {
            self.early_stops += 1;
        }

        match result.chosen_breakdown() {
            Some(chosen) => {
                self.matched += 1;
                match chosen.strategy {
                    StrategyKind::ArtistTitleAlbum => self.matched_via_artist_title_album += 1,
                    StrategyKind::ArtistTitleYear => self.matched_via_artist_title_year += 1,
                    StrategyKind::ArtistTitle => self.matched_via_artist_title += 1,
                    StrategyKind::FreeText => self.matched_via_free_text += 1,
                    StrategyKind::TitleOnly => self.matched_via_title_only += 1,
                }
            }
            None => self.not_found += 1,
        }
    }

    /// Calculate match rate as a percentage of processed records
    pub fn match_rate(&self) -> f64 {
        let processed = self.total_records - self.unprocessed;
        if processed == 0 {
            0.0
        } else {
            100.0 * self.matched as f64 / processed as f64
        }
    }

    /// Log stats in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            log::info!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
