//! Score aggregation for catalog matching.
//!
//! ## Scoring Formula
//! ```text
//! base  = (w_title·title + w_artist·artist + w_album·album + w_duration·duration) / Σw
//! final = clamp(base − year_penalty − live_mismatch_penalty
//!                    − track_number_mismatch_penalty − various_artists_mismatch_penalty
//!                    + album_artist_bonus + track_disc_bonus + perfect_core_bonus, 0, 100)
//! ```
//!
//! `base` is the weighted mean of the 0-100 sub-scores, so it stays on the
//! 0-100 scale whatever the weights sum to. All-zero weights give a base of 0.

use crate::config::MatchConfig;
use crate::models::{Adjustment, CandidateTrack, LocalTrackRecord, ScoreBreakdown};
use crate::normalize::Normalizer;
use crate::similarity::{compare, FieldSimilarities};
use crate::strategy::StrategyKind;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Weighted mean of the four field sub-scores.
pub fn weighted_base(fields: &FieldSimilarities, config: &MatchConfig) -> f64 {
    let total = config.total_weight();
    if total <= 0.0 {
        return 0.0;
    }
    let sum = config.weight_title * fields.title
        + config.weight_artist * fields.artist
        + config.weight_album * fields.album
        + config.weight_duration * fields.duration;
    sum / total
}

/// Labelled adjustments in application order, zero entries omitted.
pub fn adjustments(fields: &FieldSimilarities) -> Vec<Adjustment> {
    [
        ("year_penalty", -fields.year_penalty),
        ("live_mismatch_penalty", -fields.live_mismatch_penalty),
        ("track_number_mismatch_penalty", -fields.track_number_mismatch_penalty),
        ("various_artists_mismatch_penalty", -fields.various_artists_mismatch_penalty),
        ("album_artist_bonus", fields.album_artist_bonus),
        ("track_disc_bonus", fields.track_disc_bonus),
        ("perfect_core_bonus", fields.perfect_core_bonus),
    ]
    .into_iter()
    .filter(|(_, delta)| *delta != 0.0)
    .map(|(label, delta)| Adjustment { label, delta })
    .collect()
}

/// Score one candidate against a local record. The breakdown keeps every
/// component so the audit trail explains the final number.
pub fn score(
    local: &LocalTrackRecord,
    candidate: &CandidateTrack,
    config: &MatchConfig,
    normalizer: &Normalizer,
    strategy: StrategyKind,
    strategy_index: usize,
) -> ScoreBreakdown {
    let fields = compare(local, candidate, config, normalizer);
    let base = weighted_base(&fields, config);
    let adjustments = adjustments(&fields);
    let adjusted = base + adjustments.iter().map(|a| a.delta).sum::<f64>();

    let gated = config.min_artist_similarity > 0.0 && fields.artist < config.min_artist_similarity;
    let rejection = if gated {
        Some(format!(
            "Artist similarity {:.0}% is below threshold {:.0}%",
            fields.artist, config.min_artist_similarity
        ))
    } else {
        None
    };

    let final_score = if rejection.is_some() {
        MIN_SCORE
    } else {
        adjusted.clamp(MIN_SCORE, MAX_SCORE)
    };

    ScoreBreakdown {
        candidate: candidate.clone(),
        strategy,
        strategy_index,
        title_similarity: fields.title,
        artist_similarity: fields.artist,
        album_similarity: fields.album,
        duration_score: fields.duration,
        duration_diff_seconds: fields.duration_diff_seconds,
        weighted_base: base,
        year_penalty: fields.year_penalty,
        album_artist_bonus: fields.album_artist_bonus,
        track_disc_bonus: fields.track_disc_bonus,
        live_mismatch_penalty: fields.live_mismatch_penalty,
        adjustments,
        rejection,
        final_score,
    }
}
