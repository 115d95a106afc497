//! Per-field similarity between a local record and one candidate.
//!
//! All text fields share one token metric so scores are comparable across
//! fields. Penalties and bonuses come out as non-negative magnitudes; the
//! aggregator applies their sign.

use rustc_hash::FxHashSet;

use crate::config::MatchConfig;
use crate::models::{CandidateTrack, LocalTrackRecord};
use crate::normalize::{mentions_live, Normalizer};

// ============================================================================
// Token Similarity
// ============================================================================

/// Sørensen–Dice similarity over whitespace token sets, scaled to 0-100.
///
/// Symmetric; 100 for identical inputs (two empty strings included), 0 when
/// the token sets are disjoint or exactly one side is empty. Callers pass
/// already-normalized text.
pub fn token_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 100.0;
    }

    let tokens_a: FxHashSet<&str> = a.split_whitespace().collect();
    let tokens_b: FxHashSet<&str> = b.split_whitespace().collect();

    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 100.0;
    }
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    200.0 * intersection as f64 / (tokens_a.len() + tokens_b.len()) as f64
}

// ============================================================================
// Field Scores
// ============================================================================

/// Duration credit (0-100) for an absolute difference in seconds.
/// Full credit up to `full_tol`, none from `zero_tol`, linear in between.
pub fn duration_credit(diff_sec: f64, full_tol: f64, zero_tol: f64) -> f64 {
    let diff = diff_sec.abs();
    if diff <= full_tol {
        100.0
    } else if diff >= zero_tol {
        0.0
    } else {
        100.0 * (zero_tol - diff) / (zero_tol - full_tol)
    }
}

/// Year penalty magnitude: per-year rate times the gap, capped.
pub fn year_penalty(local: Option<i32>, remote: Option<i32>, per_year: f64, max: f64) -> f64 {
    match (local, remote) {
        (Some(a), Some(b)) if a != b => (per_year * a.abs_diff(b) as f64).min(max),
        _ => 0.0,
    }
}

/// Named sub-scores for one (local, candidate) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSimilarities {
    pub title: f64,
    pub artist: f64,
    pub album: f64,
    pub duration: f64,
    pub duration_diff_seconds: Option<f64>,
    pub year_penalty: f64,
    pub album_artist_bonus: f64,
    pub track_disc_bonus: f64,
    pub live_mismatch_penalty: f64,
    pub track_number_mismatch_penalty: f64,
    pub various_artists_mismatch_penalty: f64,
    pub perfect_core_bonus: f64,
}

fn is_various_artists(normalized: &str) -> bool {
    normalized.contains("various artists")
}

/// Compute every field comparison between a local record and a candidate.
pub fn compare(
    local: &LocalTrackRecord,
    candidate: &CandidateTrack,
    config: &MatchConfig,
    normalizer: &Normalizer,
) -> FieldSimilarities {
    let title = token_similarity(
        &normalizer.normalize_text(&local.title),
        &normalizer.normalize_text(&candidate.title),
    );

    let local_artist = normalizer.normalize_text(&local.artist);
    let candidate_artist = normalizer.normalize_text(&candidate.artist);
    let mut artist = token_similarity(&local_artist, &candidate_artist);
    if let Some(album_artist) = local.album_artist_key() {
        let album_artist = normalizer.normalize_text(album_artist);
        if album_artist != local_artist {
            artist = artist.max(token_similarity(&album_artist, &candidate_artist));
        }
    }

    let album = if local.has_album() {
        token_similarity(
            &normalizer.normalize_text(&local.album),
            &normalizer.normalize_text(&candidate.album),
        )
    } else {
        config.album_neutral_score
    };

    let duration_diff_seconds = match (local.duration_seconds, candidate.duration_seconds) {
        (Some(a), Some(b)) => Some((a - b).abs()),
        _ => None,
    };
    let duration = match duration_diff_seconds {
        Some(diff) => duration_credit(
            diff,
            config.duration_full_credit_tolerance_sec,
            config.duration_zero_credit_tolerance_sec,
        ),
        None => config.duration_neutral_score,
    };

    let year_penalty = year_penalty(
        local.year,
        candidate.release_year,
        config.year_penalty_per_year,
        config.year_penalty_max,
    );

    let album_artist_bonus = match (local.album_artist_key(), candidate.album_artist.as_deref()) {
        (Some(local_aa), Some(remote_aa)) => {
            let ratio = strsim::normalized_levenshtein(
                &normalizer.normalize_text(local_aa),
                &normalizer.normalize_text(remote_aa),
            );
            if ratio >= config.album_artist_match_ratio {
                config.album_artist_bonus
            } else {
                0.0
            }
        }
        _ => 0.0,
    };

    let track_disc_bonus = match (
        local.track_number,
        local.disc_number,
        candidate.track_number,
        candidate.disc_number,
    ) {
        (Some(lt), Some(ld), Some(ct), Some(cd)) if lt == ct && ld == cd => config.track_disc_bonus,
        _ => 0.0,
    };

    // Raw text on purpose: "live" is usually exactly what normalization strips
    let local_live = mentions_live(&local.title) || mentions_live(&local.album);
    let candidate_live = mentions_live(&candidate.title) || mentions_live(&candidate.album);
    let live_mismatch_penalty = if local_live != candidate_live {
        config.live_mismatch_penalty
    } else {
        0.0
    };

    let track_number_mismatch_penalty = match (local.track_number, candidate.track_number) {
        (Some(lt), Some(ct)) if lt != ct => config.track_number_mismatch_penalty,
        _ => 0.0,
    };

    // Album artist falls back to the track artist on either side
    let local_va = is_various_artists(
        &normalizer.normalize_text(local.album_artist_key().unwrap_or(&local.artist)),
    );
    let candidate_va = is_various_artists(&normalizer.normalize_text(
        candidate.album_artist.as_deref().unwrap_or(&candidate.artist),
    ));
    let various_artists_mismatch_penalty = if local_va != candidate_va && artist < 100.0 {
        config.various_artists_mismatch_penalty
    } else {
        0.0
    };

    let perfect_core_bonus = if title >= 100.0 && artist >= 100.0 {
        config.perfect_core_bonus
    } else {
        0.0
    };

    FieldSimilarities {
        title,
        artist,
        album,
        duration,
        duration_diff_seconds,
        year_penalty,
        album_artist_bonus,
        track_disc_bonus,
        live_mismatch_penalty,
        track_number_mismatch_penalty,
        various_artists_mismatch_penalty,
        perfect_core_bonus,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> CandidateTrack {
        CandidateTrack {
            id: "c1".to_string(),
            artist: "The Beatles".to_string(),
            title: "Hey Jude".to_string(),
            album: "Hey Jude".to_string(),
            album_artist: Some("The Beatles".to_string()),
            duration_seconds: Some(431.0),
            release_year: Some(1968),
            track_number: Some(7),
            disc_number: Some(1),
            url: "https://example.com/track/c1".to_string(),
        }
    }

    fn local() -> LocalTrackRecord {
        let mut record = LocalTrackRecord::new(0, "The Beatles", "Hey Jude");
        record.album = "Hey Jude".to_string();
        record.year = Some(1968);
        record.duration_seconds = Some(431.0);
        record.album_artist = Some("The Beatles".to_string());
        record.track_number = Some(7);
        record.disc_number = Some(1);
        record
    }

    #[test]
    fn test_token_similarity_reflexive_and_symmetric() {
        let pairs = [
            ("hey jude", "hey jude"),
            ("hey jude", "jude hey"),
            ("hey jude", "hey there delilah"),
            ("", "something"),
            ("", ""),
            ("a b c d", "c d e"),
        ];
        for (a, b) in pairs {
            assert_eq!(token_similarity(a, a), 100.0);
            assert_eq!(token_similarity(a, b), token_similarity(b, a));
        }
    }

    #[test]
    fn test_token_similarity_values() {
        assert_eq!(token_similarity("hey jude", "jude hey"), 100.0);
        assert_eq!(token_similarity("hey jude", "let it be"), 0.0);
        assert_eq!(token_similarity("", "let it be"), 0.0);
        // 2 shared of 2 + 3 tokens
        assert!((token_similarity("hey jude", "hey jude naked") - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_duration_credit_bands() {
        assert_eq!(duration_credit(0.0, 2.0, 20.0), 100.0);
        assert_eq!(duration_credit(2.0, 2.0, 20.0), 100.0);
        assert_eq!(duration_credit(-2.0, 2.0, 20.0), 100.0);
        assert!((duration_credit(11.0, 2.0, 20.0) - 50.0).abs() < 1e-9);
        assert_eq!(duration_credit(20.0, 2.0, 20.0), 0.0);
        assert_eq!(duration_credit(300.0, 2.0, 20.0), 0.0);
    }

    #[test]
    fn test_duration_credit_monotonic() {
        let mut previous = f64::INFINITY;
        for step in 0..=250 {
            let credit = duration_credit(step as f64 * 0.1, 2.0, 20.0);
            assert!(credit <= previous);
            assert!((0.0..=100.0).contains(&credit));
            previous = credit;
        }
    }

    #[test]
    fn test_year_penalty() {
        assert_eq!(year_penalty(Some(1968), Some(1968), 2.0, 10.0), 0.0);
        assert_eq!(year_penalty(None, Some(1968), 2.0, 10.0), 0.0);
        assert_eq!(year_penalty(Some(1968), None, 2.0, 10.0), 0.0);
        assert_eq!(year_penalty(Some(1968), Some(1970), 2.0, 10.0), 4.0);
        assert_eq!(year_penalty(Some(1970), Some(1968), 2.0, 10.0), 4.0);
        assert_eq!(year_penalty(Some(1968), Some(2015), 2.0, 10.0), 10.0);
        assert_eq!(year_penalty(Some(2000), Some(i32::MIN), 2.0, 10.0), 10.0);
        assert_eq!(year_penalty(Some(i32::MAX), Some(i32::MIN), 2.0, 10.0), 10.0);

        let mut previous = 0.0;
        for gap in 0..40 {
            let penalty = year_penalty(Some(1968), Some(1968 + gap), 2.0, 10.0);
            assert!(penalty >= previous);
            assert!(penalty <= 10.0);
            previous = penalty;
        }
    }

    #[test]
    fn test_compare_identical() {
        let config = MatchConfig::default();
        let fields = compare(&local(), &candidate(), &config, &Normalizer::default());
        assert_eq!(fields.title, 100.0);
        assert_eq!(fields.artist, 100.0);
        assert_eq!(fields.album, 100.0);
        assert_eq!(fields.duration, 100.0);
        assert_eq!(fields.duration_diff_seconds, Some(0.0));
        assert_eq!(fields.year_penalty, 0.0);
        assert_eq!(fields.album_artist_bonus, config.album_artist_bonus);
        assert_eq!(fields.track_disc_bonus, config.track_disc_bonus);
        assert_eq!(fields.live_mismatch_penalty, 0.0);
    }

    #[test]
    fn test_compare_missing_optional_fields_are_neutral() {
        let config = MatchConfig::default();
        let record = LocalTrackRecord::new(0, "The Beatles", "Hey Jude");
        let fields = compare(&record, &candidate(), &config, &Normalizer::default());
        assert_eq!(fields.album, config.album_neutral_score);
        assert_eq!(fields.duration, config.duration_neutral_score);
        assert_eq!(fields.duration_diff_seconds, None);
        assert_eq!(fields.year_penalty, 0.0);
        assert_eq!(fields.album_artist_bonus, 0.0);
        assert_eq!(fields.track_disc_bonus, 0.0);
    }

    #[test]
    fn test_compare_album_artist_rescues_artist_similarity() {
        let config = MatchConfig::default();
        let mut record = LocalTrackRecord::new(0, "Paul McCartney", "Hey Jude");
        record.album_artist = Some("The Beatles".to_string());
        let fields = compare(&record, &candidate(), &config, &Normalizer::default());
        assert_eq!(fields.artist, 100.0);
        assert_eq!(fields.album_artist_bonus, config.album_artist_bonus);
    }

    #[test]
    fn test_compare_track_disc_requires_both() {
        let config = MatchConfig::default();
        let mut record = local();
        record.disc_number = None;
        let fields = compare(&record, &candidate(), &config, &Normalizer::default());
        assert_eq!(fields.track_disc_bonus, 0.0);

        let mut record = local();
        record.track_number = Some(8);
        let fields = compare(&record, &candidate(), &config, &Normalizer::default());
        assert_eq!(fields.track_disc_bonus, 0.0);
    }

    #[test]
    fn test_compare_extreme_catalog_year() {
        let json = r#"{ "id": "x", "artist": "The Beatles", "title": "Hey Jude",
                        "release_year": -2147483648 }"#;
        let remote: CandidateTrack = serde_json::from_str(json).unwrap();
        let config = MatchConfig::default();
        let fields = compare(&local(), &remote, &config, &Normalizer::default());
        assert_eq!(fields.year_penalty, config.year_penalty_max);
    }

    #[test]
    fn test_compare_album_artist_below_ratio() {
        let mut record = local();
        record.album_artist = Some("Beatles".to_string());
        let mut remote = candidate();
        remote.album_artist = Some("Beatle".to_string());

        // normalized Levenshtein 6/7 is under the default 0.9
        let config = MatchConfig::default();
        let fields = compare(&record, &remote, &config, &Normalizer::default());
        assert_eq!(fields.album_artist_bonus, 0.0);

        let config = MatchConfig::from_json(r#"{ "album_artist_match_ratio": 0.8 }"#).unwrap();
        let fields = compare(&record, &remote, &config, &Normalizer::default());
        assert_eq!(fields.album_artist_bonus, config.album_artist_bonus);
    }

    #[test]
    fn test_compare_extra_adjustments_off_by_default() {
        let mut record = local();
        record.track_number = Some(3);
        record.album_artist = Some("Various Artists".to_string());
        record.artist = "Paul McCartney".to_string();
        let config = MatchConfig::default();
        let fields = compare(&record, &candidate(), &config, &Normalizer::default());
        assert_eq!(fields.track_number_mismatch_penalty, 0.0);
        assert_eq!(fields.various_artists_mismatch_penalty, 0.0);
        assert_eq!(fields.perfect_core_bonus, 0.0);
    }

    #[test]
    fn test_compare_extra_adjustments_configured() {
        let config = MatchConfig::from_json(
            r#"{
                "track_number_mismatch_penalty": 4,
                "various_artists_mismatch_penalty": 6,
                "perfect_core_bonus": 3
            }"#,
        )
        .unwrap();
        let normalizer = Normalizer::default();

        let fields = compare(&local(), &candidate(), &config, &normalizer);
        assert_eq!(fields.track_number_mismatch_penalty, 0.0);
        assert_eq!(fields.various_artists_mismatch_penalty, 0.0);
        assert_eq!(fields.perfect_core_bonus, 3.0);

        let mut record = local();
        record.track_number = Some(3);
        record.artist = "Paul McCartney".to_string();
        record.album_artist = Some("Various Artists".to_string());
        let fields = compare(&record, &candidate(), &config, &normalizer);
        assert_eq!(fields.track_number_mismatch_penalty, 4.0);
        assert!(fields.artist < 100.0);
        assert_eq!(fields.various_artists_mismatch_penalty, 6.0);
        assert_eq!(fields.perfect_core_bonus, 0.0);

        // Both sides compilations: no penalty
        let mut remote = candidate();
        remote.album_artist = Some("Various Artists".to_string());
        let fields = compare(&record, &remote, &config, &normalizer);
        assert_eq!(fields.various_artists_mismatch_penalty, 0.0);
    }

    #[test]
    fn test_compare_live_mismatch() {
        let config = MatchConfig::default();
        let mut record = local();
        record.title = "Hey Jude (Live)".to_string();
        let fields = compare(&record, &candidate(), &config, &Normalizer::default());
        assert_eq!(fields.title, 100.0);
        assert_eq!(fields.live_mismatch_penalty, config.live_mismatch_penalty);
    }
}
