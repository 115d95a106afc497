//! Weight, penalty and bonus table for scoring.
//!
//! Loaded once from a JSON file at startup, validated, then shared read-only
//! by reference with every scoring call.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Qualifier phrases stripped from bracketed/dash-suffixed annotations by default.
pub const DEFAULT_QUALIFIER_PHRASES: &[&str] = &[
    "live",
    "remaster",
    "remastered",
    "remix",
    "remixed",
    "mono",
    "stereo",
    "deluxe",
    "edition",
    "version",
    "edit",
    "demo",
    "acoustic",
    "instrumental",
    "explicit",
    "bonus",
    "feat",
    "ft",
    "featuring",
    "mix",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchConfig {
    // Field weights. Combined as a weighted mean, so they need not sum to 100.
    pub weight_title: f64,
    pub weight_artist: f64,
    pub weight_album: f64,
    pub weight_duration: f64,

    pub duration_full_credit_tolerance_sec: f64,
    pub duration_zero_credit_tolerance_sec: f64,
    /// Duration sub-score when either side lacks a duration.
    pub duration_neutral_score: f64,
    /// Album sub-score when the local record has no album.
    pub album_neutral_score: f64,

    pub year_penalty_per_year: f64,
    pub year_penalty_max: f64,

    pub album_artist_bonus: f64,
    /// Normalized Levenshtein similarity (0-1) needed for album artists to count as equal.
    pub album_artist_match_ratio: f64,
    pub track_disc_bonus: f64,
    pub live_mismatch_penalty: f64,
    /// Local track number present on both sides but different.
    pub track_number_mismatch_penalty: f64,
    /// Exactly one side's album artist is "Various Artists" and artists differ.
    pub various_artists_mismatch_penalty: f64,
    /// Title and artist both match exactly.
    pub perfect_core_bonus: f64,
    /// Artist similarity (0-100) below which a candidate scores 0. 0 disables the gate.
    pub min_artist_similarity: f64,

    pub acceptance_threshold: f64,
    pub early_stop: bool,
    /// Defaults to `acceptance_threshold` when unset.
    pub early_stop_threshold: Option<f64>,

    pub max_strategies: usize,
    /// Maximum candidates requested per search call.
    pub search_limit: usize,

    pub qualifier_phrases: BTreeSet<String>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            weight_title: 40.0,
            weight_artist: 30.0,
            weight_album: 15.0,
            weight_duration: 15.0,
            duration_full_credit_tolerance_sec: 2.0,
            duration_zero_credit_tolerance_sec: 20.0,
            duration_neutral_score: 50.0,
            album_neutral_score: 50.0,
            year_penalty_per_year: 2.0,
            year_penalty_max: 10.0,
            album_artist_bonus: 5.0,
            album_artist_match_ratio: 0.9,
            track_disc_bonus: 5.0,
            live_mismatch_penalty: 5.0,
            track_number_mismatch_penalty: 0.0,
            various_artists_mismatch_penalty: 0.0,
            perfect_core_bonus: 0.0,
            min_artist_similarity: 0.0,
            acceptance_threshold: 80.0,
            early_stop: true,
            early_stop_threshold: None,
            max_strategies: 5,
            search_limit: 10,
            qualifier_phrases: DEFAULT_QUALIFIER_PHRASES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl MatchConfig {
    /// Load config from a JSON file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_json(&contents)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: MatchConfig = serde_json::from_str(json).context("Invalid config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject tables that would break the scoring invariants.
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("weight_title", self.weight_title),
            ("weight_artist", self.weight_artist),
            ("weight_album", self.weight_album),
            ("weight_duration", self.weight_duration),
            ("duration_full_credit_tolerance_sec", self.duration_full_credit_tolerance_sec),
            ("duration_zero_credit_tolerance_sec", self.duration_zero_credit_tolerance_sec),
            ("year_penalty_per_year", self.year_penalty_per_year),
            ("year_penalty_max", self.year_penalty_max),
            ("album_artist_bonus", self.album_artist_bonus),
            ("track_disc_bonus", self.track_disc_bonus),
            ("live_mismatch_penalty", self.live_mismatch_penalty),
            ("track_number_mismatch_penalty", self.track_number_mismatch_penalty),
            ("various_artists_mismatch_penalty", self.various_artists_mismatch_penalty),
            ("perfect_core_bonus", self.perfect_core_bonus),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                bail!("Config value '{}' must be a non-negative number, got {}", name, value);
            }
        }

        let percentages = [
            ("duration_neutral_score", self.duration_neutral_score),
            ("album_neutral_score", self.album_neutral_score),
            ("min_artist_similarity", self.min_artist_similarity),
            ("acceptance_threshold", self.acceptance_threshold),
        ];
        for (name, value) in percentages {
            if !(0.0..=100.0).contains(&value) {
                bail!("Config value '{}' must be within 0-100, got {}", name, value);
            }
        }
        if let Some(threshold) = self.early_stop_threshold {
            if !(0.0..=100.0).contains(&threshold) {
                bail!(
                    "Config value 'early_stop_threshold' must be within 0-100, got {}",
                    threshold
                );
            }
        }

        if !(0.0..=1.0).contains(&self.album_artist_match_ratio) {
            bail!(
                "Config value 'album_artist_match_ratio' must be within 0-1, got {}",
                self.album_artist_match_ratio
            );
        }

        if self.duration_zero_credit_tolerance_sec <= self.duration_full_credit_tolerance_sec {
            bail!(
                "duration_zero_credit_tolerance_sec ({}) must exceed \
                 duration_full_credit_tolerance_sec ({})",
                self.duration_zero_credit_tolerance_sec,
                self.duration_full_credit_tolerance_sec
            );
        }

        if self.max_strategies < 2 {
            bail!("max_strategies must be at least 2, got {}", self.max_strategies);
        }
        if self.search_limit == 0 {
            bail!("search_limit must be at least 1");
        }
        if self.qualifier_phrases.iter().any(|p| p.trim().is_empty()) {
            bail!("qualifier_phrases must not contain blank entries");
        }

        Ok(())
    }

    pub fn total_weight(&self) -> f64 {
        self.weight_title + self.weight_artist + self.weight_album + self.weight_duration
    }

    pub fn effective_early_stop_threshold(&self) -> f64 {
        self.early_stop_threshold.unwrap_or(self.acceptance_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = MatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.total_weight(), 100.0);
        assert_eq!(config.effective_early_stop_threshold(), 80.0);
        assert!(config.qualifier_phrases.contains("live"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = MatchConfig::from_json(
            r#"{ "weight_title": 50, "acceptance_threshold": 70, "early_stop_threshold": 95 }"#,
        )
        .unwrap();
        assert_eq!(config.weight_title, 50.0);
        assert_eq!(config.weight_artist, 30.0);
        assert_eq!(config.acceptance_threshold, 70.0);
        assert_eq!(config.effective_early_stop_threshold(), 95.0);
    }

    #[test]
    fn test_qualifier_phrases_override() {
        let config =
            MatchConfig::from_json(r#"{ "qualifier_phrases": ["live", "taylor's version"] }"#)
                .unwrap();
        assert_eq!(config.qualifier_phrases.len(), 2);
        assert!(config.qualifier_phrases.contains("taylor's version"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = MatchConfig::from_json(r#"{ "weight_titel": 50 }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let result = MatchConfig::from_json(r#"{ "weight_album": -1 }"#);
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("weight_album"));
    }

    #[test]
    fn test_inverted_duration_tolerances_rejected() {
        let result = MatchConfig::from_json(
            r#"{
                "duration_full_credit_tolerance_sec": 10,
                "duration_zero_credit_tolerance_sec": 5
            }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_extra_adjustments_default_off() {
        let config = MatchConfig::default();
        assert_eq!(config.track_number_mismatch_penalty, 0.0);
        assert_eq!(config.various_artists_mismatch_penalty, 0.0);
        assert_eq!(config.perfect_core_bonus, 0.0);
        assert!(MatchConfig::from_json(r#"{ "perfect_core_bonus": -3 }"#).is_err());
    }

    #[test]
    fn test_too_few_strategies_rejected() {
        assert!(MatchConfig::from_json(r#"{ "max_strategies": 1 }"#).is_err());
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        assert!(MatchConfig::from_json(r#"{ "acceptance_threshold": 120 }"#).is_err());
    }
}
