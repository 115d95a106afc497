//! Offline search provider backed by a JSON catalog dump.
//!
//! Each remote track is normalized once at load time and indexed by title
//! token, so a search only scans tracks sharing at least one title token.

use std::path::Path;

use anyhow::{Context, Result};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::models::CandidateTrack;
use crate::normalize::Normalizer;
use crate::provider::{ProviderError, SearchProvider};
use crate::strategy::{SearchQuery, StrategyKind};

/// Precomputed normalized fields for one catalog track.
struct IndexedTrack {
    track: CandidateTrack,
    title_norm: String,
    artist_norm: String,
    album_norm: String,
}

pub struct CatalogProvider {
    tracks: Vec<IndexedTrack>,
    /// title token -> positions in `tracks`, ascending
    title_index: FxHashMap<String, Vec<usize>>,
    normalizer: Normalizer,
}

impl CatalogProvider {
    pub fn new(tracks: Vec<CandidateTrack>, normalizer: Normalizer) -> Self {
        let mut title_index: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        let indexed: Vec<IndexedTrack> = tracks
            .into_iter()
            .enumerate()
            .map(|(pos, track)| {
                let title_norm = normalizer.normalize_text(&track.title);
                let unique: FxHashSet<&str> = title_norm.split_whitespace().collect();
                for token in unique {
                    title_index.entry(token.to_string()).or_default().push(pos);
                }
                IndexedTrack {
                    artist_norm: normalizer.normalize_text(&track.artist),
                    album_norm: normalizer.normalize_text(&track.album),
                    title_norm,
                    track,
                }
            })
            .collect();

        Self {
            tracks: indexed,
            title_index,
            normalizer,
        }
    }

    /// Load a JSON array of tracks.
    pub fn from_file(path: &Path, normalizer: Normalizer) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
        let tracks: Vec<CandidateTrack> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse catalog file: {}", path.display()))?;
        Ok(Self::new(tracks, normalizer))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Positions of tracks whose title contains every token in `tokens`.
    fn positions_with_title_tokens(&self, tokens: &[&str]) -> Vec<usize> {
        let mut lists: Vec<&Vec<usize>> = Vec::with_capacity(tokens.len());
        for token in tokens {
            match self.title_index.get(*token) {
                Some(list) => lists.push(list),
                None => return Vec::new(),
            }
        }
        lists.sort_by_key(|l| l.len());
        let Some((shortest, rest)) = lists.split_first() else {
            return Vec::new();
        };
        shortest
            .iter()
            .copied()
            .filter(|pos| rest.iter().all(|l| l.binary_search(pos).is_ok()))
            .collect()
    }

    fn matches_fields(&self, entry: &IndexedTrack, query: &SearchQuery) -> bool {
        let contains_all = |haystack: &str, needle: &str| {
            let hay: FxHashSet<&str> = haystack.split_whitespace().collect();
            needle.split_whitespace().all(|t| hay.contains(t))
        };

        if let Some(artist) = &query.artist {
            if !contains_all(&entry.artist_norm, &self.normalizer.normalize_text(artist)) {
                return false;
            }
        }
        if let Some(album) = &query.album {
            if !contains_all(&entry.album_norm, &self.normalizer.normalize_text(album)) {
                return false;
            }
        }
        if let Some(year) = query.year {
            if entry.track.release_year != Some(year) {
                return false;
            }
        }
        true
    }
}

impl SearchProvider for CatalogProvider {
    fn search(&self, query: &SearchQuery) -> Result<Vec<CandidateTrack>, ProviderError> {
        if query.kind == StrategyKind::FreeText {
            // Every token must appear somewhere in title + artist
            let text = self.normalizer.normalize_text(&query.text);
            let tokens: Vec<&str> = text.split_whitespace().collect();
            if tokens.is_empty() {
                return Ok(Vec::new());
            }
            let found = self
                .tracks
                .iter()
                .filter(|entry| {
                    let hay: FxHashSet<&str> = entry
                        .title_norm
                        .split_whitespace()
                        .chain(entry.artist_norm.split_whitespace())
                        .collect();
                    tokens.iter().all(|t| hay.contains(t))
                })
                .take(query.limit)
                .map(|entry| entry.track.clone())
                .collect();
            return Ok(found);
        }

        let title = self.normalizer.normalize_text(&query.title);
        let tokens: Vec<&str> = title.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let found = self
            .positions_with_title_tokens(&tokens)
            .into_iter()
            .map(|pos| &self.tracks[pos])
            .filter(|entry| self.matches_fields(entry, query))
            .take(query.limit)
            .map(|entry| entry.track.clone())
            .collect();
        Ok(found)
    }
}
