//! Search strategy generation.
//!
//! Each local record yields an ordered list of queries, most specific first.
//! The engine walks the list and decides when to stop; nothing here knows
//! about results.

use std::fmt;

use serde::Serialize;

use crate::models::LocalTrackRecord;
use crate::normalize::{clean_string, sanitize_for_search, Normalizer};

/// Query shape, ordered from most to least specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    ArtistTitleAlbum,
    ArtistTitleYear,
    ArtistTitle,
    FreeText,
    TitleOnly,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::ArtistTitleAlbum => "artist_title_album",
            StrategyKind::ArtistTitleYear => "artist_title_year",
            StrategyKind::ArtistTitle => "artist_title",
            StrategyKind::FreeText => "free_text",
            StrategyKind::TitleOnly => "title_only",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One query descriptor. Providers may use the rendered `text` (field-filter
/// syntax) or the structured fields directly.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub kind: StrategyKind,
    pub text: String,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    /// Quoted queries ask the provider for exact field matches.
    pub quoted: bool,
    pub limit: usize,
}

impl SearchQuery {
    fn fielded(
        kind: StrategyKind,
        title: String,
        artist: Option<String>,
        album: Option<String>,
        year: Option<i32>,
        quoted: bool,
        limit: usize,
    ) -> Self {
        let quote = |s: &str| {
            if quoted {
                format!("\"{}\"", s.replace('"', ""))
            } else {
                s.to_string()
            }
        };

        let mut text = format!("track:{}", quote(&title));
        if let Some(artist) = &artist {
            text.push_str(&format!(" artist:{}", quote(artist)));
        }
        if let Some(album) = &album {
            text.push_str(&format!(" album:{}", quote(album)));
        }
        if let Some(year) = year {
            text.push_str(&format!(" year:{}", year));
        }

        Self {
            kind,
            text,
            title,
            artist,
            album,
            year,
            quoted,
            limit,
        }
    }
}

/// Build the ordered strategy list for a record.
///
/// Always contains `ArtistTitle` and ends with `TitleOnly`; never longer than
/// `max_strategies` (callers guarantee at least 2). Queries whose rendered
/// text repeats an earlier one are dropped.
pub fn strategies_for(
    record: &LocalTrackRecord,
    normalizer: &Normalizer,
    max_strategies: usize,
    limit: usize,
) -> Vec<SearchQuery> {
    let clean_title = clean_string(&record.title);
    let clean_artist = clean_string(&record.artist);
    // A title that is nothing but brackets still needs something to search for
    let exact_title = if clean_title.is_empty() {
        record.title.trim().to_string()
    } else {
        clean_title
    };
    let exact_artist = if clean_artist.is_empty() {
        record.artist.trim().to_string()
    } else {
        clean_artist
    };

    let mut candidates: Vec<SearchQuery> = Vec::with_capacity(5);

    let clean_album = clean_string(&record.album);
    if !clean_album.is_empty() {
        candidates.push(SearchQuery::fielded(
            StrategyKind::ArtistTitleAlbum,
            exact_title.clone(),
            Some(exact_artist.clone()),
            Some(clean_album),
            None,
            true,
            limit,
        ));
    }

    if let Some(year) = record.year {
        candidates.push(SearchQuery::fielded(
            StrategyKind::ArtistTitleYear,
            exact_title.clone(),
            Some(exact_artist.clone()),
            None,
            Some(year),
            true,
            limit,
        ));
    }

    let artist_title = SearchQuery::fielded(
        StrategyKind::ArtistTitle,
        normalizer.normalize_text(&record.title),
        Some(normalizer.normalize_text(&record.artist)),
        None,
        None,
        false,
        limit,
    );
    candidates.push(artist_title);

    let free_text = format!("{} {}", record.title.trim(), record.artist.trim());
    candidates.push(SearchQuery {
        kind: StrategyKind::FreeText,
        text: free_text.clone(),
        title: free_text,
        artist: None,
        album: None,
        year: None,
        quoted: false,
        limit,
    });

    let sanitized = normalizer.normalize_text(&sanitize_for_search(&record.title));
    let title_only = SearchQuery::fielded(
        StrategyKind::TitleOnly,
        if sanitized.is_empty() { normalizer.normalize_text(&record.title) } else { sanitized },
        None,
        None,
        None,
        false,
        limit,
    );

    let mut strategies: Vec<SearchQuery> = Vec::with_capacity(candidates.len() + 1);
    for query in candidates {
        if !strategies.iter().any(|q| q.text == query.text) {
            strategies.push(query);
        }
    }

    // Keep ArtistTitle and the final TitleOnly when trimming to max_strategies
    let room = max_strategies.max(2) - 1;
    while strategies.len() > room {
        let removable = strategies
            .iter()
            .rposition(|q| q.kind != StrategyKind::ArtistTitle)
            .unwrap_or(strategies.len() - 1);
        strategies.remove(removable);
    }
    if !strategies.iter().any(|q| q.text == title_only.text) {
        strategies.push(title_only);
    }

    strategies
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hey_jude() -> LocalTrackRecord {
        let mut record = LocalTrackRecord::new(0, "The Beatles", "Hey Jude (Remastered 2015)");
        record.album = "Hey Jude".to_string();
        record.year = Some(1968);
        record
    }

    fn kinds(queries: &[SearchQuery]) -> Vec<StrategyKind> {
        queries.iter().map(|q| q.kind).collect()
    }

    #[test]
    fn test_full_record_yields_all_strategies_in_order() {
        let queries = strategies_for(&hey_jude(), &Normalizer::default(), 5, 10);
        assert_eq!(
            kinds(&queries),
            vec![
                StrategyKind::ArtistTitleAlbum,
                StrategyKind::ArtistTitleYear,
                StrategyKind::ArtistTitle,
                StrategyKind::FreeText,
                StrategyKind::TitleOnly,
            ]
        );
        assert_eq!(
            queries[0].text,
            r#"track:"Hey Jude" artist:"The Beatles" album:"Hey Jude""#
        );
        assert_eq!(queries[1].text, r#"track:"Hey Jude" artist:"The Beatles" year:1968"#);
        assert_eq!(queries[2].text, "track:hey jude artist:the beatles");
        assert_eq!(queries[3].text, "Hey Jude (Remastered 2015) The Beatles");
        assert_eq!(queries[4].text, "track:hey jude");
        assert!(queries.iter().all(|q| q.limit == 10));
    }

    #[test]
    fn test_minimal_record_has_at_least_two() {
        let record = LocalTrackRecord::new(0, "Artist", "Song");
        let queries = strategies_for(&record, &Normalizer::default(), 5, 10);
        assert_eq!(
            kinds(&queries),
            vec![StrategyKind::ArtistTitle, StrategyKind::FreeText, StrategyKind::TitleOnly]
        );
    }

    #[test]
    fn test_truncation_keeps_artist_title_and_title_only() {
        let queries = strategies_for(&hey_jude(), &Normalizer::default(), 2, 10);
        assert_eq!(kinds(&queries), vec![StrategyKind::ArtistTitle, StrategyKind::TitleOnly]);

        let queries = strategies_for(&hey_jude(), &Normalizer::default(), 3, 10);
        assert_eq!(
            kinds(&queries),
            vec![
                StrategyKind::ArtistTitleAlbum,
                StrategyKind::ArtistTitle,
                StrategyKind::TitleOnly
            ]
        );
    }

    #[test]
    fn test_strictly_decreasing_specificity() {
        let queries = strategies_for(&hey_jude(), &Normalizer::default(), 5, 10);
        assert!(queries.windows(2).all(|w| w[0].kind < w[1].kind));
    }

    #[test]
    fn test_title_only_is_sanitized() {
        let record = LocalTrackRecord::new(0, "Led Zeppelin", "Led Zeppelin IV (Deluxe Edition)");
        let queries = strategies_for(&record, &Normalizer::default(), 5, 10);
        let last = queries.last().unwrap();
        assert_eq!(last.kind, StrategyKind::TitleOnly);
        assert_eq!(last.title, "led zeppelin");
        assert_eq!(last.artist, None);
    }

    #[test]
    fn test_quotes_stripped_inside_quoted_fields() {
        let mut record = LocalTrackRecord::new(0, "Artist", r#"Say "Hello""#);
        record.album = "Album".to_string();
        let queries = strategies_for(&record, &Normalizer::default(), 5, 10);
        assert_eq!(queries[0].text, r#"track:"Say Hello" artist:"Artist" album:"Album""#);
    }
}
