//! Report rows and the SQLite report writer.
//!
//! `summary` has one row per input row; `details` has one row per scored
//! candidate. Both tables keep the presentation order in `position`.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Serialize;
use serde_json::Value;

use crate::input::{COL_ALBUM, COL_ALBUM_ARTIST, COL_ARTIST, COL_TITLE};
use crate::models::{ExtraColumns, MatchResult, RecordOutcome};
use crate::progress::create_progress_bar;

const WRITE_BATCH_SIZE: usize = 10_000;

pub const STATUS_FOUND: &str = "found";
pub const STATUS_NOT_FOUND: &str = "not_found";
pub const STATUS_UNPROCESSED: &str = "unprocessed";

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub row_index: usize,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub year: Option<i32>,
    pub duration: Option<String>,

    pub found: bool,
    pub include_in_playlist: bool,
    pub confidence: Option<f64>,
    pub status: &'static str,
    pub strategy: Option<&'static str>,
    pub matched_id: Option<String>,
    pub matched_artist: Option<String>,
    pub matched_title: Option<String>,
    pub matched_album: Option<String>,
    pub matched_url: Option<String>,
    pub reason: Option<String>,

    pub extra: ExtraColumns,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    pub row_index: usize,
    pub local_artist: String,
    pub local_title: String,
    pub local_album: String,
    pub match_found_for_record: bool,
    pub chosen: bool,

    pub candidate_id: String,
    pub candidate_artist: String,
    pub candidate_title: String,
    pub candidate_album: String,
    pub candidate_year: Option<i32>,
    pub strategy: &'static str,

    pub final_score: f64,
    pub title_similarity: f64,
    pub artist_similarity: f64,
    pub album_similarity: f64,
    pub duration_score: f64,
    pub year_penalty: f64,
    pub album_artist_bonus: f64,
    pub track_disc_bonus: f64,
    pub live_mismatch_penalty: f64,
    /// JSON array of `{label, delta}`
    pub adjustments: String,
    pub rejection: Option<String>,
}

fn raw_text(raw: &ExtraColumns, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn summary_for_match(result: &MatchResult) -> SummaryRow {
    let record = &result.record;
    let chosen = result.chosen_breakdown();
    let candidate = chosen.map(|b| &b.candidate);
    let found = result.found();

    SummaryRow {
        row_index: record.row_index,
        artist: Some(record.artist.clone()),
        title: Some(record.title.clone()),
        album: record.has_album().then(|| record.album.clone()),
        album_artist: record.album_artist_key().map(str::to_string),
        year: record.year,
        duration: record.duration_raw.clone(),
        found,
        include_in_playlist: found,
        confidence: result.best_score,
        status: if found { STATUS_FOUND } else { STATUS_NOT_FOUND },
        strategy: chosen.map(|b| b.strategy.as_str()),
        matched_id: candidate.map(|c| c.id.clone()),
        matched_artist: candidate.map(|c| c.artist.clone()),
        matched_title: candidate.map(|c| c.title.clone()),
        matched_album: candidate.map(|c| c.album.clone()),
        matched_url: candidate.map(|c| c.url.clone()),
        reason: None,
        extra: record.extra.clone(),
    }
}

/// Summary rows ordered by album artist, rows without one first, then by
/// artist and input position.
pub fn build_summary_rows(outcomes: &[RecordOutcome]) -> Vec<SummaryRow> {
    let mut rows: Vec<SummaryRow> = outcomes
        .iter()
        .map(|outcome| match outcome {
            RecordOutcome::Matched(result) => summary_for_match(result),
            RecordOutcome::Unprocessed {
                row_index,
                reason,
                raw,
            } => SummaryRow {
                row_index: *row_index,
                artist: raw_text(raw, COL_ARTIST),
                title: raw_text(raw, COL_TITLE),
                album: raw_text(raw, COL_ALBUM),
                album_artist: raw_text(raw, COL_ALBUM_ARTIST),
                year: None,
                duration: None,
                found: false,
                include_in_playlist: false,
                confidence: None,
                status: STATUS_UNPROCESSED,
                strategy: None,
                matched_id: None,
                matched_artist: None,
                matched_title: None,
                matched_album: None,
                matched_url: None,
                reason: Some(reason.clone()),
                extra: raw.clone(),
            },
        })
        .collect();

    let key = |row: &SummaryRow| {
        (
            row.album_artist.is_some(),
            row.album_artist.as_deref().map(str::to_lowercase),
            row.artist.as_deref().map(str::to_lowercase),
            row.row_index,
        )
    };
    rows.sort_by_cached_key(key);
    rows
}

/// One row per audit entry, ordered by local artist, local title, then
/// best score first.
pub fn build_detail_rows(outcomes: &[RecordOutcome]) -> Vec<DetailRow> {
    let mut rows: Vec<DetailRow> = Vec::new();
    for outcome in outcomes {
        let RecordOutcome::Matched(result) = outcome else {
            continue;
        };
        let record = &result.record;
        for (i, breakdown) in result.audit.iter().enumerate() {
            let candidate = &breakdown.candidate;
            rows.push(DetailRow {
                row_index: record.row_index,
                local_artist: record.artist.clone(),
                local_title: record.title.clone(),
                local_album: record.album.clone(),
                match_found_for_record: result.found(),
                chosen: result.chosen == Some(i),
                candidate_id: candidate.id.clone(),
                candidate_artist: candidate.artist.clone(),
                candidate_title: candidate.title.clone(),
                candidate_album: candidate.album.clone(),
                candidate_year: candidate.release_year,
                strategy: breakdown.strategy.as_str(),
                final_score: breakdown.final_score,
                title_similarity: breakdown.title_similarity,
                artist_similarity: breakdown.artist_similarity,
                album_similarity: breakdown.album_similarity,
                duration_score: breakdown.duration_score,
                year_penalty: breakdown.year_penalty,
                album_artist_bonus: breakdown.album_artist_bonus,
                track_disc_bonus: breakdown.track_disc_bonus,
                live_mismatch_penalty: breakdown.live_mismatch_penalty,
                adjustments: serde_json::to_string(&breakdown.adjustments)
                    .unwrap_or_else(|_| "[]".to_string()),
                rejection: breakdown.rejection.clone(),
            });
        }
    }

    rows.sort_by(|a, b| {
        a.local_artist
            .cmp(&b.local_artist)
            .then_with(|| a.local_title.cmp(&b.local_title))
            .then_with(|| b.final_score.total_cmp(&a.final_score))
            .then_with(|| a.row_index.cmp(&b.row_index))
    });
    rows
}

// ============================================================================
// SQLite Writer
// ============================================================================

fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;

        CREATE TABLE summary (
            position INTEGER PRIMARY KEY,
            row_index INTEGER NOT NULL,
            artist TEXT,
            title TEXT,
            album TEXT,
            album_artist TEXT,
            year INTEGER,
            duration TEXT,
            found INTEGER NOT NULL,
            include_in_playlist INTEGER NOT NULL,
            confidence REAL,
            status TEXT NOT NULL,
            strategy TEXT,
            matched_id TEXT,
            matched_artist TEXT,
            matched_title TEXT,
            matched_album TEXT,
            matched_url TEXT,
            reason TEXT,
            extra TEXT NOT NULL
        );

        CREATE TABLE details (
            position INTEGER PRIMARY KEY,
            row_index INTEGER NOT NULL,
            local_artist TEXT NOT NULL,
            local_title TEXT NOT NULL,
            local_album TEXT NOT NULL,
            match_found_for_record INTEGER NOT NULL,
            chosen INTEGER NOT NULL,
            candidate_id TEXT NOT NULL,
            candidate_artist TEXT NOT NULL,
            candidate_title TEXT NOT NULL,
            candidate_album TEXT NOT NULL,
            candidate_year INTEGER,
            strategy TEXT NOT NULL,
            final_score REAL NOT NULL,
            title_similarity REAL NOT NULL,
            artist_similarity REAL NOT NULL,
            album_similarity REAL NOT NULL,
            duration_score REAL NOT NULL,
            year_penalty REAL NOT NULL,
            album_artist_bonus REAL NOT NULL,
            track_disc_bonus REAL NOT NULL,
            live_mismatch_penalty REAL NOT NULL,
            adjustments TEXT NOT NULL,
            rejection TEXT
        );

        CREATE INDEX idx_details_row ON details(row_index);",
    )
    .context("Failed to create report tables")?;
    Ok(())
}

fn write_summary(conn: &mut Connection, rows: &[SummaryRow]) -> Result<()> {
    let pb = create_progress_bar(rows.len() as u64, "Writing summary");

    for (chunk_index, chunk) in rows.chunks(WRITE_BATCH_SIZE).enumerate() {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO summary (position, row_index, artist, title, album, album_artist, year,
                    duration, found, include_in_playlist, confidence, status, strategy, matched_id,
                    matched_artist, matched_title, matched_album, matched_url, reason, extra)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                    ?18, ?19, ?20)",
            )?;

            for (i, row) in chunk.iter().enumerate() {
                let extra = serde_json::to_string(&row.extra)?;
                stmt.execute(params![
                    (chunk_index * WRITE_BATCH_SIZE + i) as i64,
                    row.row_index as i64,
                    row.artist,
                    row.title,
                    row.album,
                    row.album_artist,
                    row.year,
                    row.duration,
                    row.found,
                    row.include_in_playlist,
                    row.confidence,
                    row.status,
                    row.strategy,
                    row.matched_id,
                    row.matched_artist,
                    row.matched_title,
                    row.matched_album,
                    row.matched_url,
                    row.reason,
                    extra,
                ])?;
                pb.inc(1);
            }
        }
        tx.commit()?;
    }

    pb.finish_with_message(format!("Wrote {} summary rows", rows.len()));
    Ok(())
}

fn write_details(conn: &mut Connection, rows: &[DetailRow]) -> Result<()> {
    let pb = create_progress_bar(rows.len() as u64, "Writing details");

    for (chunk_index, chunk) in rows.chunks(WRITE_BATCH_SIZE).enumerate() {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO details (position, row_index, local_artist, local_title, local_album,
                    match_found_for_record, chosen, candidate_id, candidate_artist, candidate_title,
                    candidate_album, candidate_year, strategy, final_score, title_similarity,
                    artist_similarity, album_similarity, duration_score, year_penalty,
                    album_artist_bonus, track_disc_bonus, live_mismatch_penalty, adjustments,
                    rejection)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                    ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
            )?;

            for (i, row) in chunk.iter().enumerate() {
                stmt.execute(params![
                    (chunk_index * WRITE_BATCH_SIZE + i) as i64,
                    row.row_index as i64,
                    row.local_artist,
                    row.local_title,
                    row.local_album,
                    row.match_found_for_record,
                    row.chosen,
                    row.candidate_id,
                    row.candidate_artist,
                    row.candidate_title,
                    row.candidate_album,
                    row.candidate_year,
                    row.strategy,
                    row.final_score,
                    row.title_similarity,
                    row.artist_similarity,
                    row.album_similarity,
                    row.duration_score,
                    row.year_penalty,
                    row.album_artist_bonus,
                    row.track_disc_bonus,
                    row.live_mismatch_penalty,
                    row.adjustments,
                    row.rejection,
                ])?;
                pb.inc(1);
            }
        }
        tx.commit()?;
    }

    pb.finish_with_message(format!("Wrote {} detail rows", rows.len()));
    Ok(())
}

/// Build and write both report tables into a fresh database.
pub fn write_report(conn: &mut Connection, outcomes: &[RecordOutcome]) -> Result<()> {
    let summary = build_summary_rows(outcomes);
    let details = build_detail_rows(outcomes);

    create_tables(conn)?;
    write_summary(conn, &summary).context("Failed to write summary table")?;
    write_details(conn, &details).context("Failed to write details table")?;

    log::info!(
        "[REPORT] {} summary rows, {} detail rows",
        summary.len(),
        details.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::models::{CandidateTrack, LocalTrackRecord, MatchState};
    use crate::normalize::Normalizer;
    use crate::scoring::score;
    use crate::strategy::StrategyKind;

    fn candidate(id: &str, artist: &str, title: &str) -> CandidateTrack {
        CandidateTrack {
            id: id.to_string(),
            artist: artist.to_string(),
            title: title.to_string(),
            album: "Album".to_string(),
            album_artist: None,
            duration_seconds: None,
            release_year: Some(1968),
            track_number: None,
            disc_number: None,
            url: format!("https://example.com/track/{}", id),
        }
    }

    fn matched(record: LocalTrackRecord, candidates: &[CandidateTrack]) -> RecordOutcome {
        let config = MatchConfig::default();
        let normalizer = Normalizer::default();
        let audit: Vec<_> = candidates
            .iter()
            .map(|c| score(&record, c, &config, &normalizer, StrategyKind::ArtistTitle, 0))
            .collect();
        let best = crate::engine::select_best(&audit);
        let best_score = best.map(|i| audit[i].final_score);
        let chosen = best.filter(|&i| audit[i].final_score >= config.acceptance_threshold);
        RecordOutcome::Matched(MatchResult {
            record,
            state: if chosen.is_some() { MatchState::Found } else { MatchState::Exhausted },
            chosen,
            best_score,
            audit,
            strategies_issued: 1,
            strategies_failed: 0,
            duplicates_skipped: 0,
            stopped_early: false,
        })
    }

    fn outcomes() -> Vec<RecordOutcome> {
        let mut with_album_artist = LocalTrackRecord::new(0, "Paul McCartney", "Hey Jude");
        with_album_artist.album_artist = Some("The Beatles".to_string());
        with_album_artist
            .extra
            .insert("Genre".to_string(), Value::String("Rock".to_string()));

        let plain = LocalTrackRecord::new(1, "Wilson Pickett", "Hey Jude");

        let mut raw = ExtraColumns::new();
        raw.insert("Name".to_string(), Value::String("Orphan".to_string()));

        vec![
            matched(
                with_album_artist,
                &[
                    candidate("a", "Someone Else", "Other Song"),
                    candidate("b", "Paul McCartney", "Hey Jude"),
                ],
            ),
            matched(plain, &[candidate("c", "Nobody", "Hey Jude")]),
            RecordOutcome::Unprocessed {
                row_index: 2,
                reason: "missing required column 'Artist'".to_string(),
                raw,
            },
        ]
    }

    #[test]
    fn test_summary_rows() {
        let rows = build_summary_rows(&outcomes());
        assert_eq!(rows.len(), 3);

        // Absent album artist first, then by artist
        let order: Vec<usize> = rows.iter().map(|r| r.row_index).collect();
        assert_eq!(order, vec![2, 1, 0]);

        let unprocessed = &rows[0];
        assert_eq!(unprocessed.status, STATUS_UNPROCESSED);
        assert_eq!(unprocessed.title.as_deref(), Some("Orphan"));
        assert!(unprocessed.reason.as_deref().unwrap().contains("Artist"));
        assert!(!unprocessed.found);

        let not_found = &rows[1];
        assert_eq!(not_found.status, STATUS_NOT_FOUND);
        assert!(not_found.confidence.is_some());
        assert_eq!(not_found.matched_id, None);

        let found = &rows[2];
        assert_eq!(found.status, STATUS_FOUND);
        assert!(found.found && found.include_in_playlist);
        assert_eq!(found.matched_id.as_deref(), Some("b"));
        assert_eq!(found.strategy, Some("artist_title"));
        assert_eq!(found.extra.get("Genre"), Some(&Value::String("Rock".to_string())));
    }

    #[test]
    fn test_detail_rows_ordering() {
        let rows = build_detail_rows(&outcomes());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].local_artist, "Paul McCartney");
        assert_eq!(rows[0].candidate_id, "b");
        assert!(rows[0].chosen);
        assert!(rows[0].final_score >= rows[1].final_score);
        assert_eq!(rows[1].candidate_id, "a");
        assert!(!rows[1].chosen);
        assert_eq!(rows[2].local_artist, "Wilson Pickett");
        assert!(!rows[2].match_found_for_record);
    }

    #[test]
    fn test_write_report_to_sqlite() {
        let mut conn = Connection::open_in_memory().unwrap();
        write_report(&mut conn, &outcomes()).unwrap();

        let summary: i64 = conn
            .query_row("SELECT COUNT(*) FROM summary", [], |r| r.get(0))
            .unwrap();
        let details: i64 = conn
            .query_row("SELECT COUNT(*) FROM details", [], |r| r.get(0))
            .unwrap();
        assert_eq!(summary, 3);
        assert_eq!(details, 3);

        let (status, extra): (String, String) = conn
            .query_row(
                "SELECT status, extra FROM summary WHERE row_index = 0",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(status, STATUS_FOUND);
        assert_eq!(extra, r#"{"Genre":"Rock"}"#);

        let first: String = conn
            .query_row("SELECT status FROM summary ORDER BY position LIMIT 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(first, STATUS_UNPROCESSED);
    }
}
