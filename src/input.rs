//! Input reader for local catalog rows.
//!
//! Rows come from a JSON array of objects keyed by the usual export headers.
//! Each row is validated on its own: a bad row becomes an [`InputError`] and
//! the rest of the file is still read.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{ExtraColumns, LocalTrackRecord};
use crate::normalize::parse_duration;

pub const COL_ARTIST: &str = "Artist";
pub const COL_TITLE: &str = "Name";
pub const COL_ALBUM: &str = "Album";
pub const COL_YEAR: &str = "Year";
pub const COL_DURATION: &str = "Duration";
pub const COL_ALBUM_ARTIST: &str = "Album Artist";
pub const COL_TRACK_NUMBER: &str = "Track #";
pub const COL_DISC_NUMBER: &str = "Disc #";

const KNOWN_COLUMNS: &[&str] = &[
    COL_ARTIST,
    COL_TITLE,
    COL_ALBUM,
    COL_YEAR,
    COL_DURATION,
    COL_ALBUM_ARTIST,
    COL_TRACK_NUMBER,
    COL_DISC_NUMBER,
];

/// A row that could not be turned into a record. The run continues without it.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("row {row_index}: {reason}")]
pub struct InputError {
    pub row_index: usize,
    pub reason: String,
    /// The row as read, so it can still be reported.
    pub raw: ExtraColumns,
}

pub type InputRow = std::result::Result<LocalTrackRecord, InputError>;

/// Read a JSON array of row objects.
pub fn read_rows(path: &Path) -> Result<Vec<InputRow>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    parse_rows(&contents).with_context(|| format!("Failed to parse input file: {}", path.display()))
}

pub fn parse_rows(json: &str) -> Result<Vec<InputRow>> {
    let value: Value = serde_json::from_str(json).context("Input is not valid JSON")?;
    let Value::Array(items) = value else {
        bail!("Input must be a JSON array of row objects");
    };

    Ok(items
        .into_iter()
        .enumerate()
        .map(|(row_index, item)| match item {
            Value::Object(map) => parse_row(row_index, map),
            other => Err(InputError {
                row_index,
                reason: format!("expected an object, found {}", json_type(&other)),
                raw: ExtraColumns::new(),
            }),
        })
        .collect())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Non-blank text; numbers are accepted and rendered as written.
fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer from a JSON number or numeric string ("1968", "1968.0", 7).
/// Returns Err with a message when present but not an integer.
fn integer(map: &Map<String, Value>, key: &str) -> std::result::Result<Option<i64>, String> {
    let invalid = || format!("column '{}' is not a whole number", key);
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => Ok(Some(i)),
            None => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Some(f as i64)),
                _ => Err(invalid()),
            },
        },
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Some(i));
            }
            match s.parse::<f64>() {
                Ok(f) if f.fract() == 0.0 && f.is_finite() => Ok(Some(f as i64)),
                _ => Err(invalid()),
            }
        }
        Some(_) => Err(invalid()),
    }
}

fn parse_row(row_index: usize, map: Map<String, Value>) -> InputRow {
    let fail = |reason: String, map: &Map<String, Value>| InputError {
        row_index,
        reason,
        raw: map.clone(),
    };

    let Some(artist) = text(&map, COL_ARTIST) else {
        return Err(fail(format!("missing required column '{}'", COL_ARTIST), &map));
    };
    let Some(title) = text(&map, COL_TITLE) else {
        return Err(fail(format!("missing required column '{}'", COL_TITLE), &map));
    };

    let year = integer(&map, COL_YEAR).map_err(|e| fail(e, &map))?;
    let year = match year {
        Some(y) => {
            let year = i32::try_from(y)
                .map_err(|_| fail(format!("year {} out of range", y), &map))?;
            Some(year)
        }
        None => None,
    };

    let positive = |key: &str| -> std::result::Result<Option<u32>, InputError> {
        match integer(&map, key).map_err(|e| fail(e, &map))? {
            Some(n) if n > 0 => u32::try_from(n)
                .map(Some)
                .map_err(|_| fail(format!("column '{}' out of range", key), &map)),
            // 0 / negative track numbers carry no information
            _ => Ok(None),
        }
    };
    let track_number = positive(COL_TRACK_NUMBER)?;
    let disc_number = positive(COL_DISC_NUMBER)?;

    let duration_raw = text(&map, COL_DURATION);
    let duration_seconds = duration_raw.as_deref().and_then(parse_duration);
    if let (Some(raw), None) = (&duration_raw, duration_seconds) {
        log::debug!("[INPUT] row {}: unparsable duration '{}', ignoring", row_index, raw);
    }

    let album = text(&map, COL_ALBUM).unwrap_or_default();
    let album_artist = text(&map, COL_ALBUM_ARTIST);

    let extra: ExtraColumns = map
        .into_iter()
        .filter(|(key, _)| !KNOWN_COLUMNS.contains(&key.as_str()))
        .collect();

    Ok(LocalTrackRecord {
        row_index,
        artist,
        title,
        album,
        year,
        duration_raw,
        duration_seconds,
        album_artist,
        track_number,
        disc_number,
        extra,
    })
}
