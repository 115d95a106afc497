//! Text normalization and duration parsing for catalog matching.
//!
//! Fixed cleanup patterns live in statics; the qualifier-phrase patterns are
//! built from config, so callers hold a [`Normalizer`] value instead.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::config::MatchConfig;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Any bracketed or parenthetical group: "(Live)", "[Mono]"
pub static BRACKETED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:\([^)]*\)|\[[^\]]*\])").unwrap());

/// Standalone roman numerals I-V, dropped from search text only
pub static ROMAN_NUMERALS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:iv|v|i{1,3})\b").unwrap());

/// "live" as a word, in any casing
pub static LIVE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\blive\b").unwrap());

/// Anything that is not a letter, digit or whitespace
pub static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s]+").unwrap());

/// Regex to collapse runs of whitespace into single space
pub static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
/// Used to filter out accents during normalization.
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to ASCII by applying NFKD decomposition and removing combining marks.
/// e.g., "Beyoncé" → "beyonce", "naïve" → "naive"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    // Then transliterate any remaining non-ASCII (Cyrillic, Hebrew, CJK, etc.)
    any_ascii(&stripped).to_lowercase()
}

/// Convert curly quotes to straight quotes and " & " to " and ".
pub fn normalize_punctuation(s: &str) -> String {
    s.replace(['\u{2018}', '\u{2019}', '\u{00B4}', '\u{0060}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2013}', '\u{2014}'], "-")
        .replace(" & ", " and ")
}

/// Trim and collapse internal whitespace.
pub fn collapse_whitespace(s: &str) -> String {
    let single = s.replace(['\t', '\n', '\r'], " ");
    MULTI_SPACE.replace_all(single.trim(), " ").to_string()
}

/// Remove every bracketed/parenthetical group, keeping the original casing.
/// e.g., "Hey Jude (Remastered 2015) [Mono]" → "Hey Jude"
pub fn clean_string(text: &str) -> String {
    collapse_whitespace(&BRACKETED.replace_all(text, ""))
}

/// Clean more aggressively for search text: also drops standalone roman numerals.
pub fn sanitize_for_search(text: &str) -> String {
    let cleaned = clean_string(text);
    collapse_whitespace(&ROMAN_NUMERALS.replace_all(&cleaned, ""))
}

pub fn mentions_live(text: &str) -> bool {
    LIVE_WORD.is_match(text)
}

/// Parse a "M:SS" or "H:MM:SS" duration into seconds.
/// Returns None for anything malformed; callers treat that as missing data.
pub fn parse_duration(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let parts = s
        .split(':')
        .map(|p| {
            let p = p.trim();
            if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else {
                p.parse::<u64>().ok()
            }
        })
        .collect::<Option<Vec<u64>>>()?;

    let total = match parts.as_slice() {
        [minutes, seconds] if *seconds < 60 => minutes.checked_mul(60)?.checked_add(*seconds)?,
        [hours, minutes, seconds] if *minutes < 60 && *seconds < 60 => hours
            .checked_mul(3600)?
            .checked_add(minutes * 60 + seconds)?,
        _ => return None,
    };
    Some(total as f64)
}

// ============================================================================
// NORMALIZER
// ============================================================================

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Escaped phrase with a word boundary on each edge that is a word character.
/// "feat." gets no trailing `\b`, since "." followed by a space is not a boundary.
fn phrase_pattern(phrase: &str) -> String {
    let lead = if phrase.starts_with(is_word_char) { r"\b" } else { "" };
    let trail = if phrase.ends_with(is_word_char) { r"\b" } else { "" };
    format!("{}{}{}", lead, regex::escape(phrase).replace(' ', r"\s+"), trail)
}

/// Canonicalizes text for comparison. Built once from the config's qualifier phrases.
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Bracketed group containing a qualifier phrase: "(Remastered 2015)", "[Live]"
    qualifier_group: Option<Regex>,
    /// Dash suffix containing a qualifier phrase: "- Remastered 2015", "- Live at Wembley"
    qualifier_suffix: Option<Regex>,
}

impl Normalizer {
    pub fn new<I, S>(qualifier_phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut phrases: Vec<String> = qualifier_phrases
            .into_iter()
            .map(|p| collapse_whitespace(&normalize_punctuation(p.as_ref())))
            .filter(|p| !p.is_empty())
            .collect();
        if phrases.is_empty() {
            return Self {
                qualifier_group: None,
                qualifier_suffix: None,
            };
        }
        // Longest first so "remastered" wins over "remaster"
        phrases.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        phrases.dedup();

        let alternation = phrases
            .iter()
            .map(|p| phrase_pattern(p))
            .collect::<Vec<_>>()
            .join("|");

        let group = format!(
            r"(?i)\s*(?:\([^()]*?(?:{0})[^()]*\)|\[[^\[\]]*?(?:{0})[^\[\]]*\])",
            alternation
        );
        let suffix = format!(r"(?i)\s+-\s+[^-]*?(?:{0})[^-]*$", alternation);

        // Escaped phrases always form a valid pattern
        Self {
            qualifier_group: Regex::new(&group).ok(),
            qualifier_suffix: Regex::new(&suffix).ok(),
        }
    }

    pub fn from_config(config: &MatchConfig) -> Self {
        Self::new(&config.qualifier_phrases)
    }

    /// Remove qualifier annotations but keep everything else as written.
    /// Falls back to the input when stripping would leave nothing.
    pub fn strip_qualifiers(&self, text: &str) -> String {
        let mut result = normalize_punctuation(text);
        if let Some(group) = &self.qualifier_group {
            result = group.replace_all(&result, "").to_string();
        }
        if let Some(suffix) = &self.qualifier_suffix {
            result = suffix.replace(&result, "").to_string();
        }
        let result = collapse_whitespace(&result);
        if result.is_empty() {
            collapse_whitespace(text)
        } else {
            result
        }
    }

    /// Canonical comparison form: qualifiers stripped, ASCII-folded, lower-cased,
    /// punctuation removed, whitespace collapsed.
    /// "Hey Jude (Remastered 2015)" and "Hey Jude" both become "hey jude".
    pub fn normalize_text(&self, text: &str) -> String {
        let stripped = self.strip_qualifiers(text);
        let folded = fold_to_ascii(&stripped).replace('\'', "");
        let spaced = PUNCTUATION.replace_all(&folded, " ");
        collapse_whitespace(&spaced)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::from_config(&MatchConfig::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================
