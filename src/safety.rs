//! Safety utilities to prevent accidental file overwrites.
//!
//! The report file is deleted and recreated on every run, so the output path
//! is checked against the inputs before anything is removed.

use anyhow::{bail, Result};
use std::path::Path;

/// Pattern every report file name must contain.
pub const OUTPUT_PATTERN: &str = "matched";

/// Validates that an output path is safe to overwrite.
///
/// Checks:
/// - Output filename must contain `required_pattern`
/// - Output cannot be any of the source paths (compared canonically when
///   both exist)
/// - Output cannot carry a source-data extension (`.json`)
pub fn validate_output_path(
    output: &Path,
    required_pattern: &str,
    source_paths: &[&Path],
) -> Result<()> {
    let output_name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if !output_name.contains(required_pattern) {
        bail!(
            "Safety check failed: output file '{}' must contain '{}' in the name",
            output.display(),
            required_pattern
        );
    }

    for source in source_paths {
        let same = output == *source
            || matches!(
                (output.canonicalize(), source.canonicalize()),
                (Ok(a), Ok(b)) if a == b
            );
        if same {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    // Inputs and configs are JSON; the report is SQLite
    let extension = output.extension().and_then(|e| e.to_str()).unwrap_or("");
    if extension.eq_ignore_ascii_case("json") {
        bail!(
            "Safety check failed: output '{}' looks like an input file (.json)",
            output.display()
        );
    }

    Ok(())
}
