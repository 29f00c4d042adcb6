//! YAML parse diagnostics for configuration files.
//!
//! Converts `serde_saphyr` errors into [`miette`] diagnostics pointing at the
//! offending location, with a hint for common mistakes.

// Scoped suppression for version-dependent lint false positives from
// miette/thiserror derive macros.
#![allow(clippy::allow_attributes, clippy::allow_attributes_without_reason)]

use miette::{Diagnostic, NamedSource, SourceSpan};
use serde_saphyr::{Error as YamlError, Location};
use thiserror::Error;

const YAML_HINTS: [(&str, &str); 4] = [
    (
        "did not find expected '-'",
        "Start list items with '-' and ensure proper indentation.",
    ),
    (
        "mapping values are not allowed",
        "Check for a stray ':' or add quotes around values where needed.",
    ),
    (
        "unknown field",
        "Check the key against the documented configuration sections.",
    ),
    (
        "missing field",
        "Add the required key; `api.base_uri` and each entity's `entity` are mandatory.",
    ),
];

/// Byte offset of a 1-based line and column, clamped to the source.
fn byte_index(src: &str, line: u64, column: u64) -> usize {
    let target_line = usize::try_from(line.saturating_sub(1)).unwrap_or(usize::MAX);
    let target_column = usize::try_from(column.saturating_sub(1)).unwrap_or(usize::MAX);
    let mut offset = 0usize;
    for (idx, segment) in src.split_inclusive('\n').enumerate() {
        if idx == target_line {
            let line = segment.trim_end_matches(['\n', '\r']);
            let column_offset = line
                .char_indices()
                .nth(target_column)
                .map_or(line.len(), |(byte_idx, _)| byte_idx);
            return offset + column_offset;
        }
        offset += segment.len();
    }
    src.len()
}

fn to_span(src: &str, loc: Location) -> SourceSpan {
    let at = byte_index(src, loc.line(), loc.column());
    let len = usize::from(src.as_bytes().get(at).is_some_and(|b| *b != b'\n'));
    SourceSpan::new(at.into(), len)
}

#[allow(unused_assignments)]
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(rest_steps::config::yaml))]
struct YamlDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("parse error here")]
    span: Option<SourceSpan>,
    #[help]
    help: Option<String>,
    #[source]
    source: YamlError,
    message: String,
}

fn hint_for(message: &str, src: &str, loc: Option<Location>) -> Option<String> {
    let tab_indented = loc.is_some_and(|loc| {
        let idx = usize::try_from(loc.line().saturating_sub(1)).unwrap_or(usize::MAX);
        src.lines()
            .nth(idx)
            .is_some_and(|line| line.chars().take_while(|c| c.is_whitespace()).any(|c| c == '\t'))
    });
    if tab_indented {
        return Some("Use spaces for indentation; tabs are invalid in YAML.".into());
    }
    let lower = message.to_lowercase();
    YAML_HINTS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, hint)| (*hint).to_owned())
}

/// Map a YAML error into a diagnostic naming `name` as the source.
#[must_use]
pub fn map_yaml_error(
    err: YamlError,
    src: &str,
    name: &str,
) -> Box<dyn Diagnostic + Send + Sync + 'static> {
    let loc = err.location();
    let (line, col, span) = loc.map_or((1, 1, None), |l| {
        (l.line(), l.column(), Some(to_span(src, l)))
    });
    let text = err.to_string();
    let help = hint_for(&text, src, loc);
    Box::new(YamlDiagnostic {
        src: NamedSource::new(name, src.to_owned()),
        span,
        help,
        source: err,
        message: format!("YAML parse error at line {line}, column {col}: {text}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("a: 1\nb: 2\n", 2, 1, 5)]
    #[case("a: 1\r\nb: 2\r\n", 2, 4, 9)]
    #[case("a: 1\n", 9, 1, 5)]
    #[case("héllo: 1\n", 1, 3, 3)]
    fn maps_locations_to_bytes(
        #[case] src: &str,
        #[case] line: u64,
        #[case] column: u64,
        #[case] expected: usize,
    ) {
        assert_eq!(byte_index(src, line, column), expected);
    }

    #[test]
    fn hints_match_known_messages() {
        assert_eq!(hint_for("anything", "a: 1\n", None), None);
        let lower = hint_for("mapping values are not allowed here", "a: b: c\n", None);
        assert!(lower.is_some_and(|h| h.contains("stray ':'")));
    }
}
