use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::SqlMapperError;

lazy_static! {
    static ref NAME_MARKER: Regex =
        Regex::new(r"^\s*--\s*name\s*=\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*$")
            .expect("statement marker pattern is valid");
}

/// Name of the statement started by `line`, if the line is a `-- name=<identifier>` marker.
#[must_use]
pub fn marker_name(line: &str) -> Option<&str> {
    NAME_MARKER
        .captures(line.trim_end_matches(['\r', '\n']))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Split a `.sql` source into `(name, template)` pairs in file order.
///
/// Each block runs from the line after its marker up to the next marker or end of input, with
/// line endings kept verbatim. Text before the first marker is ignored.
///
/// # Errors
/// Returns `SqlMapperError::DuplicateStatement` if a name appears twice in `source`.
pub fn parse_statements(source: &str) -> Result<Vec<(String, String)>, SqlMapperError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut entries: Vec<(String, String)> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut current: Option<(String, String)> = None;

    for line in source.split_inclusive('\n') {
        if let Some(name) = marker_name(line) {
            if !seen.insert(name.to_owned()) {
                return Err(SqlMapperError::DuplicateStatement {
                    name: name.to_owned(),
                    detail: "declared twice in the same source".into(),
                });
            }
            entries.extend(current.take());
            current = Some((name.to_owned(), String::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push_str(line);
        }
    }
    entries.extend(current);
    Ok(entries)
}
