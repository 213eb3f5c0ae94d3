use itertools::Itertools;
use regex::Regex;

/// Builds a case-insensitive matcher for a leading `Name:` / `Name：` that a
/// model sometimes prepends to its reply. Blank names are ignored; `None`
/// when nothing is left to match.
pub fn build_prefix_pattern<S: AsRef<str>>(names: &[S]) -> Option<Regex> {
    let alternation = names
        .iter()
        .map(|name| name.as_ref())
        .filter(|name| !name.trim().is_empty())
        .map(regex::escape)
        .join("|");

    if alternation.is_empty() {
        return None;
    }

    match Regex::new(&format!(r"(?i)^\s*(?:{alternation})[：:]\s*")) {
        Ok(pattern) => Some(pattern),
        Err(error) => {
            tracing::warn!(%error, "name prefix pattern rejected, prefixes will not be stripped");
            None
        }
    }
}
