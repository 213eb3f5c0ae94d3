use std::sync::LazyLock;

use regex::Regex;

// Stage directions such as `(nods)` or `（笑）`. Either bracket style may open or
// close a span, and a span stops at the first closing bracket.
static STAGE_DIRECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[（(][^）)]*[）)]").expect("invalid stage direction regex"));

/// Cleans one reply segment: drops stage directions, then a leading speaker
/// prefix, then surrounding whitespace.
///
/// Prefixes are stripped until none is left at the start, so feeding the
/// output back in yields the same string.
pub fn strip_noise(text: &str, prefix: Option<&Regex>) -> String {
    let mut text = STAGE_DIRECTION.replace_all(text, "").into_owned();

    if let Some(prefix) = prefix {
        while let Some(end) = prefix.find(&text).map(|found| found.end()) {
            if end == 0 {
                break;
            }
            text.replace_range(..end, "");
        }
    }

    text.trim().to_owned()
}
