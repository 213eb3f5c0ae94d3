use std::sync::LazyLock;

use regex::Regex;

static SPEAKER_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]").expect("invalid speaker tag regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub speaker: String,
    pub content: String,
}

impl Segment {
    fn new(speaker: &str, content: &str) -> Self {
        Self {
            speaker: speaker.to_owned(),
            content: content.to_owned(),
        }
    }
}

/// Splits a reply into `[Speaker] text` segments. Each body runs until the
/// next tag or the end of the reply; text before the first tag is dropped.
/// Labels and bodies are returned untrimmed. A reply without any tag becomes
/// a single segment spoken by `fallback_speaker`.
pub fn split_segments(raw: &str, fallback_speaker: &str) -> Vec<Segment> {
    let tags: Vec<(usize, usize, &str)> = SPEAKER_TAG
        .captures_iter(raw)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let label = captures.get(1)?;
            Some((whole.start(), whole.end(), label.as_str()))
        })
        .collect();

    if tags.is_empty() {
        return vec![Segment::new(fallback_speaker, raw)];
    }

    tags.iter()
        .enumerate()
        .map(|(index, &(_, body_start, label))| {
            let body_end = tags.get(index + 1).map_or(raw.len(), |&(next, _, _)| next);
            Segment::new(label, &raw[body_start..body_end])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(segments: &[Segment]) -> Vec<(&str, &str)> {
        segments
            .iter()
            .map(|segment| (segment.speaker.as_str(), segment.content.as_str()))
            .collect()
    }

    #[test]
    fn splits_tagged_reply() {
        let segments = split_segments("[Alice] hi [Bob] bye", "X");
        assert_eq!(pairs(&segments), vec![("Alice", " hi "), ("Bob", " bye")]);
    }

    #[test]
    fn untagged_reply_falls_back() {
        let segments = split_segments("no tags here", "X");
        assert_eq!(pairs(&segments), vec![("X", "no tags here")]);
    }

    #[test]
    fn empty_tag_is_not_a_label() {
        let segments = split_segments("[] nothing", "X");
        assert_eq!(pairs(&segments), vec![("X", "[] nothing")]);
    }

    #[test]
    fn bodies_span_newlines_and_may_be_empty() {
        let segments = split_segments("lead [A][ B ] one\ntwo\n", "X");
        assert_eq!(pairs(&segments), vec![("A", ""), (" B ", " one\ntwo\n")]);
    }

    #[test]
    fn unterminated_bracket_joins_next_label() {
        let segments = split_segments("[A] x [y [B] z", "X");
        assert_eq!(pairs(&segments), vec![("A", " x "), ("y [B", " z")]);
    }
}
