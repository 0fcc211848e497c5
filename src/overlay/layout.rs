//! Word segmentation and per-word overlay frames.

use std::ops::Range;

use serde::Serialize;

use crate::geometry::{to_overlay_space, Rect};
use crate::models::WindowFrame;

/// A word of the focused element's value. `range` is in UTF-16 code units,
/// which is what the platform range query consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordSpan {
    pub text: String,
    pub range: Range<usize>,
}

/// Splits on whitespace. The running offset advances by the word length plus
/// exactly one separator, so ranges drift after runs of more than one
/// whitespace character (double spaces, blank lines). Known limitation, kept
/// so that ranges line up with what the annotation side computes.
pub fn segment_words(value: &str) -> Vec<WordSpan> {
    let mut offset = 0;
    let mut spans = Vec::new();

    for word in value.split_whitespace() {
        let len = word.encode_utf16().count();
        spans.push(WordSpan {
            text: word.to_string(),
            range: offset..offset + len,
        });
        offset += len + 1;
    }

    spans
}

/// The word as sent to the lookup service: leading and trailing punctuation
/// removed. Empty when nothing alphanumeric is left.
pub fn lookup_key(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric())
}

/// Whether `word` still sits at `range` inside `value`.
pub fn word_at(value: &str, range: &Range<usize>, word: &str) -> bool {
    let units: Vec<u16> = value.encode_utf16().collect();
    match units.get(range.clone()) {
        Some(slice) => slice.iter().copied().eq(word.encode_utf16()),
        None => false,
    }
}

/// Turns the accessibility-space bounds of a word into the frame of its
/// overlay. Words entirely outside the window are scrolled out of view and
/// get no frame; partially visible words are clipped to the window first.
pub fn overlay_frame(
    bounds: Rect,
    window: Option<&WindowFrame>,
    screen_height: f64,
    padding: f64,
) -> Option<Rect> {
    if bounds.is_empty() {
        return None;
    }

    let visible = match window {
        Some(window) => bounds.intersection(&window.rect())?,
        None => bounds,
    };

    Some(to_overlay_space(visible, screen_height).padded_horizontally(padding))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(spans: &[WordSpan]) -> Vec<(&str, Range<usize>)> {
        spans
            .iter()
            .map(|span| (span.text.as_str(), span.range.clone()))
            .collect()
    }

    #[test]
    fn segments_single_spaced_sentence() {
        let spans = segment_words("The cat sat");
        assert_eq!(
            pairs(&spans),
            vec![("The", 0..3), ("cat", 4..7), ("sat", 8..11)]
        );
    }

    #[test]
    fn span_carries_only_word_and_range() {
        let spans = segment_words("The cat");
        assert_eq!(
            serde_json::to_value(&spans[1]).unwrap(),
            serde_json::json!({ "text": "cat", "range": { "start": 4, "end": 7 } })
        );
    }

    #[test]
    fn double_space_drifts_by_one() {
        // "sat" actually starts at 9
        let spans = segment_words("The cat  sat");
        assert_eq!(spans[2].range, 8..11);
        assert!(!word_at("The cat  sat", &spans[2].range, "sat"));
    }

    #[test]
    fn ranges_count_utf16_units() {
        let spans = segment_words("naïve 𝔘nit ok");
        assert_eq!(
            pairs(&spans),
            vec![("naïve", 0..5), ("𝔘nit", 6..11), ("ok", 12..14)]
        );
        assert!(word_at("naïve 𝔘nit ok", &spans[1].range, "𝔘nit"));
    }

    #[test]
    fn lookup_key_strips_outer_punctuation() {
        assert_eq!(lookup_key("(Flask),"), "Flask");
        assert_eq!(lookup_key("don't"), "don't");
        assert_eq!(lookup_key("--"), "");
    }

    #[test]
    fn frame_is_clipped_translated_and_padded() {
        let window = WindowFrame(Rect::new(0.0, 100.0, 200.0, 300.0));
        let bounds = Rect::new(190.0, 120.0, 30.0, 16.0);

        let frame = overlay_frame(bounds, Some(&window), 1000.0, 1.0).unwrap();
        assert_eq!(frame, Rect::new(189.0, 864.0, 12.0, 16.0));
    }

    #[test]
    fn scrolled_out_word_has_no_frame() {
        let window = WindowFrame(Rect::new(0.0, 100.0, 200.0, 300.0));
        let bounds = Rect::new(10.0, 500.0, 30.0, 16.0);
        assert!(overlay_frame(bounds, Some(&window), 1000.0, 1.0).is_none());
    }
}
