use serde::Deserialize;

use super::notes::NoteWindowId;
use super::registry::OverlayId;

/// Pointer and click input coming back from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UiEvent {
    WordHovered { id: OverlayId, hovering: bool },
    SuggestionHovered { hovering: bool },
    SuggestionDismissed,
    NoteSelected { overlay: OverlayId, note_id: String },
    NoteDismissed { id: NoteWindowId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_tagged_events() {
        let event: UiEvent =
            serde_json::from_str(r#"{"event":"word_hovered","id":4,"hovering":true}"#).unwrap();
        assert_eq!(
            event,
            UiEvent::WordHovered {
                id: OverlayId(4),
                hovering: true
            }
        );

        let event: UiEvent = serde_json::from_str(r#"{"event":"note_dismissed","id":2}"#).unwrap();
        assert_eq!(event, UiEvent::NoteDismissed { id: NoteWindowId(2) });
    }
}
