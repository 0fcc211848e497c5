use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An annotation returned by the lookup service for a word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// The service may omit ids; a fresh one is assigned so selections can
    /// still refer to the note.
    #[serde(default = "new_note_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

fn new_note_id() -> String {
    Uuid::new_v4().to_string()
}

impl Note {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: new_note_id(),
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_id_gets_generated() {
        let note: Note = serde_json::from_str(r#"{"title":"Flask","content":"micro framework"}"#)
            .unwrap();
        assert!(!note.id.is_empty());
        assert_eq!(note.title, "Flask");
    }

    #[test]
    fn title_only_note_has_no_content() {
        let note: Note = serde_json::from_str(r#"{"id":"n1","title":"Flask"}"#).unwrap();
        assert_eq!(note.id, "n1");
        assert!(!note.has_content());
    }
}
