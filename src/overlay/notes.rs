use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::models::Note;

use super::presenter::{OverlayPresenter, PresenterCommand};

const NOTE_ORIGIN_X: f64 = 100.0;
const NOTE_WIDTH: f64 = 250.0;
const NOTE_HEIGHT: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteWindowId(pub u64);

impl fmt::Display for NoteWindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "note#{}", self.0)
    }
}

/// Floating note windows opened from a suggestion. They are independent of
/// the word overlays and stay open across text changes.
#[derive(Debug, Default)]
pub struct NoteWindows {
    next_id: u64,
    open: Vec<(NoteWindowId, Note)>,
}

impl NoteWindows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed spot on the left edge, vertically centred on the screen.
    pub fn frame(screen_height: f64) -> Rect {
        Rect::new(NOTE_ORIGIN_X, screen_height / 2.0, NOTE_WIDTH, NOTE_HEIGHT)
    }

    pub fn open(
        &mut self,
        note: Note,
        screen_height: f64,
        presenter: &mut dyn OverlayPresenter,
    ) -> NoteWindowId {
        self.next_id += 1;
        let id = NoteWindowId(self.next_id);

        presenter.apply(PresenterCommand::OpenNote {
            id,
            note: note.clone(),
            frame: Self::frame(screen_height),
        });
        self.open.push((id, note));
        id
    }

    pub fn close(&mut self, id: NoteWindowId, presenter: &mut dyn OverlayPresenter) -> bool {
        let Some(index) = self.open.iter().position(|(open, _)| *open == id) else {
            return false;
        };

        self.open.remove(index);
        presenter.apply(PresenterCommand::CloseNote { id });
        true
    }

    pub fn close_all(&mut self, presenter: &mut dyn OverlayPresenter) {
        for (id, _) in self.open.drain(..) {
            presenter.apply(PresenterCommand::CloseNote { id });
        }
    }

    pub fn get(&self, id: NoteWindowId) -> Option<&Note> {
        self.open
            .iter()
            .find(|(open, _)| *open == id)
            .map(|(_, note)| note)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<PresenterCommand>);

    impl OverlayPresenter for Recorder {
        fn apply(&mut self, command: PresenterCommand) {
            self.0.push(command);
        }
    }

    #[test]
    fn opens_at_fixed_frame_and_closes_individually() {
        let mut recorder = Recorder::default();
        let mut notes = NoteWindows::new();

        let first = notes.open(Note::new("Flask", "micro"), 900.0, &mut recorder);
        let second = notes.open(Note::new("Python", "lang"), 900.0, &mut recorder);
        assert_ne!(first, second);

        match &recorder.0[0] {
            PresenterCommand::OpenNote { frame, .. } => {
                assert_eq!(*frame, Rect::new(100.0, 450.0, 250.0, 200.0))
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(notes.close(first, &mut recorder));
        assert!(!notes.close(first, &mut recorder));
        assert_eq!(notes.len(), 1);
        assert_eq!(notes.get(second).map(|n| n.title.as_str()), Some("Python"));

        notes.close_all(&mut recorder);
        assert!(notes.is_empty());
        assert_eq!(
            recorder.0.last(),
            Some(&PresenterCommand::CloseNote { id: second })
        );
    }
}
