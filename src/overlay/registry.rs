//! Ownership of the live word overlays.
//!
//! Every window the reconciler creates goes through here, so the collection
//! and the presentation side cannot disagree about what is on screen.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::models::Note;

use super::layout::word_at;
use super::presenter::{OverlayPresenter, PresenterCommand};

/// Suggestions hang just above their word, overlapping it by this much.
const SUGGESTION_OVERLAP: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverlayId(pub u64);

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "overlay#{}", self.0)
    }
}

/// A word that should carry an overlay, with its frame in overlay space.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub word: String,
    pub range: Range<usize>,
    pub frame: Rect,
    pub notes: Vec<Note>,
}

#[derive(Debug, Clone)]
pub struct OverlayItem {
    pub id: OverlayId,
    pub word: String,
    pub range: Range<usize>,
    pub frame: Rect,
    pub notes: Vec<Note>,
    /// Frame of the suggestion window while one is shown for this item.
    pub suggestion: Option<Rect>,
}

impl OverlayItem {
    fn matches(&self, word: &str, frame: &Rect) -> bool {
        self.word == word && self.frame == *frame
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub destroyed: usize,
    pub updated: usize,
    pub kept: usize,
}

#[derive(Debug, Default)]
pub struct OverlayRegistry {
    next_id: u64,
    items: Vec<OverlayItem>,
    suggestion_owner: Option<OverlayId>,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[OverlayItem] {
        &self.items
    }

    pub fn get(&self, id: OverlayId) -> Option<&OverlayItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn suggestion_owner(&self) -> Option<OverlayId> {
        self.suggestion_owner
    }

    /// Creates an overlay unless one already exists for this exact
    /// (word, frame) pair, in which case that one's id is returned and the
    /// presenter hears nothing.
    pub fn create(&mut self, placement: Placement, presenter: &mut dyn OverlayPresenter) -> OverlayId {
        if let Some(existing) = self
            .items
            .iter()
            .find(|item| item.matches(&placement.word, &placement.frame))
        {
            return existing.id;
        }

        self.next_id += 1;
        let id = OverlayId(self.next_id);
        presenter.apply(PresenterCommand::CreateWord {
            id,
            word: placement.word.clone(),
            frame: placement.frame,
        });

        self.items.push(OverlayItem {
            id,
            word: placement.word,
            range: placement.range,
            frame: placement.frame,
            notes: placement.notes,
            suggestion: None,
        });
        id
    }

    pub fn destroy(&mut self, id: OverlayId, presenter: &mut dyn OverlayPresenter) -> bool {
        let Some(index) = self.items.iter().position(|item| item.id == id) else {
            return false;
        };

        if self.suggestion_owner == Some(id) {
            self.hide_suggestion(presenter);
        }

        self.items.remove(index);
        presenter.apply(PresenterCommand::DestroyWord { id });
        true
    }

    /// Makes the live set equal to `placements` by exact (word, frame)
    /// equality. Matching items are left alone, so an unchanged word never
    /// flickers.
    pub fn sync(
        &mut self,
        placements: Vec<Placement>,
        presenter: &mut dyn OverlayPresenter,
    ) -> SyncReport {
        let mut report = SyncReport::default();

        let stale: Vec<OverlayId> = self
            .items
            .iter()
            .filter(|item| {
                !placements
                    .iter()
                    .any(|placement| item.matches(&placement.word, &placement.frame))
            })
            .map(|item| item.id)
            .collect();

        for id in stale {
            if self.destroy(id, presenter) {
                report.destroyed += 1;
            }
        }

        for placement in placements {
            let before = self.items.len();
            let id = self.create(placement.clone(), presenter);
            if self.items.len() > before {
                report.created += 1;
            } else if let Some(item) = self.items.iter_mut().find(|item| item.id == id) {
                item.notes = placement.notes;
                item.range = placement.range;
                report.kept += 1;
            }
        }

        report
    }

    /// Geometry-only refresh. Items are matched by (word, range) and moved in
    /// place; items with no counterpart are destroyed, new counterparts are
    /// created.
    pub fn reposition(
        &mut self,
        placements: Vec<Placement>,
        presenter: &mut dyn OverlayPresenter,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        let mut unmatched = Vec::new();

        let mut remaining: Vec<Placement> = placements;
        let ids: Vec<OverlayId> = self.items.iter().map(|item| item.id).collect();

        for id in ids {
            let Some(item) = self.items.iter().find(|item| item.id == id) else {
                continue;
            };
            let position = remaining
                .iter()
                .position(|placement| placement.word == item.word && placement.range == item.range);

            match position {
                Some(index) => {
                    let placement = remaining.swap_remove(index);
                    if self.move_item(id, placement.frame, presenter) {
                        report.updated += 1;
                    } else {
                        report.kept += 1;
                    }
                }
                None => unmatched.push(id),
            }
        }

        for id in unmatched {
            if self.destroy(id, presenter) {
                report.destroyed += 1;
            }
        }

        for placement in remaining {
            let before = self.items.len();
            self.create(placement, presenter);
            if self.items.len() > before {
                report.created += 1;
            }
        }

        report
    }

    /// Destroys every item whose word no longer sits at its range in `value`.
    /// Returns how many went away.
    pub fn retain_consistent(&mut self, value: &str, presenter: &mut dyn OverlayPresenter) -> usize {
        let stale: Vec<OverlayId> = self
            .items
            .iter()
            .filter(|item| !word_at(value, &item.range, &item.word))
            .map(|item| item.id)
            .collect();

        stale
            .into_iter()
            .filter(|id| self.destroy(*id, presenter))
            .count()
    }

    /// Removes every overlay and the suggestion window.
    pub fn delete_all(&mut self, presenter: &mut dyn OverlayPresenter) {
        self.hide_suggestion(presenter);
        for item in self.items.drain(..) {
            presenter.apply(PresenterCommand::DestroyWord { id: item.id });
        }
    }

    /// Shows the suggestion window for `id`, replacing any other one. Returns
    /// false when the item does not exist.
    pub fn show_suggestion(&mut self, id: OverlayId, presenter: &mut dyn OverlayPresenter) -> bool {
        if self.suggestion_owner == Some(id) {
            return self.get(id).is_some();
        }
        if self.get(id).is_none() {
            return false;
        }

        self.hide_suggestion(presenter);

        let Some(item) = self.items.iter_mut().find(|item| item.id == id) else {
            return false;
        };
        let frame = suggestion_frame(item.frame);
        item.suggestion = Some(frame);
        self.suggestion_owner = Some(id);

        presenter.apply(PresenterCommand::ShowSuggestion {
            owner: id,
            frame,
            notes: item.notes.clone(),
        });
        true
    }

    pub fn hide_suggestion(&mut self, presenter: &mut dyn OverlayPresenter) {
        let Some(owner) = self.suggestion_owner.take() else {
            return;
        };

        if let Some(item) = self.items.iter_mut().find(|item| item.id == owner) {
            item.suggestion = None;
        }
        presenter.apply(PresenterCommand::HideSuggestion { owner });
    }

    fn move_item(&mut self, id: OverlayId, frame: Rect, presenter: &mut dyn OverlayPresenter) -> bool {
        let Some(item) = self.items.iter_mut().find(|item| item.id == id) else {
            return false;
        };
        if item.frame == frame {
            return false;
        }

        item.frame = frame;
        presenter.apply(PresenterCommand::UpdateWord { id, frame });

        if item.suggestion.is_some() {
            let suggestion = suggestion_frame(frame);
            item.suggestion = Some(suggestion);
            let notes = item.notes.clone();
            presenter.apply(PresenterCommand::ShowSuggestion {
                owner: id,
                frame: suggestion,
                notes,
            });
        }
        true
    }
}

/// Same size as the word, sitting on top of it.
fn suggestion_frame(word: Rect) -> Rect {
    Rect::new(
        word.min_x(),
        word.max_y() - SUGGESTION_OVERLAP,
        word.width,
        word.height,
    )
}
