//! The reconciliation state machine.
//!
//! Every pass starts from scratch: resolve focus, read a fresh snapshot and
//! compare it with the previous one. Text changes start a new generation and
//! ask the caller for a lookup; lookup results are only applied while their
//! generation is still current. Geometry-only changes move the existing
//! overlays without touching the lookup service.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::accessibility::{AccessibilityApi, ElementInspector, FocusResolver, ProcessHandle};
use crate::geometry::{to_overlay_space, Rect};
use crate::models::{FocusedElement, Note, WindowFrame};

use super::events::UiEvent;
use super::hover::{HoverMachine, HoverState};
use super::layout::{lookup_key, overlay_frame, segment_words};
use super::notes::{NoteWindowId, NoteWindows};
use super::presenter::{OverlayPresenter, PresenterCommand};
use super::registry::{OverlayRegistry, Placement, SyncReport};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// The element overlays are currently drawn for. `focused` is the element
/// holding keyboard focus, `element` the text element found at or below it.
#[derive(Debug, Clone)]
pub struct FocusTarget<E> {
    pub process: ProcessHandle,
    pub focused: E,
    pub element: E,
    pub window: Option<E>,
}

/// Words to resolve for one generation of the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub generation: u64,
    pub words: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LookupOutcome {
    pub generation: u64,
    pub matches: HashMap<String, Vec<Note>>,
}

/// A selected note that arrived without content. `fallback` is opened if the
/// full note cannot be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFetch {
    pub word: String,
    pub fallback: Note,
}

/// What a pass learned about focus, for the change notifier, plus the lookup
/// the caller should run.
#[derive(Debug, Clone)]
pub struct Pass<E> {
    pub process: Option<ProcessHandle>,
    pub element: Option<E>,
    pub window: Option<E>,
    pub lookup: Option<LookupRequest>,
}

impl<E> Pass<E> {
    fn without_target(process: Option<ProcessHandle>, element: Option<E>, window: Option<E>) -> Self {
        Self {
            process,
            element,
            window,
            lookup: None,
        }
    }
}

pub struct Reconciler<A: AccessibilityApi, P: OverlayPresenter> {
    resolver: FocusResolver<A>,
    inspector: ElementInspector<A>,
    presenter: P,
    padding: f64,
    show_border: bool,
    target: Option<FocusTarget<A::Element>>,
    snapshot: Option<FocusedElement>,
    window_frame: Option<WindowFrame>,
    screen_height: Option<f64>,
    generation: u64,
    relevance: Option<HashMap<String, Vec<Note>>>,
    registry: OverlayRegistry,
    hover: HoverMachine,
    notes: NoteWindows,
    border: Option<Rect>,
}

impl<A: AccessibilityApi, P: OverlayPresenter> Reconciler<A, P> {
    pub fn new(api: Arc<A>, presenter: P, padding: f64, show_border: bool) -> Self {
        Self {
            resolver: FocusResolver::new(Arc::clone(&api)),
            inspector: ElementInspector::new(api),
            presenter,
            padding,
            show_border,
            target: None,
            snapshot: None,
            window_frame: None,
            screen_height: None,
            generation: 0,
            relevance: None,
            registry: OverlayRegistry::new(),
            hover: HoverMachine::new(),
            notes: NoteWindows::new(),
            border: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn registry(&self) -> &OverlayRegistry {
        &self.registry
    }

    pub fn notes(&self) -> &NoteWindows {
        &self.notes
    }

    pub fn hover_state(&self) -> HoverState {
        self.hover.state()
    }

    pub fn target(&self) -> Option<&FocusTarget<A::Element>> {
        self.target.as_ref()
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// One reconciliation pass.
    pub fn reconcile(&mut self) -> Pass<A::Element> {
        let Some(process) = self.resolver.current_frontmost_process() else {
            self.lose_focus("no frontmost application");
            return Pass::without_target(None, None, None);
        };

        let Some(focused) = self.resolver.focused_element(&process) else {
            self.lose_focus("no focused element");
            return Pass::without_target(Some(process), None, None);
        };

        let window = self.resolver.containing_window(&focused);
        let window_frame = window
            .as_ref()
            .and_then(|window| self.inspector.read_window_frame(window));

        let is_text = self
            .inspector
            .role(&focused)
            .map(|role| role.is_text_like())
            .unwrap_or(false);
        let element = if is_text {
            focused.clone()
        } else {
            match self.inspector.find_text_element(&focused, window_frame.as_ref()) {
                Some(element) => element,
                None => {
                    self.lose_focus("focused element holds no text");
                    return Pass::without_target(Some(process), Some(focused), window);
                }
            }
        };

        let Some(snapshot) = self.inspector.read_element_snapshot(&element) else {
            self.lose_focus("focused element could not be read");
            return Pass::without_target(Some(process), Some(element), window);
        };

        if let Some(frame) = &window_frame {
            if !snapshot.frame().intersects(&frame.rect()) {
                self.lose_focus("focused element is outside its window");
                return Pass::without_target(Some(process), Some(element), window);
            }
        }

        let Some(screen_height) = self.inspector.screen_height() else {
            self.lose_focus("screen height unavailable");
            return Pass::without_target(Some(process), Some(element), window);
        };

        let target_changed = match &self.target {
            Some(target) => target.process != process || target.element != element,
            None => true,
        };

        if target_changed {
            log_debug!("focus target changed to {}", process);
            self.clear_overlays();
            self.generation += 1;
            self.relevance = None;
            self.snapshot = None;
            self.window_frame = None;
        }

        self.target = Some(FocusTarget {
            process: process.clone(),
            focused,
            element: element.clone(),
            window: window.clone(),
        });

        let text_changed = match &self.snapshot {
            Some(previous) => !previous.same_text(&snapshot),
            None => true,
        };
        let geometry_changed = self.snapshot.as_ref() != Some(&snapshot)
            || self.window_frame != window_frame
            || self.screen_height != Some(screen_height);

        self.snapshot = Some(snapshot.clone());
        self.window_frame = window_frame;
        self.screen_height = Some(screen_height);
        self.update_border(&snapshot, screen_height);

        let lookup = if text_changed {
            self.start_generation(&snapshot.value)
        } else {
            if geometry_changed && self.relevance.is_some() {
                let placements = self.place_words();
                let report = self.registry.reposition(placements, &mut self.presenter);
                self.forget_missing_hover();
                log_pass("repositioned", &report);
            }
            None
        };

        Pass {
            process: Some(process),
            element: Some(element),
            window,
            lookup,
        }
    }

    /// Applies a finished lookup. Results from an older generation, or
    /// arriving after focus has left the target before the next pass noticed,
    /// are dropped; returns whether the outcome was applied.
    pub fn apply_lookup(&mut self, outcome: LookupOutcome) -> bool {
        if outcome.generation != self.generation || self.target.is_none() {
            log_debug!(
                "discarding stale lookup for generation {} (current {})",
                outcome.generation,
                self.generation
            );
            return false;
        }

        if !self.target_still_focused() {
            self.lose_focus("focus moved while the lookup was in flight");
            return false;
        }

        log_debug!(
            "lookup for generation {} found {} relevant words",
            outcome.generation,
            outcome.matches.len()
        );
        self.relevance = Some(outcome.matches);
        self.sync_overlays();
        true
    }

    /// Returns a note fetch when a selected note needs its content loaded.
    pub fn handle_ui_event(&mut self, event: UiEvent) -> Option<NoteFetch> {
        match event {
            UiEvent::WordHovered { id, hovering: true } => {
                self.hover.word_entered(id);
                if !self.registry.show_suggestion(id, &mut self.presenter) {
                    self.hover.word_exited(id);
                }
            }
            UiEvent::WordHovered { id, hovering: false } => {
                self.hover.word_exited(id);
            }
            UiEvent::SuggestionHovered { hovering: true } => {
                if let Some(owner) = self.registry.suggestion_owner() {
                    self.hover.suggestion_entered(owner);
                }
            }
            UiEvent::SuggestionHovered { hovering: false } => {
                self.hover.suggestion_exited();
            }
            UiEvent::SuggestionDismissed => {
                self.registry.hide_suggestion(&mut self.presenter);
                self.hover.reset();
            }
            UiEvent::NoteSelected { overlay, note_id } => {
                let selected = self.registry.get(overlay).and_then(|item| {
                    item.notes
                        .iter()
                        .find(|note| note.id == note_id)
                        .map(|note| (lookup_key(&item.word).to_string(), note.clone()))
                });

                let Some((word, note)) = selected else {
                    log_warn!("selected note {} is not offered by {}", note_id, overlay);
                    return None;
                };

                self.registry.hide_suggestion(&mut self.presenter);
                self.hover.reset();

                if note.has_content() {
                    self.open_note(note);
                } else {
                    return Some(NoteFetch {
                        word,
                        fallback: note,
                    });
                }
            }
            UiEvent::NoteDismissed { id } => {
                self.notes.close(id, &mut self.presenter);
            }
        }

        None
    }

    /// True while a suggestion is shown but nothing is hovered: the caller
    /// should (re)arm the hover timer.
    pub fn suggestion_expiring(&self) -> bool {
        self.hover.is_idle() && self.registry.suggestion_owner().is_some()
    }

    /// Timed transition of the hover machine: the suggestion goes away if
    /// neither the word nor the suggestion was hovered again.
    pub fn hover_expired(&mut self) {
        if self.hover.is_idle() {
            self.registry.hide_suggestion(&mut self.presenter);
        }
    }

    pub fn open_note(&mut self, note: Note) -> Option<NoteWindowId> {
        let Some(screen_height) = self.screen_height.or_else(|| self.inspector.screen_height()) else {
            log_warn!("cannot place note '{}': screen height unavailable", note.title);
            return None;
        };

        Some(self.notes.open(note, screen_height, &mut self.presenter))
    }

    /// Drops the current target and every overlay drawn for it. Note windows
    /// are left open.
    pub fn lose_focus(&mut self, reason: &str) {
        if self.target.is_none() && self.registry.is_empty() && self.border.is_none() {
            return;
        }

        log_debug!("tearing down overlays: {}", reason);
        self.clear_overlays();
        self.hide_border();
        self.target = None;
        self.snapshot = None;
        self.window_frame = None;
        self.relevance = None;
        self.generation += 1;
    }

    /// Removes every window this reconciler ever opened.
    pub fn shutdown(&mut self) {
        self.lose_focus("shutting down");
        self.notes.close_all(&mut self.presenter);
        log_info!("all overlay windows removed");
    }

    fn start_generation(&mut self, value: &str) -> Option<LookupRequest> {
        self.generation += 1;
        self.relevance = None;

        let dropped = self.registry.retain_consistent(value, &mut self.presenter);
        if dropped > 0 {
            self.forget_missing_hover();
            log_debug!("text changed, {} overlays no longer match", dropped);
        }

        let mut seen = HashSet::new();
        let words: Vec<String> = segment_words(value)
            .iter()
            .map(|span| lookup_key(&span.text))
            .filter(|key| !key.is_empty())
            .filter(|key| seen.insert(key.to_string()))
            .map(str::to_string)
            .collect();

        if words.is_empty() {
            self.relevance = Some(HashMap::new());
            self.sync_overlays();
            return None;
        }

        Some(LookupRequest {
            generation: self.generation,
            words,
        })
    }

    fn target_still_focused(&self) -> bool {
        let Some(target) = &self.target else {
            return false;
        };
        let Some(process) = self.resolver.current_frontmost_process() else {
            return false;
        };
        if process != target.process {
            return false;
        }

        self.resolver
            .focused_element(&process)
            .map_or(false, |focused| focused == target.focused)
    }

    fn sync_overlays(&mut self) {
        let placements = self.place_words();
        let report = self.registry.sync(placements, &mut self.presenter);
        self.forget_missing_hover();
        log_pass("synced", &report);
    }

    /// Relevant words with a usable frame. A word whose bounds query fails
    /// or that is scrolled out of view is skipped on its own.
    fn place_words(&self) -> Vec<Placement> {
        let (Some(target), Some(snapshot), Some(relevance), Some(screen_height)) = (
            self.target.as_ref(),
            self.snapshot.as_ref(),
            self.relevance.as_ref(),
            self.screen_height,
        ) else {
            return Vec::new();
        };

        let mut placements = Vec::new();
        for span in segment_words(&snapshot.value) {
            let Some(notes) = relevance.get(lookup_key(&span.text)) else {
                continue;
            };

            let Some(bounds) = self
                .inspector
                .bounds_for_character_range(&target.element, span.range.clone())
            else {
                continue;
            };

            let Some(frame) =
                overlay_frame(bounds, self.window_frame.as_ref(), screen_height, self.padding)
            else {
                continue;
            };

            placements.push(Placement {
                word: span.text,
                range: span.range,
                frame,
                notes: notes.clone(),
            });
        }

        placements
    }

    fn clear_overlays(&mut self) {
        self.registry.delete_all(&mut self.presenter);
        self.hover.reset();
    }

    fn forget_missing_hover(&mut self) {
        let hovered = match self.hover.state() {
            HoverState::Idle => return,
            HoverState::WordHovered(id) | HoverState::SuggestionHovered(id) | HoverState::Both(id) => id,
        };

        if self.registry.get(hovered).is_none() {
            self.hover.reset();
        }
    }

    fn update_border(&mut self, snapshot: &FocusedElement, screen_height: f64) {
        if !self.show_border {
            return;
        }

        let frame = to_overlay_space(snapshot.frame(), screen_height);
        if self.border != Some(frame) {
            self.border = Some(frame);
            self.presenter.apply(PresenterCommand::ShowBorder { frame });
        }
    }

    fn hide_border(&mut self) {
        if self.border.take().is_some() {
            self.presenter.apply(PresenterCommand::HideBorder);
        }
    }
}

fn log_pass(action: &str, report: &SyncReport) {
    log_info!(
        "overlays {}: {} created, {} destroyed, {} updated, {} kept",
        action,
        report.created,
        report.destroyed,
        report.updated,
        report.kept
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessibility::{InMemoryAccessibility, MemoryElement};

    #[derive(Default)]
    struct Recorder(Vec<PresenterCommand>);

    impl OverlayPresenter for Recorder {
        fn apply(&mut self, command: PresenterCommand) {
            self.0.push(command);
        }
    }

    fn setup(
        show_border: bool,
    ) -> (
        Arc<InMemoryAccessibility>,
        MemoryElement,
        Reconciler<InMemoryAccessibility, Recorder>,
    ) {
        let api = Arc::new(InMemoryAccessibility::new(900.0));
        api.set_frontmost(Some(ProcessHandle::with_name(1, "Editor")));
        let window = api.add_window(1, Rect::new(0.0, 0.0, 800.0, 600.0));
        let field = api.add_text_field(
            &window,
            "The flask is python",
            Rect::new(100.0, 50.0, 400.0, 20.0),
        );
        api.focus(1, &field);

        let reconciler = Reconciler::new(Arc::clone(&api), Recorder::default(), 1.0, show_border);
        (api, field, reconciler)
    }

    fn matches(words: &[&str]) -> HashMap<String, Vec<Note>> {
        words
            .iter()
            .map(|word| (word.to_string(), vec![Note::new(*word, "")]))
            .collect()
    }

    #[test]
    fn text_pass_requests_lookup_then_places_relevant_words() {
        let (_api, _field, mut reconciler) = setup(false);

        let pass = reconciler.reconcile();
        let request = pass.lookup.unwrap();
        assert_eq!(request.words, vec!["The", "flask", "is", "python"]);

        assert!(reconciler.apply_lookup(LookupOutcome {
            generation: request.generation,
            matches: matches(&["flask", "python"]),
        }));

        let items = reconciler.registry().items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].word, "flask");
        assert_eq!(items[0].frame, Rect::new(131.0, 834.0, 42.0, 16.0));
    }

    #[test]
    fn lookup_is_dropped_once_another_app_is_frontmost() {
        let (api, _field, mut reconciler) = setup(true);
        let request = reconciler.reconcile().lookup.unwrap();

        api.set_frontmost(Some(ProcessHandle::with_name(2, "Browser")));
        let applied = reconciler.apply_lookup(LookupOutcome {
            generation: request.generation,
            matches: matches(&["flask"]),
        });

        assert!(!applied);
        assert!(reconciler.registry().is_empty());
        assert!(reconciler.target().is_none());
        assert_ne!(reconciler.generation(), request.generation);
        assert_eq!(reconciler.presenter().0.last(), Some(&PresenterCommand::HideBorder));
    }

    #[test]
    fn lookup_is_dropped_once_focus_moves_within_the_app() {
        let (api, field, mut reconciler) = setup(false);
        let request = reconciler.reconcile().lookup.unwrap();

        let window = api.containing_window(&field).unwrap();
        let other = api.add_text_field(&window, "flask", Rect::new(100.0, 200.0, 400.0, 20.0));
        api.focus(1, &other);

        assert!(!reconciler.apply_lookup(LookupOutcome {
            generation: request.generation,
            matches: matches(&["flask"]),
        }));
        assert!(reconciler.registry().is_empty());
    }

    #[test]
    fn geometry_only_change_moves_overlays_without_lookup() {
        let (api, field, mut reconciler) = setup(false);
        let request = reconciler.reconcile().lookup.unwrap();
        reconciler.apply_lookup(LookupOutcome {
            generation: request.generation,
            matches: matches(&["flask"]),
        });
        let generation = reconciler.generation();

        api.set_frame(&field, Rect::new(120.0, 50.0, 400.0, 20.0));
        let pass = reconciler.reconcile();

        assert!(pass.lookup.is_none());
        assert_eq!(reconciler.generation(), generation);
        assert!(matches!(
            reconciler.presenter().0.last(),
            Some(PresenterCommand::UpdateWord { frame, .. }) if frame.x == 151.0
        ));
    }

    #[test]
    fn non_text_focus_falls_back_to_text_descendant() {
        let api = Arc::new(InMemoryAccessibility::new(900.0));
        api.set_frontmost(Some(ProcessHandle::new(4)));
        let window = api.add_window(4, Rect::new(0.0, 0.0, 800.0, 600.0));
        let group = api.add_element(&window, "AXGroup", None, Rect::new(0.0, 0.0, 800.0, 600.0));
        let field = api.add_text_field(&group, "hello", Rect::new(10.0, 10.0, 200.0, 20.0));
        api.focus(4, &group);

        let mut reconciler = Reconciler::new(Arc::clone(&api), Recorder::default(), 1.0, false);
        let pass = reconciler.reconcile();

        assert_eq!(pass.element, Some(field));
        assert_eq!(reconciler.target().map(|t| t.element), Some(field));
        assert!(pass.lookup.is_some());
    }

    #[test]
    fn border_follows_element_and_hides_on_focus_loss() {
        let (api, _field, mut reconciler) = setup(true);
        reconciler.reconcile();
        assert_eq!(
            reconciler.presenter().0.first(),
            Some(&PresenterCommand::ShowBorder {
                frame: Rect::new(100.0, 830.0, 400.0, 20.0)
            })
        );

        api.clear_focus(1);
        let pass = reconciler.reconcile();

        assert!(pass.process.is_some());
        assert!(pass.element.is_none());
        assert!(reconciler.target().is_none());
        assert_eq!(reconciler.presenter().0.last(), Some(&PresenterCommand::HideBorder));
    }

    #[test]
    fn hover_shows_suggestion_and_expiry_hides_it() {
        let (_api, _field, mut reconciler) = setup(false);
        let request = reconciler.reconcile().lookup.unwrap();
        reconciler.apply_lookup(LookupOutcome {
            generation: request.generation,
            matches: matches(&["flask"]),
        });
        let id = reconciler.registry().items()[0].id;

        reconciler.handle_ui_event(UiEvent::WordHovered { id, hovering: true });
        assert_eq!(reconciler.registry().suggestion_owner(), Some(id));
        assert!(!reconciler.suggestion_expiring());

        reconciler.handle_ui_event(UiEvent::WordHovered { id, hovering: false });
        assert!(reconciler.suggestion_expiring());
        reconciler.handle_ui_event(UiEvent::SuggestionHovered { hovering: true });
        assert!(!reconciler.suggestion_expiring());
        reconciler.hover_expired();
        assert_eq!(reconciler.registry().suggestion_owner(), Some(id));

        reconciler.handle_ui_event(UiEvent::SuggestionHovered { hovering: false });
        reconciler.hover_expired();
        assert_eq!(reconciler.registry().suggestion_owner(), None);
    }

    #[test]
    fn selecting_title_only_note_asks_for_fetch() {
        let (_api, _field, mut reconciler) = setup(false);
        let request = reconciler.reconcile().lookup.unwrap();
        let mut relevant = matches(&[]);
        relevant.insert(
            "python".into(),
            vec![Note::new("Python", ""), Note::new("Snakes", "Reptiles.")],
        );
        reconciler.apply_lookup(LookupOutcome {
            generation: request.generation,
            matches: relevant,
        });
        let item = reconciler.registry().items()[0].clone();

        let fetch = reconciler.handle_ui_event(UiEvent::NoteSelected {
            overlay: item.id,
            note_id: item.notes[0].id.clone(),
        });
        assert_eq!(fetch.map(|f| f.word), Some("python".to_string()));

        let fetch = reconciler.handle_ui_event(UiEvent::NoteSelected {
            overlay: item.id,
            note_id: item.notes[1].id.clone(),
        });
        assert!(fetch.is_none());
        assert_eq!(reconciler.notes().len(), 1);
    }
}
