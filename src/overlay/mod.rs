//! Word overlays: layout, ownership, hover handling and the reconciler that
//! keeps them in step with the focused element.

pub mod events;
pub mod hover;
pub mod layout;
pub mod notes;
pub mod presenter;
pub mod reconciler;
pub mod registry;

pub use events::UiEvent;
pub use hover::{HoverMachine, HoverState};
pub use layout::{lookup_key, overlay_frame, segment_words, WordSpan};
pub use notes::{NoteWindowId, NoteWindows};
pub use presenter::{ChannelPresenter, LoggingPresenter, OverlayPresenter, PresenterCommand};
pub use reconciler::{FocusTarget, LookupOutcome, LookupRequest, NoteFetch, Pass, Reconciler};
pub use registry::{OverlayId, OverlayItem, OverlayRegistry, Placement, SyncReport};
