//! What the reconciler tells the presentation layer to do.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::geometry::Rect;
use crate::models::Note;

use super::notes::NoteWindowId;
use super::registry::OverlayId;

/// One window operation, in overlay space. Commands are issued in order and
/// each window is created at most once before its matching destroy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PresenterCommand {
    CreateWord {
        id: OverlayId,
        word: String,
        frame: Rect,
    },
    UpdateWord {
        id: OverlayId,
        frame: Rect,
    },
    DestroyWord {
        id: OverlayId,
    },
    ShowSuggestion {
        owner: OverlayId,
        frame: Rect,
        notes: Vec<Note>,
    },
    HideSuggestion {
        owner: OverlayId,
    },
    OpenNote {
        id: NoteWindowId,
        note: Note,
        frame: Rect,
    },
    CloseNote {
        id: NoteWindowId,
    },
    ShowBorder {
        frame: Rect,
    },
    HideBorder,
}

pub trait OverlayPresenter: Send + 'static {
    fn apply(&mut self, command: PresenterCommand);
}

impl<P: OverlayPresenter + ?Sized> OverlayPresenter for Box<P> {
    fn apply(&mut self, command: PresenterCommand) {
        (**self).apply(command)
    }
}

/// Writes every command to the log as a JSON line. Used when no window
/// server is attached.
#[derive(Debug, Default)]
pub struct LoggingPresenter;

impl OverlayPresenter for LoggingPresenter {
    fn apply(&mut self, command: PresenterCommand) {
        match serde_json::to_string(&command) {
            Ok(line) => log::info!("overlay {}", line),
            Err(err) => log::warn!("could not encode overlay command {:?}: {}", command, err),
        }
    }
}

/// Forwards commands to whoever owns the windows. A closed receiver means the
/// presentation side is gone; commands are dropped.
pub struct ChannelPresenter {
    tx: UnboundedSender<PresenterCommand>,
}

impl ChannelPresenter {
    pub fn new(tx: UnboundedSender<PresenterCommand>) -> Self {
        Self { tx }
    }
}

impl OverlayPresenter for ChannelPresenter {
    fn apply(&mut self, command: PresenterCommand) {
        if self.tx.send(command).is_err() {
            log::debug!("presentation channel closed, dropping overlay command");
        }
    }
}
