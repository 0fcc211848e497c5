//! Capability interface over the platform accessibility service, plus the
//! read-only views built on it.
//!
//! Everything the tracker learns about other processes' UI goes through
//! [`AccessibilityApi`]. Queries return `Option`: "not available" is the
//! normal answer right after an application switch and for custom-drawn
//! widgets, so callers skip and move on instead of propagating errors.

pub mod inspector;
pub mod memory;
pub mod resolver;

use std::fmt;
use std::ops::Range;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::geometry::{Point, Rect, Size};

pub use inspector::ElementInspector;
pub use memory::{InMemoryAccessibility, MemoryElement};
pub use resolver::FocusResolver;

/// A running application as reported by the platform.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pub pid: i32,
    pub name: Option<String>,
}

impl ProcessHandle {
    pub fn new(pid: i32) -> Self {
        Self { pid, name: None }
    }

    pub fn with_name(pid: i32, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: Some(name.into()),
        }
    }
}

impl PartialEq for ProcessHandle {
    fn eq(&self, other: &Self) -> bool {
        self.pid == other.pid
    }
}

impl Eq for ProcessHandle {}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", name, self.pid),
            None => write!(f, "pid {}", self.pid),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Role,
    Value,
    Position,
    Size,
    Children,
}

impl Attribute {
    pub fn platform_name(&self) -> &'static str {
        match self {
            Attribute::Role => "AXRole",
            Attribute::Value => "AXValue",
            Attribute::Position => "AXPosition",
            Attribute::Size => "AXSize",
            Attribute::Children => "AXChildren",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue<E> {
    Text(String),
    Point(Point),
    Size(Size),
    Elements(Vec<E>),
}

/// Notification classes the tracker subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxEventKind {
    FocusChanged,
    ValueChanged,
    WindowMoved,
    WindowResized,
    WindowMiniaturized,
}

impl AxEventKind {
    pub const ALL: [AxEventKind; 5] = [
        AxEventKind::FocusChanged,
        AxEventKind::ValueChanged,
        AxEventKind::WindowMoved,
        AxEventKind::WindowResized,
        AxEventKind::WindowMiniaturized,
    ];

    pub fn platform_name(&self) -> &'static str {
        match self {
            AxEventKind::FocusChanged => "AXFocusedUIElementChanged",
            AxEventKind::ValueChanged => "AXValueChanged",
            AxEventKind::WindowMoved => "AXWindowMoved",
            AxEventKind::WindowResized => "AXWindowResized",
            AxEventKind::WindowMiniaturized => "AXWindowMiniaturized",
        }
    }

    pub fn from_platform_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.platform_name() == name)
    }

    /// Window-level events are registered on the containing window, the rest
    /// on the application and the focused element.
    pub fn targets_window(&self) -> bool {
        matches!(
            self,
            AxEventKind::WindowMoved | AxEventKind::WindowResized | AxEventKind::WindowMiniaturized
        )
    }
}

/// A native notification, tagged with the process it came from so stale
/// deliveries from a previous subscription can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxEvent {
    pub pid: i32,
    pub kind: AxEventKind,
}

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("accessibility permission has not been granted")]
    PermissionDenied,
    #[error("process {0} is no longer running")]
    ProcessGone(i32),
    #[error("notifications are not supported on this platform")]
    Unsupported,
    #[error("platform error {0}")]
    Platform(i32),
}

/// Keeps a notification subscription alive. Dropping it unregisters.
pub struct ObserverHandle {
    pid: i32,
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl ObserverHandle {
    pub fn new(pid: i32, teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            pid,
            teardown: Some(Box::new(teardown)),
        }
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }
}

impl fmt::Debug for ObserverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverHandle")
            .field("pid", &self.pid)
            .finish()
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

/// The platform accessibility service.
pub trait AccessibilityApi: Send + Sync + 'static {
    type Element: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    /// Whether this process may query other processes' UI. With `prompt` the
    /// platform is asked to show its permission dialog.
    fn is_trusted(&self, prompt: bool) -> bool;

    fn frontmost_process(&self) -> Option<ProcessHandle>;

    fn focused_element(&self, process: &ProcessHandle) -> Option<Self::Element>;

    fn containing_window(&self, element: &Self::Element) -> Option<Self::Element>;

    fn attribute(
        &self,
        element: &Self::Element,
        attribute: Attribute,
    ) -> Option<AttributeValue<Self::Element>>;

    /// Bounds of a UTF-16 code-unit range of the element's value, in
    /// accessibility space.
    fn bounds_for_range(&self, element: &Self::Element, range: Range<usize>) -> Option<Rect>;

    /// Height of the display overlay space is measured against.
    fn screen_height(&self) -> Option<f64>;

    /// Registers for [`AxEventKind::ALL`] on the process, its focused element
    /// and that element's window. Events are delivered on `events` until the
    /// returned handle is dropped.
    fn observe(
        &self,
        process: &ProcessHandle,
        element: Option<&Self::Element>,
        window: Option<&Self::Element>,
        events: UnboundedSender<AxEvent>,
    ) -> Result<ObserverHandle, SubscribeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn event_names_round_trip() {
        for kind in AxEventKind::ALL {
            assert_eq!(AxEventKind::from_platform_name(kind.platform_name()), Some(kind));
        }
        assert_eq!(AxEventKind::from_platform_name("AXTitleChanged"), None);
    }

    #[test]
    fn dropping_handle_runs_teardown_once() {
        let torn_down = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&torn_down);
        let handle = ObserverHandle::new(42, move || flag.store(true, Ordering::SeqCst));

        assert_eq!(handle.pid(), 42);
        assert!(!torn_down.load(Ordering::SeqCst));
        drop(handle);
        assert!(torn_down.load(Ordering::SeqCst));
    }

    #[test]
    fn processes_compare_by_pid() {
        assert_eq!(ProcessHandle::new(7), ProcessHandle::with_name(7, "Notes"));
        assert_ne!(ProcessHandle::new(7), ProcessHandle::new(8));
    }
}
