//! A scripted accessibility tree kept in memory.
//!
//! Used to drive the tracker without a platform service: headless runs on
//! systems without a native backend, and the test suite. Text is laid out on
//! a single line with a fixed advance per UTF-16 unit.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::UnboundedSender;

use crate::geometry::{Point, Rect, Size};

use super::{
    AccessibilityApi, Attribute, AttributeValue, AxEvent, AxEventKind, ObserverHandle,
    ProcessHandle, SubscribeError,
};

const CHAR_ADVANCE: f64 = 8.0;
const LINE_HEIGHT: f64 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryElement(u64);

#[derive(Debug)]
struct Node {
    pid: i32,
    role: String,
    value: Option<String>,
    frame: Rect,
    window: Option<u64>,
    children: Vec<u64>,
    failing_ranges: HashSet<(usize, usize)>,
}

struct Subscription {
    id: u64,
    pid: i32,
    sender: UnboundedSender<AxEvent>,
}

#[derive(Default)]
struct MemoryState {
    trusted: bool,
    frontmost: Option<ProcessHandle>,
    focused: HashMap<i32, u64>,
    nodes: HashMap<u64, Node>,
    next_node: u64,
    screen_height: Option<f64>,
    subscriptions: Vec<Subscription>,
    next_subscription: u64,
    refused: HashSet<i32>,
    subscribe_calls: usize,
}

#[derive(Clone)]
pub struct InMemoryAccessibility {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryAccessibility {
    pub fn new(screen_height: f64) -> Self {
        let state = MemoryState {
            trusted: true,
            screen_height: Some(screen_height),
            ..MemoryState::default()
        };

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        lock_state(&self.state)
    }

    pub fn set_trusted(&self, trusted: bool) {
        self.lock().trusted = trusted;
    }

    pub fn set_screen_height(&self, height: Option<f64>) {
        self.lock().screen_height = height;
    }

    pub fn set_frontmost(&self, process: Option<ProcessHandle>) {
        self.lock().frontmost = process;
    }

    pub fn add_window(&self, pid: i32, frame: Rect) -> MemoryElement {
        self.insert(pid, None, "AXWindow", None, frame)
    }

    pub fn add_text_field(&self, parent: &MemoryElement, value: &str, frame: Rect) -> MemoryElement {
        self.add_element(parent, "AXTextArea", Some(value), frame)
    }

    pub fn add_element(
        &self,
        parent: &MemoryElement,
        role: &str,
        value: Option<&str>,
        frame: Rect,
    ) -> MemoryElement {
        let (pid, window) = {
            let state = self.lock();
            match state.nodes.get(&parent.0) {
                Some(node) if node.role == "AXWindow" => (node.pid, Some(parent.0)),
                Some(node) => (node.pid, node.window),
                None => (0, None),
            }
        };

        let element = self.insert(pid, window, role, value, frame);
        if let Some(node) = self.lock().nodes.get_mut(&parent.0) {
            node.children.push(element.0);
        }
        element
    }

    fn insert(
        &self,
        pid: i32,
        window: Option<u64>,
        role: &str,
        value: Option<&str>,
        frame: Rect,
    ) -> MemoryElement {
        let mut state = self.lock();
        state.next_node += 1;
        let id = state.next_node;
        state.nodes.insert(
            id,
            Node {
                pid,
                role: role.to_string(),
                value: value.map(str::to_string),
                frame,
                window,
                children: Vec::new(),
                failing_ranges: HashSet::new(),
            },
        );
        MemoryElement(id)
    }

    pub fn set_value(&self, element: &MemoryElement, value: &str) {
        if let Some(node) = self.lock().nodes.get_mut(&element.0) {
            node.value = Some(value.to_string());
        }
    }

    pub fn set_frame(&self, element: &MemoryElement, frame: Rect) {
        if let Some(node) = self.lock().nodes.get_mut(&element.0) {
            node.frame = frame;
        }
    }

    /// Makes the bounds query for exactly this range fail.
    pub fn fail_range(&self, element: &MemoryElement, range: Range<usize>) {
        if let Some(node) = self.lock().nodes.get_mut(&element.0) {
            node.failing_ranges.insert((range.start, range.end));
        }
    }

    pub fn focus(&self, pid: i32, element: &MemoryElement) {
        self.lock().focused.insert(pid, element.0);
    }

    pub fn clear_focus(&self, pid: i32) {
        self.lock().focused.remove(&pid);
    }

    /// Subscriptions for `pid` fail until the process is allowed again.
    pub fn refuse_subscriptions(&self, pid: i32, refuse: bool) {
        let mut state = self.lock();
        if refuse {
            state.refused.insert(pid);
        } else {
            state.refused.remove(&pid);
        }
    }

    /// Delivers a native notification to every live subscription of `pid`.
    /// Returns how many subscriptions received it.
    pub fn emit(&self, pid: i32, kind: AxEventKind) -> usize {
        let state = self.lock();
        state
            .subscriptions
            .iter()
            .filter(|sub| sub.pid == pid)
            .filter(|sub| sub.sender.send(AxEvent { pid, kind }).is_ok())
            .count()
    }

    pub fn active_subscriptions(&self) -> Vec<i32> {
        self.lock().subscriptions.iter().map(|sub| sub.pid).collect()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.lock().subscribe_calls
    }

    /// Where the single-line layout puts `range` of `element`.
    pub fn expected_bounds(&self, element: &MemoryElement, range: Range<usize>) -> Option<Rect> {
        let state = self.lock();
        let node = state.nodes.get(&element.0)?;
        Some(layout_range(node.frame, range))
    }
}

fn lock_state(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn layout_range(frame: Rect, range: Range<usize>) -> Rect {
    Rect::new(
        frame.x + range.start as f64 * CHAR_ADVANCE,
        frame.y,
        (range.end - range.start) as f64 * CHAR_ADVANCE,
        LINE_HEIGHT,
    )
}

impl AccessibilityApi for InMemoryAccessibility {
    type Element = MemoryElement;

    fn is_trusted(&self, _prompt: bool) -> bool {
        self.lock().trusted
    }

    fn frontmost_process(&self) -> Option<ProcessHandle> {
        self.lock().frontmost.clone()
    }

    fn focused_element(&self, process: &ProcessHandle) -> Option<MemoryElement> {
        self.lock().focused.get(&process.pid).copied().map(MemoryElement)
    }

    fn containing_window(&self, element: &MemoryElement) -> Option<MemoryElement> {
        let state = self.lock();
        let node = state.nodes.get(&element.0)?;
        if node.role == "AXWindow" {
            return Some(*element);
        }
        node.window.map(MemoryElement)
    }

    fn attribute(
        &self,
        element: &MemoryElement,
        attribute: Attribute,
    ) -> Option<AttributeValue<MemoryElement>> {
        let state = self.lock();
        let node = state.nodes.get(&element.0)?;

        match attribute {
            Attribute::Role => Some(AttributeValue::Text(node.role.clone())),
            Attribute::Value => node.value.clone().map(AttributeValue::Text),
            Attribute::Position => Some(AttributeValue::Point(Point::new(
                node.frame.x,
                node.frame.y,
            ))),
            Attribute::Size => Some(AttributeValue::Size(Size::new(
                node.frame.width,
                node.frame.height,
            ))),
            Attribute::Children => Some(AttributeValue::Elements(
                node.children.iter().copied().map(MemoryElement).collect(),
            )),
        }
    }

    fn bounds_for_range(&self, element: &MemoryElement, range: Range<usize>) -> Option<Rect> {
        let state = self.lock();
        let node = state.nodes.get(&element.0)?;
        let value = node.value.as_ref()?;

        if range.end > value.encode_utf16().count() || range.start > range.end {
            return None;
        }
        if node.failing_ranges.contains(&(range.start, range.end)) {
            return None;
        }

        Some(layout_range(node.frame, range))
    }

    fn screen_height(&self) -> Option<f64> {
        self.lock().screen_height
    }

    fn observe(
        &self,
        process: &ProcessHandle,
        _element: Option<&MemoryElement>,
        _window: Option<&MemoryElement>,
        events: UnboundedSender<AxEvent>,
    ) -> Result<ObserverHandle, SubscribeError> {
        let mut state = self.lock();
        state.subscribe_calls += 1;

        if !state.trusted {
            return Err(SubscribeError::PermissionDenied);
        }
        if state.refused.contains(&process.pid) {
            return Err(SubscribeError::ProcessGone(process.pid));
        }

        state.next_subscription += 1;
        let id = state.next_subscription;
        state.subscriptions.push(Subscription {
            id,
            pid: process.pid,
            sender: events,
        });

        let shared = Arc::clone(&self.state);
        Ok(ObserverHandle::new(process.pid, move || {
            lock_state(&shared).subscriptions.retain(|sub| sub.id != id);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn lays_out_ranges_on_one_line() {
        let api = InMemoryAccessibility::new(900.0);
        let window = api.add_window(1, Rect::new(0.0, 0.0, 500.0, 400.0));
        let field = api.add_text_field(&window, "The cat sat", Rect::new(100.0, 50.0, 300.0, 24.0));

        assert_eq!(
            api.bounds_for_range(&field, 4..7),
            Some(Rect::new(132.0, 50.0, 24.0, 16.0))
        );
        assert_eq!(api.bounds_for_range(&field, 8..40), None);
    }

    #[test]
    fn dropping_observer_removes_subscription() {
        let api = InMemoryAccessibility::new(900.0);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = api
            .observe(&ProcessHandle::new(3), None, None, tx)
            .unwrap();
        assert_eq!(api.emit(3, AxEventKind::ValueChanged), 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            AxEvent {
                pid: 3,
                kind: AxEventKind::ValueChanged
            }
        );

        drop(handle);
        assert!(api.active_subscriptions().is_empty());
        assert_eq!(api.emit(3, AxEventKind::ValueChanged), 0);
    }

    #[test]
    fn refused_process_fails_to_subscribe() {
        let api = InMemoryAccessibility::new(900.0);
        api.refuse_subscriptions(9, true);
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = api
            .observe(&ProcessHandle::new(9), None, None, tx)
            .unwrap_err();
        assert!(matches!(err, SubscribeError::ProcessGone(9)));
    }
}
