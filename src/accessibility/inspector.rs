use std::collections::VecDeque;
use std::ops::Range;
use std::sync::Arc;

use crate::geometry::{Point, Rect, Size};
use crate::models::{ElementRole, FocusedElement, WindowFrame};

use super::{AccessibilityApi, Attribute, AttributeValue};
use crate::log_debug;

const ENABLE_LOGS: bool = true;

/// How far below a non-text focused element we look for a text element.
const TEXT_SEARCH_DEPTH: usize = 4;

/// Read-only queries against a single element.
pub struct ElementInspector<A: AccessibilityApi> {
    api: Arc<A>,
}

impl<A: AccessibilityApi> Clone for ElementInspector<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
        }
    }
}

impl<A: AccessibilityApi> ElementInspector<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    pub fn role(&self, element: &A::Element) -> Option<ElementRole> {
        self.text(element, Attribute::Role)
            .map(|role| ElementRole::from_platform(&role))
    }

    /// Fails when any one of role, value, position or size is unavailable.
    pub fn read_element_snapshot(&self, element: &A::Element) -> Option<FocusedElement> {
        let role = self.role(element)?;
        let value = self.text(element, Attribute::Value)?;
        let position = self.point(element)?;
        let size = self.size(element)?;

        Some(FocusedElement {
            role,
            value,
            position,
            size,
        })
    }

    pub fn read_window_frame(&self, window: &A::Element) -> Option<WindowFrame> {
        if !self.role(window)?.is_window() {
            return None;
        }

        let position = self.point(window)?;
        let size = self.size(window)?;
        Some(WindowFrame(Rect::from_origin_size(position, size)))
    }

    /// Per-word geometry. Custom-drawn text widgets commonly reject the range
    /// query, so `None` here only means "skip this word".
    pub fn bounds_for_character_range(
        &self,
        element: &A::Element,
        range: Range<usize>,
    ) -> Option<Rect> {
        let bounds = self.api.bounds_for_range(element, range.clone());
        if bounds.is_none() {
            log_debug!("bounds query unsupported or failed for range {:?}", range);
        }
        bounds
    }

    pub fn screen_height(&self) -> Option<f64> {
        self.api.screen_height()
    }

    pub fn children(&self, element: &A::Element) -> Vec<A::Element> {
        match self.api.attribute(element, Attribute::Children) {
            Some(AttributeValue::Elements(children)) => children,
            _ => Vec::new(),
        }
    }

    /// Breadth-first search below `root` for the first text-like element that
    /// is visible inside `within` (when a window frame is known).
    pub fn find_text_element(
        &self,
        root: &A::Element,
        within: Option<&WindowFrame>,
    ) -> Option<A::Element> {
        let mut queue: VecDeque<(A::Element, usize)> = VecDeque::new();
        queue.push_back((root.clone(), 0));

        while let Some((element, depth)) = queue.pop_front() {
            let is_text = self
                .role(&element)
                .map(|role| role.is_text_like())
                .unwrap_or(false);

            if is_text && self.is_visible_in(&element, within) {
                return Some(element);
            }

            if depth < TEXT_SEARCH_DEPTH {
                for child in self.children(&element) {
                    queue.push_back((child, depth + 1));
                }
            }
        }

        None
    }

    fn is_visible_in(&self, element: &A::Element, within: Option<&WindowFrame>) -> bool {
        let Some(window) = within else {
            return true;
        };

        match (self.point(element), self.size(element)) {
            (Some(position), Some(size)) => {
                Rect::from_origin_size(position, size).intersects(&window.rect())
            }
            _ => false,
        }
    }

    fn text(&self, element: &A::Element, attribute: Attribute) -> Option<String> {
        match self.api.attribute(element, attribute)? {
            AttributeValue::Text(text) => Some(text),
            _ => None,
        }
    }

    fn point(&self, element: &A::Element) -> Option<Point> {
        match self.api.attribute(element, Attribute::Position)? {
            AttributeValue::Point(point) => Some(point),
            _ => None,
        }
    }

    fn size(&self, element: &A::Element) -> Option<Size> {
        match self.api.attribute(element, Attribute::Size)? {
            AttributeValue::Size(size) => Some(size),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessibility::InMemoryAccessibility;

    fn setup() -> (Arc<InMemoryAccessibility>, ElementInspector<InMemoryAccessibility>) {
        let api = Arc::new(InMemoryAccessibility::new(900.0));
        let inspector = ElementInspector::new(Arc::clone(&api));
        (api, inspector)
    }

    #[test]
    fn snapshot_reads_all_attributes() {
        let (api, inspector) = setup();
        let window = api.add_window(1, Rect::new(0.0, 0.0, 800.0, 600.0));
        let field = api.add_text_field(&window, "The cat sat", Rect::new(10.0, 20.0, 300.0, 24.0));

        let snapshot = inspector.read_element_snapshot(&field).unwrap();
        assert!(snapshot.role.is_text_like());
        assert_eq!(snapshot.value, "The cat sat");
        assert_eq!(snapshot.frame(), Rect::new(10.0, 20.0, 300.0, 24.0));
    }

    #[test]
    fn snapshot_fails_when_value_missing() {
        let (api, inspector) = setup();
        let window = api.add_window(1, Rect::new(0.0, 0.0, 800.0, 600.0));
        let button = api.add_element(&window, "AXButton", None, Rect::new(0.0, 0.0, 10.0, 10.0));

        assert!(inspector.read_element_snapshot(&button).is_none());
    }

    #[test]
    fn window_frame_requires_window_role() {
        let (api, inspector) = setup();
        let window = api.add_window(1, Rect::new(5.0, 6.0, 800.0, 600.0));
        let field = api.add_text_field(&window, "hi", Rect::new(10.0, 20.0, 300.0, 24.0));

        assert_eq!(
            inspector.read_window_frame(&window),
            Some(WindowFrame(Rect::new(5.0, 6.0, 800.0, 600.0)))
        );
        assert!(inspector.read_window_frame(&field).is_none());
    }

    #[test]
    fn finds_nested_text_element_inside_window() {
        let (api, inspector) = setup();
        let window = api.add_window(1, Rect::new(0.0, 0.0, 800.0, 600.0));
        let scroll = api.add_element(&window, "AXScrollArea", None, Rect::new(0.0, 0.0, 800.0, 600.0));
        let hidden = api.add_text_field(&scroll, "offscreen", Rect::new(0.0, 900.0, 100.0, 20.0));
        let visible = api.add_text_field(&scroll, "visible", Rect::new(0.0, 40.0, 100.0, 20.0));
        let frame = inspector.read_window_frame(&window);

        let found = inspector.find_text_element(&scroll, frame.as_ref()).unwrap();
        assert_eq!(found, visible);
        assert_ne!(found, hidden);
    }

    #[test]
    fn range_failure_is_reported_as_none() {
        let (api, inspector) = setup();
        let window = api.add_window(1, Rect::new(0.0, 0.0, 800.0, 600.0));
        let field = api.add_text_field(&window, "one two", Rect::new(0.0, 0.0, 300.0, 20.0));
        api.fail_range(&field, 4..7);

        assert!(inspector.bounds_for_character_range(&field, 0..3).is_some());
        assert!(inspector.bounds_for_character_range(&field, 4..7).is_none());
    }
}
