use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect, Size};

/// Semantic kind of an accessibility element, as far as the tracker cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementRole {
    Window,
    TextLike(String),
    Other(String),
}

impl ElementRole {
    /// Classifies a platform role string such as `AXWindow` or `AXTextArea`.
    pub fn from_platform(role: &str) -> Self {
        if role.eq_ignore_ascii_case("AXWindow") || role.eq_ignore_ascii_case("window") {
            ElementRole::Window
        } else if role.to_ascii_lowercase().contains("text") {
            ElementRole::TextLike(role.to_string())
        } else {
            ElementRole::Other(role.to_string())
        }
    }

    pub fn is_text_like(&self) -> bool {
        matches!(self, ElementRole::TextLike(_))
    }

    pub fn is_window(&self) -> bool {
        matches!(self, ElementRole::Window)
    }
}

/// One observation of the focused element. A new snapshot is read on every
/// pass and compared by value with the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusedElement {
    pub role: ElementRole,
    pub value: String,
    pub position: Point,
    pub size: Size,
}

impl FocusedElement {
    /// Bounds of the element in accessibility space.
    pub fn frame(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }

    /// True when the two snapshots differ only in geometry.
    pub fn same_text(&self, other: &FocusedElement) -> bool {
        self.value == other.value
    }
}

/// Bounds of the window containing the focused element, in accessibility space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowFrame(pub Rect);

impl WindowFrame {
    pub fn rect(&self) -> Rect {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_platform_roles() {
        assert_eq!(ElementRole::from_platform("AXWindow"), ElementRole::Window);
        assert!(ElementRole::from_platform("AXTextArea").is_text_like());
        assert!(ElementRole::from_platform("AXTextField").is_text_like());
        assert!(ElementRole::from_platform("text-like").is_text_like());
        assert_eq!(
            ElementRole::from_platform("AXButton"),
            ElementRole::Other("AXButton".into())
        );
    }

    #[test]
    fn same_text_ignores_geometry() {
        let a = FocusedElement {
            role: ElementRole::from_platform("AXTextArea"),
            value: "hello".into(),
            position: Point::new(0.0, 0.0),
            size: Size::new(10.0, 10.0),
        };
        let mut b = a.clone();
        b.position = Point::new(5.0, 5.0);

        assert!(a.same_text(&b));
        assert_ne!(a, b);
    }
}
