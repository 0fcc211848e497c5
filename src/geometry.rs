//! Rectangles and the two coordinate spaces the tracker works in.
//!
//! Accessibility space has its origin at the top-left of the main display and
//! grows downwards. Overlay space has its origin at the bottom-left and grows
//! upwards, which is what floating windows are positioned with.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    pub fn min_x(&self) -> f64 {
        self.x
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn min_y(&self) -> f64 {
        self.y
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// True when the two rectangles share a region of non-zero area.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min_x() < other.max_x()
            && other.min_x() < self.max_x()
            && self.min_y() < other.max_y()
            && other.min_y() < self.max_y()
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }

        let x = self.min_x().max(other.min_x());
        let y = self.min_y().max(other.min_y());
        let max_x = self.max_x().min(other.max_x());
        let max_y = self.max_y().min(other.max_y());
        Some(Rect::new(x, y, max_x - x, max_y - y))
    }

    /// Grows the rectangle by `amount` on the left and right edges.
    pub fn padded_horizontally(&self, amount: f64) -> Rect {
        Rect::new(
            self.x - amount,
            self.y,
            self.width + amount * 2.0,
            self.height,
        )
    }
}

/// Flips a rectangle from accessibility space into overlay space.
pub fn to_overlay_space(rect: Rect, screen_height: f64) -> Rect {
    Rect::new(
        rect.x,
        screen_height - rect.y - rect.height,
        rect.width,
        rect.height,
    )
}

/// Inverse of [`to_overlay_space`]. The flip is its own inverse, the separate
/// name only documents which direction a call site converts in.
pub fn to_accessibility_space(rect: Rect, screen_height: f64) -> Rect {
    Rect::new(
        rect.x,
        screen_height - rect.y - rect.height,
        rect.width,
        rect.height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_maps_to_top_of_overlay_space() {
        let rect = Rect::new(0.0, 0.0, 100.0, 20.0);
        let flipped = to_overlay_space(rect, 900.0);
        assert_eq!(flipped, Rect::new(0.0, 880.0, 100.0, 20.0));
    }

    #[test]
    fn bottom_of_screen_maps_to_overlay_origin() {
        let rect = Rect::new(40.0, 880.0, 100.0, 20.0);
        let flipped = to_overlay_space(rect, 900.0);
        assert_eq!(flipped, Rect::new(40.0, 0.0, 100.0, 20.0));
    }

    #[test]
    fn coordinate_round_trip_is_identity() {
        let samples = [
            (Rect::new(12.5, 300.0, 44.0, 17.0), 1117.0),
            (Rect::new(-200.0, -40.0, 10.0, 10.0), 900.0),
            (Rect::new(0.0, 0.0, 0.0, 0.0), 0.0),
            (Rect::new(1920.0, 1079.0, 1.0, 1.0), 1080.0),
        ];

        for (rect, height) in samples {
            let back = to_accessibility_space(to_overlay_space(rect, height), height);
            assert_eq!(back, rect);
        }
    }

    #[test]
    fn intersection_clips_to_shared_region() {
        let window = Rect::new(0.0, 100.0, 500.0, 300.0);
        let word = Rect::new(480.0, 90.0, 40.0, 20.0);

        let clipped = word.intersection(&window).unwrap();
        assert_eq!(clipped, Rect::new(480.0, 100.0, 20.0, 10.0));
    }

    #[test]
    fn touching_edges_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert!(!a.intersects(&b));
        assert!(a.intersection(&b).is_none());
    }

    #[test]
    fn horizontal_padding_keeps_vertical_extent() {
        let padded = Rect::new(10.0, 5.0, 30.0, 12.0).padded_horizontally(1.0);
        assert_eq!(padded, Rect::new(9.0, 5.0, 32.0, 12.0));
    }
}
