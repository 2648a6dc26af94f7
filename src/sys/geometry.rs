//! rectangle type shared by the layout engine and the host boundary

use serde::{Deserialize, Serialize};

use crate::layout_engine::Orientation;

/// An axis-aligned rectangle in compositor pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect { x, y, width, height }
    }

    pub fn max_x(&self) -> f64 { self.x + self.width }

    pub fn max_y(&self) -> f64 { self.y + self.height }

    /// Start coordinate along `orientation`.
    pub fn start(&self, orientation: Orientation) -> f64 {
        match orientation {
            Orientation::Horizontal => self.x,
            Orientation::Vertical => self.y,
        }
    }

    /// Size along `orientation`.
    pub fn extent(&self, orientation: Orientation) -> f64 {
        match orientation {
            Orientation::Horizontal => self.width,
            Orientation::Vertical => self.height,
        }
    }

    /// Returns a copy with the span along `orientation` replaced; the cross
    /// axis is kept.
    pub fn with_span(&self, orientation: Orientation, start: f64, extent: f64) -> Rect {
        match orientation {
            Orientation::Horizontal => Rect { x: start, width: extent, ..*self },
            Orientation::Vertical => Rect { y: start, height: extent, ..*self },
        }
    }

    /// False if any component is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Shrinks the rectangle by `gap` on every side.
    pub fn inset(&self, gap: f64) -> Rect {
        Rect {
            x: self.x + gap,
            y: self.y + gap,
            width: (self.width - 2.0 * gap).max(0.0),
            height: (self.height - 2.0 * gap).max(0.0),
        }
    }
}

pub trait Round {
    fn round(&self) -> Self;
}

impl Round for Rect {
    fn round(&self) -> Self {
        let x = self.x.round();
        let y = self.y.round();
        Rect {
            x,
            y,
            width: self.max_x().round() - x,
            height: self.max_y().round() - y,
        }
    }
}

pub trait IsWithin {
    fn is_within(&self, how_much: f64, other: Self) -> bool;
}

impl IsWithin for Rect {
    fn is_within(&self, how_much: f64, other: Self) -> bool {
        self.x.is_within(how_much, other.x)
            && self.y.is_within(how_much, other.y)
            && self.width.is_within(how_much, other.width)
            && self.height.is_within(how_much, other.height)
    }
}

impl IsWithin for f64 {
    fn is_within(&self, how_much: f64, other: Self) -> bool { (self - other).abs() < how_much }
}

pub trait SameAs: IsWithin + Sized {
    fn same_as(&self, other: Self) -> bool { self.is_within(0.1, other) }
}

impl SameAs for Rect {}

pub trait RectExt {
    fn intersection(&self, other: &Self) -> Self;
    fn contains_point(&self, x: f64, y: f64) -> bool;
    fn contains_rect(&self, other: Self) -> bool;
    fn area(&self) -> f64;
}

impl RectExt for Rect {
    fn intersection(&self, other: &Self) -> Self {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let max_x = self.max_x().min(other.max_x());
        let max_y = self.max_y().min(other.max_y());
        Rect::new(x, y, (max_x - x).max(0.0), (max_y - y).max(0.0))
    }

    fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.max_x() && y >= self.y && y <= self.max_y()
    }

    fn contains_rect(&self, other: Self) -> bool {
        self.contains_point(other.x, other.y) && self.contains_point(other.max_x(), other.max_y())
    }

    fn area(&self) -> f64 { self.width.max(0.0) * self.height.max(0.0) }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_round_keeps_far_edges() {
        let rect = Rect::new(10.4, 10.6, 100.3, 50.2);
        let rounded = rect.round();
        assert_eq!(rounded, Rect::new(10.0, 11.0, 101.0, 50.0));
        assert_eq!(rounded.max_x(), rect.max_x().round());
    }

    #[test]
    fn test_inset_subtracts_gap_on_every_side() {
        let rect = Rect::new(0.0, 0.0, 1000.0, 800.0);
        assert_eq!(rect.inset(10.0), Rect::new(10.0, 10.0, 980.0, 780.0));
        assert_eq!(rect.inset(600.0).width, 0.0);
    }

    #[test]
    fn test_with_span_replaces_primary_axis_only() {
        let rect = Rect::new(10.0, 20.0, 100.0, 200.0);
        assert_eq!(
            rect.with_span(Orientation::Horizontal, 50.0, 30.0),
            Rect::new(50.0, 20.0, 30.0, 200.0)
        );
        assert_eq!(
            rect.with_span(Orientation::Vertical, 5.0, 15.0),
            Rect::new(10.0, 5.0, 100.0, 15.0)
        );
        assert_eq!(rect.extent(Orientation::Vertical), 200.0);
        assert_eq!(rect.start(Orientation::Horizontal), 10.0);
    }

    #[test]
    fn test_is_finite_rejects_nan() {
        assert!(Rect::new(0.0, 0.0, 1.0, 1.0).is_finite());
        assert!(!Rect::new(f64::NAN, 0.0, 1.0, 1.0).is_finite());
        assert!(!Rect::new(0.0, 0.0, f64::INFINITY, 1.0).is_finite());
    }

    #[test]
    fn test_intersection_and_containment() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(50.0, 50.0, 100.0, 100.0);
        assert_eq!(a.intersection(&b), Rect::new(50.0, 50.0, 50.0, 50.0));
        assert_eq!(a.intersection(&b).area(), 2500.0);
        assert!(a.contains_rect(Rect::new(10.0, 10.0, 20.0, 20.0)));
        assert!(!a.contains_rect(b));
        assert!(a.same_as(Rect::new(0.05, 0.0, 100.0, 99.95)));
    }
}
