//! Normalized 0–100 axis space.
//!
//! Every stored coordinate lives in the closed interval [0, 100]: 0 is an
//! axis's left pole, 100 its right pole. On the vertical axis 100 is drawn at
//! the top, while screen and slide origins are top-left, so Y is flipped on
//! the way out and back in.

use serde::{Deserialize, Serialize};

pub const AXIS_MIN: f64 = 0.0;
pub const AXIS_MAX: f64 = 100.0;
/// Value read for an axis an item has no stored value for.
pub const AXIS_CENTER: f64 = 50.0;

/// Clamp a coordinate into [0, 100].
///
/// Applied to every externally supplied or AI-supplied coordinate before it
/// is stored. NaN has no position on the axis and reads as the center.
pub fn clamp(value: f64) -> f64 {
    if value.is_nan() {
        return AXIS_CENTER;
    }
    value.clamp(AXIS_MIN, AXIS_MAX)
}

/// Linear map from `[axis_min, axis_max]` to `[0, pixel_extent]`.
///
/// With `invert_y` the result is measured from the far edge, so `axis_max`
/// lands on pixel 0 (the top of the chart).
pub fn to_screen(value: f64, axis_min: f64, axis_max: f64, pixel_extent: f64, invert_y: bool) -> f64 {
    let span = axis_max - axis_min;
    if span <= 0.0 {
        return 0.0;
    }
    let fraction = (value - axis_min) / span;
    let fraction = if invert_y { 1.0 - fraction } else { fraction };
    fraction * pixel_extent
}

/// Inverse of [`to_screen`] over the normalized axis.
///
/// The pixel is clamped to the container before conversion, so a card
/// dropped outside the chart lands on its edge.
pub fn from_screen(pixel: f64, pixel_extent: f64, invert_y: bool) -> f64 {
    if pixel_extent <= 0.0 || pixel.is_nan() {
        return AXIS_CENTER;
    }
    let fraction = pixel.clamp(0.0, pixel_extent) / pixel_extent;
    let fraction = if invert_y { 1.0 - fraction } else { fraction };
    clamp(fraction * AXIS_MAX)
}

/// A rectangular drawing area (screen pixels or slide inches).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Position of a normalized `(x, y)` point inside the viewport.
    pub fn project(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.left + to_screen(clamp(x), AXIS_MIN, AXIS_MAX, self.width, false),
            self.top + to_screen(clamp(y), AXIS_MIN, AXIS_MAX, self.height, true),
        )
    }

    /// Normalized `(x, y)` for a point inside the viewport.
    pub fn unproject(&self, px: f64, py: f64) -> (f64, f64) {
        (
            from_screen(px - self.left, self.width, false),
            from_screen(py - self.top, self.height, true),
        )
    }
}

/// One of the four regions split at the midpoint of both active axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Quadrant {
    TopRight,
    TopLeft,
    BottomRight,
    BottomLeft,
}

impl Quadrant {
    /// Enumeration order; the first entry wins occupancy ties.
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopRight,
        Quadrant::TopLeft,
        Quadrant::BottomRight,
        Quadrant::BottomLeft,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quadrant::TopRight => "top-right",
            Quadrant::TopLeft => "top-left",
            Quadrant::BottomRight => "bottom-right",
            Quadrant::BottomLeft => "bottom-left",
        }
    }

    /// Whether the quadrant sits on the high side of the X axis.
    pub fn high_x(&self) -> bool {
        matches!(self, Quadrant::TopRight | Quadrant::BottomRight)
    }

    /// Whether the quadrant sits on the high side of the Y axis.
    pub fn high_y(&self) -> bool {
        matches!(self, Quadrant::TopRight | Quadrant::TopLeft)
    }
}

impl std::fmt::Display for Quadrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quadrant membership. A value of exactly 50 counts as the high side.
pub fn quadrant_of(x: f64, y: f64) -> Quadrant {
    let high_x = x >= AXIS_CENTER;
    let high_y = y >= AXIS_CENTER;
    match (high_x, high_y) {
        (true, true) => Quadrant::TopRight,
        (false, true) => Quadrant::TopLeft,
        (true, false) => Quadrant::BottomRight,
        (false, false) => Quadrant::BottomLeft,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp(-5.0), 0.0);
        assert_eq!(clamp(150.0), 100.0);
        assert_eq!(clamp(42.0), 42.0);
        assert_eq!(clamp(f64::INFINITY), 100.0);
        assert_eq!(clamp(f64::NEG_INFINITY), 0.0);
        assert_eq!(clamp(f64::NAN), 50.0);
    }

    #[test]
    fn clamp_always_in_range() {
        for v in [-1e300, -100.0, -0.0001, 0.0, 0.5, 50.0, 99.999, 100.0, 100.0001, 1e300] {
            let c = clamp(v);
            assert!((0.0..=100.0).contains(&c), "clamp({v}) = {c}");
        }
    }

    #[test]
    fn quadrant_tie_break_goes_high() {
        assert_eq!(quadrant_of(50.0, 50.0), Quadrant::TopRight);
        assert_eq!(quadrant_of(49.999, 50.0), Quadrant::TopLeft);
        assert_eq!(quadrant_of(50.0, 49.999), Quadrant::BottomRight);
        assert_eq!(quadrant_of(0.0, 0.0), Quadrant::BottomLeft);
    }

    #[test]
    fn to_screen_inverts_y() {
        assert_eq!(to_screen(100.0, 0.0, 100.0, 400.0, true), 0.0);
        assert_eq!(to_screen(0.0, 0.0, 100.0, 400.0, true), 400.0);
        assert_eq!(to_screen(25.0, 0.0, 100.0, 400.0, false), 100.0);
        assert_eq!(to_screen(10.0, 10.0, 10.0, 400.0, false), 0.0);
    }

    #[test]
    fn from_screen_clamps_to_container() {
        assert_eq!(from_screen(-30.0, 200.0, false), 0.0);
        assert_eq!(from_screen(250.0, 200.0, false), 100.0);
        assert_eq!(from_screen(0.0, 200.0, true), 100.0);
        assert_eq!(from_screen(50.0, 200.0, true), 75.0);
        assert_eq!(from_screen(10.0, 0.0, false), 50.0);
    }

    #[test]
    fn viewport_projects_and_unprojects() {
        let slide = Viewport::new(1.0, 0.5, 8.0, 6.0);
        assert_eq!(slide.project(0.0, 100.0), (1.0, 0.5));
        assert_eq!(slide.project(100.0, 0.0), (9.0, 6.5));
        assert_eq!(slide.project(50.0, 50.0), (5.0, 3.5));
        assert_eq!(slide.unproject(5.0, 3.5), (50.0, 50.0));
        assert_eq!(slide.unproject(-3.0, 100.0), (0.0, 0.0));
    }
}
