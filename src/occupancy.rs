//! Quadrant occupancy: where the map is thin.

use serde::Serialize;

use crate::coords::{quadrant_of, Quadrant};
use crate::map::{Axis, Item};

/// Items per quadrant on a pair of axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuadrantCounts {
    pub top_right: usize,
    pub top_left: usize,
    pub bottom_right: usize,
    pub bottom_left: usize,
}

impl QuadrantCounts {
    pub fn get(&self, quadrant: Quadrant) -> usize {
        match quadrant {
            Quadrant::TopRight => self.top_right,
            Quadrant::TopLeft => self.top_left,
            Quadrant::BottomRight => self.bottom_right,
            Quadrant::BottomLeft => self.bottom_left,
        }
    }

    fn bump(&mut self, quadrant: Quadrant) {
        match quadrant {
            Quadrant::TopRight => self.top_right += 1,
            Quadrant::TopLeft => self.top_left += 1,
            Quadrant::BottomRight => self.bottom_right += 1,
            Quadrant::BottomLeft => self.bottom_left += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.top_right + self.top_left + self.bottom_right + self.bottom_left
    }

    /// Least populated quadrant; ties go to the earliest in [`Quadrant::ALL`].
    pub fn least_populated(&self) -> Quadrant {
        let mut best = Quadrant::ALL[0];
        for quadrant in Quadrant::ALL.into_iter().skip(1) {
            if self.get(quadrant) < self.get(best) {
                best = quadrant;
            }
        }
        best
    }
}

/// Occupancy summary used to target a competitor suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occupancy {
    pub counts: QuadrantCounts,
    pub target: Quadrant,
    pub target_description: String,
}

/// Count items per quadrant on the given axes and pick the emptiest one.
///
/// With no items every count is zero and the target is
/// [`Quadrant::TopRight`], the first quadrant in enumeration order.
pub fn analyze(items: &[Item], x_axis: &Axis, y_axis: &Axis) -> Occupancy {
    let mut counts = QuadrantCounts::default();
    for item in items {
        let (x, y) = item.position(&x_axis.id, &y_axis.id);
        counts.bump(quadrant_of(x, y));
    }

    let target = counts.least_populated();
    Occupancy {
        counts,
        target,
        target_description: describe(target, x_axis, y_axis),
    }
}

/// "High <x label> and Low <y label>" style description of a quadrant.
pub fn describe(quadrant: Quadrant, x_axis: &Axis, y_axis: &Axis) -> String {
    let level = |high: bool| if high { "High" } else { "Low" };
    format!(
        "{} {} and {} {}",
        level(quadrant.high_x()),
        x_axis.label,
        level(quadrant.high_y()),
        y_axis.label
    )
}
