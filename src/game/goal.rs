//! Goal regions and the per-frame goal check

use glam::Vec2;

use crate::ws::protocol::Side;

use super::constants::{KICKOFF, SCREEN_WIDTH};

/// Axis-aligned rectangle, `min` top-left and `max` bottom-right
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            min: Vec2::new(x0, y0),
            max: Vec2::new(x1, y1),
        }
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) / 2.0
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }
}

/// Invalid goal layout
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("left goal line {left} is not left of right goal line {right}")]
    Overlapping { left: f32, right: f32 },

    #[error("kickoff point ({x}, {y}) lies inside a goal region")]
    KickoffInGoal { x: f32, y: f32 },
}

/// Scoring regions and, optionally, the posts the ball bounces off
#[derive(Debug, Clone, PartialEq)]
pub struct GoalGeometry {
    /// Ball left of this line (and below the bound) is in the left goal
    pub left_line_x: f32,
    /// Ball right of this line (and below the bound) is in the right goal
    pub right_line_x: f32,
    /// Goals only count below this height (larger y is lower)
    pub lower_bound_y: f32,
    /// Crossbars, left then right
    pub posts: Option<[Rect; 2]>,
}

impl GoalGeometry {
    pub fn new(
        left_line_x: f32,
        right_line_x: f32,
        lower_bound_y: f32,
        posts: Option<[Rect; 2]>,
    ) -> Result<Self, GeometryError> {
        if left_line_x >= right_line_x {
            return Err(GeometryError::Overlapping {
                left: left_line_x,
                right: right_line_x,
            });
        }

        let geometry = Self {
            left_line_x,
            right_line_x,
            lower_bound_y,
            posts,
        };

        let (x, y) = KICKOFF;
        if geometry.check(x, y).is_some() {
            return Err(GeometryError::KickoffInGoal { x, y });
        }
        Ok(geometry)
    }

    /// Open goal mouths at the field edges
    pub fn open() -> Result<Self, GeometryError> {
        Self::new(50.0, 1102.0, 500.0, None)
    }

    /// Goal mouths under solid crossbars
    pub fn with_crossbars() -> Result<Self, GeometryError> {
        Self::new(
            60.0,
            1092.0,
            520.0,
            Some([
                Rect::new(0.0, 488.0, 110.0, 504.0),
                Rect::new(SCREEN_WIDTH - 110.0, 488.0, SCREEN_WIDTH, 504.0),
            ]),
        )
    }

    /// Side credited with a goal if the ball centre is at `(x, y)`
    pub fn check(&self, x: f32, y: f32) -> Option<Side> {
        if y <= self.lower_bound_y {
            return None;
        }
        if x < self.left_line_x {
            Some(Side::Right)
        } else if x > self.right_line_x {
            Some(Side::Left)
        } else {
            None
        }
    }
}
