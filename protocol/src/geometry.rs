//! Integer grid geometry. All ranges in the arena are Chebyshev ranges.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A cell of the arena grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }

    /// max(|dx|, |dy|).
    pub fn chebyshev(&self, other: &Point) -> i32 {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        dx.max(dy)
    }

    /// One king's step toward `target`. Returns `self` if already there.
    pub fn step_toward(&self, target: &Point) -> Point {
        Point {
            x: self.x + (target.x - self.x).signum(),
            y: self.y + (target.y - self.y).signum(),
        }
    }

    /// The neighbouring cell in the given direction.
    pub fn step(&self, direction: Direction) -> Point {
        let (dx, dy) = direction.offset();
        Point {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Checks if the point lies in `[0, width) x [0, height)`.
    pub fn is_within(&self, width: i32, height: i32) -> bool {
        self.x >= 0 && self.y >= 0 && self.x < width && self.y < height
    }

    /// Clamps the point into `[0, width) x [0, height)`.
    pub fn clamped(&self, width: i32, height: i32) -> Point {
        Point {
            x: self.x.clamp(0, (width - 1).max(0)),
            y: self.y.clamp(0, (height - 1).max(0)),
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The eight compass directions, in the order a wandering character tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
    North,
    NorthEast,
}

impl Direction {
    /// Clockwise order starting east.
    pub const ALL: [Direction; 8] = [
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
        Direction::North,
        Direction::NorthEast,
    ];

    /// The grid offset. y grows southwards.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::East => (1, 0),
            Direction::SouthEast => (1, 1),
            Direction::South => (0, 1),
            Direction::SouthWest => (-1, 1),
            Direction::West => (-1, 0),
            Direction::NorthWest => (-1, -1),
            Direction::North => (0, -1),
            Direction::NorthEast => (1, -1),
        }
    }

    /// The directions in compass order, beginning with `self`.
    pub fn rotations(self) -> impl Iterator<Item = Direction> {
        let start = Direction::ALL
            .iter()
            .position(|d| *d == self)
            .unwrap_or_default();
        (0..Direction::ALL.len()).map(move |i| Direction::ALL[(start + i) % Direction::ALL.len()])
    }
}
