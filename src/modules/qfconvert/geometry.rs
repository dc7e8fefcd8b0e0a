//! Grid geometry — points, compass directions and rectangular areas.
//!
//! Coordinates follow the DF screen: `x` grows east, `y` grows south.

use std::ops::{Add, Mul};
use std::str::FromStr;

use thiserror::Error;

/// Largest coordinate magnitude accepted from user input.  DF maps are far
/// smaller; the limit keeps cursor arithmetic well inside `i32`.
pub const COORD_LIMIT: i32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Halfway point, rounded towards the north-west.
    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x).div_euclid(2), (self.y + other.y).div_euclid(2))
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Mul<i32> for Point {
    type Output = Point;

    fn mul(self, rhs: i32) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

#[derive(Debug, Error)]
pub enum ParsePointError {
    #[error("expected a point as `x,y`, got `{0}`")]
    Syntax(String),
    #[error("coordinate {0} is outside ±{COORD_LIMIT}")]
    OutOfRange(i32),
}

impl FromStr for Point {
    type Err = ParsePointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePointError::Syntax(s.to_string());
        let (x, y) = s.split_once(',').ok_or_else(err)?;
        let x: i32 = x.trim().parse().map_err(|_| err())?;
        let y: i32 = y.trim().parse().map_err(|_| err())?;
        for v in [x, y] {
            if !(-COORD_LIMIT..=COORD_LIMIT).contains(&v) {
                return Err(ParsePointError::OutOfRange(v));
            }
        }
        Ok(Point::new(x, y))
    }
}

// ───────────────────────────────────────── direction ─────────

/// The eight cursor directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Direction {
    /// Direction from `start` towards `end`; `None` when they coincide.
    pub fn between(start: Point, end: Point) -> Option<Direction> {
        use Direction::*;
        let sign = |from: i32, to: i32| to.cmp(&from) as i32;
        match (sign(start.x, end.x), sign(start.y, end.y)) {
            (0, -1) => Some(N),
            (1, -1) => Some(NE),
            (1, 0) => Some(E),
            (1, 1) => Some(SE),
            (0, 1) => Some(S),
            (-1, 1) => Some(SW),
            (-1, 0) => Some(W),
            (-1, -1) => Some(NW),
            _ => None,
        }
    }

    pub fn compass(self) -> &'static str {
        match self {
            Direction::N => "n",
            Direction::NE => "ne",
            Direction::E => "e",
            Direction::SE => "se",
            Direction::S => "s",
            Direction::SW => "sw",
            Direction::W => "w",
            Direction::NW => "nw",
        }
    }

    /// Unit step in this direction.
    pub fn delta(self) -> Point {
        match self {
            Direction::N => Point::new(0, -1),
            Direction::NE => Point::new(1, -1),
            Direction::E => Point::new(1, 0),
            Direction::SE => Point::new(1, 1),
            Direction::S => Point::new(0, 1),
            Direction::SW => Point::new(-1, 1),
            Direction::W => Point::new(-1, 0),
            Direction::NW => Point::new(-1, -1),
        }
    }
}

// ───────────────────────────────────────── area ──────────────

/// Rectangle spanned by two opposite corners (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area {
    pub start: Point,
    pub end: Point,
}

impl Area {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn width(&self) -> i32 {
        (self.end.x - self.start.x).abs() + 1
    }

    pub fn height(&self) -> i32 {
        (self.end.y - self.start.y).abs() + 1
    }

    pub fn size(&self) -> i32 {
        self.width() * self.height()
    }

    /// The corner diagonally across from `corner`.
    pub fn opposite_corner(&self, corner: Point) -> Point {
        let (min_x, max_x) = (self.start.x.min(self.end.x), self.start.x.max(self.end.x));
        let (min_y, max_y) = (self.start.y.min(self.end.y), self.start.y.max(self.end.y));
        Point::new(
            if corner.x == min_x { max_x } else { min_x },
            if corner.y == min_y { max_y } else { min_y },
        )
    }
}
