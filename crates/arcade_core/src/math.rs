//! Fixed-point math and axis-aligned rectangles.
//!
//! Positions, sizes and speeds are fixed-point so a recorded session
//! replays bit-for-bit on any CPU. Floating-point operations can round
//! differently across platforms.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Fixed-point 2D vector, used for velocities and displacements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X component.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y component.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Create a vector from whole numbers.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Check whether both components are zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.x == Fixed::ZERO && self.y == Fixed::ZERO
    }
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::AddAssign for Vec2Fixed {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

/// Axis-aligned bounding box.
///
/// Both axes are half-open intervals: the box covers `[x, x + width)` and
/// `[y, y + height)`. Two boxes that share only an edge do not overlap.
/// The y axis grows downward, as on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Top edge.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
    /// Width (non-negative).
    #[serde(with = "fixed_serde")]
    pub width: Fixed,
    /// Height (non-negative).
    #[serde(with = "fixed_serde")]
    pub height: Fixed,
}

impl Rect {
    /// Create a rectangle from its top-left corner and size.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed, width: Fixed, height: Fixed) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from whole numbers.
    #[must_use]
    pub fn from_ints(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(
            Fixed::from_num(x),
            Fixed::from_num(y),
            Fixed::from_num(width),
            Fixed::from_num(height),
        )
    }

    /// Right edge (exclusive).
    #[must_use]
    pub fn right(&self) -> Fixed {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    #[must_use]
    pub fn bottom(&self) -> Fixed {
        self.y + self.height
    }

    /// Top-left corner.
    #[must_use]
    pub fn origin(&self) -> Vec2Fixed {
        Vec2Fixed::new(self.x, self.y)
    }

    /// Whether the rectangle covers no area.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= Fixed::ZERO || self.height <= Fixed::ZERO
    }

    /// Half-open overlap test. Symmetric: `a.intersects(&b) == b.intersects(&a)`.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Whether `other` lies entirely within this rectangle.
    #[must_use]
    pub fn contains_rect(&self, other: &Self) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Copy of this rectangle moved by `delta`.
    #[must_use]
    pub fn translated(&self, delta: Vec2Fixed) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
            ..*self
        }
    }

    /// Smallest rectangle covering both `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Self::new(x, y, right - x, bottom - y)
    }
}

/// Sign of a fixed-point value as -1, 0 or 1.
#[must_use]
pub fn signum(value: Fixed) -> i32 {
    if value > Fixed::ZERO {
        1
    } else if value < Fixed::ZERO {
        -1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_determinism() {
        // Same operations must produce identical results
        let a = Fixed::from_num(1) / Fixed::from_num(3);
        let b = Fixed::from_num(1) / Fixed::from_num(3);
        assert_eq!(a, b);
        assert_eq!(a * Fixed::from_num(7), b * Fixed::from_num(7));
    }

    #[test]
    fn test_rect_edges() {
        let r = Rect::from_ints(10, 0, 5, 5);
        assert_eq!(r.right(), Fixed::from_num(15));
        assert_eq!(r.bottom(), Fixed::from_num(5));
        assert!(!r.is_empty());
        assert!(Rect::from_ints(0, 0, 0, 5).is_empty());
    }

    #[test]
    fn test_touching_edges_do_not_overlap() {
        let a = Rect::from_ints(10, 0, 5, 5);
        let b = Rect::from_ints(15, 0, 5, 5);
        assert!(!a.intersects(&b));
        assert!(!b.intersects(&a));

        let c = Rect::from_ints(14, 4, 5, 5);
        assert!(a.intersects(&c));
        assert!(c.intersects(&a));
    }

    #[test]
    fn test_union_and_translate() {
        let a = Rect::from_ints(0, 0, 2, 2);
        let moved = a.translated(Vec2Fixed::from_ints(8, 0));
        assert_eq!(moved, Rect::from_ints(8, 0, 2, 2));
        assert_eq!(a.union(&moved), Rect::from_ints(0, 0, 10, 2));
    }

    #[test]
    fn test_contains_rect() {
        let bounds = Rect::from_ints(0, 0, 100, 100);
        assert!(bounds.contains_rect(&Rect::from_ints(0, 0, 100, 100)));
        assert!(!bounds.contains_rect(&Rect::from_ints(96, 0, 5, 5)));
    }

    #[test]
    fn test_signum() {
        assert_eq!(signum(Fixed::from_num(-3)), -1);
        assert_eq!(signum(Fixed::ZERO), 0);
        assert_eq!(signum(Fixed::from_num(0.25)), 1);
    }
}
