//! Rectangle math over native screen coordinates.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativePoint {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeSize {
    pub width: i32,
    pub height: i32,
}

/// Rectangle with the same layout as the Win32 `RECT`.
///
/// `right` and `bottom` are exclusive.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl NativeRect {
    pub const EMPTY: NativeRect = NativeRect {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };

    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_origin_size(origin: NativePoint, size: NativeSize) -> Self {
        Self::new(
            origin.x,
            origin.y,
            origin.x + size.width,
            origin.y + size.height,
        )
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn origin(&self) -> NativePoint {
        NativePoint {
            x: self.left,
            y: self.top,
        }
    }

    pub fn size(&self) -> NativeSize {
        NativeSize {
            width: self.width(),
            height: self.height(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn contains_point(&self, point: NativePoint) -> bool {
        point.x >= self.left && point.x < self.right && point.y >= self.top && point.y < self.bottom
    }

    pub fn contains(&self, other: &NativeRect) -> bool {
        !other.is_empty()
            && other.left >= self.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }

    pub fn intersects(&self, other: &NativeRect) -> bool {
        !self.intersection(other).is_empty()
    }

    /// Overlapping area, [`NativeRect::EMPTY`] when there is none.
    pub fn intersection(&self, other: &NativeRect) -> NativeRect {
        let rect = NativeRect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        if rect.is_empty() {
            NativeRect::EMPTY
        } else {
            rect
        }
    }

    /// Smallest rectangle covering both; empty inputs are ignored.
    pub fn union(&self, other: &NativeRect) -> NativeRect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        NativeRect::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    pub fn offset(&self, dx: i32, dy: i32) -> NativeRect {
        NativeRect::new(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }

    fn overlaps_vertically(&self, other: &NativeRect) -> bool {
        self.top < other.bottom && other.top < self.bottom
    }

    fn overlaps_horizontally(&self, other: &NativeRect) -> bool {
        self.left < other.right && other.left < self.right
    }

    /// `self` touches the left edge of `other`.
    pub fn is_docked_left_of(&self, other: &NativeRect) -> bool {
        self.right == other.left && self.overlaps_vertically(other)
    }

    pub fn is_docked_right_of(&self, other: &NativeRect) -> bool {
        other.is_docked_left_of(self)
    }

    /// `self` touches the top edge of `other`.
    pub fn is_docked_above(&self, other: &NativeRect) -> bool {
        self.bottom == other.top && self.overlaps_horizontally(other)
    }

    pub fn is_docked_below(&self, other: &NativeRect) -> bool {
        other.is_docked_above(self)
    }
}
