//! Rectangles and rectangle-list regions in bitmap or device coordinates.

use alloc::vec::Vec;

/// Half-open rectangle: `left..right` by `top..bottom`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle anchored at the origin with the given size.
    pub const fn from_size(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Bounding rectangle of a signed extent.
    ///
    /// A negative width or height describes a mirrored range that ends at `x` (or `y`)
    /// inclusive, so the swapped edges are shifted right (down) by one pixel.
    pub fn bounding(x: i32, y: i32, width: i32, height: i32) -> Self {
        let mut rect = Self::new(x, y, x.saturating_add(width), y.saturating_add(height));
        if rect.left > rect.right {
            core::mem::swap(&mut rect.left, &mut rect.right);
            rect.left = rect.left.saturating_add(1);
            rect.right = rect.right.saturating_add(1);
        }
        if rect.top > rect.bottom {
            core::mem::swap(&mut rect.top, &mut rect.bottom);
            rect.top = rect.top.saturating_add(1);
            rect.bottom = rect.bottom.saturating_add(1);
        }
        rect
    }

    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Intersection of two rectangles, or `None` when they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let rect = Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        if rect.is_empty() { None } else { Some(rect) }
    }

    /// Move by `(dx, dy)`. Edges saturate at the ends of the `i32` range.
    pub fn offset(&mut self, dx: i32, dy: i32) {
        self.left = self.left.saturating_add(dx);
        self.right = self.right.saturating_add(dx);
        self.top = self.top.saturating_add(dy);
        self.bottom = self.bottom.saturating_add(dy);
    }

    pub fn offset_by(mut self, dx: i32, dy: i32) -> Self {
        self.offset(dx, dy);
        self
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }
}

/// A set of non-empty rectangles.
///
/// Used as the clip region produced by RLE decoding (which scanline spans were
/// written) and as the clip handed to a destination surface.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rectangle. Spans adjacent to the previous span on the same rows merge.
    pub fn union_rect(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        if let Some(last) = self.rects.last_mut() {
            if last.top == rect.top && last.bottom == rect.bottom {
                if rect.left <= last.right && rect.right >= last.left {
                    last.left = last.left.min(rect.left);
                    last.right = last.right.max(rect.right);
                    return;
                }
            }
        }
        self.rects.push(rect);
    }

    pub fn offset(&mut self, dx: i32, dy: i32) {
        for rect in &mut self.rects {
            rect.offset(dx, dy);
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.rects.iter().any(|r| r.contains(x, y))
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Smallest rectangle covering every span, if any.
    pub fn bounds(&self) -> Option<Rect> {
        let mut iter = self.rects.iter();
        let first = *iter.next()?;
        Some(iter.fold(first, |acc, r| {
            Rect::new(
                acc.left.min(r.left),
                acc.top.min(r.top),
                acc.right.max(r.right),
                acc.bottom.max(r.bottom),
            )
        }))
    }
}
