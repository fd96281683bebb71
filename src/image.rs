// SPDX-License-Identifier: Apache-2.0

//! Small-grid images: an origin offset, a width/height, and a row-major mask
//! of color values in `[0, COLORS)`.

use serde::{Deserialize, Serialize};

/// Number of distinct pixel values a finished image may contain.
pub const COLORS: u8 = 10;

/// Sentinel for a pixel that has not been decided yet. Only ever present
/// while a composition is in flight, never in a finished image.
pub const UNSET: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }
}

/// A grid image. Equality is structural: offset, size and mask.
///
/// The derived `Ord` (offset, then size, then mask) is relied on by the final
/// candidate sort in [`crate::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Image {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub mask: Vec<u8>,
}

impl Image {
    /// Builds an image of the given size with every pixel set to `value`.
    pub fn full(pos: Point, size: Point, value: u8) -> Image {
        assert!(size.x >= 0 && size.y >= 0, "negative image size: {size:?}");
        Image {
            x: pos.x,
            y: pos.y,
            w: size.x,
            h: size.y,
            mask: vec![value; (size.x * size.y) as usize],
        }
    }

    pub fn size(&self) -> Point {
        Point::new(self.w, self.h)
    }

    pub fn area(&self) -> i64 {
        self.w as i64 * self.h as i64
    }

    /// Pixel at row `i`, column `j`.
    pub fn pixel(&self, i: i32, j: i32) -> u8 {
        debug_assert!(i >= 0 && i < self.h && j >= 0 && j < self.w);
        self.mask[(i * self.w + j) as usize]
    }

    /// 64-bit polynomial hash over offset, size and mask contents.
    pub fn content_hash(&self) -> u64 {
        let mut r: u64 = 1;
        for v in [self.x, self.y, self.w, self.h] {
            r = r.wrapping_mul(1069388789821391921).wrapping_add(v as u64);
        }
        for &c in &self.mask {
            r = r.wrapping_mul(1069388789821391921).wrapping_add(c as u64);
        }
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_and_pixel() {
        let img = Image::full(Point::new(1, 2), Point::new(3, 2), 7);
        assert_eq!(img.area(), 6);
        assert_eq!(img.pixel(1, 2), 7);
        assert_eq!(img.size(), Point::new(3, 2));
    }

    #[test]
    fn content_hash_differs_on_offset() {
        let a = Image::full(Point::new(0, 0), Point::new(2, 2), 0);
        let b = Image::full(Point::new(1, 0), Point::new(2, 2), 0);
        assert_ne!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash(), a.clone().content_hash());
    }
}
