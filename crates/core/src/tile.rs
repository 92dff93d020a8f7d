//! Tile coordinate math and utilities
//!
//! World coordinates are 32-bit fixed point: the whole world spans
//! `0..2^32` on each axis, and a tile at zoom `z` spans `2^(32 - z)` world
//! units. Geometry is carried tile-relative (world minus tile origin) until
//! [`to_tile_scale`] shifts it down to the requested detail.

use crate::draw::Draw;

/// Highest zoom representable with 32-bit world coordinates.
pub const MAX_ZOOM: u8 = 32;

/// Tile coordinates: x, y, and zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    /// Create a new tile coordinate
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// World coordinate of this tile's top-left corner.
    ///
    /// Zoom 0 is the single world tile, whose origin is always (0, 0).
    pub fn origin(&self) -> (i64, i64) {
        if self.z == 0 || self.z > MAX_ZOOM {
            return (0, 0);
        }
        let shift = 32 - self.z as u32;
        ((self.x as i64) << shift, (self.y as i64) << shift)
    }
}

/// Nominal tile width in world units.
///
/// At zoom 0 this is `0xFFFFFFFF` rather than `2^32`, matching the largest
/// unsigned 32-bit world coordinate.
pub fn tile_extent(zoom: u8) -> i64 {
    if zoom == 0 {
        0xFFFF_FFFF
    } else {
        1i64 << (32 - zoom.min(MAX_ZOOM) as u32)
    }
}

/// Number of bits dropped when going from world units to tile pixels.
///
/// Saturates at zero when `detail + zoom` exceeds 32; the pipeline rejects
/// such configurations before they reach this point.
#[inline]
pub fn tile_shift(zoom: u8, detail: u8) -> u32 {
    32u32.saturating_sub(detail as u32 + zoom as u32)
}

/// Size of one tile pixel in world units at the given zoom and detail.
#[inline]
pub fn pixel_size(zoom: u8, detail: u8) -> i64 {
    1i64 << tile_shift(zoom, detail)
}

/// Rescale tile-relative world coordinates into tile-local pixel units.
///
/// Uses an arithmetic shift, so coordinates in the negative buffer zone round
/// toward negative infinity.
pub fn to_tile_scale(geom: &mut [Draw], zoom: u8, detail: u8) {
    let shift = tile_shift(zoom, detail);
    for d in geom.iter_mut() {
        d.x >>= shift;
        d.y >>= shift;
    }
}

/// Axis-aligned bounding box in tile-relative world units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl BoundingBox {
    /// Create a new bounding box
    pub fn new(min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Create an empty bounding box (the sentinel any point tightens)
    pub fn empty() -> Self {
        Self {
            min_x: i64::MAX,
            min_y: i64::MAX,
            max_x: i64::MIN,
            max_y: i64::MIN,
        }
    }

    /// Check if no point has been added yet
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Expand this bounding box to include a point
    pub fn expand_point(&mut self, x: i64, y: i64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Expand this bounding box to include another
    pub fn expand(&mut self, other: &Self) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// The bounds as `[min_x, min_y, max_x, max_y]`
    pub fn to_array(&self) -> [i64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

/// The buffered square used by point and segment clipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipBounds {
    pub min: i64,
    pub max: i64,
}

impl ClipBounds {
    /// Tile square expanded by `buffer` 256ths of the tile extent on each side.
    ///
    /// Zoom 0 gets no buffer: the world tile already covers every coordinate.
    pub fn for_zoom(zoom: u8, buffer: i64) -> Self {
        if zoom == 0 {
            return Self {
                min: 0,
                max: tile_extent(0),
            };
        }

        let extent = tile_extent(zoom);
        let margin = buffer * extent / 256;
        Self {
            min: -margin,
            max: extent + margin,
        }
    }

    /// Inclusive containment test.
    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.min && y >= self.min && x <= self.max && y <= self.max
    }
}
