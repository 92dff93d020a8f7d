//! Draw commands: the in-memory geometry representation shared by every stage.
//!
//! A feature's geometry is a flat sequence of [`Draw`] values, each an
//! operation plus a fixed-point coordinate. Subpaths start with a `MoveTo`,
//! continue with `LineTo`s, and polygon rings may end with a `ClosePath`.
//! The primitive kind ([`GeomType`]) travels next to the sequence rather than
//! inside it.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// A drawing operation.
///
/// The stream-level `End` tag is deliberately absent: it only terminates a
/// decode and never appears in processed geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    MoveTo,
    LineTo,
    ClosePath,
}

/// One point-command of a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Draw {
    pub op: Op,
    pub x: i64,
    pub y: i64,
}

/// An ordered sequence of draws describing one or more subpaths.
pub type DrawVec = Vec<Draw>;

impl Draw {
    pub fn new(op: Op, x: i64, y: i64) -> Self {
        Self { op, x, y }
    }

    pub fn move_to(x: i64, y: i64) -> Self {
        Self::new(Op::MoveTo, x, y)
    }

    pub fn line_to(x: i64, y: i64) -> Self {
        Self::new(Op::LineTo, x, y)
    }

    /// `ClosePath` carries no coordinate; it is stored as (0, 0).
    pub fn close_path() -> Self {
        Self::new(Op::ClosePath, 0, 0)
    }

    /// True if both draws sit on the same coordinate, regardless of operation.
    #[inline]
    pub fn same_point(&self, other: &Draw) -> bool {
        self.x == other.x && self.y == other.y
    }
}

/// Primitive kind of a feature, selecting which pipeline branch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeomType {
    Point,
    Line,
    Polygon,
}

// ============================================================================
// Subpath boundaries
// ============================================================================

/// A piece of a draw sequence as seen by ring-structured passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// A `MoveTo` followed by zero or more `LineTo`s, as an index range.
    Subpath(Range<usize>),
    /// Any draw that does not start a subpath (`ClosePath`, or a stray `LineTo`).
    Other(usize),
}

/// Iterator over the [`Piece`]s of a draw sequence.
pub struct Pieces<'a> {
    geom: &'a [Draw],
    pos: usize,
}

impl Iterator for Pieces<'_> {
    type Item = Piece;

    fn next(&mut self) -> Option<Piece> {
        let start = self.pos;
        let draw = self.geom.get(start)?;

        if draw.op == Op::MoveTo {
            let end = subpath_end(self.geom, start);
            self.pos = end;
            Some(Piece::Subpath(start..end))
        } else {
            self.pos = start + 1;
            Some(Piece::Other(start))
        }
    }
}

/// Split a draw sequence into subpaths and stray operations.
///
/// ```
/// use tilegeom_core::draw::{pieces, Draw, Piece};
///
/// let geom = vec![
///     Draw::move_to(0, 0),
///     Draw::line_to(1, 0),
///     Draw::close_path(),
///     Draw::move_to(5, 5),
/// ];
/// let found: Vec<Piece> = pieces(&geom).collect();
/// assert_eq!(
///     found,
///     vec![Piece::Subpath(0..2), Piece::Other(2), Piece::Subpath(3..4)]
/// );
/// ```
pub fn pieces(geom: &[Draw]) -> Pieces<'_> {
    Pieces { geom, pos: 0 }
}

/// Index one past the last `LineTo` of the subpath starting at `start`.
pub fn subpath_end(geom: &[Draw], start: usize) -> usize {
    geom[start + 1..]
        .iter()
        .position(|d| d.op != Op::LineTo)
        .map_or(geom.len(), |offset| start + 1 + offset)
}

// ============================================================================
// Area
// ============================================================================

/// Twice the signed shoelace area of a ring, computed exactly.
///
/// The ring is treated as closed (the last vertex wraps to the first), so an
/// explicitly repeated closing point contributes nothing.
pub fn twice_signed_area(ring: &[Draw]) -> i128 {
    let n = ring.len();
    (0..n)
        .map(|k| {
            let a = &ring[k];
            let b = &ring[(k + 1) % n];
            a.x as i128 * b.y as i128 - a.y as i128 * b.x as i128
        })
        .sum()
}

/// Signed shoelace area of a ring in double precision.
///
/// Positive for outer rings under this crate's convention (y grows downward
/// in tile space, so outer rings run clockwise on screen, as MVT expects).
pub fn signed_area(ring: &[Draw]) -> f64 {
    twice_signed_area(ring) as f64 / 2.0
}
