//! Tiny polygon reduction.
//!
//! Polygons smaller than a couple of pixels at the current zoom would either
//! vanish or render as noise. Dropping them outright loses area: a field of
//! small lakes disappears at low zoom even though together they cover a
//! visible region. Instead, their area is diffused:
//!
//! > Any polygons that are smaller than a minimum area will have their
//! > probability diffused, so that some of them will be drawn as a square of
//! > this minimum size and others will not be drawn at all, preserving the
//! > total area that all of them should have had together.
//!
//! [`TinyPolygonReducer`] carries the accumulated area from one feature to
//! the next, so it must be threaded through the features of one tile in
//! order.
//!
//! # Coordinate System
//!
//! Rings are measured in tile-relative world units, before rescaling. The
//! minimum size is two tile pixels on a side.

use crate::draw::{pieces, signed_area, Draw, DrawVec, Op, Piece};
use crate::tile::pixel_size;

/// Result of [`TinyPolygonReducer::reduce`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub geometry: DrawVec,
    /// True when no ring was kept as-is: the feature now consists only of
    /// stand-in squares, or of nothing at all.
    pub reduced: bool,
}

/// Diffuses the area of sub-pixel rings across the features of a tile.
#[derive(Debug, Clone, Default)]
pub struct TinyPolygonReducer {
    accum_area: f64,
}

impl TinyPolygonReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already accumulated area.
    pub fn with_accumulated(accum_area: f64) -> Self {
        Self { accum_area }
    }

    /// Area carried over from previously reduced rings.
    pub fn accumulated(&self) -> f64 {
        self.accum_area
    }

    /// Forget the carried area, e.g. when starting a new tile.
    pub fn reset(&mut self) {
        self.accum_area = 0.0;
    }

    /// Replace tiny rings with their share of minimum-size squares.
    ///
    /// A ring is folded into the accumulator when its area is at most one
    /// minimum square, or when it is a hole whose outer ring was not kept.
    /// Whenever the accumulator exceeds one minimum square, a square centred
    /// on the ring's first point is emitted in its place and its area paid
    /// out of the accumulator. All other rings are kept unchanged.
    ///
    /// Rings may be explicitly closed or `ClosePath`-terminated; emitted
    /// squares follow the form of the ring they replace.
    pub fn reduce(&mut self, geom: &[Draw], zoom: u8, detail: u8) -> Reduction {
        let pixel = pixel_size(zoom, detail) * 2;
        let min_area = (pixel as f64) * (pixel as f64);

        let mut out = DrawVec::with_capacity(geom.len());
        let mut reduced = true;
        let mut included_last_outer = false;

        let mut iter = pieces(geom).peekable();
        while let Some(piece) = iter.next() {
            let range = match piece {
                Piece::Subpath(range) => range,
                Piece::Other(index) => {
                    log::debug!(
                        "Passing through stray {:?} at draw {} of {}",
                        geom[index].op,
                        index,
                        geom.len()
                    );
                    out.push(geom[index]);
                    continue;
                }
            };

            let closes = geom.get(range.end).is_some_and(|d| d.op == Op::ClosePath);
            if closes {
                iter.next();
            }

            let ring = &geom[range.clone()];
            let area = signed_area(ring);

            if area.abs() <= min_area || (area < 0.0 && !included_last_outer) {
                self.accum_area += area;
                if self.accum_area > min_area {
                    push_square(&ring[0], pixel, closes, &mut out);
                    self.accum_area -= min_area;
                }
                if area >= 0.0 {
                    included_last_outer = false;
                }
            } else {
                out.extend_from_slice(ring);
                if closes {
                    out.push(Draw::close_path());
                }
                reduced = false;
                if area >= 0.0 {
                    included_last_outer = true;
                }
            }
        }

        Reduction {
            geometry: out,
            reduced,
        }
    }
}

fn push_square(center: &Draw, pixel: i64, close_path: bool, out: &mut DrawVec) {
    let half = pixel / 2;
    let (x, y) = (center.x, center.y);
    out.push(Draw::move_to(x - half, y - half));
    out.push(Draw::line_to(x + half, y - half));
    out.push(Draw::line_to(x + half, y + half));
    out.push(Draw::line_to(x - half, y + half));
    if close_path {
        out.push(Draw::close_path());
    } else {
        out.push(Draw::line_to(x - half, y - half));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // zoom 0, detail 30: one pixel is 4 units, the minimum square is 8x8
    const Z: u8 = 0;
    const DETAIL: u8 = 30;
    const MIN_AREA: f64 = 64.0;

    fn closed_rect(x0: i64, y0: i64, w: i64, h: i64) -> DrawVec {
        vec![
            Draw::move_to(x0, y0),
            Draw::line_to(x0 + w, y0),
            Draw::line_to(x0 + w, y0 + h),
            Draw::line_to(x0, y0 + h),
            Draw::line_to(x0, y0),
        ]
    }

    fn reversed(ring: &[Draw]) -> DrawVec {
        let mut r: DrawVec = ring.iter().rev().copied().collect();
        r[0].op = Op::MoveTo;
        let last = r.len() - 1;
        r[last].op = Op::LineTo;
        r
    }

    #[test]
    fn test_large_polygon_kept() {
        let mut reducer = TinyPolygonReducer::new();
        let geom = closed_rect(0, 0, 100, 100);

        let result = reducer.reduce(&geom, Z, DETAIL);

        assert_eq!(result.geometry, geom);
        assert!(!result.reduced);
        assert_eq!(reducer.accumulated(), 0.0);
    }

    #[test]
    fn test_tiny_polygon_accumulates_then_squares() {
        let mut reducer = TinyPolygonReducer::new();
        let tiny = closed_rect(100, 100, 8, 5); // area 40

        let first = reducer.reduce(&tiny, Z, DETAIL);
        assert!(first.geometry.is_empty());
        assert!(first.reduced);
        assert_eq!(reducer.accumulated(), 40.0);

        let second = reducer.reduce(&tiny, Z, DETAIL);
        assert!(second.reduced);
        assert_eq!(second.geometry, closed_rect(96, 96, 8, 8));
        assert_eq!(reducer.accumulated(), 80.0 - MIN_AREA);
    }

    #[test]
    fn test_square_follows_closepath_form() {
        let mut reducer = TinyPolygonReducer::with_accumulated(60.0);
        let mut ring = closed_rect(0, 0, 2, 3);
        ring.pop();
        ring.push(Draw::close_path());

        let result = reducer.reduce(&ring, Z, DETAIL);

        assert_eq!(
            result.geometry,
            vec![
                Draw::move_to(-4, -4),
                Draw::line_to(4, -4),
                Draw::line_to(4, 4),
                Draw::line_to(-4, 4),
                Draw::close_path(),
            ]
        );
    }

    #[test]
    fn test_closepath_ring_kept_with_terminator() {
        let mut reducer = TinyPolygonReducer::new();
        let mut ring = closed_rect(0, 0, 50, 50);
        ring.pop();
        ring.push(Draw::close_path());

        let result = reducer.reduce(&ring, Z, DETAIL);
        assert_eq!(result.geometry, ring);
    }

    #[test]
    fn test_hole_of_kept_outer_is_kept() {
        let mut reducer = TinyPolygonReducer::new();
        let mut geom = closed_rect(0, 0, 100, 100);
        geom.extend(reversed(&closed_rect(10, 10, 20, 20)));

        let result = reducer.reduce(&geom, Z, DETAIL);
        assert_eq!(result.geometry, geom);
        assert_eq!(reducer.accumulated(), 0.0);
    }

    #[test]
    fn test_hole_of_reduced_outer_is_folded() {
        let mut reducer = TinyPolygonReducer::new();
        let mut geom = closed_rect(0, 0, 5, 5); // area 25, reduced
        geom.extend(reversed(&closed_rect(0, 0, 20, 20))); // area -400

        let result = reducer.reduce(&geom, Z, DETAIL);
        assert!(result.geometry.is_empty());
        assert!(result.reduced);
        assert_eq!(reducer.accumulated(), 25.0 - 400.0);
    }

    #[test]
    fn test_two_point_ring_vanishes() {
        let geom = vec![Draw::move_to(0, 0), Draw::line_to(10, 10)];

        let mut fresh = TinyPolygonReducer::new();
        assert!(fresh.reduce(&geom, Z, DETAIL).geometry.is_empty());

        let mut primed = TinyPolygonReducer::with_accumulated(MIN_AREA + 1.0);
        let result = primed.reduce(&geom, Z, DETAIL);
        assert_eq!(result.geometry, closed_rect(-4, -4, 8, 8));
        assert_eq!(primed.accumulated(), 1.0);
    }

    #[test]
    fn test_stray_operation_passes_through() {
        let mut reducer = TinyPolygonReducer::new();
        let geom = vec![Draw::line_to(1, 1)];
        let result = reducer.reduce(&geom, Z, DETAIL);
        assert_eq!(result.geometry, geom);
    }

    #[test]
    fn test_reset() {
        let mut reducer = TinyPolygonReducer::with_accumulated(12.0);
        reducer.reset();
        assert_eq!(reducer.accumulated(), 0.0);
    }
}
