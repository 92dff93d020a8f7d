//! Geometry clipping to tile bounds.
//!
//! Features are clipped to the tile square plus a buffer zone so adjacent
//! tiles overlap slightly and rendered edges meet without seams. The buffer
//! is given in 1/256ths of the tile extent (one "screen pixel" of a 256px
//! tile).
//!
//! - **Points** are kept or dropped individually ([`clip_point`]).
//! - **Lines** are clipped segment by segment with Cohen–Sutherland
//!   ([`clip_lines`]).
//! - **Polygons** go through a [`BooleanEngine`], which both clips and
//!   repairs them ([`clean_or_clip_poly`]).
//!
//! [`quick_check`] classifies a feature's bounding box first, so features
//! wholly inside or outside skip clipping entirely.
//!
//! Point, line and bounding-box tests use an unbuffered world square at zoom
//! 0, while polygon clipping applies the buffer at every zoom.

use crate::draw::{pieces, Draw, DrawVec, Op, Piece};
use crate::overlay::{BooleanEngine, Contour, PolyNode, PolyTree};
use crate::tile::{tile_extent, BoundingBox, ClipBounds};
use crate::validate::is_degenerate_ring;
use crate::{Error, Result, Warning};

/// Default buffer in 1/256ths of the tile extent
pub const DEFAULT_BUFFER: i64 = 5;

// ============================================================================
// Bounding box classification
// ============================================================================

/// Where a feature's bounding box sits relative to the buffered tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryClass {
    /// Entirely outside; the feature contributes nothing to the tile.
    Outside,
    /// Strictly inside; no clipping needed.
    Inside,
    /// Touches or crosses the boundary.
    Overlapping,
}

/// Classify a tile-relative bounding box against the buffered tile square.
///
/// A box lying exactly on the boundary is `Overlapping`, never `Inside`.
pub fn quick_check(bbox: &BoundingBox, zoom: u8, buffer: i64) -> BoundaryClass {
    let ClipBounds { min, max } = ClipBounds::for_zoom(zoom, buffer);

    if bbox.min_x > max || bbox.min_y > max || bbox.max_x < min || bbox.max_y < min {
        return BoundaryClass::Outside;
    }

    if bbox.min_x > min && bbox.min_y > min && bbox.max_x < max && bbox.max_y < max {
        return BoundaryClass::Inside;
    }

    BoundaryClass::Overlapping
}

// ============================================================================
// Points
// ============================================================================

/// Keep the draws whose coordinates lie within the buffered tile (inclusive).
pub fn clip_point(geom: &[Draw], zoom: u8, buffer: i64) -> DrawVec {
    let bounds = ClipBounds::for_zoom(zoom, buffer);
    geom.iter()
        .filter(|d| bounds.contains(d.x, d.y))
        .copied()
        .collect()
}

// ============================================================================
// Lines
// ============================================================================

/// Outcome of clipping one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentClip {
    /// No part of the segment is inside.
    Outside,
    /// The segment was entirely inside and is untouched.
    Unchanged,
    /// At least one endpoint was moved onto the boundary.
    Clipped,
}

const INSIDE: u8 = 0;
const LEFT: u8 = 1;
const RIGHT: u8 = 2;
const BOTTOM: u8 = 4;
const TOP: u8 = 8;

fn out_code(x: f64, y: f64, min: f64, max: f64) -> u8 {
    let mut code = INSIDE;
    if x < min {
        code |= LEFT;
    } else if x > max {
        code |= RIGHT;
    }
    if y < min {
        code |= BOTTOM;
    } else if y > max {
        code |= TOP;
    }
    code
}

/// Cohen–Sutherland clip of the segment `(x0, y0)-(x1, y1)` in place.
pub fn clip_segment(
    x0: &mut f64,
    y0: &mut f64,
    x1: &mut f64,
    y1: &mut f64,
    bounds: &ClipBounds,
) -> SegmentClip {
    let (min, max) = (bounds.min as f64, bounds.max as f64);
    let mut code0 = out_code(*x0, *y0, min, max);
    let mut code1 = out_code(*x1, *y1, min, max);
    let mut changed = false;

    loop {
        if code0 | code1 == INSIDE {
            break;
        }
        if code0 & code1 != INSIDE {
            return SegmentClip::Outside;
        }

        let outside = if code0 != INSIDE { code0 } else { code1 };
        let (x, y) = if outside & TOP != 0 {
            (*x0 + (*x1 - *x0) * (max - *y0) / (*y1 - *y0), max)
        } else if outside & BOTTOM != 0 {
            (*x0 + (*x1 - *x0) * (min - *y0) / (*y1 - *y0), min)
        } else if outside & RIGHT != 0 {
            (max, *y0 + (*y1 - *y0) * (max - *x0) / (*x1 - *x0))
        } else {
            (min, *y0 + (*y1 - *y0) * (min - *x0) / (*x1 - *x0))
        };

        if outside == code0 {
            *x0 = x;
            *y0 = y;
            code0 = out_code(x, y, min, max);
        } else {
            *x1 = x;
            *y1 = y;
            code1 = out_code(x, y, min, max);
        }
        changed = true;
    }

    if changed {
        SegmentClip::Clipped
    } else {
        SegmentClip::Unchanged
    }
}

/// Clip every segment of a line geometry to the buffered tile.
///
/// A clipped segment is emitted as its own `MoveTo`/`LineTo` pair followed by
/// a `MoveTo` back to the original endpoint, so the next segment starts from
/// the right place. The resulting no-op moves are left for
/// [`remove_noop`](crate::validate::remove_noop) to strip.
pub fn clip_lines(geom: &[Draw], zoom: u8, buffer: i64) -> DrawVec {
    let bounds = ClipBounds::for_zoom(zoom, buffer);
    let mut out = DrawVec::with_capacity(geom.len());

    for (i, d) in geom.iter().enumerate() {
        let prev = i.checked_sub(1).map(|p| &geom[p]);
        let Some(prev) = prev.filter(|p| p.op != Op::ClosePath && d.op == Op::LineTo) else {
            out.push(*d);
            continue;
        };

        let (mut x0, mut y0) = (prev.x as f64, prev.y as f64);
        let (mut x1, mut y1) = (d.x as f64, d.y as f64);

        match clip_segment(&mut x0, &mut y0, &mut x1, &mut y1, &bounds) {
            SegmentClip::Unchanged => out.push(*d),
            SegmentClip::Clipped => {
                out.push(Draw::move_to(x0 as i64, y0 as i64));
                out.push(Draw::line_to(x1 as i64, y1 as i64));
                out.push(Draw::move_to(d.x, d.y));
            }
            SegmentClip::Outside => out.push(Draw::move_to(d.x, d.y)),
        }
    }

    out
}

// ============================================================================
// Polygons
// ============================================================================

/// Which Boolean operation [`clean_or_clip_poly`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonMode {
    /// Union of the rings, repairing self-intersections and overlaps.
    Clean,
    /// Intersection with the buffered tile square.
    Clip,
}

/// The buffered tile square used for polygon clipping.
///
/// Unlike [`ClipBounds::for_zoom`], the buffer is applied at zoom 0 too.
pub fn clip_square(zoom: u8, buffer: i64) -> Contour {
    let extent = tile_extent(zoom);
    let b = buffer * extent / 256;
    vec![
        [-b, -b],
        [extent + b, -b],
        [extent + b, extent + b],
        [-b, extent + b],
    ]
}

/// Clean or clip a polygon through a Boolean engine.
///
/// Every subpath must be a `MoveTo` followed by `LineTo`s; anything else is an
/// [`Error::InvariantViolation`]. Rings that cannot enclose area are skipped
/// with a [`Warning::RejectedPath`]. Engine failures are recorded as
/// [`Warning::EngineFailure`] and yield an empty geometry.
///
/// Output rings are explicitly closed, each outer ring followed by its holes.
pub fn clean_or_clip_poly<E: BooleanEngine + ?Sized>(
    geom: &[Draw],
    zoom: u8,
    buffer: i64,
    mode: PolygonMode,
    engine: &E,
    warnings: &mut Vec<Warning>,
) -> Result<DrawVec> {
    let mut subjects: Vec<Contour> = Vec::new();

    for piece in pieces(geom) {
        match piece {
            Piece::Subpath(range) => {
                let path: Contour = geom[range].iter().map(|d| [d.x, d.y]).collect();
                if is_degenerate_ring(&path) {
                    log::debug!("Rejecting degenerate path of {} points", path.len());
                    warnings.push(Warning::RejectedPath { points: path.len() });
                    continue;
                }
                subjects.push(path);
            }
            Piece::Other(index) => {
                return Err(Error::InvariantViolation(format!(
                    "unexpected {:?} at draw {} in polygon",
                    geom[index].op, index
                )));
            }
        }
    }

    let result = match mode {
        PolygonMode::Clip => engine.intersect(&subjects, &clip_square(zoom, buffer)),
        PolygonMode::Clean => engine.union(&subjects),
    };

    let tree = match result {
        Ok(tree) => tree,
        Err(e) => {
            log::warn!("Polygon {:?} failed: {}", mode, e);
            warnings.push(Warning::EngineFailure {
                reason: e.to_string(),
            });
            PolyTree::default()
        }
    };

    let mut out = DrawVec::new();
    for root in &tree.roots {
        decode_node(root, &mut out);
    }
    Ok(out)
}

fn push_closed(contour: &Contour, out: &mut DrawVec) {
    let Some(&[fx, fy]) = contour.first() else {
        return;
    };
    out.push(Draw::move_to(fx, fy));
    out.extend(contour[1..].iter().map(|&[x, y]| Draw::line_to(x, y)));
    out.push(Draw::line_to(fx, fy));
}

/// Emit an outer ring, then its holes, then the outer rings nested in those
/// holes as new top-level rings.
fn decode_node(node: &PolyNode, out: &mut DrawVec) {
    push_closed(&node.contour, out);
    for hole in &node.children {
        push_closed(&hole.contour, out);
    }
    for hole in &node.children {
        for island in &hole.children {
            decode_node(island, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{EngineError, IOverlayEngine};

    /// Zoom whose tile extent is 256 world units
    const Z: u8 = 24;

    fn closed_square(x0: i64, y0: i64, size: i64) -> DrawVec {
        vec![
            Draw::move_to(x0, y0),
            Draw::line_to(x0 + size, y0),
            Draw::line_to(x0 + size, y0 + size),
            Draw::line_to(x0, y0 + size),
            Draw::line_to(x0, y0),
        ]
    }

    fn ring_extent(geom: &[Draw]) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        for d in geom {
            bbox.expand_point(d.x, d.y);
        }
        bbox
    }

    // ========== Bounding Box Classification Tests ==========

    #[test]
    fn test_quick_check_inside() {
        let bbox = BoundingBox::new(10, 10, 20, 20);
        assert_eq!(quick_check(&bbox, Z, 0), BoundaryClass::Inside);
    }

    #[test]
    fn test_quick_check_touching_edge_is_overlapping() {
        let bbox = BoundingBox::new(0, 10, 20, 20);
        assert_eq!(quick_check(&bbox, Z, 0), BoundaryClass::Overlapping);
    }

    #[test]
    fn test_quick_check_outside() {
        assert_eq!(
            quick_check(&BoundingBox::new(300, 10, 400, 20), Z, 0),
            BoundaryClass::Outside
        );
        assert_eq!(
            quick_check(&BoundingBox::new(-50, -50, -1, -1), Z, 0),
            BoundaryClass::Outside
        );
    }

    #[test]
    fn test_quick_check_buffer_pulls_feature_in() {
        // 8/256 of 256 units = 8 units of buffer
        let bbox = BoundingBox::new(-5, 10, -1, 20);
        assert_eq!(quick_check(&bbox, Z, 0), BoundaryClass::Outside);
        assert_eq!(quick_check(&bbox, Z, 8), BoundaryClass::Inside);

        let wide = BoundingBox::new(-20, 10, -1, 20);
        assert_eq!(quick_check(&wide, Z, 8), BoundaryClass::Overlapping);
    }

    // ========== Point Clipping Tests ==========

    #[test]
    fn test_clip_point_inside_and_outside() {
        let geom = vec![
            Draw::move_to(10, 10),
            Draw::move_to(300, 10),
            Draw::move_to(256, 256),
            Draw::move_to(-1, 5),
        ];
        let out = clip_point(&geom, Z, 0);
        assert_eq!(out, vec![Draw::move_to(10, 10), Draw::move_to(256, 256)]);
    }

    #[test]
    fn test_clip_point_zoom_0_ignores_buffer() {
        let geom = vec![Draw::move_to(-10, 0), Draw::move_to(0, 0)];
        let out = clip_point(&geom, 0, 64);
        assert_eq!(out, vec![Draw::move_to(0, 0)]);
    }

    // ========== Segment Clipping Tests ==========

    #[test]
    fn test_clip_segment_unchanged() {
        let bounds = ClipBounds { min: 0, max: 100 };
        let (mut x0, mut y0, mut x1, mut y1) = (10.0, 10.0, 90.0, 50.0);
        let result = clip_segment(&mut x0, &mut y0, &mut x1, &mut y1, &bounds);
        assert_eq!(result, SegmentClip::Unchanged);
        assert_eq!((x0, y0, x1, y1), (10.0, 10.0, 90.0, 50.0));
    }

    #[test]
    fn test_clip_segment_both_ends() {
        let bounds = ClipBounds { min: 0, max: 100 };
        let (mut x0, mut y0, mut x1, mut y1) = (-50.0, 50.0, 150.0, 50.0);
        let result = clip_segment(&mut x0, &mut y0, &mut x1, &mut y1, &bounds);
        assert_eq!(result, SegmentClip::Clipped);
        assert_eq!((x0, y0, x1, y1), (0.0, 50.0, 100.0, 50.0));
    }

    #[test]
    fn test_clip_segment_diagonal_corner_miss() {
        // Both ends outside on different sides, passing the corner outside
        let bounds = ClipBounds { min: 0, max: 100 };
        let (mut x0, mut y0, mut x1, mut y1) = (-10.0, 5.0, 5.0, -10.0);
        let result = clip_segment(&mut x0, &mut y0, &mut x1, &mut y1, &bounds);
        assert_eq!(result, SegmentClip::Outside);
    }

    #[test]
    fn test_clip_segment_same_side_outside() {
        let bounds = ClipBounds { min: 0, max: 100 };
        let (mut x0, mut y0, mut x1, mut y1) = (120.0, 0.0, 130.0, 100.0);
        let result = clip_segment(&mut x0, &mut y0, &mut x1, &mut y1, &bounds);
        assert_eq!(result, SegmentClip::Outside);
    }

    // ========== Line Clipping Tests ==========

    #[test]
    fn test_clip_lines_crossing() {
        let geom = vec![Draw::move_to(-100, 128), Draw::line_to(100, 128)];
        let out = clip_lines(&geom, Z, 0);
        assert_eq!(
            out,
            vec![
                Draw::move_to(-100, 128),
                Draw::move_to(0, 128),
                Draw::line_to(100, 128),
                Draw::move_to(100, 128),
            ]
        );
    }

    #[test]
    fn test_clip_lines_outside() {
        let geom = vec![Draw::move_to(-100, -100), Draw::line_to(-50, -50)];
        let out = clip_lines(&geom, Z, 0);
        assert_eq!(
            out,
            vec![Draw::move_to(-100, -100), Draw::move_to(-50, -50)]
        );
    }

    #[test]
    fn test_clip_lines_fully_inside() {
        let geom = vec![
            Draw::move_to(10, 10),
            Draw::line_to(50, 10),
            Draw::line_to(50, 90),
        ];
        assert_eq!(clip_lines(&geom, Z, 0), geom);
    }

    #[test]
    fn test_clip_lines_truncates_toward_zero() {
        // Intersection with x = 0 lands at y = 2.5
        let geom = vec![Draw::move_to(-2, 1), Draw::line_to(2, 4)];
        let out = clip_lines(&geom, Z, 0);
        assert_eq!(out[1], Draw::move_to(0, 2));
    }

    // ========== Polygon Clipping Tests ==========

    #[test]
    fn test_clip_square_buffer_at_zoom_0() {
        let square = clip_square(0, 5);
        let b = 5 * 0xFFFF_FFFFi64 / 256;
        assert_eq!(square[0], [-b, -b]);
        assert_eq!(square[2], [0xFFFF_FFFF + b, 0xFFFF_FFFF + b]);
    }

    #[test]
    fn test_clip_polygon_partial() {
        let engine = IOverlayEngine::default();
        let mut warnings = Vec::new();
        let geom = closed_square(128, 128, 256);

        let out = clean_or_clip_poly(&geom, Z, 0, PolygonMode::Clip, &engine, &mut warnings)
            .unwrap();

        assert!(warnings.is_empty());
        assert_eq!(out.len(), 5);
        assert_eq!(out[0].op, Op::MoveTo);
        assert!(out[0].same_point(&out[4]));
        assert_eq!(ring_extent(&out).to_array(), [128, 128, 256, 256]);
    }

    #[test]
    fn test_clip_polygon_outside() {
        let engine = IOverlayEngine::default();
        let mut warnings = Vec::new();
        let geom = closed_square(1000, 1000, 50);

        let out = clean_or_clip_poly(&geom, Z, 0, PolygonMode::Clip, &engine, &mut warnings)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_clean_polygon_with_hole_keeps_outer_first() {
        let engine = IOverlayEngine::default();
        let mut warnings = Vec::new();
        let mut geom = closed_square(0, 0, 100);
        geom.extend(closed_square(25, 25, 50));

        let out = clean_or_clip_poly(&geom, Z, 0, PolygonMode::Clean, &engine, &mut warnings)
            .unwrap();

        assert_eq!(out.len(), 10);
        assert_eq!(ring_extent(&out[..5]).to_array(), [0, 0, 100, 100]);
        assert_eq!(ring_extent(&out[5..]).to_array(), [25, 25, 75, 75]);
        assert!(crate::draw::signed_area(&out[..5]) > 0.0);
        assert!(crate::draw::signed_area(&out[5..]) < 0.0);
    }

    #[test]
    fn test_clean_rejects_degenerate_paths() {
        let engine = IOverlayEngine::default();
        let mut warnings = Vec::new();
        let mut geom = vec![Draw::move_to(5, 5), Draw::line_to(9, 9)];
        geom.extend(closed_square(0, 0, 10));

        let out = clean_or_clip_poly(&geom, Z, 0, PolygonMode::Clean, &engine, &mut warnings)
            .unwrap();

        assert_eq!(warnings, vec![Warning::RejectedPath { points: 2 }]);
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn test_clean_unexpected_closepath_is_error() {
        let engine = IOverlayEngine::default();
        let mut warnings = Vec::new();
        let mut geom = closed_square(0, 0, 10);
        geom.push(Draw::close_path());

        let result =
            clean_or_clip_poly(&geom, Z, 0, PolygonMode::Clean, &engine, &mut warnings);
        assert!(matches!(result, Err(Error::InvariantViolation(_))));
    }

    struct FailingEngine;

    impl BooleanEngine for FailingEngine {
        fn union(&self, _: &[Contour]) -> std::result::Result<PolyTree, EngineError> {
            Err(EngineError::Aborted("boom".to_string()))
        }

        fn intersect(
            &self,
            _: &[Contour],
            _: &Contour,
        ) -> std::result::Result<PolyTree, EngineError> {
            Err(EngineError::NonFinite)
        }
    }

    #[test]
    fn test_engine_failure_becomes_warning() {
        let mut warnings = Vec::new();
        let geom = closed_square(0, 0, 10);

        let out = clean_or_clip_poly(
            &geom,
            Z,
            0,
            PolygonMode::Clean,
            &FailingEngine,
            &mut warnings,
        )
        .unwrap();

        assert!(out.is_empty());
        assert!(matches!(warnings[0], Warning::EngineFailure { .. }));
    }

    #[test]
    fn test_decode_node_order() {
        // outer > hole > island > island hole
        let tree = PolyNode {
            contour: vec![[0, 0], [30, 0], [30, 30]],
            children: vec![PolyNode {
                contour: vec![[1, 1], [2, 2], [3, 1]],
                children: vec![PolyNode {
                    contour: vec![[10, 10], [20, 10], [20, 20]],
                    children: vec![PolyNode::new(vec![[11, 11], [12, 12], [13, 11]])],
                }],
            }],
        };

        let mut out = DrawVec::new();
        decode_node(&tree, &mut out);

        let starts: Vec<(i64, i64)> = out
            .iter()
            .filter(|d| d.op == Op::MoveTo)
            .map(|d| (d.x, d.y))
            .collect();
        assert_eq!(starts, vec![(0, 0), (1, 1), (10, 10), (11, 11)]);
        assert_eq!(out.len(), 16);
    }
}
