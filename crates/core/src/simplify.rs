//! Zoom-based line simplification.
//!
//! Lines are simplified with Douglas-Peucker to the resolution of the tile:
//! a vertex survives only if dropping it would move the line by more than one
//! tile pixel.
//!
//! # Coordinate Spaces
//!
//! Simplification runs on tile-relative world coordinates, before rescaling,
//! with a tolerance of one pixel expressed in world units:
//!
//! ```text
//! tolerance = 2^(32 - detail - zoom)
//! ```
//!
//! The traversal uses an explicit stack instead of recursion, so very long
//! lines cannot overflow the call stack.

use crate::draw::{pieces, Draw, DrawVec, Op, Piece};
use crate::tile::pixel_size;

/// Squared distance from `p` to the segment `a-b`.
///
/// The projection is clamped to the segment, so points beyond either end
/// measure to the nearest endpoint.
fn square_distance_to_segment(p: &Draw, a: &Draw, b: &Draw) -> f64 {
    let dx = (b.x - a.x) as f64;
    let dy = (b.y - a.y) as f64;
    let len2 = dx * dx + dy * dy;

    let u = if len2 == 0.0 {
        0.0
    } else {
        (((p.x - a.x) as f64) * dx + ((p.y - a.y) as f64) * dy) / len2
    }
    .clamp(0.0, 1.0);

    let x = a.x as f64 + u * dx;
    let y = a.y as f64 + u * dy;
    let ex = x - p.x as f64;
    let ey = y - p.y as f64;
    ex * ex + ey * ey
}

/// Mark the points of one subpath that must be kept.
///
/// Points already marked in `necessary` split the subpath into independent
/// ranges; the first and last points are expected to be marked by the
/// caller. Within each range, the point farthest from the chord is marked if
/// it lies more than `tolerance` away, and both halves are examined in turn.
pub fn douglas_peucker(points: &[Draw], necessary: &mut [bool], tolerance: f64) {
    let n = points.len().min(necessary.len());
    if n < 2 {
        return;
    }
    let e2 = tolerance * tolerance;

    let mut stack: Vec<(usize, usize)> = Vec::new();
    let mut left = 0;
    for right in 1..n {
        if necessary[right] {
            stack.push((left, right));
            left = right;
        }
    }

    while let Some((first, second)) = stack.pop() {
        let mut max_distance = -1.0;
        let mut farthest = second;

        for i in first + 1..second {
            let distance = square_distance_to_segment(&points[i], &points[first], &points[second]);
            if distance > e2 && distance > max_distance {
                farthest = i;
                max_distance = distance;
            }
        }

        if max_distance > e2 {
            necessary[farthest] = true;
            if farthest - first > 1 {
                stack.push((first, farthest));
            }
            if second - farthest > 1 {
                stack.push((farthest, second));
            }
        }
    }
}

/// Simplify every subpath of a line geometry to one pixel at this zoom.
///
/// Subpath endpoints always survive, as do operations that are not
/// `LineTo`s.
pub fn simplify_lines(geom: &[Draw], zoom: u8, detail: u8) -> DrawVec {
    let tolerance = pixel_size(zoom, detail) as f64;
    let mut necessary: Vec<bool> = geom.iter().map(|d| d.op != Op::LineTo).collect();

    for piece in pieces(geom) {
        if let Piece::Subpath(range) = piece {
            necessary[range.start] = true;
            necessary[range.end - 1] = true;
            douglas_peucker(&geom[range.clone()], &mut necessary[range], tolerance);
        }
    }

    geom.iter()
        .zip(&necessary)
        .filter(|(_, keep)| **keep)
        .map(|(d, _)| *d)
        .collect()
}
