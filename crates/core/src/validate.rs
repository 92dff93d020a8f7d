//! Degenerate geometry detection and removal.
//!
//! Clipping and rescaling routinely collapse geometry: segments shrink to
//! zero length once coordinates are shifted to pixel resolution, and clipped
//! lines leave behind `MoveTo`s that never draw anything. [`remove_noop`]
//! strips those no-ops so downstream stages only see drawable paths.
//!
//! # Usage
//!
//! ```
//! use tilegeom_core::draw::{Draw, GeomType};
//! use tilegeom_core::validate::remove_noop;
//!
//! let line = vec![
//!     Draw::move_to(0, 0),
//!     Draw::line_to(0, 0),
//!     Draw::line_to(8, 0),
//!     Draw::move_to(20, 20),
//! ];
//! let cleaned = remove_noop(&line, GeomType::Line, 0);
//! assert_eq!(cleaned, vec![Draw::move_to(0, 0), Draw::line_to(8, 0)]);
//! ```

use crate::draw::{Draw, DrawVec, GeomType, Op};

/// Remove zero-length segments and unused moves.
///
/// Coordinates are compared after an arithmetic right shift by `shift`, so a
/// segment counts as empty when both ends land on the same pixel. The
/// coordinates themselves are not modified.
///
/// Runs three passes:
///
/// 1. Drop `LineTo`s that repeat the previous drawn point.
/// 2. Drop `MoveTo`s that draw nothing: at the end of the sequence, directly
///    followed by another `MoveTo`, or followed by a `ClosePath` (which is
///    dropped along with it).
/// 3. For lines, drop a `MoveTo` that restarts exactly where the previous
///    `LineTo` ended, joining the two subpaths.
pub fn remove_noop(geom: &[Draw], geom_type: GeomType, shift: u32) -> DrawVec {
    let key = |d: &Draw| (d.x >> shift, d.y >> shift);

    // Pass 1: empty LineTos
    let mut last: Option<(i64, i64)> = None;
    let mut pass1 = DrawVec::with_capacity(geom.len());
    for d in geom {
        match d.op {
            Op::LineTo if last == Some(key(d)) => continue,
            Op::ClosePath => pass1.push(*d),
            Op::MoveTo | Op::LineTo => {
                pass1.push(*d);
                last = Some(key(d));
            }
        }
    }

    // Pass 2: unused MoveTos
    let mut pass2 = DrawVec::with_capacity(pass1.len());
    let mut i = 0;
    while i < pass1.len() {
        let d = pass1[i];
        if d.op == Op::MoveTo {
            match pass1.get(i + 1).map(|next| next.op) {
                None | Some(Op::MoveTo) => {
                    i += 1;
                    continue;
                }
                Some(Op::ClosePath) => {
                    log::debug!("Dropping empty ring at ({}, {})", d.x, d.y);
                    i += 2;
                    continue;
                }
                Some(Op::LineTo) => {}
            }
        }
        pass2.push(d);
        i += 1;
    }

    if geom_type != GeomType::Line {
        return pass2;
    }

    // Pass 3: MoveTos that continue the previous line
    pass2
        .iter()
        .enumerate()
        .filter(|(i, d)| {
            !(d.op == Op::MoveTo
                && *i > 0
                && pass2[i - 1].op == Op::LineTo
                && key(&pass2[i - 1]) == key(d))
        })
        .map(|(_, d)| *d)
        .collect()
}

/// True if a ring cannot enclose any area.
///
/// A ring is degenerate when it has fewer than three distinct consecutive
/// vertices (a repeated closing point counts once) or when all of its
/// vertices are collinear. Self-intersecting rings whose lobes cancel, such
/// as a symmetric bowtie, are not degenerate: the engine's fill rule splits
/// them into lobes. Degenerate rings are never handed to the Boolean engine.
pub fn is_degenerate_ring(points: &[[i64; 2]]) -> bool {
    let mut distinct: Vec<[i64; 2]> = Vec::with_capacity(points.len());
    for p in points {
        if distinct.last() != Some(p) {
            distinct.push(*p);
        }
    }
    while distinct.len() > 1 && distinct.first() == distinct.last() {
        distinct.pop();
    }

    if distinct.len() < 3 {
        return true;
    }

    let n = distinct.len();
    (0..n).all(|k| {
        let [ax, ay] = distinct[k];
        let [bx, by] = distinct[(k + 1) % n];
        let [cx, cy] = distinct[(k + 2) % n];
        let cross = (bx as i128 - ax as i128) * (cy as i128 - by as i128)
            - (by as i128 - ay as i128) * (cx as i128 - bx as i128);
        cross == 0
    })
}
