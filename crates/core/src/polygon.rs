//! Polygon ring normalization.
//!
//! Two passes bracket the polygon pipeline:
//!
//! - [`fix_polygon`] runs on freshly decoded geometry. Input rings may come in
//!   any winding; the first ring after each polygon terminator (`ClosePath`)
//!   is the outer ring and the rest are holes. Rings are rewound so outer
//!   rings have positive signed area and holes negative.
//! - [`close_poly`] runs last, converting explicitly closed rings into the
//!   `ClosePath`-terminated form used by vector tile encoders.

use crate::draw::{pieces, signed_area, Draw, DrawVec, Op, Piece};
use crate::{Error, Result, Warning};

/// Convert explicitly closed rings into `ClosePath`-terminated rings.
///
/// The repeated closing point of each ring is replaced by a `ClosePath`. A
/// ring whose last point does not match its first is reported as
/// [`Warning::UnclosedRing`] and converted the same way. Single-point
/// subpaths and stray operations are dropped.
pub fn close_poly(geom: &[Draw], warnings: &mut Vec<Warning>) -> DrawVec {
    let mut out = DrawVec::with_capacity(geom.len());
    let mut ring_index = 0;

    for piece in pieces(geom) {
        let Piece::Subpath(range) = piece else {
            continue;
        };
        let ring = &geom[range];
        if ring.len() < 2 {
            continue;
        }

        let (first, last) = (&ring[0], &ring[ring.len() - 1]);
        if !first.same_point(last) {
            log::warn!(
                "Ring {} not closed: starts at ({}, {}), ends at ({}, {})",
                ring_index,
                first.x,
                first.y,
                last.x,
                last.y
            );
            warnings.push(Warning::UnclosedRing { ring: ring_index });
        }

        out.extend_from_slice(&ring[..ring.len() - 1]);
        out.push(Draw::close_path());
        ring_index += 1;
    }

    out
}

/// Rewind rings so outer rings are positive and holes negative.
///
/// A `ClosePath` ends the current polygon: the next ring is an outer ring.
/// `ClosePath`s are consumed, and every ring comes out explicitly closed
/// (last point equal to the first).
///
/// # Errors
///
/// [`Error::InvariantViolation`] if a ring starts with anything but `MoveTo`.
pub fn fix_polygon(geom: &[Draw]) -> Result<DrawVec> {
    let mut out = DrawVec::with_capacity(geom.len() + 4);
    let mut expect_outer = true;

    for piece in pieces(geom) {
        match piece {
            Piece::Other(index) if geom[index].op == Op::ClosePath => {
                expect_outer = true;
            }
            Piece::Other(index) => {
                return Err(Error::InvariantViolation(format!(
                    "polygon ring begins with {:?} at draw {}, not MoveTo",
                    geom[index].op, index
                )));
            }
            Piece::Subpath(range) => {
                let mut ring: DrawVec = geom[range].to_vec();
                if let (Some(first), Some(last)) = (ring.first(), ring.last()) {
                    if !first.same_point(last) {
                        ring.push(*first);
                    }
                }

                if (signed_area(&ring) > 0.0) != expect_outer {
                    ring.reverse();
                }

                out.extend(ring.iter().enumerate().map(|(k, d)| {
                    let op = if k == 0 { Op::MoveTo } else { Op::LineTo };
                    Draw::new(op, d.x, d.y)
                }));
                expect_outer = false;
            }
        }
    }

    Ok(out)
}
