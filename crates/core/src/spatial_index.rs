//! Z-order (Morton) keys and canonical line direction.
//!
//! Lines that meet end to end only merge cleanly in the tile encoder when
//! they run the same way. [`reorder_lines`] picks a canonical direction for
//! every simple line: the end with the lower Z-order key comes first, so
//! lines drawn "up and to the left" are flipped to run "down and to the
//! right".
//!
//! # Example
//!
//! ```
//! use tilegeom_core::spatial_index::encode_zorder;
//!
//! assert_eq!(encode_zorder(0, 0), 0);
//! assert!(encode_zorder(1, 0) > encode_zorder(0, 1));
//! ```

use crate::draw::{Draw, DrawVec, Op};

/// Interleave the bits of `wx` and `wy` into a Z-order key.
///
/// Bits are taken from the most significant end, x before y, so the key of
/// `(1, 0)` is `0b10` and of `(0, 1)` is `0b01`.
pub fn encode_zorder(wx: u32, wy: u32) -> u64 {
    let mut out: u64 = 0;

    for i in 0..32 {
        let bit_pos = 31 - i;
        let vx = ((wx >> bit_pos) & 1) as u64;
        let vy = ((wy >> bit_pos) & 1) as u64;

        out |= (vx << 1 | vy) << (62 - 2 * i);
    }

    out
}

fn zorder_of(d: &Draw) -> u64 {
    encode_zorder(d.x as u32, d.y as u32)
}

/// Give a simple line a canonical direction.
///
/// Only a single subpath (one leading `MoveTo`, then `LineTo`s) is touched.
/// If its start has a higher Z-order key than its end, the points are
/// reversed and re-tagged. Coordinates are truncated to 32 bits for the key.
pub fn reorder_lines(geom: &[Draw]) -> DrawVec {
    let (Some(first), Some(last)) = (geom.first(), geom.last()) else {
        return geom.to_vec();
    };

    let simple = first.op == Op::MoveTo && geom[1..].iter().all(|d| d.op == Op::LineTo);
    if !simple || zorder_of(first) <= zorder_of(last) {
        return geom.to_vec();
    }

    let mut out: DrawVec = geom.iter().rev().copied().collect();
    let end = out.len() - 1;
    out[0].op = Op::MoveTo;
    out[end].op = Op::LineTo;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zorder_encoding_origin() {
        assert_eq!(encode_zorder(0, 0), 0);
    }

    #[test]
    fn test_zorder_encoding_max() {
        assert_eq!(encode_zorder(u32::MAX, u32::MAX), u64::MAX);
    }

    #[test]
    fn test_zorder_encoding_basic_interleaving() {
        assert_eq!(encode_zorder(1, 0), 0b10);
        assert_eq!(encode_zorder(0, 1), 0b01);
        assert_eq!(encode_zorder(1, 1), 0b11);
        assert_eq!(encode_zorder(2, 0), 0b1000);
        // Top bit of x lands in the top bit of the key
        assert_eq!(encode_zorder(1 << 31, 0), 1 << 63);
    }

    #[test]
    fn test_zorder_preserves_quadrant_order() {
        let half = 1u32 << 31;
        let nw = encode_zorder(10, 10);
        let sw = encode_zorder(10, half + 10);
        let ne = encode_zorder(half + 10, 10);
        let se = encode_zorder(half + 10, half + 10);
        assert!(nw < sw && sw < ne && ne < se);
    }

    #[test]
    fn test_reorder_flips_backward_line() {
        let geom = vec![
            Draw::move_to(100, 100),
            Draw::line_to(50, 60),
            Draw::line_to(0, 0),
        ];
        let out = reorder_lines(&geom);
        assert_eq!(
            out,
            vec![
                Draw::move_to(0, 0),
                Draw::line_to(50, 60),
                Draw::line_to(100, 100),
            ]
        );
    }

    #[test]
    fn test_reorder_keeps_forward_line() {
        let geom = vec![Draw::move_to(0, 0), Draw::line_to(100, 100)];
        assert_eq!(reorder_lines(&geom), geom);
    }

    #[test]
    fn test_reorder_skips_multi_subpath() {
        let geom = vec![
            Draw::move_to(100, 100),
            Draw::line_to(0, 0),
            Draw::move_to(50, 50),
            Draw::line_to(10, 10),
        ];
        assert_eq!(reorder_lines(&geom), geom);
    }

    #[test]
    fn test_reorder_skips_leading_lineto_and_empty() {
        let geom = vec![Draw::line_to(100, 100), Draw::line_to(0, 0)];
        assert_eq!(reorder_lines(&geom), geom);
        assert!(reorder_lines(&[]).is_empty());
    }

    #[test]
    fn test_reorder_truncates_to_u32() {
        // -1 wraps to u32::MAX, which sorts after 5
        let geom = vec![Draw::move_to(-1, 0), Draw::line_to(5, 0)];
        let out = reorder_lines(&geom);
        assert_eq!(out, vec![Draw::move_to(5, 0), Draw::line_to(-1, 0)]);
    }
}
