//! Geometry stream codec.
//!
//! Features are stored as a compact byte stream of operation tags and
//! coordinate deltas:
//!
//! - **Tags**: one byte per operation, using the MVT command ids
//!   (`MoveTo = 1`, `LineTo = 2`, `ClosePath = 7`) plus `End = 0`
//! - **Deltas**: `MoveTo`/`LineTo` are followed by two zigzag-encoded LEB128
//!   varints holding the offset from the previous position, in units of
//!   `2^geometry_scale` world units
//!
//! Decoding yields tile-relative coordinates and the bounding box of the
//! feature, which drives the cheap clip pre-check.

use bytes::{Buf, BufMut};
use prost::encoding::{decode_varint, encode_varint};
use serde::{Deserialize, Serialize};

use crate::draw::{Draw, DrawVec, Op};
use crate::tile::{BoundingBox, TileCoord};
use crate::{Error, Result};

/// Stream terminator.
pub const VT_END: u8 = 0;
/// Start a new subpath.
pub const VT_MOVETO: u8 = 1;
/// Continue the current subpath.
pub const VT_LINETO: u8 = 2;
/// Close the current ring or polygon.
pub const VT_CLOSEPATH: u8 = 7;

/// Encoding parameters shared by the writer and the reader of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Deltas are stored right-shifted by this many bits.
    pub geometry_scale: u32,
    /// World position the running coordinate starts from.
    pub origin: (i64, i64),
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            geometry_scale: 0,
            origin: (0, 0),
        }
    }
}

// ============================================================================
// Zigzag Encoding
// ============================================================================

/// Encode a signed integer using zigzag encoding.
///
/// Maps small magnitudes of either sign to small unsigned values
/// (0 → 0, -1 → 1, 1 → 2, -2 → 3, ...), which keeps varints short.
#[inline]
pub fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Decode a zigzag-encoded unsigned integer back to signed.
#[inline]
pub fn zigzag_decode(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode a geometry stream into tile-relative draws and their bounding box.
///
/// The cursor is advanced past the `End` tag, so several features can be read
/// back to back from one buffer.
///
/// # Errors
///
/// [`Error::MalformedStream`] on an unknown tag, a truncated stream, or a
/// delta that overflows the coordinate range.
///
/// # Example
///
/// ```
/// use tilegeom_core::codec::{decode_geometry, encode_geometry, CodecConfig};
/// use tilegeom_core::draw::Draw;
/// use tilegeom_core::tile::TileCoord;
///
/// let config = CodecConfig::default();
/// let bytes = encode_geometry(&[Draw::move_to(10, 20), Draw::line_to(30, 5)], &config);
///
/// let (geom, bbox) = decode_geometry(&mut bytes.as_slice(), TileCoord::new(0, 0, 0), &config)
///     .unwrap();
/// assert_eq!(geom.len(), 2);
/// assert_eq!(bbox.to_array(), [10, 5, 30, 20]);
/// ```
pub fn decode_geometry<B: Buf>(
    buf: &mut B,
    tile: TileCoord,
    config: &CodecConfig,
) -> Result<(DrawVec, BoundingBox)> {
    let total = buf.remaining();
    let (tile_x, tile_y) = tile.origin();
    let scale = 1i64
        .checked_shl(config.geometry_scale)
        .filter(|s| *s > 0)
        .ok_or_else(|| malformed(0, format!("geometry scale {} too large", config.geometry_scale)))?;

    let mut out = DrawVec::new();
    let mut bbox = BoundingBox::empty();
    let (mut wx, mut wy) = config.origin;

    loop {
        let offset = total - buf.remaining();
        if !buf.has_remaining() {
            return Err(malformed(offset, "stream ended before End tag".to_string()));
        }

        let op = match buf.get_u8() {
            VT_END => break,
            VT_MOVETO => Op::MoveTo,
            VT_LINETO => Op::LineTo,
            VT_CLOSEPATH => {
                out.push(Draw::close_path());
                continue;
            }
            other => return Err(malformed(offset, format!("unknown operation tag {}", other))),
        };

        let dx = read_delta(buf, total)?;
        let dy = read_delta(buf, total)?;

        wx = dx
            .checked_mul(scale)
            .and_then(|d| wx.checked_add(d))
            .ok_or_else(|| malformed(offset, "x coordinate overflow".to_string()))?;
        wy = dy
            .checked_mul(scale)
            .and_then(|d| wy.checked_add(d))
            .ok_or_else(|| malformed(offset, "y coordinate overflow".to_string()))?;

        let x = wx
            .checked_sub(tile_x)
            .ok_or_else(|| malformed(offset, "x coordinate overflow".to_string()))?;
        let y = wy
            .checked_sub(tile_y)
            .ok_or_else(|| malformed(offset, "y coordinate overflow".to_string()))?;

        bbox.expand_point(x, y);
        out.push(Draw::new(op, x, y));
    }

    Ok((out, bbox))
}

fn read_delta<B: Buf>(buf: &mut B, total: usize) -> Result<i64> {
    let offset = total - buf.remaining();
    decode_varint(buf)
        .map(zigzag_decode)
        .map_err(|e| malformed(offset, format!("bad coordinate varint: {}", e)))
}

fn malformed(offset: usize, reason: String) -> Error {
    Error::MalformedStream { offset, reason }
}

// ============================================================================
// Encoding
// ============================================================================

/// Serialize draws given in absolute world coordinates into a geometry stream.
///
/// Coordinates are stored relative to `config.origin`, right-shifted by
/// `config.geometry_scale`; bits below the scale are lost. The stream is
/// terminated with [`VT_END`].
pub fn encode_geometry(geom: &[Draw], config: &CodecConfig) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + geom.len() * 5);
    write_geometry(geom, config, &mut out);
    out
}

/// Like [`encode_geometry`], appending to an existing buffer.
pub fn write_geometry<B: BufMut>(geom: &[Draw], config: &CodecConfig, buf: &mut B) {
    let shift = config.geometry_scale;
    let (mut px, mut py) = (config.origin.0 >> shift, config.origin.1 >> shift);

    for d in geom {
        match d.op {
            Op::ClosePath => buf.put_u8(VT_CLOSEPATH),
            Op::MoveTo | Op::LineTo => {
                buf.put_u8(if d.op == Op::MoveTo {
                    VT_MOVETO
                } else {
                    VT_LINETO
                });

                let (x, y) = (d.x >> shift, d.y >> shift);
                encode_varint(zigzag_encode(x - px), buf);
                encode_varint(zigzag_encode(y - py), buf);
                px = x;
                py = y;
            }
        }
    }

    buf.put_u8(VT_END);
}
