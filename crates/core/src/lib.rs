//! Geometry core for vector tile generation.
//!
//! This library turns feature geometry, stored as compact delta-encoded
//! streams in 32-bit world coordinates, into clipped, cleaned and simplified
//! tile-local geometry ready for encoding into a vector tile.
//!
//! The stages can be used individually ([`codec`], [`clip`], [`simplify`],
//! ...) or wired together by [`pipeline::GeometryPipeline`].
//!
//! # Examples
//!
//! ```
//! use tilegeom_core::codec::encode_geometry;
//! use tilegeom_core::draw::{Draw, GeomType, Op};
//! use tilegeom_core::feature_drop::TinyPolygonReducer;
//! use tilegeom_core::pipeline::{GeometryConfig, GeometryPipeline};
//! use tilegeom_core::tile::TileCoord;
//!
//! let config = GeometryConfig::default();
//! let pipeline = GeometryPipeline::new(config.clone());
//!
//! // A square covering the north-west quarter of the world
//! let half = 1i64 << 31;
//! let stream = encode_geometry(
//!     &[
//!         Draw::move_to(0, 0),
//!         Draw::line_to(half, 0),
//!         Draw::line_to(half, half),
//!         Draw::line_to(0, half),
//!         Draw::close_path(),
//!     ],
//!     &config.codec,
//! );
//!
//! let mut reducer = TinyPolygonReducer::new();
//! let feature = pipeline
//!     .process(&stream, GeomType::Polygon, TileCoord::new(0, 0, 0), &mut reducer)
//!     .unwrap();
//!
//! assert!(!feature.geometry.is_empty());
//! assert_eq!(feature.geometry.last().map(|d| d.op), Some(Op::ClosePath));
//! ```

use thiserror::Error;

pub mod clip;
pub mod codec;
pub mod draw;
pub mod feature_drop;
pub mod overlay;
pub mod pipeline;
pub mod polygon;
pub mod simplify;
pub mod spatial_index;
pub mod tile;
pub mod validate;

pub use draw::{Draw, DrawVec, GeomType, Op};
pub use pipeline::{GeometryConfig, GeometryPipeline, ProcessedFeature};
pub use tile::{BoundingBox, TileCoord};

/// Errors that fail the processing of a single feature
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Malformed geometry stream at byte {offset}: {reason}")]
    MalformedStream { offset: usize, reason: String },

    #[error("Ring structure violated: {0}")]
    InvariantViolation(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Recoverable problems noticed while processing a feature.
///
/// Warnings never stop processing; they are collected on the
/// [`ProcessedFeature`] and logged as they happen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    #[error("ring {ring} was not closed")]
    UnclosedRing { ring: usize },

    #[error("degenerate path of {points} points rejected before overlay")]
    RejectedPath { points: usize },

    #[error("polygon overlay failed: {reason}")]
    EngineFailure { reason: String },
}
