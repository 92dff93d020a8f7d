//! Per-feature geometry pipeline - wires together decoding, clipping,
//! reduction, simplification and cleaning.
//!
//! For each feature and tile, [`GeometryPipeline::process`]:
//! 1. Decodes the geometry stream into tile-relative world coordinates
//! 2. Classifies its bounding box against the buffered tile
//! 3. Clips, reduces or simplifies it according to its primitive type
//! 4. Rescales it to tile-local pixel coordinates
//!
//! # Stage order
//!
//! ```text
//! Polygon: decode → fix winding → classify → clip → drop no-ops → reduce tiny
//!          → rescale → drop no-ops → clean → close rings
//! Line:    decode → classify → clip → drop no-ops → simplify → reorder
//!          → rescale → drop no-ops
//! Point:   decode → classify → clip → rescale
//! ```
//!
//! Features whose bounding box lies entirely outside the buffered
//! tile skip every stage after classification.

use serde::{Deserialize, Serialize};

use crate::clip::{
    clean_or_clip_poly, clip_lines, clip_point, quick_check, BoundaryClass, PolygonMode,
    DEFAULT_BUFFER,
};
use crate::codec::{decode_geometry, CodecConfig};
use crate::draw::{DrawVec, GeomType};
use crate::feature_drop::TinyPolygonReducer;
use crate::overlay::{BooleanEngine, FillMode, IOverlayEngine};
use crate::polygon::{close_poly, fix_polygon};
use crate::simplify::simplify_lines;
use crate::spatial_index::reorder_lines;
use crate::tile::{tile_shift, to_tile_scale, BoundingBox, TileCoord, MAX_ZOOM};
use crate::validate::remove_noop;
use crate::{Error, Result, Warning};

/// Default bits of resolution within a tile (4096 × 4096)
pub const DEFAULT_DETAIL: u8 = 12;

/// Configuration for the geometry pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Bits of coordinate resolution inside a tile (default: 12)
    pub detail: u8,
    /// Clip buffer in 1/256ths of the tile extent (default: 5)
    pub buffer: u32,
    /// Parameters of the input geometry stream
    pub codec: CodecConfig,
    /// Simplify lines to one pixel
    pub simplify: bool,
    /// Give simple lines a canonical direction
    pub reorder: bool,
    /// Diffuse sub-pixel polygons into minimum-size squares
    pub reduce_tiny: bool,
    /// Fill rule for the default Boolean engine
    pub fill: FillMode,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            detail: DEFAULT_DETAIL,
            buffer: DEFAULT_BUFFER as u32,
            codec: CodecConfig::default(),
            simplify: true,
            reorder: true,
            reduce_tiny: true,
            fill: FillMode::EvenOdd,
        }
    }
}

impl GeometryConfig {
    /// Set the detail.
    pub fn with_detail(mut self, detail: u8) -> Self {
        self.detail = detail;
        self
    }

    /// Set the clip buffer.
    pub fn with_buffer(mut self, buffer: u32) -> Self {
        self.buffer = buffer;
        self
    }

    /// Enable or disable line simplification.
    pub fn with_simplify(mut self, simplify: bool) -> Self {
        self.simplify = simplify;
        self
    }

    /// Enable or disable line direction canonicalization.
    pub fn with_reorder(mut self, reorder: bool) -> Self {
        self.reorder = reorder;
        self
    }

    /// Enable or disable tiny polygon reduction.
    pub fn with_reduce_tiny(mut self, reduce_tiny: bool) -> Self {
        self.reduce_tiny = reduce_tiny;
        self
    }

    /// Set the fill rule.
    pub fn with_fill(mut self, fill: FillMode) -> Self {
        self.fill = fill;
        self
    }

    /// Set the stream codec parameters.
    pub fn with_codec(mut self, codec: CodecConfig) -> Self {
        self.codec = codec;
        self
    }
}

/// Geometry of one feature, ready for tile encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedFeature {
    pub geom_type: GeomType,
    /// Tile-local pixel coordinates. Polygon rings are `ClosePath`-terminated,
    /// each outer ring followed by its holes.
    pub geometry: DrawVec,
    /// Bounding box of the decoded feature in tile-relative world units
    pub bbox: BoundingBox,
    pub boundary: BoundaryClass,
    /// True if every ring was replaced by tiny-polygon reduction
    pub reduced: bool,
    pub warnings: Vec<Warning>,
}

impl ProcessedFeature {
    /// Check if nothing of the feature remains in this tile.
    pub fn is_empty(&self) -> bool {
        self.geometry.is_empty()
    }
}

/// Runs features through the geometry stages for one tile at a time.
#[derive(Debug, Clone)]
pub struct GeometryPipeline<E: BooleanEngine = IOverlayEngine> {
    config: GeometryConfig,
    engine: E,
}

impl GeometryPipeline<IOverlayEngine> {
    /// Create a pipeline using the `i_overlay` engine with the configured fill rule.
    pub fn new(config: GeometryConfig) -> Self {
        let engine = IOverlayEngine::new(config.fill);
        Self { config, engine }
    }
}

impl<E: BooleanEngine> GeometryPipeline<E> {
    /// Create a pipeline with a custom Boolean engine.
    pub fn with_engine(config: GeometryConfig, engine: E) -> Self {
        Self { config, engine }
    }

    pub fn config(&self) -> &GeometryConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Check that the tile exists at its zoom and that the zoom and the
    /// configured detail fit in 32-bit world coordinates.
    pub fn validate(&self, tile: TileCoord) -> Result<()> {
        if tile.z > MAX_ZOOM {
            return Err(Error::InvalidParameter(format!(
                "zoom {} exceeds maximum {}",
                tile.z, MAX_ZOOM
            )));
        }
        let tiles_per_side = 1u64 << tile.z;
        if u64::from(tile.x) >= tiles_per_side || u64::from(tile.y) >= tiles_per_side {
            return Err(Error::InvalidParameter(format!(
                "tile {}/{} does not exist at zoom {}",
                tile.x, tile.y, tile.z
            )));
        }
        if self.config.detail as u32 + tile.z as u32 > MAX_ZOOM as u32 {
            return Err(Error::InvalidParameter(format!(
                "detail {} at zoom {} exceeds {} bits",
                self.config.detail, tile.z, MAX_ZOOM
            )));
        }
        Ok(())
    }

    /// Process one feature for one tile.
    ///
    /// `reducer` carries tiny-polygon area between the features of a tile and
    /// must be passed the tile's features in order.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameter`] if the tile fails [`validate`](Self::validate)
    /// - [`Error::MalformedStream`] if the stream cannot be decoded
    /// - [`Error::InvariantViolation`] if polygon rings are structurally broken
    pub fn process(
        &self,
        stream: &[u8],
        geom_type: GeomType,
        tile: TileCoord,
        reducer: &mut TinyPolygonReducer,
    ) -> Result<ProcessedFeature> {
        self.validate(tile)?;

        let mut cursor = stream;
        let (geom, bbox) = decode_geometry(&mut cursor, tile, &self.config.codec)?;
        log::trace!("decode: {} draws", geom.len());

        let mut warnings = Vec::new();
        let (geometry, boundary, reduced) = match geom_type {
            GeomType::Point => {
                let boundary = quick_check(&bbox, tile.z, self.buffer());
                let geometry = if boundary == BoundaryClass::Outside {
                    DrawVec::new()
                } else {
                    self.process_points(geom, tile)
                };
                (geometry, boundary, false)
            }
            GeomType::Line => {
                let boundary = quick_check(&bbox, tile.z, self.buffer());
                let geometry = if boundary == BoundaryClass::Outside {
                    DrawVec::new()
                } else {
                    self.process_lines(geom, boundary, tile)
                };
                (geometry, boundary, false)
            }
            GeomType::Polygon => {
                let geom = fix_polygon(&geom)?;
                log::trace!("fix_polygon: {} draws", geom.len());

                let boundary = quick_check(&bbox, tile.z, self.buffer());
                if boundary == BoundaryClass::Outside {
                    (DrawVec::new(), boundary, false)
                } else {
                    let (geometry, reduced) =
                        self.process_polygons(geom, boundary, tile, reducer, &mut warnings)?;
                    (geometry, boundary, reduced)
                }
            }
        };

        log::debug!(
            "{:?} in tile {}/{}/{}: {:?}, {} draws, {} warnings{}",
            geom_type,
            tile.z,
            tile.x,
            tile.y,
            boundary,
            geometry.len(),
            warnings.len(),
            if reduced { ", reduced" } else { "" }
        );

        Ok(ProcessedFeature {
            geom_type,
            geometry,
            bbox,
            boundary,
            reduced,
            warnings,
        })
    }

    fn buffer(&self) -> i64 {
        i64::from(self.config.buffer)
    }

    fn process_points(&self, geom: DrawVec, tile: TileCoord) -> DrawVec {
        let mut geom = clip_point(&geom, tile.z, self.buffer());
        to_tile_scale(&mut geom, tile.z, self.config.detail);
        geom
    }

    fn process_lines(&self, geom: DrawVec, boundary: BoundaryClass, tile: TileCoord) -> DrawVec {
        let (z, detail) = (tile.z, self.config.detail);

        let mut geom = if boundary == BoundaryClass::Overlapping {
            clip_lines(&geom, z, self.buffer())
        } else {
            geom
        };
        log::trace!("clip_lines: {} draws", geom.len());

        geom = remove_noop(&geom, GeomType::Line, tile_shift(z, detail));
        if self.config.simplify {
            geom = simplify_lines(&geom, z, detail);
            log::trace!("simplify_lines: {} draws", geom.len());
        }
        if self.config.reorder {
            geom = reorder_lines(&geom);
        }

        to_tile_scale(&mut geom, z, detail);
        remove_noop(&geom, GeomType::Line, 0)
    }

    fn process_polygons(
        &self,
        geom: DrawVec,
        boundary: BoundaryClass,
        tile: TileCoord,
        reducer: &mut TinyPolygonReducer,
        warnings: &mut Vec<Warning>,
    ) -> Result<(DrawVec, bool)> {
        let (z, detail) = (tile.z, self.config.detail);

        let mut geom = if boundary == BoundaryClass::Overlapping {
            clean_or_clip_poly(
                &geom,
                z,
                self.buffer(),
                PolygonMode::Clip,
                &self.engine,
                warnings,
            )?
        } else {
            geom
        };
        log::trace!("clip: {} draws", geom.len());

        geom = remove_noop(&geom, GeomType::Polygon, tile_shift(z, detail));

        let mut reduced = false;
        if self.config.reduce_tiny {
            let reduction = reducer.reduce(&geom, z, detail);
            geom = reduction.geometry;
            reduced = reduction.reduced;
            log::trace!("reduce: {} draws, reduced={}", geom.len(), reduced);
        }

        to_tile_scale(&mut geom, z, detail);
        geom = remove_noop(&geom, GeomType::Polygon, 0);

        geom = clean_or_clip_poly(
            &geom,
            z,
            self.buffer(),
            PolygonMode::Clean,
            &self.engine,
            warnings,
        )?;
        log::trace!("clean: {} draws", geom.len());

        Ok((close_poly(&geom, warnings), reduced))
    }
}
