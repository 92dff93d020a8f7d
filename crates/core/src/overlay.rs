//! Polygon Boolean operations behind a narrow trait.
//!
//! The clipping code only needs two operations from a planar Boolean engine:
//! a union of all subject rings (to clean self-intersections and overlaps)
//! and an intersection with a clip square. [`BooleanEngine`] captures exactly
//! that, returning the result as a [`PolyTree`] of nested contours.
//!
//! [`IOverlayEngine`] is the default implementation, backed by `i_overlay`.
//!
//! # i_overlay output format
//!
//! `i_overlay` returns a flat list of shapes, each `[exterior, holes...]`,
//! with implicitly closed contours (the first point is not repeated) and the
//! exterior wound with positive signed area. A shape sitting inside another
//! shape's hole is reported as a separate top-level shape, so the adapter
//! rebuilds the nesting itself.

use std::panic::{catch_unwind, AssertUnwindSafe};

use geo::algorithm::coordinate_position::{CoordPos, CoordinatePosition};
use geo::{Coord, LineString, Polygon};
use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::simplify::SimplifyShape;
use i_overlay::float::single::SingleFloatOverlay;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An implicitly closed ring of integer coordinates.
pub type Contour = Vec<[i64; 2]>;

/// Largest magnitude a coordinate may have to survive the trip through `f64`.
pub const MAX_EXACT_COORD: i64 = 1 << 53;

/// Failures reported by a [`BooleanEngine`].
///
/// These never fail a feature: the caller records them as warnings and
/// carries on with an empty result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("coordinate {value} is outside the engine's exact range")]
    CoordinateRange { value: i64 },

    #[error("engine produced a non-finite coordinate")]
    NonFinite,

    #[error("engine aborted: {0}")]
    Aborted(String),
}

/// A node of the nested result: an outer ring with its holes as children,
/// or a hole with the outer rings it contains as children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolyNode {
    pub contour: Contour,
    pub children: Vec<PolyNode>,
}

impl PolyNode {
    pub fn new(contour: Contour) -> Self {
        Self {
            contour,
            children: Vec::new(),
        }
    }
}

/// The result of a Boolean operation. Top-level nodes are outer rings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolyTree {
    pub roots: Vec<PolyNode>,
}

impl PolyTree {
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total number of contours at every depth.
    pub fn contour_count(&self) -> usize {
        fn count(node: &PolyNode) -> usize {
            1 + node.children.iter().map(count).sum::<usize>()
        }
        self.roots.iter().map(count).sum()
    }
}

/// Planar polygon Boolean operations.
pub trait BooleanEngine {
    /// Union of all subject rings.
    fn union(&self, subjects: &[Contour]) -> Result<PolyTree, EngineError>;

    /// Intersection of all subject rings with a single clip ring.
    fn intersect(&self, subjects: &[Contour], clip: &Contour) -> Result<PolyTree, EngineError>;
}

/// Fill rule deciding which regions of overlapping rings are inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    #[default]
    EvenOdd,
    NonZero,
}

impl From<FillMode> for FillRule {
    fn from(mode: FillMode) -> Self {
        match mode {
            FillMode::EvenOdd => FillRule::EvenOdd,
            FillMode::NonZero => FillRule::NonZero,
        }
    }
}

// ============================================================================
// i_overlay engine
// ============================================================================

type FloatContour = Vec<[f64; 2]>;
type FloatShape = Vec<FloatContour>;

/// [`BooleanEngine`] backed by the `i_overlay` float API.
#[derive(Debug, Clone, Copy, Default)]
pub struct IOverlayEngine {
    fill: FillMode,
}

impl IOverlayEngine {
    pub fn new(fill: FillMode) -> Self {
        Self { fill }
    }

    pub fn fill(&self) -> FillMode {
        self.fill
    }
}

impl BooleanEngine for IOverlayEngine {
    fn union(&self, subjects: &[Contour]) -> Result<PolyTree, EngineError> {
        if subjects.is_empty() {
            return Ok(PolyTree::default());
        }

        let shape = to_float_shape(subjects)?;
        if shape.is_empty() {
            return Ok(PolyTree::default());
        }
        let fill: FillRule = self.fill.into();
        let shapes = run_engine(|| shape.simplify_shape(fill, 0.0))?;
        build_tree(&shapes)
    }

    fn intersect(&self, subjects: &[Contour], clip: &Contour) -> Result<PolyTree, EngineError> {
        if subjects.is_empty() || clip.is_empty() {
            return Ok(PolyTree::default());
        }

        let clip_contour = to_float_contour(clip)?;
        if clip_contour.len() < 3 {
            return Ok(PolyTree::default());
        }
        let rect = bounding_rect(&clip_contour);
        let shape: FloatShape = to_float_shape(subjects)?
            .iter()
            .map(|ring| clip_to_rect(ring, rect))
            .filter(|ring| ring.len() >= 3)
            .collect();
        if shape.is_empty() {
            return Ok(PolyTree::default());
        }

        let fill: FillRule = self.fill.into();
        let mut shapes = run_engine(|| {
            shape
                .as_slice()
                .overlay(&clip_contour, OverlayRule::Intersect, fill)
        })?;
        clamp_shapes(&mut shapes, rect);
        build_tree(&shapes)
    }
}

fn run_engine<F>(op: F) -> Result<Vec<FloatShape>, EngineError>
where
    F: FnOnce() -> Vec<FloatShape>,
{
    catch_unwind(AssertUnwindSafe(op)).map_err(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic in overlay".to_string());
        EngineError::Aborted(reason)
    })
}

/// Convert a contour to floats in the implicitly closed form the engine
/// expects.
///
/// Consecutive repeated vertices are dropped, as is a trailing vertex equal
/// to the first; the engine would otherwise lose a corner of the ring.
fn to_float_contour(contour: &Contour) -> Result<FloatContour, EngineError> {
    let mut out: FloatContour = Vec::with_capacity(contour.len());
    let mut last: Option<[i64; 2]> = None;

    for &p in contour {
        for value in p {
            if value.abs() > MAX_EXACT_COORD {
                return Err(EngineError::CoordinateRange { value });
            }
        }
        if last != Some(p) {
            out.push([p[0] as f64, p[1] as f64]);
            last = Some(p);
        }
    }
    while out.len() > 1 && out.first() == out.last() {
        out.pop();
    }

    Ok(out)
}

fn to_float_shape(contours: &[Contour]) -> Result<FloatShape, EngineError> {
    let mut shape = FloatShape::with_capacity(contours.len());
    for contour in contours {
        let ring = to_float_contour(contour)?;
        if ring.len() >= 3 {
            shape.push(ring);
        }
    }
    Ok(shape)
}

// ============================================================================
// Rectangle pre-clip
// ============================================================================

/// `[min_x, min_y, max_x, max_y]` of a non-empty contour.
fn bounding_rect(contour: &[[f64; 2]]) -> [f64; 4] {
    contour.iter().fold(
        [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY],
        |[x0, y0, x1, y1], &[x, y]| [x0.min(x), y0.min(y), x1.max(x), y1.max(y)],
    )
}

/// Sutherland-Hodgman clip of a ring against an axis-aligned rectangle.
///
/// The engine quantizes its input relative to the overall extent, so a ring
/// spanning the world would lose precision against a small tile. Clipping to
/// the rectangle first keeps the extent close to the clip contour's. Winding
/// numbers inside the rectangle are unchanged, so the result under either
/// fill rule is the same.
fn clip_to_rect(ring: &[[f64; 2]], rect: [f64; 4]) -> FloatContour {
    let [min_x, min_y, max_x, max_y] = rect;

    let mut output = clip_against_edge(ring, |p| p[0] >= min_x, |a, b| {
        let t = (min_x - a[0]) / (b[0] - a[0]);
        [min_x, a[1] + t * (b[1] - a[1])]
    });
    output = clip_against_edge(&output, |p| p[0] <= max_x, |a, b| {
        let t = (max_x - a[0]) / (b[0] - a[0]);
        [max_x, a[1] + t * (b[1] - a[1])]
    });
    output = clip_against_edge(&output, |p| p[1] >= min_y, |a, b| {
        let t = (min_y - a[1]) / (b[1] - a[1]);
        [a[0] + t * (b[0] - a[0]), min_y]
    });
    clip_against_edge(&output, |p| p[1] <= max_y, |a, b| {
        let t = (max_y - a[1]) / (b[1] - a[1]);
        [a[0] + t * (b[0] - a[0]), max_y]
    })
}

/// Pull coordinates back onto the rectangle.
///
/// The engine snaps its output to a grid relative to the input extent, which
/// at low zoom can land a unit or two beyond the clip edge.
fn clamp_shapes(shapes: &mut [FloatShape], rect: [f64; 4]) {
    let [min_x, min_y, max_x, max_y] = rect;
    for p in shapes.iter_mut().flatten().flatten() {
        p[0] = p[0].clamp(min_x, max_x);
        p[1] = p[1].clamp(min_y, max_y);
    }
}

fn clip_against_edge<F, I>(vertices: &[[f64; 2]], inside: F, intersect: I) -> FloatContour
where
    F: Fn(&[f64; 2]) -> bool,
    I: Fn(&[f64; 2], &[f64; 2]) -> [f64; 2],
{
    let mut output = Vec::with_capacity(vertices.len() + 4);

    for (i, current) in vertices.iter().enumerate() {
        let next = &vertices[(i + 1) % vertices.len()];

        match (inside(current), inside(next)) {
            (true, true) => output.push(*current),
            (true, false) => {
                output.push(*current);
                output.push(intersect(current, next));
            }
            (false, true) => output.push(intersect(current, next)),
            (false, false) => {}
        }
    }

    output
}

// ============================================================================
// Output conversion
// ============================================================================

/// Round a float contour back to integers, dropping repeated points.
///
/// Returns `None` when fewer than three points remain.
fn round_contour(contour: &[[f64; 2]]) -> Result<Option<Contour>, EngineError> {
    let mut out: Contour = Vec::with_capacity(contour.len());
    for &[x, y] in contour {
        if !x.is_finite() || !y.is_finite() {
            return Err(EngineError::NonFinite);
        }
        let p = [x.round() as i64, y.round() as i64];
        if out.last() != Some(&p) {
            out.push(p);
        }
    }
    while out.len() > 1 && out.first() == out.last() {
        out.pop();
    }

    Ok((out.len() >= 3).then_some(out))
}

/// Twice the signed area of an implicitly closed contour.
pub fn contour_area2(contour: &[[i64; 2]]) -> i128 {
    let n = contour.len();
    (0..n)
        .map(|k| {
            let [ax, ay] = contour[k];
            let [bx, by] = contour[(k + 1) % n];
            ax as i128 * by as i128 - ay as i128 * bx as i128
        })
        .sum()
}

/// Reverse `contour` if its orientation disagrees with `positive`.
///
/// Returns `false` for a zero-area contour, which the caller drops.
fn orient(contour: &mut Contour, positive: bool) -> bool {
    let area = contour_area2(contour);
    if area == 0 {
        return false;
    }
    if (area > 0) != positive {
        contour.reverse();
    }
    true
}

struct Shape {
    outer: Contour,
    holes: Vec<Contour>,
}

fn to_geo_polygon(contour: &Contour) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = contour
        .iter()
        .map(|&[x, y]| Coord {
            x: x as f64,
            y: y as f64,
        })
        .collect();
    Polygon::new(LineString::new(coords), vec![])
}

/// Rebuild nesting from i_overlay's flat shape list.
fn build_tree(raw: &[FloatShape]) -> Result<PolyTree, EngineError> {
    let mut shapes: Vec<Shape> = Vec::with_capacity(raw.len());

    for raw_shape in raw {
        let Some((first, rest)) = raw_shape.split_first() else {
            continue;
        };
        let Some(mut outer) = round_contour(first)? else {
            continue;
        };
        if !orient(&mut outer, true) {
            continue;
        }

        let mut holes = Vec::with_capacity(rest.len());
        for raw_hole in rest {
            if let Some(mut hole) = round_contour(raw_hole)? {
                if orient(&mut hole, false) {
                    holes.push(hole);
                }
            }
        }
        shapes.push(Shape { outer, holes });
    }

    // For each shape, the smallest hole of another shape that strictly
    // contains one of its vertices and is larger than the shape itself.
    let hole_polys: Vec<Vec<Polygon<f64>>> = shapes
        .iter()
        .map(|s| s.holes.iter().map(to_geo_polygon).collect())
        .collect();

    let mut parent: Vec<Option<(usize, usize)>> = vec![None; shapes.len()];
    for (i, shape) in shapes.iter().enumerate() {
        let own_area = contour_area2(&shape.outer).abs();
        let mut best: Option<((usize, usize), i128)> = None;

        for (j, other) in shapes.iter().enumerate() {
            if i == j {
                continue;
            }
            for (k, hole) in other.holes.iter().enumerate() {
                let hole_area = contour_area2(hole).abs();
                if hole_area <= own_area || best.is_some_and(|(_, a)| a <= hole_area) {
                    continue;
                }
                let poly = &hole_polys[j][k];
                let inside = shape.outer.iter().any(|&[x, y]| {
                    let c = Coord {
                        x: x as f64,
                        y: y as f64,
                    };
                    poly.coordinate_position(&c) == CoordPos::Inside
                });
                if inside {
                    best = Some(((j, k), hole_area));
                }
            }
        }
        parent[i] = best.map(|(slot, _)| slot);
    }

    fn assemble(
        index: usize,
        shapes: &[Shape],
        parent: &[Option<(usize, usize)>],
    ) -> PolyNode {
        let shape = &shapes[index];
        let children = shape
            .holes
            .iter()
            .enumerate()
            .map(|(k, hole)| PolyNode {
                contour: hole.clone(),
                children: (0..shapes.len())
                    .filter(|&c| parent[c] == Some((index, k)))
                    .map(|c| assemble(c, shapes, parent))
                    .collect(),
            })
            .collect();

        PolyNode {
            contour: shape.outer.clone(),
            children,
        }
    }

    let roots = (0..shapes.len())
        .filter(|&i| parent[i].is_none())
        .map(|i| assemble(i, &shapes, &parent))
        .collect();

    Ok(PolyTree { roots })
}
