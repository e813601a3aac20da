//! Geometry primitives and coordinate mapping.
//!
//! Three coordinate spaces are involved:
//! - pointer space: screen pixels relative to a view's top-left corner,
//! - stage-space: the view's image pixels, where shapes are stored,
//! - normalized space: `[0, 1]` relative to the view's pixel dimensions.
//!
//! Everything here is pure; callers apply the results.

use serde::{Deserialize, Serialize};

use crate::config::HandleConfig;
use crate::polygon::Ring;
use crate::zoom_math::Transform;

// ============================================================================
// Core Geometry Types
// ============================================================================

/// A 2D point in stage or pointer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Calculate distance to another point.
    pub fn distance_to(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// An axis-aligned bounding box in stage-space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Top-left corner X coordinate
    pub x: f32,
    /// Top-left corner Y coordinate
    pub y: f32,
    /// Width of the box
    pub width: f32,
    /// Height of the box
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a bounding box from two corner points.
    pub fn from_corners(p1: Point, p2: Point) -> Self {
        let x = p1.x.min(p2.x);
        let y = p1.y.min(p2.y);
        let width = (p1.x - p2.x).abs();
        let height = (p1.y - p2.y).abs();
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest box containing every point, or `None` for no points.
    pub fn enclosing<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (mut min_x, mut min_y) = (first.x, first.y);
        let (mut max_x, mut max_y) = (first.x, first.y);

        for p in iter {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }
}

/// Pixel dimensions of a view's image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDimensions {
    pub width: u32,
    pub height: u32,
}

impl ViewDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A point in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
}

/// Result of clamping a point into a view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clamped {
    /// The point, moved inside the view if needed
    pub point: Point,
    /// Whether the input lay outside the view
    pub was_clamped: bool,
}

// ============================================================================
// Normalization
// ============================================================================

/// Map a stage-space point to normalized coordinates, clamped to `[0, 1]`.
pub fn to_normalized(stage: Point, dims: ViewDimensions) -> NormalizedPoint {
    NormalizedPoint {
        x: normalize_axis(stage.x, dims.width),
        y: normalize_axis(stage.y, dims.height),
    }
}

/// Map normalized coordinates back to stage-space.
pub fn from_normalized(normalized: NormalizedPoint, dims: ViewDimensions) -> Point {
    Point::new(
        normalized.x * dims.width as f32,
        normalized.y * dims.height as f32,
    )
}

fn normalize_axis(value: f32, extent: u32) -> f32 {
    if extent == 0 {
        return 0.0;
    }
    (value / extent as f32).clamp(0.0, 1.0)
}

/// Clamp a stage-space point into the view's pixel bounds.
///
/// Out-of-bounds pointer events are clamped rather than rejected.
pub fn clamp_to_view(point: Point, dims: ViewDimensions) -> Clamped {
    let clamped = Point::new(
        point.x.clamp(0.0, dims.width as f32),
        point.y.clamp(0.0, dims.height as f32),
    );
    let was_clamped = clamped != point;
    if was_clamped {
        log::debug!(
            "Clamped ({:.1}, {:.1}) into {}x{} view",
            point.x,
            point.y,
            dims.width,
            dims.height
        );
    }
    Clamped {
        point: clamped,
        was_clamped,
    }
}

/// Normalize a stage-space box to `[x, y, w, h]` with every value in `[0, 1]`.
///
/// Both corners are clamped before the size is taken, so `x + w <= 1` and
/// `y + h <= 1` also hold.
pub fn normalize_box(bbox: &BoundingBox, dims: ViewDimensions) -> [f32; 4] {
    let top_left = to_normalized(Point::new(bbox.x, bbox.y), dims);
    let bottom_right = to_normalized(
        Point::new(bbox.x + bbox.width, bbox.y + bbox.height),
        dims,
    );
    [
        top_left.x,
        top_left.y,
        bottom_right.x - top_left.x,
        bottom_right.y - top_left.y,
    ]
}

// ============================================================================
// Viewport
// ============================================================================

/// A view's transform together with its image dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub dims: ViewDimensions,
    pub transform: Transform,
}

impl Viewport {
    pub fn new(dims: ViewDimensions, transform: Transform) -> Self {
        Self { dims, transform }
    }

    pub fn zoom(&self) -> f32 {
        self.transform.zoom
    }

    /// Map a pointer position into stage-space without clamping.
    pub fn pointer_to_stage(&self, pointer: Point) -> Point {
        self.transform.pointer_to_stage(pointer)
    }

    /// Map a pointer position into stage-space, clamped to the image.
    pub fn pointer_to_stage_clamped(&self, pointer: Point) -> Clamped {
        clamp_to_view(self.pointer_to_stage(pointer), self.dims)
    }

    /// Map a pointer position to normalized coordinates using this view's zoom.
    pub fn to_normalized(&self, pointer: Point) -> NormalizedPoint {
        to_normalized(self.pointer_to_stage(pointer), self.dims)
    }

    /// Map normalized coordinates to a pointer position in this view.
    pub fn from_normalized(&self, normalized: NormalizedPoint) -> Point {
        self.transform
            .stage_to_pointer(from_normalized(normalized, self.dims))
    }
}

// ============================================================================
// Vertex Hit Testing
// ============================================================================

/// Identifies one vertex of a polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexRef {
    /// Index of the ring in the polygon
    pub ring: usize,
    /// Id of the point inside the ring
    pub point_id: u32,
}

/// A vertex found by [`hit_test_vertex`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexHit {
    pub vertex: VertexRef,
    /// Position of the vertex inside its ring
    pub index: usize,
    /// Stage-space distance from the query point
    pub distance: f32,
}

/// Stage-space radius of a vertex handle.
///
/// Handles keep a constant on-screen size, so the stage radius shrinks as
/// zoom grows.
pub fn vertex_radius(is_first: bool, zoom: f32, hovered: bool, config: &HandleConfig) -> f32 {
    let base = if is_first {
        config.first_vertex_radius
    } else {
        config.vertex_radius
    };
    let scale = if hovered { config.hover_scale } else { 1.0 };
    base * scale / zoom.max(config.min_zoom)
}

/// Find the vertex closest to `point` whose handle contains it.
///
/// Ties go to the vertex found first in ring order.
pub fn hit_test_vertex(
    rings: &[Ring],
    point: Point,
    zoom: f32,
    hovered: Option<VertexRef>,
    config: &HandleConfig,
) -> Option<VertexHit> {
    let mut best: Option<VertexHit> = None;

    for (ring_index, ring) in rings.iter().enumerate() {
        for (index, vertex) in ring.points().iter().enumerate() {
            let vertex_ref = VertexRef {
                ring: ring_index,
                point_id: vertex.id,
            };
            let radius = vertex_radius(index == 0, zoom, hovered == Some(vertex_ref), config);
            let distance = vertex.position().distance_to(&point);
            if distance > radius {
                continue;
            }
            if best.is_none_or(|b| distance < b.distance) {
                best = Some(VertexHit {
                    vertex: vertex_ref,
                    index,
                    distance,
                });
            }
        }
    }

    best
}

// ============================================================================
// Tests
// ============================================================================
