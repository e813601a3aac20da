//! Polygon editing state machine.
//!
//! A polygon is an ordered list of rings. Ring 0 is the outer boundary; later
//! rings are holes or disjoint parts. At most one ring is open (being drawn)
//! at a time, and it is always the last one.
//!
//! ```text
//! Empty --click--> Drawing --click on first point (>= 3 points)--> Closed
//!                  Drawing --click elsewhere--> Drawing (point appended)
//! ```
//!
//! Vertices of any ring can be dragged or deleted. A ring that drops below
//! [`MIN_POLYGON_VERTICES`] is removed from the polygon.

use serde::{Deserialize, Serialize};

use crate::config::HandleConfig;
use crate::error::EditorError;
use crate::geometry::{BoundingBox, Point, VertexRef, hit_test_vertex};

/// Minimum number of vertices required for a valid ring.
pub const MIN_POLYGON_VERTICES: usize = 3;

/// A polygon vertex in stage-space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolygonGroupPoint {
    /// Unique within its ring and stable across drags
    pub id: u32,
    pub x: f32,
    pub y: f32,
}

impl PolygonGroupPoint {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Whether a ring is still being drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RingState {
    Drawing,
    Closed,
}

/// One loop of polygon vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    points: Vec<PolygonGroupPoint>,
    state: RingState,
    #[serde(skip)]
    next_id: u32,
}

impl Ring {
    /// Create an empty open ring.
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            state: RingState::Drawing,
            next_id: 0,
        }
    }

    /// Create a closed ring from a list of positions.
    pub fn closed_from(points: impl IntoIterator<Item = Point>) -> Self {
        let mut ring = Self::new();
        for p in points {
            ring.push(p);
        }
        ring.state = RingState::Closed;
        ring
    }

    /// Append a vertex and return its id.
    pub fn push(&mut self, point: Point) -> u32 {
        // Deserialized rings start with next_id = 0
        let id = self
            .next_id
            .max(self.points.iter().map(|p| p.id + 1).max().unwrap_or(0));
        self.next_id = id + 1;
        self.points.push(PolygonGroupPoint {
            id,
            x: point.x,
            y: point.y,
        });
        id
    }

    pub fn points(&self) -> &[PolygonGroupPoint] {
        &self.points
    }

    pub fn state(&self) -> RingState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == RingState::Closed
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether the ring has enough vertices to enclose an area.
    pub fn is_valid(&self) -> bool {
        self.points.len() >= MIN_POLYGON_VERTICES
    }

    /// Position of the vertex with `id` inside the ring.
    pub fn index_of(&self, id: u32) -> Option<usize> {
        self.points.iter().position(|p| p.id == id)
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::enclosing(self.points.iter().map(PolygonGroupPoint::position))
    }

    /// Vertex coordinates as `[x, y]` pairs, in ring order.
    pub fn coords(&self) -> Vec<[f32; 2]> {
        self.points.iter().map(|p| [p.x, p.y]).collect()
    }
}

impl Default for Ring {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a click handled by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// A new ring was started with its first point
    RingStarted { ring: usize, point_id: u32 },
    /// A point was appended to the open ring
    PointAdded { ring: usize, point_id: u32 },
    /// The open ring was closed
    RingClosed { ring: usize },
    /// The click landed on a vertex and changed nothing
    Ignored,
}

/// Result of deleting a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// The vertex was removed and its ring is still valid
    PointRemoved { ring: usize, point_id: u32 },
    /// The ring fell below the minimum and was removed with the vertex
    RingRemoved { ring: usize },
}

/// Editing state for one polygon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolygonEditor {
    rings: Vec<Ring>,
    #[serde(skip)]
    hovered: Option<VertexRef>,
}

impl PolygonEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an editor over existing rings.
    pub fn from_rings(rings: Vec<Ring>) -> Self {
        Self {
            rings,
            hovered: None,
        }
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    /// Whether the polygon has no ring at all.
    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    /// The vertex currently under the pointer, if any.
    pub fn hovered(&self) -> Option<VertexRef> {
        self.hovered
    }

    /// Index of the ring being drawn.
    pub fn open_ring(&self) -> Option<usize> {
        self.rings
            .last()
            .filter(|ring| !ring.is_closed())
            .map(|_| self.rings.len() - 1)
    }

    /// Handle a click at a stage-space position.
    ///
    /// A click on a vertex handle is routed to [`Self::on_vertex_click`];
    /// anywhere else it adds a point, starting a new ring when none is open.
    pub fn on_click(&mut self, point: Point, zoom: f32, handles: &HandleConfig) -> ClickOutcome {
        if let Some(hit) = hit_test_vertex(&self.rings, point, zoom, self.hovered, handles) {
            // The hit comes from our own rings, so the lookup cannot fail.
            return self
                .on_vertex_click(hit.vertex.ring, hit.vertex.point_id)
                .unwrap_or(ClickOutcome::Ignored);
        }

        match self.open_ring() {
            Some(ring) => {
                let point_id = self.rings[ring].push(point);
                log::trace!("Added point {} to ring {}", point_id, ring);
                ClickOutcome::PointAdded { ring, point_id }
            }
            None => {
                let mut new_ring = Ring::new();
                let point_id = new_ring.push(point);
                self.rings.push(new_ring);
                let ring = self.rings.len() - 1;
                log::debug!("Started ring {}", ring);
                ClickOutcome::RingStarted { ring, point_id }
            }
        }
    }

    /// Handle a click on a known vertex.
    ///
    /// Clicking the first vertex of the open ring closes it once it has
    /// enough points. Every other vertex click is ignored, so no duplicate
    /// point is ever added on top of a handle.
    pub fn on_vertex_click(
        &mut self,
        ring: usize,
        point_id: u32,
    ) -> Result<ClickOutcome, EditorError> {
        let index = self.vertex_index(ring, point_id)?;
        let target = &self.rings[ring];

        if index == 0 && !target.is_closed() && target.is_valid() {
            self.rings[ring].state = RingState::Closed;
            log::debug!("Closed ring {} with {} points", ring, self.rings[ring].len());
            return Ok(ClickOutcome::RingClosed { ring });
        }

        Ok(ClickOutcome::Ignored)
    }

    /// Move a vertex to a new stage-space position.
    ///
    /// The position is applied as-is: no clamping, no reordering.
    pub fn on_vertex_drag(
        &mut self,
        ring: usize,
        point_id: u32,
        to: Point,
    ) -> Result<(), EditorError> {
        let index = self.vertex_index(ring, point_id)?;
        let vertex = &mut self.rings[ring].points[index];
        vertex.x = to.x;
        vertex.y = to.y;
        Ok(())
    }

    /// Remove a vertex, dropping its ring if it becomes degenerate.
    pub fn on_vertex_delete(
        &mut self,
        ring: usize,
        point_id: u32,
    ) -> Result<RemovalOutcome, EditorError> {
        let index = self.vertex_index(ring, point_id)?;
        self.rings[ring].points.remove(index);

        if self.rings[ring].len() < MIN_POLYGON_VERTICES {
            let removed = self.rings.remove(ring);
            // Ring indices shifted, so any hover reference is stale.
            self.hovered = None;
            log::debug!(
                "Removed ring {} left with {} point(s)",
                ring,
                removed.len()
            );
            return Ok(RemovalOutcome::RingRemoved { ring });
        }

        if self.hovered == Some(VertexRef { ring, point_id }) {
            self.hovered = None;
        }
        Ok(RemovalOutcome::PointRemoved { ring, point_id })
    }

    /// Track the vertex under the pointer.
    ///
    /// The hovered vertex keeps an enlarged hit target until the pointer
    /// leaves it.
    pub fn on_pointer_move(
        &mut self,
        point: Point,
        zoom: f32,
        handles: &HandleConfig,
    ) -> Option<VertexRef> {
        let hovered =
            hit_test_vertex(&self.rings, point, zoom, self.hovered, handles).map(|hit| hit.vertex);
        if hovered != self.hovered {
            log::trace!("Hover changed: {:?} -> {:?}", self.hovered, hovered);
            self.hovered = hovered;
        }
        hovered
    }

    /// Close the open ring without clicking its first point.
    pub fn close_ring(&mut self) -> Result<ClickOutcome, EditorError> {
        let Some(ring) = self.open_ring() else {
            return Ok(ClickOutcome::Ignored);
        };
        let points = self.rings[ring].len();
        if points < MIN_POLYGON_VERTICES {
            return Err(EditorError::DegenerateRing { ring, points });
        }
        self.rings[ring].state = RingState::Closed;
        log::debug!("Closed ring {} with {} points", ring, points);
        Ok(ClickOutcome::RingClosed { ring })
    }

    /// Discard the ring being drawn.
    pub fn cancel_ring(&mut self) -> Option<Ring> {
        let ring = self.open_ring()?;
        self.hovered = None;
        Some(self.rings.remove(ring))
    }

    /// Rings that can be committed, with degenerate ones filtered out.
    pub fn valid_rings(&self) -> impl Iterator<Item = &Ring> {
        self.rings.iter().filter(|ring| ring.is_valid())
    }

    fn vertex_index(&self, ring: usize, point_id: u32) -> Result<usize, EditorError> {
        self.rings
            .get(ring)
            .ok_or(EditorError::UnknownRing { ring })?
            .index_of(point_id)
            .ok_or(EditorError::UnknownVertex { ring, point_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handles() -> HandleConfig {
        HandleConfig::default()
    }

    /// Draw an open triangle at zoom 1.
    fn open_triangle() -> PolygonEditor {
        let mut editor = PolygonEditor::new();
        for (x, y) in [(10.0, 10.0), (100.0, 10.0), (100.0, 100.0)] {
            editor.on_click(Point::new(x, y), 1.0, &handles());
        }
        editor
    }

    #[test]
    fn test_first_click_starts_ring() {
        let mut editor = PolygonEditor::new();
        let outcome = editor.on_click(Point::new(5.0, 5.0), 1.0, &handles());
        assert_eq!(outcome, ClickOutcome::RingStarted { ring: 0, point_id: 0 });
        assert_eq!(editor.open_ring(), Some(0));
    }

    #[test]
    fn test_clicks_append_points() {
        let editor = open_triangle();
        assert_eq!(editor.rings().len(), 1);
        assert_eq!(editor.rings()[0].len(), 3);
        assert_eq!(editor.rings()[0].state(), RingState::Drawing);
    }

    #[test]
    fn test_click_near_first_point_closes_without_duplicate() {
        let mut editor = open_triangle();
        let outcome = editor.on_click(Point::new(14.0, 13.0), 1.0, &handles());
        assert_eq!(outcome, ClickOutcome::RingClosed { ring: 0 });
        assert_eq!(editor.rings()[0].len(), 3);
        assert!(editor.rings()[0].is_closed());
        assert_eq!(editor.open_ring(), None);
    }

    #[test]
    fn test_close_radius_shrinks_with_zoom() {
        let mut editor = open_triangle();
        // 5px away: inside the 6px radius at zoom 1, outside 3px at zoom 2
        let outcome = editor.on_click(Point::new(15.0, 10.0), 2.0, &handles());
        assert!(matches!(outcome, ClickOutcome::PointAdded { ring: 0, .. }));
        assert_eq!(editor.rings()[0].len(), 4);
    }

    #[test]
    fn test_click_on_first_point_of_short_ring_is_ignored() {
        let mut editor = PolygonEditor::new();
        editor.on_click(Point::new(10.0, 10.0), 1.0, &handles());
        editor.on_click(Point::new(50.0, 10.0), 1.0, &handles());

        let outcome = editor.on_click(Point::new(11.0, 10.0), 1.0, &handles());
        assert_eq!(outcome, ClickOutcome::Ignored);
        assert_eq!(editor.rings()[0].len(), 2);
    }

    #[test]
    fn test_click_after_close_starts_second_ring() {
        let mut editor = open_triangle();
        editor.close_ring().unwrap();

        let outcome = editor.on_click(Point::new(40.0, 30.0), 1.0, &handles());
        assert_eq!(outcome, ClickOutcome::RingStarted { ring: 1, point_id: 0 });
        assert_eq!(editor.rings().len(), 2);
    }

    #[test]
    fn test_drag_keeps_order_and_id() {
        let mut editor = open_triangle();
        editor.close_ring().unwrap();
        let ids: Vec<u32> = editor.rings()[0].points().iter().map(|p| p.id).collect();

        editor.on_vertex_drag(0, 1, Point::new(-30.0, 500.0)).unwrap();

        let ring = &editor.rings()[0];
        assert_eq!(ring.points().iter().map(|p| p.id).collect::<Vec<_>>(), ids);
        // No clamping while dragging
        assert_eq!(ring.points()[1].position(), Point::new(-30.0, 500.0));
    }

    #[test]
    fn test_delete_below_minimum_removes_ring() {
        let mut editor = open_triangle();
        editor.close_ring().unwrap();

        let outcome = editor.on_vertex_delete(0, 2).unwrap();
        assert_eq!(outcome, RemovalOutcome::RingRemoved { ring: 0 });
        assert!(editor.is_empty());
    }

    #[test]
    fn test_delete_keeps_valid_ring() {
        let mut editor = open_triangle();
        editor.on_click(Point::new(10.0, 100.0), 1.0, &handles());
        editor.close_ring().unwrap();

        let outcome = editor.on_vertex_delete(0, 1).unwrap();
        assert_eq!(outcome, RemovalOutcome::PointRemoved { ring: 0, point_id: 1 });
        assert_eq!(editor.rings()[0].len(), 3);
    }

    #[test]
    fn test_delete_unknown_vertex_leaves_state() {
        let mut editor = open_triangle();
        let before = editor.clone();
        assert!(matches!(
            editor.on_vertex_delete(0, 42),
            Err(EditorError::UnknownVertex { ring: 0, point_id: 42 })
        ));
        assert!(matches!(
            editor.on_vertex_delete(3, 0),
            Err(EditorError::UnknownRing { ring: 3 })
        ));
        assert_eq!(editor, before);
    }

    #[test]
    fn test_ids_stay_unique_after_delete() {
        let mut editor = open_triangle();
        editor.on_click(Point::new(10.0, 100.0), 1.0, &handles());
        editor.on_vertex_delete(0, 3).unwrap();

        let outcome = editor.on_click(Point::new(200.0, 200.0), 1.0, &handles());
        assert_eq!(outcome, ClickOutcome::PointAdded { ring: 0, point_id: 4 });
    }

    #[test]
    fn test_close_ring_requires_three_points() {
        let mut editor = PolygonEditor::new();
        editor.on_click(Point::new(0.0, 0.0), 1.0, &handles());
        editor.on_click(Point::new(50.0, 0.0), 1.0, &handles());
        assert!(matches!(
            editor.close_ring(),
            Err(EditorError::DegenerateRing { ring: 0, points: 2 })
        ));
    }

    #[test]
    fn test_hover_enlarges_target_until_leaving() {
        let mut editor = open_triangle();
        let h = handles();

        // Within the 4px radius of point 1 at (100, 10)
        let hovered = editor.on_pointer_move(Point::new(100.0, 13.0), 1.0, &h);
        assert_eq!(hovered, Some(VertexRef { ring: 0, point_id: 1 }));

        // 7px away: outside 4px but inside the doubled 8px target
        assert!(editor.on_pointer_move(Point::new(100.0, 17.0), 1.0, &h).is_some());

        // Leaving the enlarged radius clears the hover
        assert!(editor.on_pointer_move(Point::new(100.0, 30.0), 1.0, &h).is_none());
        // And the normal radius applies again
        assert!(editor.on_pointer_move(Point::new(100.0, 17.0), 1.0, &h).is_none());
    }

    #[test]
    fn test_cancel_ring_discards_open_ring() {
        let mut editor = open_triangle();
        let ring = editor.cancel_ring().unwrap();
        assert_eq!(ring.len(), 3);
        assert!(editor.is_empty());
    }

    #[test]
    fn test_deserialized_ring_continues_ids() {
        let json = r#"{"points":[{"id":0,"x":0.0,"y":0.0},{"id":7,"x":1.0,"y":0.0}],
            "state":"drawing"}"#;
        let mut ring: Ring = serde_json::from_str(json).unwrap();
        assert_eq!(ring.push(Point::new(1.0, 1.0)), 8);
    }
}
