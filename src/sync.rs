//! Per-view zoom and dimensions for the views of one item.
//!
//! Every view keeps its own transform. Zooming or panning one view never
//! touches another, and handle sizes are always derived from the zoom of the
//! view they are drawn in.

use std::collections::BTreeMap;

use crate::config::HandleConfig;
use crate::error::EditorError;
use crate::geometry::{NormalizedPoint, Point, ViewDimensions, Viewport, vertex_radius};
use crate::zoom_math::Transform;

/// State of a single view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub dims: ViewDimensions,
    pub transform: Transform,
}

/// Keeps the transforms of all views of the current item.
#[derive(Debug, Clone)]
pub struct SyncController {
    views: BTreeMap<String, ViewState>,
    handles: HandleConfig,
}

impl SyncController {
    pub fn new(handles: HandleConfig) -> Self {
        Self {
            views: BTreeMap::new(),
            handles,
        }
    }

    pub fn handles(&self) -> &HandleConfig {
        &self.handles
    }

    /// Register a view at zoom 1 with no pan. Re-adding a view resets it.
    pub fn add_view(&mut self, view_id: impl Into<String>, dims: ViewDimensions) {
        let view_id = view_id.into();
        log::debug!("Added view '{}' ({}x{})", view_id, dims.width, dims.height);
        self.views.insert(
            view_id,
            ViewState {
                dims,
                transform: Transform::identity(),
            },
        );
    }

    pub fn remove_view(&mut self, view_id: &str) -> Option<ViewState> {
        self.views.remove(view_id)
    }

    /// Drop every view, as when switching items.
    pub fn clear(&mut self) {
        self.views.clear();
    }

    pub fn view_ids(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }

    pub fn contains(&self, view_id: &str) -> bool {
        self.views.contains_key(view_id)
    }

    pub fn view(&self, view_id: &str) -> Result<&ViewState, EditorError> {
        self.views
            .get(view_id)
            .ok_or_else(|| EditorError::UnknownView(view_id.to_string()))
    }

    fn view_mut(&mut self, view_id: &str) -> Result<&mut ViewState, EditorError> {
        self.views
            .get_mut(view_id)
            .ok_or_else(|| EditorError::UnknownView(view_id.to_string()))
    }

    pub fn viewport(&self, view_id: &str) -> Result<Viewport, EditorError> {
        let state = self.view(view_id)?;
        Ok(Viewport::new(state.dims, state.transform))
    }

    pub fn dims(&self, view_id: &str) -> Result<ViewDimensions, EditorError> {
        Ok(self.view(view_id)?.dims)
    }

    /// Set a view's zoom, keeping its pan. Returns the new handle scale.
    pub fn set_zoom(&mut self, view_id: &str, zoom: f32) -> Result<f32, EditorError> {
        validate_zoom(zoom)?;
        let state = self.view_mut(view_id)?;
        state.transform = state.transform.with_zoom(zoom);
        log::debug!("View '{}' zoom set to {:.3}", view_id, zoom);
        self.handle_scale(view_id)
    }

    /// Zoom a view around a pointer position. Returns the new handle scale.
    pub fn zoom_to_cursor(
        &mut self,
        view_id: &str,
        zoom: f32,
        cursor: Point,
    ) -> Result<f32, EditorError> {
        validate_zoom(zoom)?;
        let state = self.view_mut(view_id)?;
        state.transform = state.transform.zoom_to_cursor(zoom, cursor);
        log::debug!(
            "View '{}' zoomed to {:.3} around ({:.1}, {:.1})",
            view_id,
            zoom,
            cursor.x,
            cursor.y
        );
        self.handle_scale(view_id)
    }

    pub fn pan_by(&mut self, view_id: &str, dx: f32, dy: f32) -> Result<(), EditorError> {
        let state = self.view_mut(view_id)?;
        state.transform = state.transform.pan_by(dx, dy);
        Ok(())
    }

    /// Factor applied to handle sizes so they keep a constant on-screen size.
    pub fn handle_scale(&self, view_id: &str) -> Result<f32, EditorError> {
        let zoom = self.view(view_id)?.transform.zoom;
        Ok(1.0 / zoom.max(self.handles.min_zoom))
    }

    /// Stage-space radius of a vertex handle in one view.
    pub fn vertex_radius(
        &self,
        view_id: &str,
        is_first: bool,
        hovered: bool,
    ) -> Result<f32, EditorError> {
        let zoom = self.view(view_id)?.transform.zoom;
        Ok(vertex_radius(is_first, zoom, hovered, &self.handles))
    }

    pub fn pointer_to_stage(&self, view_id: &str, pointer: Point) -> Result<Point, EditorError> {
        Ok(self.viewport(view_id)?.pointer_to_stage(pointer))
    }

    pub fn to_normalized(
        &self,
        view_id: &str,
        pointer: Point,
    ) -> Result<NormalizedPoint, EditorError> {
        Ok(self.viewport(view_id)?.to_normalized(pointer))
    }
}

fn validate_zoom(zoom: f32) -> Result<(), EditorError> {
    if zoom.is_finite() && zoom > 0.0 {
        Ok(())
    } else {
        Err(EditorError::InvalidZoom { zoom })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> SyncController {
        let mut sync = SyncController::new(HandleConfig::default());
        sync.add_view("left", ViewDimensions::new(400, 400));
        sync.add_view("right", ViewDimensions::new(800, 600));
        sync
    }

    #[test]
    fn test_zoom_is_per_view() {
        let mut sync = controller();
        let scale = sync.set_zoom("left", 2.0).unwrap();

        assert_eq!(scale, 0.5);
        assert_eq!(sync.viewport("left").unwrap().zoom(), 2.0);
        assert_eq!(sync.view("right").unwrap().transform, Transform::identity());
        assert_eq!(sync.handle_scale("right").unwrap(), 1.0);
    }

    #[test]
    fn test_vertex_radius_per_view() {
        let mut sync = controller();
        sync.set_zoom("right", 4.0).unwrap();

        assert_eq!(sync.vertex_radius("left", true, false).unwrap(), 6.0);
        assert_eq!(sync.vertex_radius("right", true, false).unwrap(), 1.5);
        assert_eq!(sync.vertex_radius("right", false, true).unwrap(), 2.0);
    }

    #[test]
    fn test_pointer_mapping_uses_view_transform() {
        let mut sync = controller();
        sync.set_zoom("left", 2.0).unwrap();
        sync.pan_by("left", 10.0, 20.0).unwrap();

        let stage = sync.pointer_to_stage("left", Point::new(210.0, 220.0)).unwrap();
        assert_eq!(stage, Point::new(100.0, 100.0));
        let n = sync.to_normalized("left", Point::new(210.0, 220.0)).unwrap();
        assert_eq!(n, NormalizedPoint { x: 0.25, y: 0.25 });

        // Same pointer in the other view is unaffected
        let other = sync.pointer_to_stage("right", Point::new(210.0, 220.0)).unwrap();
        assert_eq!(other, Point::new(210.0, 220.0));
    }

    #[test]
    fn test_zoom_to_cursor_keeps_anchor() {
        let mut sync = controller();
        let cursor = Point::new(100.0, 50.0);
        let before = sync.pointer_to_stage("left", cursor).unwrap();
        sync.zoom_to_cursor("left", 3.0, cursor).unwrap();
        let after = sync.pointer_to_stage("left", cursor).unwrap();
        assert!((before.x - after.x).abs() < 1e-4);
        assert!((before.y - after.y).abs() < 1e-4);
    }

    #[test]
    fn test_invalid_zoom_rejected() {
        let mut sync = controller();
        for zoom in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                sync.set_zoom("left", zoom),
                Err(EditorError::InvalidZoom { .. })
            ));
        }
        assert_eq!(sync.viewport("left").unwrap().zoom(), 1.0);
    }

    #[test]
    fn test_unknown_view() {
        let mut sync = controller();
        assert!(matches!(
            sync.set_zoom("middle", 2.0),
            Err(EditorError::UnknownView(id)) if id == "middle"
        ));
        assert!(sync.remove_view("left").is_some());
        assert!(!sync.contains("left"));
        assert_eq!(sync.view_ids().collect::<Vec<_>>(), vec!["right"]);
    }
}
