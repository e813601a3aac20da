//! Pan/zoom mathematics for a single view.
//!
//! A view shows its stage (image pixel space) scaled by `zoom` and offset by
//! `pan`, both relative to the view's top-left corner:
//! `pointer = stage * zoom + pan`.

use crate::geometry::Point;

/// Represents pan/zoom transform state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub zoom: f32,
    pub pan_x: f32,
    pub pan_y: f32,
}

impl Transform {
    /// Create a new transform with the given zoom and pan.
    pub fn new(zoom: f32, pan_x: f32, pan_y: f32) -> Self {
        Self { zoom, pan_x, pan_y }
    }

    /// Create an identity transform (zoom=1, no pan).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }

    /// Map a pointer position (view-relative screen pixels) into stage-space.
    ///
    /// No clamping happens here; callers decide whether the result must lie
    /// inside the image.
    pub fn pointer_to_stage(&self, pointer: Point) -> Point {
        Point::new(
            (pointer.x - self.pan_x) / self.zoom,
            (pointer.y - self.pan_y) / self.zoom,
        )
    }

    /// Map a stage-space point back to a pointer position.
    pub fn stage_to_pointer(&self, stage: Point) -> Point {
        Point::new(
            stage.x * self.zoom + self.pan_x,
            stage.y * self.zoom + self.pan_y,
        )
    }

    /// Change zoom while keeping the stage point under the cursor fixed.
    pub fn zoom_to_cursor(&self, new_zoom: f32, cursor: Point) -> Transform {
        let anchor = self.pointer_to_stage(cursor);
        Transform {
            zoom: new_zoom,
            pan_x: cursor.x - anchor.x * new_zoom,
            pan_y: cursor.y - anchor.y * new_zoom,
        }
    }

    /// Apply a pan delta to the transform.
    pub fn pan_by(&self, dx: f32, dy: f32) -> Transform {
        Transform {
            zoom: self.zoom,
            pan_x: self.pan_x + dx,
            pan_y: self.pan_y + dy,
        }
    }

    /// Replace the zoom factor, keeping the pan offset.
    pub fn with_zoom(&self, zoom: f32) -> Transform {
        Transform { zoom, ..*self }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 0.0001;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_identity_transform() {
        let t = Transform::identity();
        let p = Point::new(12.0, 34.0);
        assert_eq!(t.pointer_to_stage(p), p);
        assert_eq!(t.stage_to_pointer(p), p);
    }

    #[test]
    fn test_pointer_to_stage_inverse() {
        let t = Transform::new(2.5, 40.0, -10.0);
        let p = Point::new(123.0, 77.0);
        let back = t.stage_to_pointer(t.pointer_to_stage(p));
        assert!(approx_eq(back.x, p.x));
        assert!(approx_eq(back.y, p.y));
    }

    #[test]
    fn test_zoom_halves_stage_distance() {
        let t = Transform::new(2.0, 0.0, 0.0);
        assert_eq!(t.pointer_to_stage(Point::new(100.0, 50.0)), Point::new(50.0, 25.0));
    }

    #[test]
    fn test_zoom_to_cursor_preserves_cursor_point() {
        let t = Transform::new(1.0, 50.0, 30.0);
        let cursor = Point::new(150.0, 120.0);

        let before = t.pointer_to_stage(cursor);
        let new_t = t.zoom_to_cursor(2.0, cursor);
        let after = new_t.pointer_to_stage(cursor);

        assert_eq!(new_t.zoom, 2.0);
        assert!(approx_eq(before.x, after.x));
        assert!(approx_eq(before.y, after.y));
    }

    #[test]
    fn test_pan_by() {
        let t = Transform::new(1.0, 10.0, 20.0);
        let new_t = t.pan_by(5.0, -10.0);

        assert_eq!(new_t.zoom, 1.0);
        assert_eq!(new_t.pan_x, 15.0);
        assert_eq!(new_t.pan_y, 10.0);
    }

    #[test]
    fn test_with_zoom_keeps_pan() {
        let t = Transform::new(1.0, 3.0, 4.0).with_zoom(3.0);
        assert_eq!(t, Transform::new(3.0, 3.0, 4.0));
    }
}
