//! Annotatable shapes and the objects they produce on commit.
//!
//! A [`Shape`] is the transient, in-progress form of an annotation. It keeps
//! one geometry per view it was drawn on, usually just one. Committing it
//! yields one [`ItemObject`] per drawn view, each with a bounding box
//! normalized by that view's dimensions and an optional RLE mask.

use std::collections::BTreeMap;

use mask_rle::{Rle, from_polygons};
use serde::{Deserialize, Serialize};

use crate::config::CommitConfig;
use crate::error::EditorError;
use crate::geometry::{BoundingBox, ViewDimensions, normalize_box};
use crate::polygon::{PolygonEditor, PolygonGroupPoint, RemovalOutcome, Ring};

/// Minimum size (width/height) for a committable rectangle, in image pixels.
pub const MIN_BBOX_SIZE: f32 = 1.0;

/// Free-form feature values attached to an object, keyed by feature name.
pub type Features = BTreeMap<String, serde_json::Value>;

// ============================================================================
// Shape
// ============================================================================

/// Lifecycle of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShapeStatus {
    /// Cancelled, or never started
    None,
    /// Being drawn or edited
    InProgress,
    /// Committed to item objects
    Saved,
}

/// Kind of shape being drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    Rectangle,
    Polygon,
    Mask,
}

impl ShapeType {
    /// Get the display name for this shape type.
    pub fn name(&self) -> &'static str {
        match self {
            ShapeType::Rectangle => "Rectangle",
            ShapeType::Polygon => "Polygon",
            ShapeType::Mask => "Mask",
        }
    }
}

/// Where a mask came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MaskOrigin {
    /// Painted by the user
    Manual,
    /// Suggested by a model, with the model's score
    Model { confidence: f32 },
}

/// Geometry drawn on one view, in that view's stage-space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ShapeGeometry {
    /// Axis-aligned box, unset until the first drag
    Rectangle { bbox: Option<BoundingBox> },
    /// Rings of polygon vertices
    Polygon { editor: PolygonEditor },
    /// Pixel mask, either painted by hand or handed over by a model
    Mask { rle: Option<Rle>, origin: MaskOrigin },
}

impl ShapeGeometry {
    fn empty(shape_type: ShapeType) -> Self {
        match shape_type {
            ShapeType::Rectangle => ShapeGeometry::Rectangle { bbox: None },
            ShapeType::Polygon => ShapeGeometry::Polygon {
                editor: PolygonEditor::new(),
            },
            ShapeType::Mask => ShapeGeometry::Mask {
                rle: None,
                origin: MaskOrigin::Manual,
            },
        }
    }

    pub fn shape_type(&self) -> ShapeType {
        match self {
            ShapeGeometry::Rectangle { .. } => ShapeType::Rectangle,
            ShapeGeometry::Polygon { .. } => ShapeType::Polygon,
            ShapeGeometry::Mask { .. } => ShapeType::Mask,
        }
    }

    /// Whether nothing has been drawn yet.
    pub fn is_blank(&self) -> bool {
        match self {
            ShapeGeometry::Rectangle { bbox } => bbox.is_none(),
            ShapeGeometry::Polygon { editor } => editor.is_empty(),
            ShapeGeometry::Mask { rle, .. } => rle.is_none(),
        }
    }
}

/// A shape being annotated on one or more views of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    shape_type: ShapeType,
    /// Geometry per view id
    parts: BTreeMap<String, ShapeGeometry>,
    status: ShapeStatus,
    pub item_id: String,
}

impl Shape {
    pub fn status(&self) -> ShapeStatus {
        self.status
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == ShapeStatus::InProgress
    }

    pub fn shape_type(&self) -> ShapeType {
        self.shape_type
    }

    /// Views the shape has geometry on, in id order.
    pub fn views(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// Geometry drawn on one view.
    pub fn part(&self, view_id: &str) -> Option<&ShapeGeometry> {
        self.parts.get(view_id)
    }

    /// Whether no view has anything drawn.
    pub fn is_blank(&self) -> bool {
        self.parts.values().all(ShapeGeometry::is_blank)
    }

    /// Geometry of a view, created empty the first time the view is touched.
    fn part_mut(&mut self, view_id: &str) -> &mut ShapeGeometry {
        let shape_type = self.shape_type;
        self.parts.entry(view_id.to_string()).or_insert_with(|| {
            log::debug!("{} extended to view '{}'", shape_type.name(), view_id);
            ShapeGeometry::empty(shape_type)
        })
    }

    fn expect_type(&self, expected: ShapeType) -> Result<(), EditorError> {
        if self.shape_type != expected {
            return Err(EditorError::WrongShapeType {
                expected,
                found: self.shape_type,
            });
        }
        Ok(())
    }

    /// The polygon editor of a view, if this is a polygon drawn there.
    pub fn polygon(&self, view_id: &str) -> Option<&PolygonEditor> {
        match self.parts.get(view_id)? {
            ShapeGeometry::Polygon { editor } => Some(editor),
            _ => None,
        }
    }

    /// Mutable access to the polygon editor of a view.
    pub fn polygon_mut(&mut self, view_id: &str) -> Result<&mut PolygonEditor, EditorError> {
        self.expect_type(ShapeType::Polygon)?;
        match self.part_mut(view_id) {
            ShapeGeometry::Polygon { editor } => Ok(editor),
            other => Err(EditorError::WrongShapeType {
                expected: ShapeType::Polygon,
                found: other.shape_type(),
            }),
        }
    }

    /// Replace the rectangle bounds on a view.
    pub fn set_rectangle(&mut self, view_id: &str, bbox: BoundingBox) -> Result<(), EditorError> {
        self.expect_type(ShapeType::Rectangle)?;
        if let ShapeGeometry::Rectangle { bbox: current } = self.part_mut(view_id) {
            *current = Some(bbox);
        }
        Ok(())
    }

    /// Replace the mask on a view. The RLE is validated before anything changes.
    pub fn set_mask(
        &mut self,
        view_id: &str,
        rle: Rle,
        origin: MaskOrigin,
    ) -> Result<(), EditorError> {
        self.expect_type(ShapeType::Mask)?;
        rle.validate()?;
        if let ShapeGeometry::Mask {
            rle: current,
            origin: current_origin,
        } = self.part_mut(view_id)
        {
            *current = Some(rle);
            *current_origin = origin;
        }
        Ok(())
    }

    /// Delete a polygon vertex on a view.
    ///
    /// A shape left with no ring on any view is discarded.
    pub fn delete_polygon_vertex(
        &mut self,
        view_id: &str,
        ring: usize,
        point_id: u32,
    ) -> Result<RemovalOutcome, EditorError> {
        self.expect_type(ShapeType::Polygon)?;
        let editor = match self.parts.get_mut(view_id) {
            Some(ShapeGeometry::Polygon { editor }) => editor,
            _ => return Err(EditorError::UnknownRing { ring }),
        };
        let outcome = editor.on_vertex_delete(ring, point_id)?;
        if self.is_blank() {
            log::debug!("Polygon has no rings left");
            self.status = ShapeStatus::None;
        }
        Ok(outcome)
    }
}

// ============================================================================
// Bounding Box Wire Type
// ============================================================================

/// Coordinate layout of a [`BBox`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BBoxFormat {
    /// `[x, y, width, height]`
    Xywh,
    /// `[x_min, y_min, x_max, y_max]`
    Xyxy,
}

/// Bounding box as stored on an item object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub coords: [f32; 4],
    pub format: BBoxFormat,
    pub is_normalized: bool,
    pub confidence: f32,
}

impl BBox {
    /// Normalized xywh box with full confidence.
    pub fn from_xywh(coords: [f32; 4]) -> Self {
        Self {
            coords,
            format: BBoxFormat::Xywh,
            is_normalized: true,
            confidence: 1.0,
        }
    }

    /// Normalized xyxy box with full confidence.
    pub fn from_xyxy(coords: [f32; 4]) -> Self {
        Self {
            coords,
            format: BBoxFormat::Xyxy,
            ..Self::from_xywh(coords)
        }
    }

    /// Bounding box of a mask's foreground, or `None` for an empty mask.
    pub fn from_mask(rle: &Rle) -> Option<Self> {
        rle.to_normalized_bbox().map(Self::from_xywh)
    }

    pub fn with_confidence(self, confidence: f32) -> Self {
        Self { confidence, ..self }
    }

    pub fn xywh_coords(&self) -> [f32; 4] {
        match self.format {
            BBoxFormat::Xywh => self.coords,
            BBoxFormat::Xyxy => {
                let [x0, y0, x1, y1] = self.coords;
                [x0, y0, x1 - x0, y1 - y0]
            }
        }
    }

    pub fn xyxy_coords(&self) -> [f32; 4] {
        match self.format {
            BBoxFormat::Xyxy => self.coords,
            BBoxFormat::Xywh => {
                let [x, y, w, h] = self.coords;
                [x, y, x + w, y + h]
            }
        }
    }

    pub fn to_xywh(&self) -> Self {
        Self {
            coords: self.xywh_coords(),
            format: BBoxFormat::Xywh,
            ..*self
        }
    }

    pub fn to_xyxy(&self) -> Self {
        Self {
            coords: self.xyxy_coords(),
            format: BBoxFormat::Xyxy,
            ..*self
        }
    }

    /// Divide pixel coordinates by the image size.
    pub fn normalize(&self, height: u32, width: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        let [a, b, c, d] = self.coords;
        Self {
            coords: [a / w, b / h, c / w, d / h],
            is_normalized: true,
            ..*self
        }
    }

    /// Scale normalized coordinates back to pixels.
    pub fn denormalize(&self, height: u32, width: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        let [a, b, c, d] = self.coords;
        Self {
            coords: [a * w, b * h, c * w, d * h],
            is_normalized: false,
            ..*self
        }
    }
}

// ============================================================================
// Item Objects
// ============================================================================

/// A committed annotation attached to one view of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemObject {
    pub id: String,
    pub item_id: String,
    pub source_id: String,
    pub view_id: String,
    #[serde(default)]
    pub features: Features,
    pub bbox: BBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<Rle>,
}

/// The objects of the item currently open, in commit order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectCollection {
    objects: Vec<ItemObject>,
}

impl ObjectCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, object: ItemObject) {
        self.objects.push(object);
    }

    /// Remove an object by id.
    pub fn remove(&mut self, id: &str) -> Option<ItemObject> {
        let index = self.objects.iter().position(|o| o.id == id)?;
        Some(self.objects.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&ItemObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemObject> {
        self.objects.iter()
    }

    /// Objects annotated on one view.
    pub fn for_view<'a>(&'a self, view_id: &'a str) -> impl Iterator<Item = &'a ItemObject> {
        self.objects.iter().filter(move |o| o.view_id == view_id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Drop every object, as on item reload.
    pub fn clear(&mut self) {
        self.objects.clear();
    }
}

impl FromIterator<ItemObject> for ObjectCollection {
    fn from_iter<I: IntoIterator<Item = ItemObject>>(iter: I) -> Self {
        Self {
            objects: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Start a new, empty shape on a view.
pub fn start_shape(
    shape_type: ShapeType,
    view_id: impl Into<String>,
    item_id: impl Into<String>,
) -> Shape {
    let view_id = view_id.into();
    let shape = Shape {
        shape_type,
        parts: BTreeMap::from([(view_id, ShapeGeometry::empty(shape_type))]),
        status: ShapeStatus::InProgress,
        item_id: item_id.into(),
    };
    log::debug!(
        "Started {} on view(s) {:?} of item '{}'",
        shape_type.name(),
        shape.views().collect::<Vec<_>>(),
        shape.item_id
    );
    shape
}

/// Turn an in-progress shape into item objects, one per view drawn on.
///
/// `dims` gives the pixel dimensions of a view; each object is normalized
/// with its own view's dimensions. Views with nothing drawn are skipped. On
/// success the shape is marked saved; on error it is left untouched, so the
/// user can keep editing.
pub fn commit<D>(
    shape: &mut Shape,
    features: Features,
    dims: D,
    config: &CommitConfig,
) -> Result<Vec<ItemObject>, EditorError>
where
    D: Fn(&str) -> Result<ViewDimensions, EditorError>,
{
    if !shape.is_in_progress() {
        log::error!(
            "Refusing to commit {} with status {:?}",
            shape.shape_type.name(),
            shape.status
        );
        return Err(EditorError::InvalidCommit {
            status: shape.status,
        });
    }

    let mut drawn = Vec::new();
    for (view_id, geometry) in shape.parts.iter().filter(|(_, g)| !g.is_blank()) {
        let part = commit_part(view_id, geometry, dims(view_id.as_str())?, config)?;
        drawn.push((view_id, part));
    }
    if drawn.is_empty() {
        return Err(EditorError::empty_shape(match shape.shape_type {
            ShapeType::Rectangle => "no rectangle has been drawn",
            ShapeType::Polygon => "polygon has no ring",
            ShapeType::Mask => "no mask has been set",
        }));
    }

    let objects: Vec<ItemObject> = drawn
        .into_iter()
        .map(|(view_id, (coords, mask, origin))| {
            let (source_id, confidence) = match origin {
                MaskOrigin::Manual => (config.source_id.clone(), config.default_confidence),
                MaskOrigin::Model { confidence } => (config.model_source_id.clone(), confidence),
            };
            ItemObject {
                id: uuid::Uuid::new_v4().to_string(),
                item_id: shape.item_id.clone(),
                source_id,
                view_id: view_id.clone(),
                features: features.clone(),
                bbox: BBox::from_xywh(coords).with_confidence(confidence),
                mask,
            }
        })
        .collect();

    shape.status = ShapeStatus::Saved;
    for object in &objects {
        log::info!(
            "Committed {} {} on view '{}'",
            shape.shape_type.name(),
            object.id,
            object.view_id
        );
    }
    Ok(objects)
}

type CommittedPart = ([f32; 4], Option<Rle>, MaskOrigin);

fn commit_part(
    view_id: &str,
    geometry: &ShapeGeometry,
    dims: ViewDimensions,
    config: &CommitConfig,
) -> Result<CommittedPart, EditorError> {
    match geometry {
        ShapeGeometry::Rectangle { bbox } => {
            let bbox = bbox
                .filter(|b| b.width >= MIN_BBOX_SIZE && b.height >= MIN_BBOX_SIZE)
                .ok_or_else(|| EditorError::empty_shape("rectangle is smaller than one pixel"))?;
            Ok((normalize_box(&bbox, dims), None, MaskOrigin::Manual))
        }
        ShapeGeometry::Polygon { editor } => {
            let (coords, mask) = polygon_geometry(editor, dims, config)?;
            Ok((coords, mask, MaskOrigin::Manual))
        }
        ShapeGeometry::Mask { rle, origin } => {
            let rle = rle
                .as_ref()
                .ok_or_else(|| EditorError::empty_shape("no mask has been set"))?;
            if rle.size() != [dims.height, dims.width] {
                log::warn!(
                    "Mask size {:?} differs from view '{}' ({}x{})",
                    rle.size(),
                    view_id,
                    dims.width,
                    dims.height
                );
            }
            let coords = rle
                .to_normalized_bbox()
                .ok_or_else(|| EditorError::empty_shape("mask has no foreground"))?;
            Ok((coords, Some(rle.clone()), *origin))
        }
    }
}

fn polygon_geometry(
    editor: &PolygonEditor,
    dims: ViewDimensions,
    config: &CommitConfig,
) -> Result<([f32; 4], Option<Rle>), EditorError> {
    let Some(first) = editor.rings().first() else {
        return Err(EditorError::empty_shape("polygon has no ring"));
    };

    let rings: Vec<&Ring> = editor.valid_rings().collect();
    let dropped = editor.rings().len() - rings.len();
    if rings.is_empty() {
        return Err(EditorError::DegenerateRing {
            ring: 0,
            points: first.len(),
        });
    }
    if dropped > 0 {
        log::warn!("Dropping {} ring(s) with fewer than 3 points", dropped);
    }

    let bbox = BoundingBox::enclosing(
        rings
            .iter()
            .flat_map(|ring| ring.points().iter().map(PolygonGroupPoint::position)),
    )
    .ok_or_else(|| EditorError::empty_shape("polygon has no points"))?;

    let mask = if config.polygon_as_mask {
        let coords: Vec<Vec<[f32; 2]>> = rings.iter().map(|ring| ring.coords()).collect();
        Some(from_polygons(&coords, dims.height, dims.width)?)
    } else {
        None
    };

    Ok((normalize_box(&bbox, dims), mask))
}

/// Abandon a shape. Returns whether it was in progress.
pub fn cancel(shape: &mut Shape) -> bool {
    if !shape.is_in_progress() {
        return false;
    }
    shape.status = ShapeStatus::None;
    log::info!(
        "Cancelled {} on view(s) {:?}",
        shape.shape_type.name(),
        shape.views().collect::<Vec<_>>()
    );
    true
}

// ============================================================================
// Tests
// ============================================================================
