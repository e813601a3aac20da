//! Editing session for one item.
//!
//! The session is the explicit context object of the editor: it owns the
//! views of the open item, the shape being edited, the committed objects and
//! the queue of changes waiting to be persisted. Observers are told about
//! every state change through [`SessionEvent`] notifications.

use std::collections::VecDeque;

use mask_rle::Rle;
use ndarray::Array2;

use crate::collab::{BackendError, ObjectStore};
use crate::config::EditorConfig;
use crate::error::EditorError;
use crate::geometry::{BoundingBox, Point, VertexRef, ViewDimensions, hit_test_vertex};
use crate::polygon::{ClickOutcome, RemovalOutcome};
use crate::shape::{
    self, Features, ItemObject, MaskOrigin, ObjectCollection, Shape, ShapeStatus, ShapeType,
};
use crate::sync::SyncController;

// ============================================================================
// Events
// ============================================================================

/// What changed in the active shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeChange {
    /// Rectangle bounds updated while dragging
    Resized(BoundingBox),
    /// Polygon click handled
    Clicked(ClickOutcome),
    /// Polygon vertex moved
    VertexMoved(VertexRef),
    /// Polygon vertex deleted
    VertexRemoved(RemovalOutcome),
    /// Mask replaced
    MaskSet,
}

/// Notification sent to session subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ItemChanged {
        item_id: String,
    },
    ShapeStarted {
        view_id: String,
        shape_type: ShapeType,
    },
    ShapeChanged {
        view_id: String,
        change: ShapeChange,
    },
    ShapeCommitted {
        view_id: String,
        object_id: String,
    },
    /// Lists every view the shape had geometry on
    ShapeCancelled {
        view_ids: Vec<String>,
    },
    ObjectDeleted {
        object_id: String,
    },
    ZoomChanged {
        view_id: String,
        zoom: f32,
        handle_scale: f32,
    },
    /// Pending changes were delivered to the store
    Persisted {
        count: usize,
    },
    /// The store refused a change; it stays queued
    PersistFailed {
        error: BackendError,
        pending: usize,
    },
}

/// Handle returned by [`EditingSession::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

type EventHandler = Box<dyn FnMut(&SessionEvent)>;

// ============================================================================
// Persistence Queue
// ============================================================================

/// A change waiting to be sent to the object store.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingChange {
    Save(ItemObject),
    Delete { item_id: String, object_id: String },
}

impl PendingChange {
    fn apply(&self, store: &mut dyn ObjectStore) -> Result<(), BackendError> {
        match self {
            PendingChange::Save(object) => store.save_object(object),
            PendingChange::Delete { item_id, object_id } => {
                store.delete_object(item_id, object_id)
            }
        }
    }
}

/// Result of [`EditingSession::flush`].
#[derive(Debug, Clone, PartialEq)]
pub struct FlushReport {
    /// Changes accepted by the store
    pub delivered: usize,
    /// Changes still queued
    pub pending: usize,
    /// Error that stopped delivery, if any
    pub error: Option<BackendError>,
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Drag {
    Rectangle { anchor: Point },
    /// Vertex grabbed with the pointer, `offset` from the pointer to the vertex
    Vertex { vertex: VertexRef, offset: Point },
}

/// A drag and the view it started on.
#[derive(Debug, Clone, PartialEq)]
struct ActiveDrag {
    view_id: String,
    kind: Drag,
}

/// State of the item being annotated.
pub struct EditingSession {
    config: EditorConfig,
    item_id: String,
    views: SyncController,
    active: Option<Shape>,
    drag: Option<ActiveDrag>,
    objects: ObjectCollection,
    outbox: VecDeque<PendingChange>,
    subscribers: Vec<(SubscriptionId, EventHandler)>,
    next_subscription: u64,
}

impl EditingSession {
    /// Open an item with its views.
    pub fn open<I, S>(item_id: impl Into<String>, views: I, config: EditorConfig) -> Self
    where
        I: IntoIterator<Item = (S, ViewDimensions)>,
        S: Into<String>,
    {
        let mut session = Self {
            views: SyncController::new(config.handles.clone()),
            config,
            item_id: item_id.into(),
            active: None,
            drag: None,
            objects: ObjectCollection::new(),
            outbox: VecDeque::new(),
            subscribers: Vec::new(),
            next_subscription: 0,
        };
        for (view_id, dims) in views {
            session.views.add_view(view_id, dims);
        }
        log::info!("Opened item '{}'", session.item_id);
        session
    }

    /// Move to another item, dropping the active shape and loaded objects.
    ///
    /// An in-progress shape is cancelled first, so observers see
    /// [`SessionEvent::ShapeCancelled`] before [`SessionEvent::ItemChanged`].
    /// Queued changes are kept; they carry their own item id.
    pub fn switch_item<I, S>(&mut self, item_id: impl Into<String>, views: I)
    where
        I: IntoIterator<Item = (S, ViewDimensions)>,
        S: Into<String>,
    {
        if self.cancel() {
            log::debug!("Discarded in-progress shape of item '{}'", self.item_id);
        }
        self.objects.clear();
        self.views.clear();
        for (view_id, dims) in views {
            self.views.add_view(view_id, dims);
        }
        self.item_id = item_id.into();
        log::info!("Switched to item '{}'", self.item_id);
        self.emit(SessionEvent::ItemChanged {
            item_id: self.item_id.clone(),
        });
    }

    /// Replace the item's objects, as loaded from the backend.
    ///
    /// Objects belonging to another item are skipped.
    pub fn load_objects(&mut self, objects: impl IntoIterator<Item = ItemObject>) {
        let item_id = self.item_id.clone();
        self.objects = objects
            .into_iter()
            .filter(|object| {
                let keep = object.item_id == item_id;
                if !keep {
                    log::warn!(
                        "Skipping object {} of item '{}' while loading '{}'",
                        object.id,
                        object.item_id,
                        item_id
                    );
                }
                keep
            })
            .collect();
        log::debug!("Loaded {} object(s)", self.objects.len());
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn views(&self) -> &SyncController {
        &self.views
    }

    pub fn objects(&self) -> &ObjectCollection {
        &self.objects
    }

    pub fn active_shape(&self) -> Option<&Shape> {
        self.active.as_ref()
    }

    /// Changes waiting to be persisted, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &PendingChange> {
        self.outbox.iter()
    }

    // ------------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------------

    /// Register an observer. Events are delivered synchronously, in
    /// subscription order.
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&SessionEvent) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(handler)));
        log::debug!("Subscription {} added", id);
        id
    }

    /// Remove an observer. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        let removed = self.subscribers.len() != before;
        if removed {
            log::debug!("Subscription {} removed", id);
        }
        removed
    }

    fn emit(&mut self, event: SessionEvent) {
        log::trace!("Event: {:?}", event);
        for (_, handler) in self.subscribers.iter_mut() {
            handler(&event);
        }
    }

    // ------------------------------------------------------------------------
    // Shape lifecycle
    // ------------------------------------------------------------------------

    /// Start drawing a new shape on a view, cancelling any shape in progress.
    pub fn start_shape(
        &mut self,
        shape_type: ShapeType,
        view_id: &str,
    ) -> Result<(), EditorError> {
        if !self.views.contains(view_id) {
            return Err(EditorError::UnknownView(view_id.to_string()));
        }
        self.cancel();

        self.active = Some(shape::start_shape(shape_type, view_id, self.item_id.as_str()));
        self.emit(SessionEvent::ShapeStarted {
            view_id: view_id.to_string(),
            shape_type,
        });
        Ok(())
    }

    /// Commit the active shape and queue the new objects for persistence.
    ///
    /// Returns the ids of the created objects, one per view the shape was
    /// drawn on. On error the shape stays active.
    pub fn commit(&mut self, features: Features) -> Result<Vec<String>, EditorError> {
        let shape = self.active.as_mut().ok_or(EditorError::NoActiveShape)?;
        let views = &self.views;
        let objects = shape::commit(
            shape,
            features,
            |view_id: &str| views.dims(view_id),
            &self.config.commit,
        )?;

        self.active = None;
        self.drag = None;
        let mut ids = Vec::with_capacity(objects.len());
        for object in objects {
            let event = SessionEvent::ShapeCommitted {
                view_id: object.view_id.clone(),
                object_id: object.id.clone(),
            };
            ids.push(object.id.clone());
            self.objects.push(object.clone());
            self.outbox.push_back(PendingChange::Save(object));
            self.emit(event);
        }
        Ok(ids)
    }

    /// Abandon the active shape. Returns whether one was in progress.
    pub fn cancel(&mut self) -> bool {
        self.drag = None;
        let Some(mut shape) = self.active.take() else {
            return false;
        };
        if !shape::cancel(&mut shape) {
            return false;
        }
        self.emit(SessionEvent::ShapeCancelled {
            view_ids: shape.views().map(str::to_string).collect(),
        });
        true
    }

    /// Delete a committed object and queue the deletion.
    pub fn delete_object(&mut self, object_id: &str) -> Result<ItemObject, EditorError> {
        let object = self
            .objects
            .remove(object_id)
            .ok_or_else(|| EditorError::UnknownObject(object_id.to_string()))?;
        self.outbox.push_back(PendingChange::Delete {
            item_id: object.item_id.clone(),
            object_id: object.id.clone(),
        });
        log::info!("Deleted object {}", object.id);
        self.emit(SessionEvent::ObjectDeleted {
            object_id: object.id.clone(),
        });
        Ok(object)
    }

    // ------------------------------------------------------------------------
    // Pointer input
    // ------------------------------------------------------------------------

    /// Handle a pointer press at a view-relative screen position.
    ///
    /// The press goes to the shape's geometry on `view_id`, through that
    /// view's own transform; a view the shape has not touched yet gets a new
    /// empty part. Rectangles anchor a drag at the (clamped) press position.
    /// Polygons either grab the vertex under the pointer or add a point.
    /// Returns the polygon click outcome when a polygon is being edited.
    pub fn pointer_down(
        &mut self,
        view_id: &str,
        pointer: Point,
    ) -> Result<Option<ClickOutcome>, EditorError> {
        let viewport = self.views.viewport(view_id)?;
        let shape = active_shape(&mut self.active)?;
        let raw = viewport.pointer_to_stage(pointer);
        let stage = viewport.pointer_to_stage_clamped(pointer).point;

        match shape.shape_type() {
            ShapeType::Rectangle => {
                let bbox = BoundingBox::from_corners(stage, stage);
                shape.set_rectangle(view_id, bbox)?;
                self.drag = Some(ActiveDrag {
                    view_id: view_id.to_string(),
                    kind: Drag::Rectangle { anchor: stage },
                });
                self.emit_change(view_id, ShapeChange::Resized(bbox));
                Ok(None)
            }
            ShapeType::Polygon => {
                let editor = shape.polygon_mut(view_id)?;
                let handles = self.views.handles();
                let hit = hit_test_vertex(
                    editor.rings(),
                    stage,
                    viewport.zoom(),
                    editor.hovered(),
                    handles,
                );
                let outcome = match hit {
                    Some(hit) => {
                        let grabbed =
                            editor.rings()[hit.vertex.ring].points()[hit.index].position();
                        self.drag = Some(ActiveDrag {
                            view_id: view_id.to_string(),
                            kind: Drag::Vertex {
                                vertex: hit.vertex,
                                offset: Point::new(grabbed.x - raw.x, grabbed.y - raw.y),
                            },
                        });
                        editor.on_vertex_click(hit.vertex.ring, hit.vertex.point_id)?
                    }
                    None => editor.on_click(stage, viewport.zoom(), handles),
                };
                if outcome != ClickOutcome::Ignored {
                    self.emit_change(view_id, ShapeChange::Clicked(outcome));
                }
                Ok(Some(outcome))
            }
            ShapeType::Mask => Ok(None),
        }
    }

    /// Handle pointer motion: resize, drag a vertex or update hover.
    ///
    /// A drag only follows motion on the view it started on. Motion without
    /// an active shape is ignored.
    pub fn pointer_move(&mut self, view_id: &str, pointer: Point) -> Result<(), EditorError> {
        let viewport = self.views.viewport(view_id)?;
        let Some(shape) = self.active.as_mut() else {
            return Ok(());
        };
        let drag = self
            .drag
            .as_ref()
            .filter(|drag| drag.view_id == view_id)
            .map(|drag| drag.kind);

        match drag {
            Some(Drag::Rectangle { anchor }) => {
                let corner = viewport.pointer_to_stage_clamped(pointer).point;
                let bbox = BoundingBox::from_corners(anchor, corner);
                shape.set_rectangle(view_id, bbox)?;
                self.emit_change(view_id, ShapeChange::Resized(bbox));
            }
            Some(Drag::Vertex { vertex, offset }) => {
                // Dragged vertices follow the pointer even outside the image
                let raw = viewport.pointer_to_stage(pointer);
                let stage = Point::new(raw.x + offset.x, raw.y + offset.y);
                shape
                    .polygon_mut(view_id)?
                    .on_vertex_drag(vertex.ring, vertex.point_id, stage)?;
                self.emit_change(view_id, ShapeChange::VertexMoved(vertex));
            }
            None => {
                if shape.polygon(view_id).is_some() {
                    let stage = viewport.pointer_to_stage(pointer);
                    let editor = shape.polygon_mut(view_id)?;
                    editor.on_pointer_move(stage, viewport.zoom(), self.views.handles());
                }
            }
        }
        Ok(())
    }

    /// Handle a pointer release, ending any drag.
    pub fn pointer_up(&mut self, view_id: &str, pointer: Point) -> Result<(), EditorError> {
        if self.drag.is_some() {
            self.pointer_move(view_id, pointer)?;
        }
        self.drag = None;
        Ok(())
    }

    /// Move a polygon vertex to a pointer position, without clamping.
    pub fn drag_vertex(
        &mut self,
        view_id: &str,
        vertex: VertexRef,
        pointer: Point,
    ) -> Result<(), EditorError> {
        let viewport = self.views.viewport(view_id)?;
        let shape = active_shape(&mut self.active)?;
        let stage = viewport.pointer_to_stage(pointer);
        shape
            .polygon_mut(view_id)?
            .on_vertex_drag(vertex.ring, vertex.point_id, stage)?;
        self.emit_change(view_id, ShapeChange::VertexMoved(vertex));
        Ok(())
    }

    /// Delete a polygon vertex from the shape's geometry on `view_id`.
    ///
    /// When no view has a ring left the shape is dropped and a
    /// [`SessionEvent::ShapeCancelled`] follows.
    pub fn delete_vertex(
        &mut self,
        view_id: &str,
        vertex: VertexRef,
    ) -> Result<RemovalOutcome, EditorError> {
        self.views.viewport(view_id)?;
        let shape = active_shape(&mut self.active)?;
        let outcome = shape.delete_polygon_vertex(view_id, vertex.ring, vertex.point_id)?;
        let emptied = self
            .active
            .take_if(|shape| shape.status() == ShapeStatus::None);
        self.drag = None;
        self.emit_change(view_id, ShapeChange::VertexRemoved(outcome));

        if let Some(shape) = emptied {
            self.emit(SessionEvent::ShapeCancelled {
                view_ids: shape.views().map(str::to_string).collect(),
            });
        }
        Ok(outcome)
    }

    /// Close the polygon ring being drawn.
    pub fn close_ring(&mut self, view_id: &str) -> Result<ClickOutcome, EditorError> {
        self.views.viewport(view_id)?;
        let shape = active_shape(&mut self.active)?;
        let outcome = shape.polygon_mut(view_id)?.close_ring()?;
        if outcome != ClickOutcome::Ignored {
            self.emit_change(view_id, ShapeChange::Clicked(outcome));
        }
        Ok(outcome)
    }

    /// Replace the mask of the active mask shape on one view.
    pub fn set_mask(
        &mut self,
        view_id: &str,
        rle: Rle,
        origin: MaskOrigin,
    ) -> Result<(), EditorError> {
        self.views.viewport(view_id)?;
        let shape = active_shape(&mut self.active)?;
        shape.set_mask(view_id, rle, origin)?;
        self.emit_change(view_id, ShapeChange::MaskSet);
        Ok(())
    }

    /// Replace the mask from a dense `(height, width)` array.
    pub fn set_dense_mask(
        &mut self,
        view_id: &str,
        mask: &Array2<bool>,
        origin: MaskOrigin,
    ) -> Result<(), EditorError> {
        self.set_mask(view_id, mask_rle::encode(mask)?, origin)
    }

    fn emit_change(&mut self, view_id: &str, change: ShapeChange) {
        self.emit(SessionEvent::ShapeChanged {
            view_id: view_id.to_string(),
            change,
        });
    }

    // ------------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------------

    /// Set the zoom of one view.
    pub fn set_zoom(&mut self, view_id: &str, zoom: f32) -> Result<f32, EditorError> {
        let handle_scale = self.views.set_zoom(view_id, zoom)?;
        self.emit(SessionEvent::ZoomChanged {
            view_id: view_id.to_string(),
            zoom,
            handle_scale,
        });
        Ok(handle_scale)
    }

    /// Zoom one view around a pointer position.
    pub fn zoom_to_cursor(
        &mut self,
        view_id: &str,
        zoom: f32,
        cursor: Point,
    ) -> Result<f32, EditorError> {
        let handle_scale = self.views.zoom_to_cursor(view_id, zoom, cursor)?;
        self.emit(SessionEvent::ZoomChanged {
            view_id: view_id.to_string(),
            zoom,
            handle_scale,
        });
        Ok(handle_scale)
    }

    pub fn pan_by(&mut self, view_id: &str, dx: f32, dy: f32) -> Result<(), EditorError> {
        self.views.pan_by(view_id, dx, dy)
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    /// Send queued changes to the store, oldest first.
    ///
    /// Delivery stops at the first failure; that change and everything after
    /// it stay queued for the next flush.
    pub fn flush(&mut self, store: &mut dyn ObjectStore) -> FlushReport {
        let mut delivered = 0;
        let mut error = None;

        while let Some(change) = self.outbox.front() {
            match change.apply(store) {
                Ok(()) => {
                    self.outbox.pop_front();
                    delivered += 1;
                }
                Err(e) => {
                    log::warn!("Persisting change failed, keeping it queued: {}", e);
                    error = Some(e);
                    break;
                }
            }
        }

        let pending = self.outbox.len();
        if delivered > 0 {
            log::info!("Persisted {} change(s)", delivered);
            self.emit(SessionEvent::Persisted { count: delivered });
        }
        if let Some(e) = &error {
            self.emit(SessionEvent::PersistFailed {
                error: e.clone(),
                pending,
            });
        }

        FlushReport {
            delivered,
            pending,
            error,
        }
    }
}

fn active_shape(active: &mut Option<Shape>) -> Result<&mut Shape, EditorError> {
    active.as_mut().ok_or(EditorError::NoActiveShape)
}
