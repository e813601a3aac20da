//! Shape Annotator - interactive shape-annotation engine
//!
//! Turns pointer interaction on one or more views of an image item into
//! rectangles, polygons and masks, and commits them as normalized item
//! objects ready to be stored.

pub mod collab;
pub mod config;
pub mod error;
pub mod geometry;
pub mod polygon;
pub mod replay;
pub mod session;
pub mod shape;
pub mod sync;
pub mod zoom_math;

#[cfg(test)]
mod tests;

pub use collab::{
    BackendError, DatasetItem, DatasetSource, ItemPage, NavigationContext, ObjectStore,
    SearchQuery, StaticDataset,
};
pub use config::{CommitConfig, EditorConfig, HandleConfig, LogLevel};
pub use error::EditorError;
pub use geometry::{BoundingBox, NormalizedPoint, Point, VertexRef, ViewDimensions, Viewport};
pub use mask_rle::{MaskError, Rle};
pub use polygon::{ClickOutcome, PolygonEditor, PolygonGroupPoint, RemovalOutcome, Ring};
pub use replay::{JsonLinesStore, ReplayScript};
pub use session::{EditingSession, FlushReport, SessionEvent, ShapeChange, SubscriptionId};
pub use shape::{
    BBox, BBoxFormat, Features, ItemObject, MaskOrigin, ObjectCollection, Shape, ShapeGeometry,
    ShapeStatus, ShapeType,
};
pub use sync::SyncController;
pub use zoom_math::Transform;
