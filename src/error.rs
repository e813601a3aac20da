//! Error types for shape editing operations.
//!
//! Geometry and codec errors reject a single operation and leave the editing
//! state as it was. Backend errors are non-fatal: committed objects stay
//! queued until they can be delivered.

use mask_rle::MaskError;
use thiserror::Error;

use crate::collab::BackendError;
use crate::config::ConfigError;
use crate::shape::{ShapeStatus, ShapeType};

/// Errors that can occur while editing or committing shapes.
#[derive(Error, Debug)]
pub enum EditorError {
    /// RLE counts inconsistent with the declared size
    #[error(transparent)]
    Mask(#[from] MaskError),

    /// A ring has too few points to enclose an area
    #[error("Ring {ring} has {points} point(s), at least 3 are required")]
    DegenerateRing {
        /// Index of the offending ring
        ring: usize,
        /// Number of points left in it
        points: usize,
    },

    /// Commit attempted on a shape that is not in progress
    #[error("Cannot commit a shape with status {status:?}")]
    InvalidCommit {
        /// Status the shape was in
        status: ShapeStatus,
    },

    /// The shape has no usable geometry yet
    #[error("Nothing to commit: {reason}")]
    EmptyShape {
        /// What is missing
        reason: String,
    },

    /// Operation does not apply to this kind of shape
    #[error("Expected a {expected:?} shape, found {found:?}")]
    WrongShapeType {
        /// Shape type the operation needs
        expected: ShapeType,
        /// Shape type being edited
        found: ShapeType,
    },

    /// No shape is being edited
    #[error("No active shape")]
    NoActiveShape,

    /// View id not part of the current item
    #[error("Unknown view: {0}")]
    UnknownView(String),

    /// Ring index out of range
    #[error("Unknown ring {ring}")]
    UnknownRing {
        /// Requested ring index
        ring: usize,
    },

    /// Point id not present in the ring
    #[error("Unknown vertex {point_id} in ring {ring}")]
    UnknownVertex {
        /// Ring index
        ring: usize,
        /// Requested point id
        point_id: u32,
    },

    /// Object id not present in the item's collection
    #[error("Unknown object: {0}")]
    UnknownObject(String),

    /// Zoom factor that is zero, negative or not finite
    #[error("Invalid zoom factor {zoom}")]
    InvalidZoom {
        /// The rejected value
        zoom: f32,
    },

    /// Persistence or dataset backend failure
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Mask image could not be read
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EditorError {
    /// Create an empty shape error.
    pub fn empty_shape(reason: impl Into<String>) -> Self {
        Self::EmptyShape {
            reason: reason.into(),
        }
    }

    /// Whether the error comes from the backend and the operation can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EditorError::Backend(_))
    }
}
