//! Mask RLE - run-length encoding for binary segmentation masks.
//!
//! Dense masks are `ndarray::Array2<bool>` of shape `(height, width)`. The
//! encoded form follows the COCO convention: alternating background and
//! foreground runs in column-major order, starting with background, together
//! with `size = [height, width]`.

mod compressed;
mod contour;
mod error;
mod luma;
mod raster;
mod rle;

pub use error::MaskError;
pub use luma::{FOREGROUND_LUMA, from_luma, to_luma};
pub use raster::from_polygons;
pub use rle::{Rle, decode, encode};
