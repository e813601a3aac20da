//! Error types for mask encoding and decoding.

use thiserror::Error;

/// Errors that can occur while building or decoding an RLE mask.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MaskError {
    /// Counts are inconsistent with the declared size, or contain invalid values
    #[error("Malformed mask: {message}")]
    Malformed {
        /// Description of what is wrong with the encoding
        message: String,
    },

    /// The mask has more pixels than a single run can count
    #[error("Mask of {height}x{width} pixels is too large to encode")]
    TooLarge { height: u64, width: u64 },
}

impl MaskError {
    /// Create a malformed mask error with a message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Create a too-large error for a mask size.
    pub fn too_large(height: impl Into<u64>, width: impl Into<u64>) -> Self {
        Self::TooLarge {
            height: height.into(),
            width: width.into(),
        }
    }
}
