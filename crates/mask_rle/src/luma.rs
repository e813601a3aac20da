//! Conversions between grayscale images and RLE masks.

use image::{GrayImage, Luma};
use ndarray::Array2;

use crate::error::MaskError;
use crate::rle::{Rle, decode, encode};

/// Value written for foreground pixels by [`to_luma`].
pub const FOREGROUND_LUMA: u8 = 255;

/// Encode a grayscale image, treating pixels brighter than `threshold` as foreground.
pub fn from_luma(image: &GrayImage, threshold: u8) -> Result<Rle, MaskError> {
    let (width, height) = image.dimensions();
    let mask = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        image.get_pixel(x as u32, y as u32)[0] > threshold
    });
    encode(&mask)
}

/// Render an RLE as a black/white grayscale image.
pub fn to_luma(rle: &Rle) -> Result<GrayImage, MaskError> {
    let mask = decode(rle)?;
    Ok(GrayImage::from_fn(rle.width(), rle.height(), |x, y| {
        if mask[[y as usize, x as usize]] {
            Luma([FOREGROUND_LUMA])
        } else {
            Luma([0])
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold() {
        let mut image = GrayImage::new(3, 2);
        image.put_pixel(2, 0, Luma([200]));
        image.put_pixel(0, 1, Luma([100]));

        let rle = from_luma(&image, 127).unwrap();
        assert_eq!(rle.size(), [2, 3]);
        assert_eq!(rle.area(), 1);
        assert_eq!(rle.to_bbox(), Some([2, 0, 1, 1]));
    }

    #[test]
    fn test_image_round_trip() {
        let rle = Rle::new(vec![1, 2, 3], 2, 3).unwrap();
        let image = to_luma(&rle).unwrap();
        assert_eq!(image.get_pixel(1, 0)[0], FOREGROUND_LUMA);
        assert_eq!(image.get_pixel(0, 0)[0], 0);
        assert_eq!(from_luma(&image, 0), Ok(rle));
    }
}
