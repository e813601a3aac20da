//! Polygon rasterization into RLE masks.

use ndarray::Array2;

use crate::error::MaskError;
use crate::rle::{Rle, encode, pixel_count};

/// Rasterize polygon rings into an RLE mask of `height` x `width`.
///
/// A pixel is foreground when its center lies inside an odd number of rings,
/// so inner rings carve holes out of the outer one and disjoint rings add
/// separate regions. Rings with fewer than three vertices are ignored.
pub fn from_polygons<R>(rings: &[R], height: u32, width: u32) -> Result<Rle, MaskError>
where
    R: AsRef<[[f32; 2]]>,
{
    pixel_count(height, width)?;
    let (h, w) = (height as usize, width as usize);
    let mut mask = Array2::from_elem((h, w), false);
    let mut crossings: Vec<f64> = Vec::new();

    for row in 0..h {
        let cy = row as f64 + 0.5;
        crossings.clear();

        for ring in rings.iter().map(|r| r.as_ref()).filter(|r| r.len() >= 3) {
            let n = ring.len();
            for i in 0..n {
                let [x0, y0] = ring[i].map(f64::from);
                let [x1, y1] = ring[(i + 1) % n].map(f64::from);
                if (y0 > cy) != (y1 > cy) {
                    crossings.push(x0 + (cy - y0) * (x1 - x0) / (y1 - y0));
                }
            }
        }

        crossings.sort_by(f64::total_cmp);
        for span in crossings.chunks_exact(2) {
            let start = (span[0] - 0.5).ceil().max(0.0) as usize;
            let end = ((span[1] - 0.5).ceil().max(0.0) as usize).min(w);
            for col in start..end {
                mask[[row, col]] = true;
            }
        }
    }

    log::trace!(
        "Rasterized {} ring(s) into {}x{} mask",
        rings.len(),
        height,
        width
    );
    encode(&mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_aligned_square() {
        let square: Vec<[f32; 2]> = vec![[1.0, 1.0], [3.0, 1.0], [3.0, 3.0], [1.0, 3.0]];
        let rle = from_polygons(&[square], 4, 4).unwrap();
        assert_eq!(rle.counts(), &[5, 2, 2, 2, 5]);
        assert_eq!(rle.to_bbox(), Some([1, 1, 2, 2]));
    }

    #[test]
    fn test_hole_is_carved_out() {
        let outer: Vec<[f32; 2]> = vec![[0.0, 0.0], [6.0, 0.0], [6.0, 6.0], [0.0, 6.0]];
        let hole: Vec<[f32; 2]> = vec![[2.0, 2.0], [4.0, 2.0], [4.0, 4.0], [2.0, 4.0]];
        let rle = from_polygons(&[outer, hole], 6, 6).unwrap();
        assert_eq!(rle.area(), 36 - 4);
    }

    #[test]
    fn test_degenerate_ring_ignored() {
        let line: Vec<[f32; 2]> = vec![[0.0, 0.0], [4.0, 4.0]];
        assert_eq!(from_polygons(&[line], 4, 4), Rle::empty(4, 4));
    }

    #[test]
    fn test_oversized_target_rejected() {
        let square: Vec<[f32; 2]> = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
        assert!(matches!(
            from_polygons(&[square], 70_000, 70_000),
            Err(MaskError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_polygon_outside_is_clipped() {
        let big: Vec<[f32; 2]> = vec![[-5.0, -5.0], [10.0, -5.0], [10.0, 10.0], [-5.0, 10.0]];
        assert_eq!(from_polygons(&[big], 3, 2).unwrap().area(), 6);
    }
}
