//! Run-length encoding of binary masks.
//!
//! Counts alternate background/foreground runs, starting with background, over
//! pixels traversed in column-major (Fortran) order. `size` is `[height, width]`.
//! This is the convention used by COCO tooling, so masks written here can be
//! read by pycocotools and vice versa.

use ndarray::{Array2, ShapeBuilder};
use serde::{Deserialize, Serialize};

use crate::error::MaskError;

/// A validated run-length encoded mask.
///
/// The sum of `counts` always equals `height * width`; every constructor
/// checks this, so a decoded `Rle` can be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRle")]
pub struct Rle {
    counts: Vec<u32>,
    size: [u32; 2],
}

/// Wire form accepted on deserialization, before validation.
///
/// Signed so that negative counts coming from other tools are reported as
/// malformed instead of failing inside serde with a type error.
#[derive(Deserialize)]
struct RawRle {
    counts: Vec<i64>,
    size: [i64; 2],
}

impl TryFrom<RawRle> for Rle {
    type Error = MaskError;

    fn try_from(raw: RawRle) -> Result<Self, Self::Error> {
        Rle::from_signed(&raw.counts, raw.size)
    }
}

impl Rle {
    /// Build an RLE from unsigned counts, checking them against the size.
    pub fn new(counts: Vec<u32>, height: u32, width: u32) -> Result<Self, MaskError> {
        let rle = Self {
            counts,
            size: [height, width],
        };
        rle.validate()?;
        Ok(rle)
    }

    /// Build an RLE from untrusted signed counts and size.
    pub fn from_signed(counts: &[i64], size: [i64; 2]) -> Result<Self, MaskError> {
        let [height, width] = size;
        let height = u32::try_from(height)
            .map_err(|_| MaskError::malformed(format!("invalid mask height {height}")))?;
        let width = u32::try_from(width)
            .map_err(|_| MaskError::malformed(format!("invalid mask width {width}")))?;

        let counts = counts
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                u32::try_from(c)
                    .map_err(|_| MaskError::malformed(format!("invalid count {c} at run {i}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(counts, height, width)
    }

    /// An all-background mask of the given size.
    pub fn empty(height: u32, width: u32) -> Result<Self, MaskError> {
        Ok(Self {
            counts: vec![pixel_count(height, width)?],
            size: [height, width],
        })
    }

    /// Check that the counts cover exactly `height * width` pixels.
    pub fn validate(&self) -> Result<(), MaskError> {
        let total: u64 = self.counts.iter().map(|&c| u64::from(c)).sum();
        let expected = u64::from(self.size[0]) * u64::from(self.size[1]);
        if total != expected {
            log::debug!(
                "Rejected RLE: counts sum to {} but size {:?} needs {}",
                total,
                self.size,
                expected
            );
            return Err(MaskError::malformed(format!(
                "counts sum to {total}, expected {expected} for size {:?}",
                self.size
            )));
        }
        Ok(())
    }

    /// Run lengths, alternating background and foreground.
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Mask size as `[height, width]`.
    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    pub fn height(&self) -> u32 {
        self.size[0]
    }

    pub fn width(&self) -> u32 {
        self.size[1]
    }

    /// Number of foreground pixels.
    pub fn area(&self) -> u64 {
        self.counts
            .iter()
            .skip(1)
            .step_by(2)
            .map(|&c| u64::from(c))
            .sum()
    }

    /// Whether the mask has no foreground pixel.
    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    /// Pixel bounding box `[x, y, width, height]` of the foreground.
    ///
    /// Returns `None` for a mask with no foreground pixel.
    pub fn to_bbox(&self) -> Option<[u32; 4]> {
        let h = u64::from(self.height());
        if h == 0 {
            return None;
        }

        let (mut min_x, mut min_y) = (u64::MAX, u64::MAX);
        let (mut max_x, mut max_y) = (0u64, 0u64);
        let mut found = false;
        let mut position = 0u64;

        for (i, &count) in self.counts.iter().enumerate() {
            let count = u64::from(count);
            if i % 2 == 1 && count > 0 {
                found = true;
                let start = position;
                let end = position + count - 1;
                let (x1, y1) = (start / h, start % h);
                let (x2, y2) = (end / h, end % h);

                min_x = min_x.min(x1);
                max_x = max_x.max(x2);
                if x1 == x2 {
                    min_y = min_y.min(y1);
                    max_y = max_y.max(y2);
                } else {
                    // A run spanning two or more columns touches the first and
                    // last row of the mask.
                    min_y = 0;
                    max_y = h - 1;
                }
            }
            position += count;
        }

        if !found {
            return None;
        }

        Some([
            min_x as u32,
            min_y as u32,
            (max_x - min_x + 1) as u32,
            (max_y - min_y + 1) as u32,
        ])
    }

    /// Foreground bounding box `[x, y, w, h]` normalized to `[0, 1]`.
    pub fn to_normalized_bbox(&self) -> Option<[f32; 4]> {
        let [x, y, w, h] = self.to_bbox()?;
        let width = self.width() as f32;
        let height = self.height() as f32;
        Some([
            x as f32 / width,
            y as f32 / height,
            w as f32 / width,
            h as f32 / height,
        ])
    }
}

/// Number of pixels in a `height` x `width` mask, if every run fits a count.
pub(crate) fn pixel_count(height: u32, width: u32) -> Result<u32, MaskError> {
    height
        .checked_mul(width)
        .ok_or_else(|| MaskError::too_large(height, width))
}

/// Encode a dense mask of shape `(height, width)` into RLE.
///
/// Fails when the mask has more than `u32::MAX` pixels.
pub fn encode(mask: &Array2<bool>) -> Result<Rle, MaskError> {
    let (rows, cols) = mask.dim();
    let too_large = || MaskError::too_large(rows as u64, cols as u64);
    let height = u32::try_from(rows).map_err(|_| too_large())?;
    let width = u32::try_from(cols).map_err(|_| too_large())?;
    pixel_count(height, width)?;

    let mut counts = Vec::new();
    let mut current = false;
    let mut run: u32 = 0;

    // The transposed view iterates column by column.
    for &pixel in mask.t().iter() {
        if pixel != current {
            counts.push(run);
            run = 0;
            current = pixel;
        }
        run += 1;
    }
    counts.push(run);

    Ok(Rle {
        counts,
        size: [height, width],
    })
}

/// Decode an RLE into a dense mask of shape `(height, width)`.
///
/// Malformed input is rejected as a whole; no partial mask is produced.
pub fn decode(rle: &Rle) -> Result<Array2<bool>, MaskError> {
    rle.validate()?;
    let height = rle.height() as usize;
    let width = rle.width() as usize;

    let mut pixels = Vec::with_capacity(height * width);
    let mut value = false;
    for &count in &rle.counts {
        pixels.extend(std::iter::repeat_n(value, count as usize));
        value = !value;
    }

    Array2::from_shape_vec((height, width).f(), pixels)
        .map_err(|e| MaskError::malformed(format!("cannot shape decoded pixels: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    #[test]
    fn test_all_background_4x4() {
        let mask = Array2::from_elem((4, 4), false);
        let rle = encode(&mask).unwrap();
        assert_eq!(rle.counts(), &[16]);
        assert_eq!(rle.size(), [4, 4]);
        assert_eq!(decode(&rle).unwrap(), mask);
    }

    #[test]
    fn test_all_foreground_starts_with_zero_run() {
        let mask = Array2::from_elem((2, 3), true);
        let rle = encode(&mask).unwrap();
        assert_eq!(rle.counts(), &[0, 6]);
        assert_eq!(rle.area(), 6);
    }

    #[test]
    fn test_column_major_order() {
        // Column 0 is [0, 1], column 1 is [1, 1]
        let mask = array![[false, true], [true, true]];
        let rle = encode(&mask).unwrap();
        assert_eq!(rle.counts(), &[1, 3]);
        assert_eq!(rle.size(), [2, 2]);
    }

    #[test]
    fn test_non_square_decode() {
        let rle = Rle::new(vec![1, 2, 3], 2, 3).unwrap();
        let mask = decode(&rle).unwrap();
        assert_eq!(
            mask,
            array![[false, true, false], [true, false, false]]
        );
    }

    #[test]
    fn test_wrong_sum_rejected() {
        let err = Rle::new(vec![3, 4], 2, 2).unwrap_err();
        assert!(matches!(err, MaskError::Malformed { .. }));
    }

    #[test]
    fn test_negative_count_rejected() {
        let err = Rle::from_signed(&[5, -1, 0], [2, 2]).unwrap_err();
        assert!(err.to_string().contains("invalid count -1"));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Rle = serde_json::from_str(r#"{"counts":[16],"size":[4,4]}"#).unwrap();
        assert_eq!(ok, Rle::empty(4, 4).unwrap());

        assert!(serde_json::from_str::<Rle>(r#"{"counts":[15],"size":[4,4]}"#).is_err());
        assert!(serde_json::from_str::<Rle>(r#"{"counts":[17,-1],"size":[4,4]}"#).is_err());
    }

    #[test]
    fn test_serialize_wire_form() {
        let json = serde_json::to_string(&Rle::empty(4, 4).unwrap()).unwrap();
        assert_eq!(json, r#"{"counts":[16],"size":[4,4]}"#);
    }

    #[test]
    fn test_bbox_single_column_run() {
        let mut mask = Array2::from_elem((5, 4), false);
        mask[[1, 2]] = true;
        mask[[3, 2]] = true;
        assert_eq!(encode(&mask).unwrap().to_bbox(), Some([2, 1, 1, 3]));
    }

    #[test]
    fn test_bbox_block() {
        let mut mask = Array2::from_elem((6, 6), false);
        for y in 2..5 {
            for x in 1..4 {
                mask[[y, x]] = true;
            }
        }
        let rle = encode(&mask).unwrap();
        assert_eq!(rle.to_bbox(), Some([1, 2, 3, 3]));
        let n = rle.to_normalized_bbox().unwrap();
        assert!((n[0] - 1.0 / 6.0).abs() < 1e-6);
        assert!((n[3] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_empty_rejects_oversized_mask() {
        assert_eq!(
            Rle::empty(70_000, 70_000),
            Err(MaskError::TooLarge {
                height: 70_000,
                width: 70_000
            })
        );
        let widest = Rle::empty(1, u32::MAX).unwrap();
        assert_eq!(widest.counts(), &[u32::MAX]);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_encode_rejects_oversized_mask() {
        // Zero rows keep the array empty while the columns overflow a u32
        let mask = Array2::from_elem((0, u32::MAX as usize + 1), false);
        assert!(matches!(encode(&mask), Err(MaskError::TooLarge { .. })));
    }

    #[test]
    fn test_bbox_empty_mask() {
        assert_eq!(Rle::empty(3, 3).unwrap().to_bbox(), None);
    }

    fn arb_mask() -> impl Strategy<Value = Array2<bool>> {
        (0usize..12, 0usize..12).prop_flat_map(|(h, w)| {
            prop::collection::vec(any::<bool>(), h * w)
                .prop_map(move |v| Array2::from_shape_vec((h, w), v).unwrap())
        })
    }

    /// Bounding box computed by scanning the dense mask.
    fn dense_bbox(mask: &Array2<bool>) -> Option<[u32; 4]> {
        let mut bounds: Option<(usize, usize, usize, usize)> = None;
        for ((y, x), &v) in mask.indexed_iter() {
            if v {
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        bounds.map(|(x0, y0, x1, y1)| {
            [x0 as u32, y0 as u32, (x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32]
        })
    }

    proptest! {
        #[test]
        fn prop_round_trip(mask in arb_mask()) {
            let rle = encode(&mask).unwrap();
            let (h, w) = mask.dim();
            let total: u64 = rle.counts().iter().map(|&c| u64::from(c)).sum();
            prop_assert_eq!(total, (h * w) as u64);
            prop_assert_eq!(decode(&rle).unwrap(), mask);
        }

        #[test]
        fn prop_bbox_matches_dense_scan(mask in arb_mask()) {
            prop_assert_eq!(encode(&mask).unwrap().to_bbox(), dense_bbox(&mask));
        }

        #[test]
        fn prop_area_matches_dense_count(mask in arb_mask()) {
            let expected = mask.iter().filter(|&&v| v).count() as u64;
            prop_assert_eq!(encode(&mask).unwrap().area(), expected);
        }
    }
}
