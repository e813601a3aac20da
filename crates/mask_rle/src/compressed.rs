//! COCO compressed RLE strings.
//!
//! Each count is stored as a sequence of 5-bit groups offset into printable
//! ASCII (`'0'` + group), with bit 6 marking continuation. From the fourth
//! count on, the value stored is the difference to the count two runs
//! earlier, which keeps typical masks short. Decoding sign-extends the last
//! group, so negative deltas survive the trip.

use crate::error::MaskError;
use crate::rle::Rle;

const CHAR_OFFSET: u8 = 48;
const GROUP_BITS: u32 = 5;
const GROUP_MASK: i64 = 0x1f;
const SIGN_BIT: i64 = 0x10;
const MORE_BIT: i64 = 0x20;

impl Rle {
    /// Encode the counts as a COCO compressed string.
    pub fn to_compressed_string(&self) -> String {
        let counts = self.counts();
        let mut out = String::new();

        for (i, &count) in counts.iter().enumerate() {
            let mut x = i64::from(count);
            if i > 2 {
                x -= i64::from(counts[i - 2]);
            }
            loop {
                let mut c = x & GROUP_MASK;
                x >>= GROUP_BITS;
                let more = if c & SIGN_BIT != 0 { x != -1 } else { x != 0 };
                if more {
                    c |= MORE_BIT;
                }
                out.push(char::from(c as u8 + CHAR_OFFSET));
                if !more {
                    break;
                }
            }
        }
        out
    }

    /// Decode a COCO compressed string for a mask of `height` x `width`.
    pub fn from_compressed_string(s: &str, height: u32, width: u32) -> Result<Self, MaskError> {
        let mut counts: Vec<i64> = Vec::new();
        let mut bytes = s.bytes().peekable();

        while bytes.peek().is_some() {
            let mut x: i64 = 0;
            let mut shift = 0u32;
            loop {
                let byte = bytes.next().ok_or_else(|| {
                    MaskError::malformed("compressed string ends inside a count")
                })?;
                let c = i64::from(byte.checked_sub(CHAR_OFFSET).ok_or_else(|| {
                    MaskError::malformed(format!("invalid character {:?}", char::from(byte)))
                })?);
                if shift >= 60 {
                    return Err(MaskError::malformed("count too large in compressed string"));
                }
                x |= (c & GROUP_MASK) << shift;
                shift += GROUP_BITS;
                if c & MORE_BIT == 0 {
                    if c & SIGN_BIT != 0 {
                        x |= -1i64 << shift;
                    }
                    break;
                }
            }
            if counts.len() > 2 {
                x += counts[counts.len() - 2];
            }
            counts.push(x);
        }

        Rle::from_signed(&counts, [i64::from(height), i64::from(width)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_run() {
        let rle = Rle::empty(10, 10).unwrap();
        assert_eq!(rle.to_compressed_string(), "T3");
        assert_eq!(Rle::from_compressed_string("T3", 10, 10).unwrap(), rle);
    }

    #[test]
    fn test_short_counts_are_digits() {
        let rle = Rle::new(vec![3, 2, 4], 3, 3).unwrap();
        assert_eq!(rle.to_compressed_string(), "324");
    }

    #[test]
    fn test_negative_delta() {
        // Fourth count 1 is stored as 1 - 5 = -4
        let rle = Rle::new(vec![2, 5, 1, 1], 3, 3).unwrap();
        let s = rle.to_compressed_string();
        assert_eq!(s, "251L");
        assert_eq!(Rle::from_compressed_string(&s, 3, 3).unwrap(), rle);
    }

    #[test]
    fn test_round_trip_longer_mask() {
        let rle = Rle::new(vec![40, 7, 33, 12, 100, 1, 7], 20, 10).unwrap();
        let s = rle.to_compressed_string();
        assert_eq!(Rle::from_compressed_string(&s, 20, 10).unwrap(), rle);
    }

    #[test]
    fn test_truncated_string_rejected() {
        // 'T' has the continuation bit set
        assert!(Rle::from_compressed_string("T", 10, 10).is_err());
    }

    #[test]
    fn test_wrong_size_rejected() {
        assert!(Rle::from_compressed_string("T3", 5, 5).is_err());
    }

    #[test]
    fn test_invalid_character_rejected() {
        assert!(Rle::from_compressed_string("!", 1, 1).is_err());
    }
}
