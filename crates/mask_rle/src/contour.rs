//! Boundary tracing from RLE masks to polygon rings.

use std::collections::BTreeMap;

use crate::error::MaskError;
use crate::rle::{Rle, decode};

/// A pixel corner as `(row, col)`, so map order is row-major.
type Corner = (i64, i64);

impl Rle {
    /// Trace the foreground boundaries as polygon rings in pixel coordinates.
    ///
    /// Vertices are `[x, y]` pixel corners and rings follow pixel edges, so
    /// [`from_polygons`](crate::from_polygons) turns the rings back into the
    /// same mask. Outer boundaries run clockwise on screen and holes
    /// counter-clockwise. Pixels touching only at a corner end up in separate
    /// rings. Collinear corners are dropped.
    pub fn to_polygons(&self) -> Result<Vec<Vec<[f32; 2]>>, MaskError> {
        let mask = decode(self)?;
        let (height, width) = mask.dim();
        let filled = |row: i64, col: i64| {
            row >= 0
                && col >= 0
                && (row as usize) < height
                && (col as usize) < width
                && mask[[row as usize, col as usize]]
        };

        // Every foreground side facing background becomes a unit edge with
        // the foreground on its right.
        let mut edges: BTreeMap<Corner, Vec<Corner>> = BTreeMap::new();
        let mut add = |from: Corner, to: Corner| edges.entry(from).or_default().push(to);
        for ((row, col), _) in mask.indexed_iter().filter(|(_, pixel)| **pixel) {
            let (r, c) = (row as i64, col as i64);
            if !filled(r - 1, c) {
                add((r, c), (r, c + 1));
            }
            if !filled(r, c + 1) {
                add((r, c + 1), (r + 1, c + 1));
            }
            if !filled(r + 1, c) {
                add((r + 1, c + 1), (r + 1, c));
            }
            if !filled(r, c - 1) {
                add((r + 1, c), (r, c));
            }
        }

        let mut rings = Vec::new();
        while let Some(&start) = edges.keys().next() {
            let mut corners = vec![start];
            let mut current = start;
            let mut heading = None;
            while let Some(next) = take_edge(&mut edges, current, heading) {
                heading = Some((next.0 - current.0, next.1 - current.1));
                if next == start {
                    break;
                }
                corners.push(next);
                current = next;
            }
            rings.push(simplify(&corners));
        }

        log::trace!(
            "Traced {} ring(s) from {}x{} mask",
            rings.len(),
            height,
            width
        );
        Ok(rings)
    }
}

/// Remove and return an edge leaving `from`.
///
/// Where two edges leave the same corner, the right turn is taken so the
/// boundary keeps hugging the pixels it came along.
fn take_edge(
    edges: &mut BTreeMap<Corner, Vec<Corner>>,
    from: Corner,
    heading: Option<Corner>,
) -> Option<Corner> {
    let targets = edges.get_mut(&from)?;
    let index = heading
        .and_then(|(dr, dc)| {
            let right = (from.0 + dc, from.1 - dr);
            targets.iter().position(|&t| t == right)
        })
        .unwrap_or(0);
    let to = targets.swap_remove(index);
    if targets.is_empty() {
        edges.remove(&from);
    }
    Some(to)
}

fn simplify(corners: &[Corner]) -> Vec<[f32; 2]> {
    let n = corners.len();
    let step = |a: Corner, b: Corner| ((b.0 - a.0).signum(), (b.1 - a.1).signum());
    (0..n)
        .filter(|&i| {
            let prev = corners[(i + n - 1) % n];
            let next = corners[(i + 1) % n];
            step(prev, corners[i]) != step(corners[i], next)
        })
        .map(|i| {
            let (row, col) = corners[i];
            [col as f32, row as f32]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;
    use proptest::prelude::*;

    use crate::{encode, from_polygons};

    /// 6x6 mask holding a 4x4 square with a 2x2 hole in the middle.
    fn square_with_hole() -> Array2<bool> {
        Array2::from_shape_fn((6, 6), |(y, x)| {
            let in_square = (1..5).contains(&y) && (1..5).contains(&x);
            let in_hole = (2..4).contains(&y) && (2..4).contains(&x);
            in_square && !in_hole
        })
    }

    #[test]
    fn test_square_with_hole() {
        let rle = encode(&square_with_hole()).unwrap();
        let rings = rle.to_polygons().unwrap();

        assert_eq!(
            rings,
            vec![
                vec![[1.0, 1.0], [5.0, 1.0], [5.0, 5.0], [1.0, 5.0]],
                vec![[2.0, 2.0], [2.0, 4.0], [4.0, 4.0], [4.0, 2.0]],
            ]
        );
        assert_eq!(from_polygons(&rings, 6, 6).unwrap(), rle);
    }

    #[test]
    fn test_empty_mask_has_no_rings() {
        let rle = encode(&Array2::from_elem((3, 4), false)).unwrap();
        assert!(rle.to_polygons().unwrap().is_empty());
    }

    #[test]
    fn test_diagonal_pixels_are_separate_rings() {
        let mut mask = Array2::from_elem((2, 2), false);
        mask[[0, 0]] = true;
        mask[[1, 1]] = true;
        let rle = encode(&mask).unwrap();

        let rings = rle.to_polygons().unwrap();
        assert_eq!(rings.len(), 2);
        assert!(rings.iter().all(|ring| ring.len() == 4));
        assert_eq!(from_polygons(&rings, 2, 2).unwrap(), rle);
    }

    #[test]
    fn test_mask_touching_the_border() {
        let rle = encode(&Array2::from_elem((3, 2), true)).unwrap();
        let rings = rle.to_polygons().unwrap();
        assert_eq!(rings, vec![vec![[0.0, 0.0], [2.0, 0.0], [2.0, 3.0], [0.0, 3.0]]]);
    }

    fn arb_mask() -> impl Strategy<Value = Array2<bool>> {
        (1usize..10, 1usize..10).prop_flat_map(|(h, w)| {
            prop::collection::vec(any::<bool>(), h * w)
                .prop_map(move |v| Array2::from_shape_vec((h, w), v).unwrap())
        })
    }

    proptest! {
        #[test]
        fn prop_rings_rasterize_to_same_mask(mask in arb_mask()) {
            let rle = encode(&mask).unwrap();
            let rings = rle.to_polygons().unwrap();
            prop_assert_eq!(from_polygons(&rings, rle.height(), rle.width()).unwrap(), rle);
        }
    }
}
