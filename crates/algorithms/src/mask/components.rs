//! Connected components of binary masks

use ndarray::Array2;
use sarflood_core::raster::{Connectivity, Raster};

/// Component labels of the positive pixels of a mask
///
/// Label 0 marks background; component `k` (1-based) has `sizes[k - 1]` pixels.
/// Labels are assigned in row-major order of each component's first pixel.
#[derive(Debug, Clone)]
pub struct Components {
    pub labels: Array2<u32>,
    pub sizes: Vec<usize>,
}

impl Components {
    /// Number of components
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Pixel count of the component covering `(row, col)`, 0 for background
    pub fn size_at(&self, row: usize, col: usize) -> usize {
        match self.labels.get((row, col)) {
            Some(&label) if label > 0 => self.sizes[label as usize - 1],
            _ => 0,
        }
    }
}

/// Whether a mask pixel is a valid positive
pub fn is_positive(mask: &Raster<u8>, row: usize, col: usize) -> bool {
    mask.valid_at(row, col).is_some_and(|v| v != 0)
}

/// Label connected groups of valid, non-zero pixels.
pub fn label_components(mask: &Raster<u8>, connectivity: Connectivity) -> Components {
    let (rows, cols) = mask.shape();
    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut sizes = Vec::new();

    for r in 0..rows {
        for c in 0..cols {
            if labels[[r, c]] != 0 || !is_positive(mask, r, c) {
                continue;
            }

            let label = sizes.len() as u32 + 1;
            let mut size = 0;
            let mut stack = vec![(r, c)];
            labels[[r, c]] = label;

            while let Some((cr, cc)) = stack.pop() {
                size += 1;
                for (nr, nc) in connectivity.neighbors(cr, cc, rows, cols) {
                    if labels[[nr, nc]] == 0 && is_positive(mask, nr, nc) {
                        labels[[nr, nc]] = label;
                        stack.push((nr, nc));
                    }
                }
            }

            sizes.push(size);
        }
    }

    Components { labels, sizes }
}
