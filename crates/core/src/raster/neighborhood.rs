//! Neighborhood definitions for raster analysis

/// Pixel adjacency used when grouping cells into connected regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Edge neighbors only (N, E, S, W)
    Four,
    /// Edge and corner neighbors
    Eight,
}

impl Connectivity {
    const ROOK: [(isize, isize); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];
    const QUEEN: [(isize, isize); 8] = [
        (-1, -1),
        (-1, 0),
        (-1, 1),
        (0, -1),
        (0, 1),
        (1, -1),
        (1, 0),
        (1, 1),
    ];

    /// Relative (row, col) offsets of the neighbors, excluding the center
    pub fn offsets(&self) -> &'static [(isize, isize)] {
        match self {
            Connectivity::Four => &Self::ROOK,
            Connectivity::Eight => &Self::QUEEN,
        }
    }

    /// In-bounds neighbors of `(row, col)` on a `rows x cols` grid
    pub fn neighbors(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.offsets().iter().filter_map(move |&(dr, dc)| {
            let nr = row.checked_add_signed(dr)?;
            let nc = col.checked_add_signed(dc)?;
            (nr < rows && nc < cols).then_some((nr, nc))
        })
    }
}

/// Circular footprint of a focal kernel
#[derive(Debug, Clone, PartialEq)]
pub struct CircularKernel {
    radius_cells: f64,
    offsets: Vec<(isize, isize)>,
}

impl CircularKernel {
    /// Kernel whose footprint holds every cell center within `radius` map
    /// units of the target cell center.
    ///
    /// The center cell is always part of the footprint.
    pub fn from_map_units(radius: f64, cell_size: f64) -> Self {
        let radius_cells = if cell_size > 0.0 { radius / cell_size } else { 0.0 };
        Self::from_cells(radius_cells)
    }

    /// Kernel with a radius expressed in cells
    pub fn from_cells(radius_cells: f64) -> Self {
        let radius_cells = radius_cells.max(0.0);
        let reach = radius_cells.floor() as isize;
        let r_sq = radius_cells * radius_cells + 1e-9;

        let mut offsets = Vec::new();
        for dr in -reach..=reach {
            for dc in -reach..=reach {
                if ((dr * dr + dc * dc) as f64) <= r_sq {
                    offsets.push((dr, dc));
                }
            }
        }

        Self {
            radius_cells,
            offsets,
        }
    }

    /// Radius in cells
    pub fn radius_cells(&self) -> f64 {
        self.radius_cells
    }

    /// Relative (row, col) offsets including the center
    pub fn offsets(&self) -> &[(isize, isize)] {
        &self.offsets
    }

    /// Number of cells in the footprint
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// A kernel always holds at least the center cell
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_offsets() {
        assert_eq!(Connectivity::Four.offsets().len(), 4);
        assert_eq!(Connectivity::Eight.offsets().len(), 8);
    }

    #[test]
    fn test_neighbors_clip_at_edges() {
        let corner: Vec<_> = Connectivity::Eight.neighbors(0, 0, 5, 5).collect();
        assert_eq!(corner.len(), 3);

        let inner: Vec<_> = Connectivity::Four.neighbors(2, 2, 5, 5).collect();
        assert_eq!(inner, vec![(1, 2), (2, 1), (2, 3), (3, 2)]);
    }

    #[test]
    fn test_circular_kernel_footprint() {
        // 50 m radius on 10 m cells: radius 5 disk
        let k = CircularKernel::from_map_units(50.0, 10.0);
        assert_eq!(k.radius_cells(), 5.0);
        assert!(k.offsets().contains(&(0, 5)));
        assert!(k.offsets().contains(&(3, 4)));
        assert!(!k.offsets().contains(&(4, 4)));
        assert_eq!(k.len(), 81);

        // Radius smaller than a cell keeps only the center
        let tiny = CircularKernel::from_map_units(3.0, 10.0);
        assert_eq!(tiny.offsets(), &[(0, 0)]);
    }
}
