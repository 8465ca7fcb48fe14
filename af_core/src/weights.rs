//! Projection of user metering windows onto a statistics region grid.

use af_traits::Rect;

/// Maximum number of user metering windows honoured.
pub const MAX_WINDOWS: usize = 10;

/// Per-region weights for one statistics grid, plus their sum.
///
/// A zero `sum` marks the weights as invalid; the next fusion call
/// recomputes them for the grid dimensions it sees.
#[derive(Debug, Clone, Default)]
pub struct RegionWeights {
    pub rows: u32,
    pub cols: u32,
    pub sum: u32,
    pub w: Vec<u16>,
}

impl RegionWeights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve space up front to reduce reallocation once grid sizes are
    /// known.
    pub fn with_capacity(regions: usize) -> Self {
        Self {
            w: Vec::with_capacity(regions),
            ..Self::default()
        }
    }

    /// Force recomputation on the next fusion call.
    pub fn invalidate(&mut self) {
        self.sum = 0;
    }

    /// Recompute weights for a `rows x cols` grid covering `stats_region`.
    ///
    /// Each window contributes to every grid cell it overlaps, in
    /// proportion to the overlap area. Weights are scaled so the total
    /// stays below 1<<16: 46080 is a round number below 65536, for better
    /// rounding when window size is a simple fraction of the image
    /// dimensions. When no window lands inside the region (or `windows` is
    /// empty), the default AF window is used: the middle 1/2 of the width
    /// by the middle 1/3 of the height.
    pub fn compute(&mut self, rows: u32, cols: u32, stats_region: &Rect, windows: &[Rect]) {
        self.rows = rows;
        self.cols = cols;
        self.sum = 0;
        self.w.clear();
        self.w.resize((rows * cols) as usize, 0);

        if rows > 0
            && cols > 0
            && !windows.is_empty()
            && stats_region.height >= rows
            && stats_region.width >= cols
        {
            let max_cell_weight = 46080 / (MAX_WINDOWS as u32 * rows * cols);
            let cell_h = stats_region.height / rows;
            let cell_w = stats_region.width / cols;
            let cell_a = cell_h * cell_w;

            for win in windows {
                for r in 0..rows {
                    let y0 = (stats_region.y + (cell_h * r) as i32).max(win.y);
                    let y1 = (stats_region.y + (cell_h * (r + 1)) as i32)
                        .min(win.y + win.height as i32);
                    if y0 >= y1 {
                        continue;
                    }
                    let h = (y1 - y0) as u32;
                    for c in 0..cols {
                        let x0 = (stats_region.x + (cell_w * c) as i32).max(win.x);
                        let x1 = (stats_region.x + (cell_w * (c + 1)) as i32)
                            .min(win.x + win.width as i32);
                        if x0 >= x1 {
                            continue;
                        }
                        let a = h * (x1 - x0) as u32;
                        let a = (max_cell_weight * a + cell_a - 1) / cell_a;
                        self.w[(r * cols + c) as usize] += a as u16;
                        self.sum += a;
                    }
                }
            }
        }

        if self.sum == 0 {
            for r in rows / 3..rows - rows / 3 {
                for c in cols / 4..cols - cols / 4 {
                    self.w[(r * cols + c) as usize] = 1;
                    self.sum += 1;
                }
            }
        }
    }
}
