//! A synthetic lens-and-scene model for exercising the focus loop.
//!
//! The scene has a single subject at a fixed dioptre distance: contrast
//! follows a Gaussian profile around it, and the PDAF phase is linear in
//! the defocus with a slope matched to the default loop gain.

use af_core::mocks;
use af_traits::{PdafRegions, Statistics};

/// PDAF grid dimensions produced by the simulated sensor.
const PDAF_COLS: u32 = 16;
const PDAF_ROWS: u32 = 12;
/// Focus (CDAF) grid dimensions produced by the simulated ISP.
const FOCUS_COLS: u32 = 8;
const FOCUS_ROWS: u32 = 8;

pub struct Scene {
    /// Dioptre distance of the subject.
    peak: f64,
    /// Contrast figure of merit at perfect focus.
    peak_contrast: f64,
    /// Width of the contrast profile, dioptres.
    sigma: f64,
    /// Phase counts per dioptre of defocus.
    phase_slope: f64,
}

impl Scene {
    pub fn new(peak: f64) -> Self {
        Self {
            peak,
            peak_contrast: 4000.0,
            sigma: 1.5,
            phase_slope: 50.0,
        }
    }

    pub fn contrast_at(&self, pos: f64) -> f64 {
        let d = pos - self.peak;
        self.peak_contrast * (-d * d / (2.0 * self.sigma * self.sigma)).exp()
    }

    /// The PDAF samples a sensor at `pos` dioptres would embed.
    pub fn pdaf_at(&self, pos: f64, conf: u32) -> PdafRegions {
        let phase = ((pos - self.peak) * self.phase_slope).round() as i32;
        mocks::uniform_pdaf(PDAF_COLS, PDAF_ROWS, phase, conf)
    }

    /// The ISP statistics for a frame exposed at `pos` dioptres.
    pub fn stats_at(&self, pos: f64) -> Statistics {
        mocks::uniform_stats(FOCUS_COLS, FOCUS_ROWS, self.contrast_at(pos) as u64)
    }
}
