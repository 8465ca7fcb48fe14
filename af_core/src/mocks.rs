//! Test and simulation helpers for driving the algorithm frame by frame.

use af_traits::{
    AfStatus, AgcStatus, AwbRegions, FocusRegions, FrameMetadata, GridSize, PdafData, PdafRegions,
    Region, RgbySums, Statistics,
};

/// An owning, in-memory metadata bundle for one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameBag {
    pub pdaf: Option<PdafRegions>,
    pub agc: Option<AgcStatus>,
    pub af_status: Option<AfStatus>,
}

impl FrameBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pdaf(pdaf: PdafRegions) -> Self {
        Self {
            pdaf: Some(pdaf),
            ..Self::default()
        }
    }
}

impl FrameMetadata for FrameBag {
    fn pdaf_regions(&self) -> Option<&PdafRegions> {
        self.pdaf.as_ref()
    }

    fn agc_status(&self) -> Option<AgcStatus> {
        self.agc
    }

    fn set_af_status(&mut self, status: AfStatus) {
        self.af_status = Some(status);
    }
}

/// A PDAF grid with every cell carrying the same sample.
pub fn uniform_pdaf(cols: u32, rows: u32, phase: i32, conf: u32) -> PdafRegions {
    PdafRegions::filled(
        GridSize::new(cols, rows),
        Region {
            val: PdafData { phase, conf },
            counted: 1,
        },
    )
}

/// A focus grid with every region at the same figure of merit.
pub fn uniform_focus(cols: u32, rows: u32, fom: u64) -> FocusRegions {
    FocusRegions::filled(GridSize::new(cols, rows), Region { val: fom, counted: 1 })
}

/// An AWB grid with every zone at the same mean green level.
pub fn flat_awb(cols: u32, rows: u32, g_mean: u64, counted: u32) -> AwbRegions {
    AwbRegions::filled(
        GridSize::new(cols, rows),
        Region {
            val: RgbySums {
                r_sum: 0,
                g_sum: g_mean * u64::from(counted),
                b_sum: 0,
            },
            counted,
        },
    )
}

/// Statistics with a uniform focus figure of merit and a quiet scene.
pub fn uniform_stats(cols: u32, rows: u32, fom: u64) -> Statistics {
    Statistics {
        focus_regions: uniform_focus(cols, rows, fom),
        awb_regions: flat_awb(cols, rows, 500, 128),
    }
}
