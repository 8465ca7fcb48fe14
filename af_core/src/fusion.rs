//! Reduction of PDAF and CDAF region grids to per-frame scalars.
//!
//! Accumulators widen to 64 bits before the final divide; narrowing
//! earlier would overflow the weighted phase sum on high-resolution PDAF
//! grids.

use af_traits::{FocusRegions, PdafRegions};

use crate::weights::RegionWeights;

/// Fuse a PDAF grid into a single (phase, confidence) pair.
///
/// Cells below `conf_thresh` are ignored. Confident cells are clipped to
/// `conf_clip`, then shrunk twice by `conf_thresh / 4`: once before the
/// confidence sum (suppressing marginal cells) and again before the phase
/// sum (biasing strong cells towards zero phase so the weighted mean
/// converges smoothly).
///
/// Returns `None` unless `0 < weight sum <= confidence sum`, i.e. the
/// average cell cleared the threshold with margin.
pub fn fuse_phase(
    weights: &RegionWeights,
    regions: &PdafRegions,
    conf_thresh: u32,
    conf_clip: u32,
) -> Option<(f64, f64)> {
    let mut sum_wc: u64 = 0;
    let mut sum_wcp: i64 = 0;

    for (w, region) in weights.w.iter().zip(regions.iter()) {
        let w = u64::from(*w);
        if w == 0 {
            continue;
        }
        let c = region.val.conf;
        if c < conf_thresh {
            continue;
        }
        let c = c.min(conf_clip);
        let c = c.saturating_sub(conf_thresh / 4);
        sum_wc += w * u64::from(c);
        let c = c.saturating_sub(conf_thresh / 4);
        sum_wcp += (w as i64) * i64::from(c) * i64::from(region.val.phase);
    }

    if 0 < weights.sum && u64::from(weights.sum) <= sum_wc {
        let phase = sum_wcp as f64 / sum_wc as f64;
        let conf = sum_wc as f64 / f64::from(weights.sum);
        Some((phase, conf))
    } else {
        None
    }
}

/// Weighted mean of the per-region focus figures of merit. Returns 0 when
/// the weight grid is empty.
pub fn fuse_contrast(weights: &RegionWeights, regions: &FocusRegions) -> f64 {
    let mut sum_wc: u64 = 0;
    for (w, region) in weights.w.iter().zip(regions.iter()) {
        sum_wc += u64::from(*w) * region.val;
    }

    if weights.sum > 0 {
        sum_wc as f64 / f64::from(weights.sum)
    } else {
        0.0
    }
}
