//! Scene-change detection for continuous mode on sensors without PDAF.
//!
//! Watches the mean green level of the AWB statistics while AGC is locked:
//! a large jump arms a re-scan, which fires once the level settles again
//! (or immediately when AGC first locks). The thresholds below are fixed
//! properties of the statistics pipeline, not tuning-file entries.

use af_traits::AwbRegions;
use tracing::debug;

/// Zones with fewer counted pixels than this are ignored.
const MIN_ZONE_PIXELS: u32 = 16;
/// Zones with a mean green level below this are ignored.
const MIN_ZONE_GREEN: f64 = 32.0;
/// Green-mean jump that arms a re-scan.
const SCENE_CHANGE_THRESHOLD: f64 = 1000.0;
/// Green-mean stability below which an armed re-scan fires.
const SCENE_STABLE_THRESHOLD: f64 = 400.0;

#[derive(Debug, Clone, Default)]
pub struct SceneMonitor {
    last_mean: f64,
    last_agc_locked: bool,
    trigger_when_stable: bool,
}

impl SceneMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mean of the per-zone green averages, over zones with enough pixels
    /// and signal. Returns 0.0 when no zone qualifies, which is also the
    /// "no baseline yet" value.
    pub fn zone_mean(stats: &AwbRegions) -> f64 {
        let mut sum = 0.0;
        let mut zones = 0u32;
        for region in stats.iter() {
            if region.counted >= MIN_ZONE_PIXELS {
                let zone = region.val.g_sum as f64 / f64::from(region.counted);
                if zone >= MIN_ZONE_GREEN {
                    sum += zone;
                    zones += 1;
                }
            }
        }
        if zones > 0 {
            sum / f64::from(zones)
        } else {
            0.0
        }
    }

    /// Decide whether a re-scan should start now, arming on large jumps.
    ///
    /// Persisting the observation is separate ([`Self::observe`]) and must
    /// happen afterwards, so that a scan start in between (which resets
    /// this monitor) still leaves the current frame as the new baseline.
    pub fn check(&mut self, agc_locked: bool, mean: f64) -> bool {
        if !agc_locked || self.last_mean == 0.0 {
            return false;
        }
        let diff = (mean - self.last_mean).abs();
        if diff > SCENE_CHANGE_THRESHOLD {
            debug!(diff, "scene changed");
            self.trigger_when_stable = true;
        }
        if self.trigger_when_stable && diff < SCENE_STABLE_THRESHOLD {
            true
        } else {
            // AGC has just locked.
            !self.last_agc_locked
        }
    }

    /// Persist the latest observation as the comparison baseline.
    pub fn observe(&mut self, agc_locked: bool, mean: f64) {
        self.last_agc_locked = agc_locked;
        self.last_mean = mean;
    }

    /// Forget everything; called when a scan starts.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Drop the brightness baseline (scan just finished) so the next
    /// comparison starts from fresh data.
    pub fn clear_baseline(&mut self) {
        self.last_mean = 0.0;
    }
}
