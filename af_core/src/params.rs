//! Tuning parameters and their defaults.
//!
//! Defaults assume a V3-class camera module with the standard lens; all may
//! be overridden in the tuning file. Focus values are in dioptres (1/m).
//! Frame counts are relative to the update rate, since much of the loop
//! delay is in the sensor and ISP rather than the lens mechanism.

use af_config::{RangeTable, SpeedTable, Tuning};
use af_traits::status::{NUM_AF_RANGES, NUM_AF_SPEEDS};
use af_traits::{AfRange, AfSpeed};
use tracing::warn;

use crate::error::TuningError;
use crate::lens::LensMap;

fn read_param<T: Copy>(dest: &mut T, value: Option<T>, name: &str) {
    match value {
        Some(v) => *dest = v,
        None => warn!("missing parameter \"{name}\""),
    }
}

/// Focus bounds for one [`AfRange`], in dioptres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeParams {
    pub focus_min: f64,
    pub focus_max: f64,
    /// Position for the start of a scan, and for `Trigger` from an unknown
    /// lens position.
    pub focus_default: f64,
}

impl Default for RangeParams {
    fn default() -> Self {
        Self {
            focus_min: 0.0,
            focus_max: 12.0,
            focus_default: 1.0,
        }
    }
}

impl RangeParams {
    fn read(&mut self, t: &RangeTable) {
        read_param(&mut self.focus_min, t.min, "min");
        read_param(&mut self.focus_max, t.max, "max");
        read_param(&mut self.focus_default, t.default, "default");
    }
}

/// Loop tuning for one [`AfSpeed`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedParams {
    /// Coarse-scan step, dioptres per step.
    pub step_coarse: f64,
    /// Fine-scan step, dioptres per step.
    pub step_fine: f64,
    /// Contrast ratio (0..1) below the scan maximum that terminates a scan
    /// phase and qualifies the final peak.
    pub contrast_ratio: f64,
    /// PDAF loop gain; negative, converts phase units to dioptres.
    pub pdaf_gain: f64,
    /// Dead-band-like attenuation of phase steps smaller than this, in
    /// dioptres, to suppress hunting.
    pub pdaf_squelch: f64,
    /// Maximum lens movement per frame, dioptres.
    pub max_slew: f64,
    /// PDAF frame budget for a triggered (Auto) sequence.
    pub pdaf_frames: u32,
    /// Consecutive low-confidence PDAF frames before falling back to a
    /// contrast scan. Zero disables PDAF entirely.
    pub dropout_frames: u32,
    /// Dwell frames between scan steps, so CDAF statistics reflect the
    /// position just applied.
    pub step_frames: u32,
}

impl Default for SpeedParams {
    fn default() -> Self {
        Self {
            step_coarse: 1.0,
            step_fine: 0.25,
            contrast_ratio: 0.75,
            pdaf_gain: -0.02,
            pdaf_squelch: 0.125,
            max_slew: 2.0,
            pdaf_frames: 20,
            dropout_frames: 6,
            step_frames: 4,
        }
    }
}

impl SpeedParams {
    fn read(&mut self, t: &SpeedTable) {
        read_param(&mut self.step_coarse, t.step_coarse, "step_coarse");
        read_param(&mut self.step_fine, t.step_fine, "step_fine");
        read_param(&mut self.contrast_ratio, t.contrast_ratio, "contrast_ratio");
        read_param(&mut self.pdaf_gain, t.pdaf_gain, "pdaf_gain");
        read_param(&mut self.pdaf_squelch, t.pdaf_squelch, "pdaf_squelch");
        read_param(&mut self.max_slew, t.max_slew, "max_slew");
        read_param(&mut self.pdaf_frames, t.pdaf_frames, "pdaf_frames");
        read_param(&mut self.dropout_frames, t.dropout_frames, "dropout_frames");
        read_param(&mut self.step_frames, t.step_frames, "step_frames");
    }
}

/// All tuning for the algorithm, immutable after load.
#[derive(Debug, Clone)]
pub struct CfgParams {
    pub ranges: [RangeParams; NUM_AF_RANGES],
    pub speeds: [SpeedParams; NUM_AF_SPEEDS],
    /// Fused-confidence scale for squelching and dropout detection.
    pub conf_epsilon: u32,
    /// Per-cell confidence below which PDAF samples are ignored.
    pub conf_thresh: u32,
    /// Per-cell confidence ceiling.
    pub conf_clip: u32,
    /// Frames to skip at startup and after a sensor mode change.
    pub skip_frames: u32,
    pub map: LensMap,
}

impl Default for CfgParams {
    fn default() -> Self {
        Self {
            ranges: [RangeParams::default(); NUM_AF_RANGES],
            speeds: [SpeedParams::default(); NUM_AF_SPEEDS],
            conf_epsilon: 8,
            conf_thresh: 16,
            conf_clip: 512,
            skip_frames: 5,
            map: LensMap::new(),
        }
    }
}

impl CfgParams {
    pub fn range(&self, r: AfRange) -> &RangeParams {
        &self.ranges[r as usize]
    }

    pub fn speed(&self, s: AfSpeed) -> &SpeedParams {
        &self.speeds[s as usize]
    }

    /// Interpret a parsed tuning file. Missing entries keep their defaults
    /// (with a warning); values that cannot be made sense of are errors.
    pub fn read(&mut self, tuning: &Tuning) -> Result<(), TuningError> {
        if let Some(rr) = &tuning.ranges {
            match &rr.normal {
                Some(t) => self.ranges[AfRange::Normal as usize].read(t),
                None => warn!("missing range \"normal\""),
            }

            self.ranges[AfRange::Macro as usize] = self.ranges[AfRange::Normal as usize];
            if let Some(t) = &rr.macro_ {
                self.ranges[AfRange::Macro as usize].read(t);
            }

            // Full takes the union bounds of Normal and Macro unless the
            // file says otherwise.
            let normal = self.ranges[AfRange::Normal as usize];
            let macro_ = self.ranges[AfRange::Macro as usize];
            self.ranges[AfRange::Full as usize] = RangeParams {
                focus_min: normal.focus_min.min(macro_.focus_min),
                focus_max: normal.focus_max.max(macro_.focus_max),
                focus_default: normal.focus_default,
            };
            if let Some(t) = &rr.full {
                self.ranges[AfRange::Full as usize].read(t);
            }
        } else {
            warn!("no ranges defined");
        }

        if let Some(ss) = &tuning.speeds {
            match &ss.normal {
                Some(t) => self.speeds[AfSpeed::Normal as usize].read(t),
                None => warn!("missing speed \"normal\""),
            }

            self.speeds[AfSpeed::Fast as usize] = self.speeds[AfSpeed::Normal as usize];
            if let Some(t) = &ss.fast {
                self.speeds[AfSpeed::Fast as usize].read(t);
            }
        } else {
            warn!("no speeds defined");
        }

        read_param(&mut self.conf_epsilon, tuning.conf_epsilon, "conf_epsilon");
        read_param(&mut self.conf_thresh, tuning.conf_thresh, "conf_thresh");
        read_param(&mut self.conf_clip, tuning.conf_clip, "conf_clip");
        read_param(&mut self.skip_frames, tuning.skip_frames, "skip_frames");

        if let Some(points) = &tuning.map {
            self.map = LensMap::from_points(points.iter().map(|p| (p[0], p[1])));
        } else {
            warn!("no map defined");
        }

        self.validate()
    }

    /// Install the default dioptre -> hardware map if the file provided
    /// none.
    pub fn initialise(&mut self) {
        if self.map.is_empty() {
            const DEFAULT_MAP_X0: f64 = 0.0;
            const DEFAULT_MAP_Y0: f64 = 445.0;
            const DEFAULT_MAP_X1: f64 = 15.0;
            const DEFAULT_MAP_Y1: f64 = 925.0;

            self.map.append(DEFAULT_MAP_X0, DEFAULT_MAP_Y0);
            self.map.append(DEFAULT_MAP_X1, DEFAULT_MAP_Y1);
        }
    }

    fn validate(&self) -> Result<(), TuningError> {
        for r in &self.ranges {
            if !(r.focus_min <= r.focus_default && r.focus_default <= r.focus_max) {
                return Err(TuningError::Invalid(
                    "focus range must satisfy min <= default <= max",
                ));
            }
        }
        for s in &self.speeds {
            if s.step_coarse <= 0.0 || s.step_fine <= 0.0 {
                return Err(TuningError::Invalid("scan steps must be > 0"));
            }
            if s.max_slew <= 0.0 {
                return Err(TuningError::Invalid("max_slew must be > 0"));
            }
            if !(0.0..=1.0).contains(&s.contrast_ratio) {
                return Err(TuningError::Invalid("contrast_ratio must be within 0..1"));
            }
        }
        if !self.map.is_empty() && !self.map.is_monotonic() {
            return Err(TuningError::NonMonotonicMap);
        }
        Ok(())
    }
}
