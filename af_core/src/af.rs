//! The autofocus state machine.
//!
//! One frame at a time: [`Af::prepare`] consumes the sensor metadata
//! (PDAF), runs the control step and publishes status plus the new lens
//! setting; [`Af::process`] later fuses the ISP's contrast statistics for
//! use on the next frame. Control calls from the owning thread take
//! effect on the following `prepare`.

use af_config::Tuning;
use af_traits::{
    AfMode, AfPause, AfPauseState, AfRange, AfSpeed, AfState, AfStatus, AgcStatus, AwbRegions,
    CameraMode, FocusRegions, FrameMetadata, PdafRegions, Rect, Statistics,
};
use tracing::debug;

use crate::error::TuningError;
use crate::fusion;
use crate::params::CfgParams;
use crate::registry::Algorithm;
use crate::scan::{ScanLog, ScanRecord, ScanState};
use crate::scene::SceneMonitor;
use crate::weights::{RegionWeights, MAX_WINDOWS};

/// Registry name of this algorithm.
pub const NAME: &str = "rpi.af";

/// The control surface of an autofocus algorithm, beyond the common
/// [`Algorithm`] capability set.
pub trait AfAlgorithm: Algorithm {
    fn set_range(&mut self, range: AfRange);
    fn set_speed(&mut self, speed: AfSpeed);
    fn set_metering(&mut self, use_windows: bool);
    fn set_windows(&mut self, windows: &[Rect]);
    fn set_lens_position(&mut self, dioptres: f64) -> (bool, i32);
    fn get_lens_position(&self) -> Option<f64>;
    fn trigger_scan(&mut self);
    fn cancel_scan(&mut self);
    fn set_mode(&mut self, mode: AfMode);
    fn get_mode(&self) -> AfMode;
    fn pause(&mut self, pause: AfPause);
}

pub struct Af {
    cfg: CfgParams,
    range: AfRange,
    speed: AfSpeed,
    mode: AfMode,
    pause_flag: bool,
    stats_region: Rect,
    windows: Vec<Rect>,
    use_windows: bool,
    phase_weights: RegionWeights,
    contrast_weights: RegionWeights,
    scan_state: ScanState,
    initted: bool,
    /// Next commanded lens position, dioptres.
    ftarget: f64,
    /// Slew-limited position the lens is actually at, dioptres.
    fsmooth: f64,
    /// CDAF contrast fused in the previous frame's `process`.
    prev_contrast: f64,
    skip_count: u32,
    step_count: u32,
    drop_count: u32,
    scan: ScanLog,
    report_state: AfState,
    is_pdaf_enabled: bool,
    scene: SceneMonitor,
    /// AWB statistics retained from `process` for the scene monitor.
    awb_stats: Option<AwbRegions>,
}

impl Default for Af {
    fn default() -> Self {
        Self::new()
    }
}

impl Af {
    pub fn new() -> Self {
        Self {
            cfg: CfgParams::default(),
            range: AfRange::Normal,
            speed: AfSpeed::Normal,
            mode: AfMode::Manual,
            pause_flag: false,
            stats_region: Rect::default(),
            windows: Vec::new(),
            use_windows: false,
            // It's too early to query the PDAF and focus grid sizes, but
            // these are plausible upper bounds.
            phase_weights: RegionWeights::with_capacity(16 * 12),
            contrast_weights: RegionWeights::with_capacity(8 * 8),
            scan_state: ScanState::Idle,
            initted: false,
            ftarget: -1.0,
            fsmooth: -1.0,
            prev_contrast: 0.0,
            skip_count: 0,
            step_count: 0,
            drop_count: 0,
            scan: ScanLog::new(),
            report_state: AfState::Idle,
            is_pdaf_enabled: false,
            scene: SceneMonitor::new(),
            awb_stats: None,
        }
    }

    pub fn read(&mut self, tuning: &Tuning) -> Result<(), TuningError> {
        self.cfg.read(tuning)
    }

    pub fn initialise(&mut self) {
        self.cfg.initialise();
    }

    /// Note a new sensor mode. The PDAF and focus statistics grids are
    /// assumed to cover the visible area.
    pub fn switch_mode(&mut self, camera_mode: &CameraMode) {
        self.stats_region = Rect::new(
            camera_mode.crop_x as i32,
            camera_mode.crop_y as i32,
            (f64::from(camera_mode.width) * camera_mode.scale_x) as u32,
            (f64::from(camera_mode.height) * camera_mode.scale_y) as u32,
        );
        debug!(region = ?self.stats_region, "switch_mode");
        self.invalidate_weights();

        if self.scan_state >= ScanState::Coarse && self.scan_state < ScanState::Settle {
            // A scan was in progress; CDAF statistics may have changed, so
            // re-start it. If the application is just about to take a
            // still picture this will not help, though.
            self.start_programmed_scan();
        }
        self.skip_count = self.cfg.skip_frames;
    }

    fn invalidate_weights(&mut self) {
        self.phase_weights.invalidate();
        self.contrast_weights.invalidate();
    }

    fn get_phase(&mut self, regions: &PdafRegions) -> Option<(f64, f64)> {
        let size = regions.size();
        if size.height != self.phase_weights.rows
            || size.width != self.phase_weights.cols
            || self.phase_weights.sum == 0
        {
            debug!(width = size.width, height = size.height, "recompute phase weights");
            let windows: &[Rect] = if self.use_windows { &self.windows } else { &[] };
            self.phase_weights
                .compute(size.height, size.width, &self.stats_region, windows);
        }

        fusion::fuse_phase(
            &self.phase_weights,
            regions,
            self.cfg.conf_thresh,
            self.cfg.conf_clip,
        )
    }

    fn get_contrast(&mut self, focus_stats: &FocusRegions) -> f64 {
        let size = focus_stats.size();
        if size.height != self.contrast_weights.rows
            || size.width != self.contrast_weights.cols
            || self.contrast_weights.sum == 0
        {
            debug!(width = size.width, height = size.height, "recompute contrast weights");
            let windows: &[Rect] = if self.use_windows { &self.windows } else { &[] };
            self.contrast_weights
                .compute(size.height, size.width, &self.stats_region, windows);
        }

        fusion::fuse_contrast(&self.contrast_weights, focus_stats)
    }

    /// One closed-loop PDAF step from the fused (phase, confidence).
    fn do_pdaf(&mut self, mut phase: f64, conf: f64) {
        let speed = *self.cfg.speed(self.speed);
        let range = *self.cfg.range(self.range);

        // Apply loop gain.
        phase *= speed.pdaf_gain;

        if self.mode == AfMode::Continuous {
            // Scale down lens movement when the delta is small or the
            // confidence is low, to suppress wobble.
            phase *= conf / (conf + f64::from(self.cfg.conf_epsilon));
            if phase.abs() < speed.pdaf_squelch {
                let a = phase / speed.pdaf_squelch;
                phase *= a * a;
            }
        } else {
            // Triggered-auto mode: allow early termination when the phase
            // delta is small, and scale lens movements down towards the
            // end of the sequence to ensure a stable image.
            if self.step_count >= speed.step_frames {
                if phase.abs() < speed.pdaf_squelch {
                    self.step_count = speed.step_frames;
                }
            } else {
                phase *= f64::from(self.step_count) / f64::from(speed.step_frames.max(1));
            }
        }

        // Apply slew rate limit. Report failure if out of bounds.
        if phase < -speed.max_slew {
            phase = -speed.max_slew;
            self.report_state = if self.ftarget <= range.focus_min {
                AfState::Failed
            } else {
                AfState::Scanning
            };
        } else if phase > speed.max_slew {
            phase = speed.max_slew;
            self.report_state = if self.ftarget >= range.focus_max {
                AfState::Failed
            } else {
                AfState::Scanning
            };
        } else {
            self.report_state = AfState::Focused;
        }

        self.ftarget = self.fsmooth + phase;
    }

    /// Try to cut a scan short by extrapolating two PDAF samples to the
    /// zero-phase lens position.
    fn early_termination_by_phase(&mut self, phase: f64) -> bool {
        let Some(last) = self.scan.last().copied() else {
            return false;
        };
        if last.conf >= f64::from(self.cfg.conf_epsilon) {
            // The gradient must be finite with the expected sign, and the
            // extrapolation well-conditioned.
            if (self.ftarget - last.focus) * (phase - last.phase) > 0.0 {
                let param = phase / (phase - last.phase);
                if (-3.0..=3.5).contains(&param) {
                    self.ftarget += param * (last.focus - self.ftarget);
                    debug!(param, "early termination by phase");
                    return true;
                }
            }
        }
        false
    }

    /// One step of the programmed (coarse or fine) contrast scan.
    fn do_scan(&mut self, contrast: f64, phase: f64, conf: f64) {
        // Record the lens position and statistics for this scan step.
        self.scan.add(ScanRecord {
            focus: self.ftarget,
            contrast,
            phase,
            conf,
        });

        let speed = *self.cfg.speed(self.speed);
        let range = *self.cfg.range(self.range);

        if self.scan_state == ScanState::Coarse {
            if self.ftarget >= range.focus_max
                || contrast < speed.contrast_ratio * self.scan.max_contrast()
            {
                // Coarse scan finished (or terminated on contrast): jump
                // to just after the best contrast and scan finely back
                // through it.
                self.ftarget = self
                    .ftarget
                    .min(self.scan.find_peak(self.scan.max_index()) + 2.0 * speed.step_fine);
                self.scan_state = ScanState::Fine;
                self.scan.clear_records();
            } else {
                self.ftarget += speed.step_coarse;
            }
        } else {
            // ScanState::Fine
            if self.ftarget <= range.focus_min
                || self.scan.len() >= 5
                || contrast < speed.contrast_ratio * self.scan.max_contrast()
            {
                // Fine scan finished: quadratic peak-finding around the
                // best sample.
                self.ftarget = self.scan.find_peak(self.scan.max_index());
                self.scan_state = ScanState::Settle;
            } else {
                self.ftarget -= speed.step_fine;
            }
        }

        // Dwell between steps so the next CDAF statistics reflect the
        // position just commanded.
        self.step_count = if self.ftarget == self.fsmooth {
            0
        } else {
            speed.step_frames
        };
    }

    /// Issue the post-scan verdict and decide where to go next.
    fn finish_settle(&mut self, contrast: f64) {
        let speed = *self.cfg.speed(self.speed);
        let threshold = speed.contrast_ratio * self.scan.max_contrast();
        // Focused only if we observed a genuine peak: contrast held up at
        // the chosen position and dipped somewhere along the sweep.
        self.report_state = if contrast >= threshold && self.scan.min_contrast() <= threshold {
            AfState::Focused
        } else {
            AfState::Failed
        };

        self.scan_state = if self.mode == AfMode::Continuous
            && !self.pause_flag
            && speed.dropout_frames > 0
            && self.is_pdaf_enabled
        {
            ScanState::Pdaf
        } else {
            ScanState::Idle
        };
        self.scan.clear_records();
        self.scene.clear_baseline();
    }

    /// Per-frame control step, dispatched on the scan state.
    fn do_af(&mut self, contrast: f64, phase: f64, conf: f64, agc: Option<AgcStatus>) {
        // Skip frames at startup and after a sensor mode change.
        if self.skip_count > 0 {
            debug!("skip frame");
            self.skip_count -= 1;
            return;
        }

        if self.mode == AfMode::Continuous
            && !self.is_pdaf_enabled
            && self.scan_state == ScanState::Idle
        {
            // Without PDAF, watch the scene through the AWB statistics and
            // the AGC lock, and re-scan when it changes and settles again.
            let locked = agc.map(|a| a.locked).unwrap_or(false);
            let mean = self
                .awb_stats
                .as_ref()
                .map(SceneMonitor::zone_mean)
                .unwrap_or(0.0);
            if self.scene.check(locked, mean) {
                self.start_programmed_scan();
            }
            self.scene.observe(locked, mean);
        } else if self.scan_state == ScanState::Pdaf {
            // Use PDAF closed-loop control whenever available, in both
            // continuous mode and (for a limited number of iterations)
            // when triggered. If PDAF fails (poor contrast, noise or
            // large defocus), fall back to a CDAF-based scan; to avoid
            // nuisance scans, only after several low-confidence frames.
            let gate = if self.drop_count > 0 { 1.0 } else { 0.25 };
            if conf > gate * f64::from(self.cfg.conf_epsilon) {
                self.do_pdaf(phase, conf);
                if self.step_count > 0 {
                    self.step_count -= 1;
                } else if self.mode != AfMode::Continuous {
                    self.scan_state = ScanState::Idle;
                }
                self.drop_count = 0;
            } else {
                self.drop_count += 1;
                if self.drop_count == self.cfg.speed(self.speed).dropout_frames {
                    self.start_programmed_scan();
                }
            }
        } else if self.scan_state >= ScanState::Coarse && self.fsmooth == self.ftarget {
            // Scanning sequence: PDAF has become unavailable. Allow a
            // delay between steps for the CDAF statistics to update, and
            // a settling time at the end. A coarse or fine scan can be
            // abandoned if two PDAF samples allow direct interpolation of
            // the zero-phase lens position.
            if self.step_count > 0 {
                self.step_count -= 1;
            } else if self.scan_state == ScanState::Settle {
                self.finish_settle(contrast);
            } else if conf >= f64::from(self.cfg.conf_epsilon)
                && self.early_termination_by_phase(phase)
            {
                self.scan_state = ScanState::Settle;
                self.step_count = if self.mode == AfMode::Continuous {
                    0
                } else {
                    self.cfg.speed(self.speed).step_frames
                };
            } else {
                self.do_scan(contrast, phase, conf);
            }
        }
    }

    fn update_lens_position(&mut self) {
        if self.scan_state >= ScanState::Pdaf {
            let range = self.cfg.range(self.range);
            self.ftarget = self.ftarget.clamp(range.focus_min, range.focus_max);
        }

        if self.initted {
            // From a known lens position: apply the slew rate limit.
            let max_slew = self.cfg.speed(self.speed).max_slew;
            self.fsmooth = self
                .ftarget
                .clamp(self.fsmooth - max_slew, self.fsmooth + max_slew);
        } else {
            // From an unknown position: go straight to target, but add delay.
            self.fsmooth = self.ftarget;
            self.initted = true;
            self.skip_count = self.cfg.skip_frames;
        }
    }

    fn start_af(&mut self) {
        // Use PDAF if the tuning file allows it; else CDAF.
        let speed = *self.cfg.speed(self.speed);
        if speed.dropout_frames > 0 && (self.mode == AfMode::Continuous || speed.pdaf_frames > 0) {
            if !self.initted {
                self.ftarget = self.cfg.range(self.range).focus_default;
                self.update_lens_position();
            }
            self.step_count = if self.mode == AfMode::Continuous {
                0
            } else {
                speed.pdaf_frames
            };
            self.scan_state = ScanState::Pdaf;
            self.scan.clear_records();
            self.drop_count = 0;
            self.report_state = AfState::Scanning;
        } else {
            self.start_programmed_scan();
        }
    }

    fn start_programmed_scan(&mut self) {
        self.ftarget = self.cfg.range(self.range).focus_min;
        self.update_lens_position();
        self.scan_state = ScanState::Coarse;
        self.scan.reset();
        self.step_count = self.cfg.speed(self.speed).step_frames;
        self.report_state = AfState::Scanning;
        self.scene.reset();
    }

    fn go_idle(&mut self) {
        self.scan_state = ScanState::Idle;
        self.report_state = AfState::Idle;
        self.scan.clear_records();
    }

    /// Per-frame entry point at frame-prepare time.
    ///
    /// PDAF data are available here, but CDAF statistics not until
    /// [`Af::process`]; we gamble on PDAF being usable and issue the lens
    /// movement immediately. Conversely, scans insert an extra frame's
    /// delay between steps so that the CDAF statistics retrieved from the
    /// previous `process` match the position being judged.
    pub fn prepare(&mut self, metadata: &mut dyn FrameMetadata) {
        // Initialise for a triggered scan or the start of continuous mode.
        if self.scan_state == ScanState::Trigger {
            self.start_af();
        }

        if self.initted {
            let mut phase = 0.0;
            let mut conf = 0.0;
            let old_ft = self.ftarget;
            let old_fs = self.fsmooth;
            let old_ss = self.scan_state;
            let old_st = self.step_count;

            if let Some(regions) = metadata.pdaf_regions() {
                if let Some((p, c)) = self.get_phase(regions) {
                    phase = p;
                    conf = c;
                }
                self.is_pdaf_enabled = true;
            }
            let agc = metadata.agc_status();
            self.do_af(self.prev_contrast, phase, conf, agc);
            self.update_lens_position();
            debug!(
                "{:?} sst {:?}->{:?} stp {}->{} ft {:.2}->{:.2} fs {:.2}->{:.2} cont={} phase={} conf={}",
                self.report_state,
                old_ss,
                self.scan_state,
                old_st,
                self.step_count,
                old_ft,
                self.ftarget,
                old_fs,
                self.fsmooth,
                self.prev_contrast as i64,
                phase as i64,
                conf as i64
            );
        }

        // Report status and produce the new lens setting.
        let pause_state = if self.pause_flag {
            if self.scan_state == ScanState::Idle {
                AfPauseState::Paused
            } else {
                AfPauseState::Pausing
            }
        } else {
            AfPauseState::Running
        };

        let state = if self.mode == AfMode::Auto && self.scan_state != ScanState::Idle {
            AfState::Scanning
        } else {
            self.report_state
        };

        let lens_setting = if self.initted {
            Some(self.cfg.map.eval(self.fsmooth))
        } else {
            None
        };

        metadata.set_af_status(AfStatus {
            state,
            pause_state,
            lens_setting,
        });
    }

    /// Per-frame entry point after ISP statistics: fuse the CDAF contrast
    /// for the next frame's `prepare` and retain the AWB regions for the
    /// scene monitor.
    pub fn process(&mut self, stats: &Statistics) {
        self.prev_contrast = self.get_contrast(&stats.focus_regions);
        self.awb_stats = Some(stats.awb_regions.clone());
    }

    // Controls

    pub fn set_range(&mut self, range: AfRange) {
        debug!(?range, "set_range");
        self.range = range;
    }

    pub fn set_speed(&mut self, speed: AfSpeed) {
        debug!(?speed, "set_speed");
        if self.scan_state == ScanState::Pdaf
            && self.cfg.speed(speed).pdaf_frames > self.cfg.speed(self.speed).pdaf_frames
        {
            // Extend an in-flight PDAF sequence to honour the new budget.
            self.step_count +=
                self.cfg.speed(speed).pdaf_frames - self.cfg.speed(self.speed).pdaf_frames;
        }
        self.speed = speed;
    }

    pub fn set_metering(&mut self, use_windows: bool) {
        if self.use_windows != use_windows {
            self.use_windows = use_windows;
            self.invalidate_weights();
        }
    }

    pub fn set_windows(&mut self, windows: &[Rect]) {
        self.windows.clear();
        for w in windows.iter().take(MAX_WINDOWS) {
            debug!(window = ?w, "set_windows");
            self.windows.push(*w);
        }

        if self.use_windows {
            self.invalidate_weights();
        }
    }

    /// Position the lens directly (honoured in Manual mode only). Returns
    /// whether the lens needs to move, and the hardware code for the
    /// (possibly clamped) position.
    pub fn set_lens_position(&mut self, dioptres: f64) -> (bool, i32) {
        let mut changed = false;

        if self.mode == AfMode::Manual {
            debug!(dioptres, "set_lens_position");
            self.ftarget = self.cfg.map.domain().clip(dioptres);
            changed = !(self.initted && self.fsmooth == self.ftarget);
            self.update_lens_position();
        }

        (changed, self.cfg.map.eval(self.fsmooth))
    }

    /// The current (smoothed) lens position, once known.
    pub fn get_lens_position(&self) -> Option<f64> {
        self.initted.then_some(self.fsmooth)
    }

    /// Where the algorithm is in its scan lifecycle.
    pub fn scan_state(&self) -> ScanState {
        self.scan_state
    }

    pub fn trigger_scan(&mut self) {
        debug!("trigger_scan");
        if self.mode == AfMode::Auto && self.scan_state == ScanState::Idle {
            self.scan_state = ScanState::Trigger;
        }
    }

    pub fn cancel_scan(&mut self) {
        debug!("cancel_scan");
        if self.mode == AfMode::Auto {
            self.go_idle();
        }
    }

    pub fn set_mode(&mut self, mode: AfMode) {
        debug!(?mode, "set_mode");
        if self.mode != mode {
            self.mode = mode;
            self.pause_flag = false;
            if mode == AfMode::Continuous {
                self.scan_state = ScanState::Trigger;
            } else if mode != AfMode::Auto || self.scan_state < ScanState::Coarse {
                self.go_idle();
            }
        }
    }

    pub fn get_mode(&self) -> AfMode {
        self.mode
    }

    /// Pause or resume continuous operation. `Deferred` lets a scan in
    /// flight run to completion before holding; `Immediate` abandons it.
    pub fn pause(&mut self, pause: AfPause) {
        debug!(?pause, "pause");
        if self.mode == AfMode::Continuous {
            if pause == AfPause::Resume && self.pause_flag {
                self.pause_flag = false;
                if self.scan_state < ScanState::Coarse {
                    self.scan_state = ScanState::Trigger;
                }
            } else if pause != AfPause::Resume && !self.pause_flag {
                self.pause_flag = true;
                if pause == AfPause::Immediate || self.scan_state < ScanState::Coarse {
                    self.go_idle();
                }
            }
        }
    }
}

impl Algorithm for Af {
    fn name(&self) -> &'static str {
        NAME
    }

    fn read(&mut self, tuning: &Tuning) -> Result<(), TuningError> {
        Af::read(self, tuning)
    }

    fn initialise(&mut self) {
        Af::initialise(self)
    }

    fn switch_mode(&mut self, camera_mode: &CameraMode) {
        Af::switch_mode(self, camera_mode)
    }

    fn prepare(&mut self, metadata: &mut dyn FrameMetadata) {
        Af::prepare(self, metadata)
    }

    fn process(&mut self, stats: &Statistics) {
        Af::process(self, stats)
    }
}

impl AfAlgorithm for Af {
    fn set_range(&mut self, range: AfRange) {
        Af::set_range(self, range)
    }

    fn set_speed(&mut self, speed: AfSpeed) {
        Af::set_speed(self, speed)
    }

    fn set_metering(&mut self, use_windows: bool) {
        Af::set_metering(self, use_windows)
    }

    fn set_windows(&mut self, windows: &[Rect]) {
        Af::set_windows(self, windows)
    }

    fn set_lens_position(&mut self, dioptres: f64) -> (bool, i32) {
        Af::set_lens_position(self, dioptres)
    }

    fn get_lens_position(&self) -> Option<f64> {
        Af::get_lens_position(self)
    }

    fn trigger_scan(&mut self) {
        Af::trigger_scan(self)
    }

    fn cancel_scan(&mut self) {
        Af::cancel_scan(self)
    }

    fn set_mode(&mut self, mode: AfMode) {
        Af::set_mode(self, mode)
    }

    fn get_mode(&self) -> AfMode {
        Af::get_mode(self)
    }

    fn pause(&mut self, pause: AfPause) {
        Af::pause(self, pause)
    }
}
