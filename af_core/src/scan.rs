//! Programmed-scan bookkeeping and contrast-peak refinement.

use tracing::debug;

/// Where the algorithm is in its scan lifecycle. Ordering matters: states
/// from `Pdaf` onwards actively drive the lens, and `Coarse`..`Settle`
/// form the programmed-scan sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScanState {
    Idle,
    /// A scan has been requested and starts on the next frame.
    Trigger,
    /// Closed-loop phase control.
    Pdaf,
    /// Coarse sweep up through the focus range.
    Coarse,
    /// Fine sweep back through the contrast peak.
    Fine,
    /// Dwell at the chosen position before the final verdict.
    Settle,
}

/// One programmed-scan step: the commanded focus and the statistics
/// observed there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanRecord {
    pub focus: f64,
    pub contrast: f64,
    pub phase: f64,
    pub conf: f64,
}

/// Samples collected during a programmed scan, with running contrast
/// bookkeeping.
///
/// `clear_records` drops the samples while keeping the minimum seen, so a
/// fine scan can still prove the whole sweep crossed a genuine peak; the
/// maximum restarts with the next sample added.
#[derive(Debug, Clone)]
pub struct ScanLog {
    records: Vec<ScanRecord>,
    max_contrast: f64,
    min_contrast: f64,
    max_index: usize,
}

impl Default for ScanLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanLog {
    pub fn new() -> Self {
        Self {
            // Enough for any coarse sweep; avoids reallocation mid-scan.
            records: Vec::with_capacity(32),
            max_contrast: 0.0,
            min_contrast: 1.0e9,
            max_index: 0,
        }
    }

    /// Start a fresh scan.
    pub fn reset(&mut self) {
        self.records.clear();
        self.max_contrast = 0.0;
        self.min_contrast = 1.0e9;
        self.max_index = 0;
    }

    /// Drop the samples but keep the minimum-contrast bookkeeping.
    pub fn clear_records(&mut self) {
        self.records.clear();
    }

    pub fn add(&mut self, record: ScanRecord) {
        if self.records.is_empty() || record.contrast > self.max_contrast {
            self.max_contrast = record.contrast;
            self.max_index = self.records.len();
        }
        if record.contrast < self.min_contrast {
            self.min_contrast = record.contrast;
        }
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&ScanRecord> {
        self.records.last()
    }

    pub fn max_contrast(&self) -> f64 {
        self.max_contrast
    }

    pub fn min_contrast(&self) -> f64 {
        self.min_contrast
    }

    pub fn max_index(&self) -> usize {
        self.max_index
    }

    /// Best-focus estimate around sample `i`.
    ///
    /// For an interior sample whose contrast drop to one neighbour is
    /// smaller (and non-negative) than to the other, fit a quadratic
    /// through the three samples and shift the focus towards the
    /// smaller-drop side; otherwise the sample's own focus stands.
    pub fn find_peak(&self, i: usize) -> f64 {
        let mut f = self.records[i].focus;

        if i > 0 && i + 1 < self.records.len() {
            let drop_lo = self.records[i].contrast - self.records[i - 1].contrast;
            let drop_hi = self.records[i].contrast - self.records[i + 1].contrast;
            if 0.0 <= drop_lo && drop_lo < drop_hi {
                let ratio = drop_lo / drop_hi;
                let param = 0.3125 * (1.0 - ratio) * (1.6 - ratio);
                f += param * (self.records[i - 1].focus - f);
            } else if 0.0 <= drop_hi && drop_hi < drop_lo {
                let ratio = drop_hi / drop_lo;
                let param = 0.3125 * (1.0 - ratio) * (1.6 - ratio);
                f += param * (self.records[i + 1].focus - f);
            }
        }

        debug!(focus = f, "find_peak");
        f
    }
}
