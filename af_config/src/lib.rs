//! Serde model of the autofocus tuning file.
//!
//! Every leaf is optional: the core substitutes its defaults (with a
//! warning) for anything the file omits, so a sparse or even empty file is
//! valid. This crate only parses; interpretation and validation live in
//! `af_core`.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read tuning file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse tuning file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// One focus range table (`[ranges.normal]` etc.), all values in dioptres.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeTable {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub default: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ranges {
    pub normal: Option<RangeTable>,
    #[serde(rename = "macro")]
    pub macro_: Option<RangeTable>,
    pub full: Option<RangeTable>,
}

/// One speed table (`[speeds.normal]` etc.).
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpeedTable {
    pub step_coarse: Option<f64>,
    pub step_fine: Option<f64>,
    pub contrast_ratio: Option<f64>,
    pub pdaf_gain: Option<f64>,
    pub pdaf_squelch: Option<f64>,
    pub max_slew: Option<f64>,
    pub pdaf_frames: Option<u32>,
    pub dropout_frames: Option<u32>,
    pub step_frames: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Speeds {
    pub normal: Option<SpeedTable>,
    pub fast: Option<SpeedTable>,
}

/// The whole tuning file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tuning {
    pub ranges: Option<Ranges>,
    pub speeds: Option<Speeds>,
    pub conf_epsilon: Option<u32>,
    pub conf_thresh: Option<u32>,
    pub conf_clip: Option<u32>,
    pub skip_frames: Option<u32>,
    /// Piecewise-linear dioptre -> hardware-code anchor points.
    pub map: Option<Vec<[f64; 2]>>,
}

pub fn load_toml(s: &str) -> Result<Tuning, ConfigError> {
    Ok(toml::from_str::<Tuning>(s)?)
}

pub fn load_file(path: &Path) -> Result<Tuning, ConfigError> {
    load_toml(&std::fs::read_to_string(path)?)
}
