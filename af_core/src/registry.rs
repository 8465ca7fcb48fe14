//! Name-keyed factory table for control algorithms.
//!
//! The registry is the sole means by which the owning pipeline
//! instantiates algorithms: it asks for them by the names listed in its
//! tuning data, and calls the resulting objects only through the
//! [`Algorithm`] capability set.

use std::collections::HashMap;

use af_config::Tuning;
use af_traits::{CameraMode, FrameMetadata, Statistics};
use tracing::warn;

use crate::af::Af;
use crate::error::TuningError;

/// The capability set every registered control algorithm provides.
pub trait Algorithm {
    fn name(&self) -> &'static str;

    /// Interpret this algorithm's tuning-file section.
    fn read(&mut self, tuning: &Tuning) -> Result<(), TuningError>;

    /// Complete configuration once all tuning has been read.
    fn initialise(&mut self);

    /// Note a sensor mode change.
    fn switch_mode(&mut self, camera_mode: &CameraMode);

    /// Frame-prepare stage: consume sensor metadata, publish status.
    fn prepare(&mut self, metadata: &mut dyn FrameMetadata);

    /// Statistics stage: consume ISP statistics.
    fn process(&mut self, stats: &Statistics);
}

pub type AlgorithmFactory = fn() -> Box<dyn Algorithm>;

/// Registry of algorithm factories, keyed by name.
#[derive(Default)]
pub struct Registry {
    factories: HashMap<&'static str, AlgorithmFactory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in algorithm registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(crate::af::NAME, || Box::new(Af::new()));
        registry
    }

    pub fn register(&mut self, name: &'static str, factory: AlgorithmFactory) {
        if self.factories.insert(name, factory).is_some() {
            warn!(name, "algorithm re-registered");
        }
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn Algorithm>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }
}
