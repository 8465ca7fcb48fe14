use thiserror::Error;

/// Errors raised while interpreting a tuning file.
///
/// Missing parameters are not errors (defaults apply, with a warning);
/// these cover values that cannot be made sense of at all.
#[derive(Debug, Error, Clone)]
pub enum TuningError {
    #[error("invalid tuning: {0}")]
    Invalid(&'static str),
    #[error("lens map points must have strictly increasing dioptre values")]
    NonMonotonicMap,
}
