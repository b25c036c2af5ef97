use thiserror::Error;

use crate::input::Feature;

/// Rejections raised at the input boundary, before the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("field `{field}` must be a finite number")]
    NonFinite { field: Feature },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("tier level {0} is outside 1..=5")]
pub struct InvalidTier(pub u8);
