//! Prelude for commonly used types and traits in frame-guard.

pub use crate::dataset::{Column, Dataset, Grouping, MemoryDataset, Value};
pub use crate::error::{ErrorContext, GuardError, Result};
pub use crate::logging::LogConfig;
pub use crate::validator::{Strategy, Validator, ValidatorExt};
