//! Failure strategies for checks.

use crate::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a check does when it finds a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Abort the chain with [`GuardError::ValidationFailure`].
    Fail,
    /// Record the violation with the observability layer and continue.
    Warn,
}

impl Strategy {
    /// Returns the literal used to spell this strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Fail => "fail",
            Strategy::Warn => "warn",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fail" => Ok(Strategy::Fail),
            "warn" => Ok(Strategy::Warn),
            other => Err(GuardError::invalid_argument(format!(
                "strategy must be either 'fail' or 'warn', got '{other}'"
            ))),
        }
    }
}

/// Anything a check accepts as its strategy argument.
///
/// Checks convert their argument before touching the data, so an unknown
/// strategy string is rejected without evaluating anything.
pub trait IntoStrategy {
    fn into_strategy(self) -> Result<Strategy>;
}

impl IntoStrategy for Strategy {
    fn into_strategy(self) -> Result<Strategy> {
        Ok(self)
    }
}

impl IntoStrategy for &str {
    fn into_strategy(self) -> Result<Strategy> {
        self.parse()
    }
}

impl IntoStrategy for String {
    fn into_strategy(self) -> Result<Strategy> {
        self.parse()
    }
}

impl IntoStrategy for &String {
    fn into_strategy(self) -> Result<Strategy> {
        self.parse()
    }
}
