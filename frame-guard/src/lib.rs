//! # frame-guard - chainable data-quality checks for tabular data
//!
//! frame-guard adds a small vocabulary of data-quality checks to any
//! tabular dataset. Checks chain fluently, run in the order they are
//! written, and either abort the chain or just warn, depending on the
//! strategy each one is given.
//!
//! ## Quick Start
//!
//! ```rust
//! use frame_guard::prelude::*;
//! use datafusion::prelude::*;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let ctx = SessionContext::new();
//! ctx.sql("CREATE TABLE users (id BIGINT, email VARCHAR) AS VALUES (1, 'a@x.io'), (2, 'b@x.io')")
//!     .await?
//!     .collect()
//!     .await?;
//! let users = ctx.table("users").await?;
//!
//! users
//!     .validator()
//!     .check_count(2, Strategy::Fail)
//!     .await?
//!     .check_primary_key(Strategy::Fail, ["id"])
//!     .await?
//!     .check_regex_col("email", r"^[^@]+@[^@]+$", Strategy::Warn)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Checks
//!
//! | Check | Violation |
//! |---|---|
//! | `check_primary_key` | some key tuple occurs in more than one row |
//! | `check_regex_col` | some value does not match the pattern |
//! | `check_equality_col` | some row has differing values in two columns |
//! | `check_count` | the row count differs from the expected count |
//!
//! Under [`validator::Strategy::Fail`] a violation returns
//! [`error::GuardError::ValidationFailure`]. Under
//! [`validator::Strategy::Warn`] it is logged through `tracing` and passed to
//! an optional [`validator::WarningSink`], and the chain continues.
//!
//! ## Architecture
//!
//! - **`dataset`**: the [`dataset::Dataset`] contract plus the DataFusion
//!   and in-memory adapters
//! - **`validator`**: [`validator::Validator`] and the `validator()` accessor
//! - **`session`**: DataFusion session configuration and table registry
//! - **`compute`**: named input/output wiring around a user transform
//! - **`logging`**: log configuration and subscriber setup

pub mod compute;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod session;
pub mod validator;
