//! Judging pipeline and problem lookup for codejudge.
//!
//! Leaf components first: [`store`] and [`cache`] back the read-through
//! [`gateway`]; [`workspace`], [`compiler`], [`runner`] and [`evaluator`]
//! make up the judging pipeline that [`executor`] drives end to end.

pub mod cache;
pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod gateway;
pub mod metrics;
pub mod runner;
pub mod store;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use error::{JudgeError, Result};
