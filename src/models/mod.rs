//! Data models for spec orchestration
//!
//! This module contains the data structures shared by the store, planner and executor.

mod spec;
mod test_result;

pub use spec::SpecDescriptor;
pub use test_result::{PerformanceSample, TestResult, TestStatus};
