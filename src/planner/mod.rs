//! Run planning
//!
//! Decides what runs, in which order and how wide, from the statistics store.

mod cache_gate;
mod concurrency;
mod priority;

pub use cache_gate::{CacheGate, GateDecision};
pub use concurrency::{ConcurrencyAdvisor, SystemResources};
pub use priority::{PriorityFactors, PriorityScorer, DEFAULT_PRIORITY};

use std::cmp::Ordering;

use crate::models::SpecDescriptor;

/// Launch order: priority descending, then directory, then full path
pub fn compare_specs(a: &SpecDescriptor, b: &SpecDescriptor) -> Ordering {
    b.priority
        .total_cmp(&a.priority)
        .then_with(|| a.directory().cmp(b.directory()))
        .then_with(|| a.path.cmp(&b.path))
}

pub fn order_specs(specs: &mut [SpecDescriptor]) {
    specs.sort_by(compare_specs);
}
