//! Output formatting module
//!
//! Renders run reports and stored statistics as tables, JSON or CSV.

mod formatter;

pub use formatter::{OutputFormat, ResultFormatter};
