//! Reporting utilities.
//!
//! Formatting lives here so the fitting code stays free of output concerns.

pub mod format;

pub use format::*;
