//! Input/output helpers.
//!
//! - point file parsing, including DMS coordinates (`points`)
//! - residual CSV export (`export`)
//! - solution JSON export (`json`)

pub mod export;
pub mod json;
pub mod points;

pub use export::*;
pub use json::*;
pub use points::*;
