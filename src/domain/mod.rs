//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - correspondence points and coordinate tuples (`Point`, `Coord`)
//! - the known/unknown target definition (`TargetSpec`, `ParamValue`, `ModifierSpec`)
//! - fit outputs and run configuration (`FitSolution`, `FitConfig`)

pub mod types;

pub use types::*;
