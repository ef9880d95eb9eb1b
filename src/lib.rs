//! `projfit` library crate.
//!
//! Estimates unknown parameters of a target projection from correspondence
//! points by nonlinear least squares.
//!
//! The binary (`projfit`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the fitting engine ([`fit::find_params`]) is reusable on its own

pub mod app;
pub mod cli;
pub mod definition;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod params;
pub mod report;
pub mod transform;
