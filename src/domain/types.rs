//! Shared domain types.
//!
//! These types carry a single fit from input to output:
//!
//! - correspondence points (`Point`, `Coord`)
//! - the partially-known target definition (`TargetSpec`, `ParamValue`, `ModifierSpec`)
//! - fit outputs (`FitSolution`, `Modifiers`)
//! - run configuration derived from CLI flags (`FitConfig`)

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::FitError;
use crate::math::SolverReport;

/// A coordinate tuple in either 2 or 3 dimensions.
///
/// Also used for residual tuples, which follow the same arity rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coord {
    Xy([f64; 2]),
    Xyz([f64; 3]),
}

impl Coord {
    pub fn xy(x: f64, y: f64) -> Self {
        Coord::Xy([x, y])
    }

    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Coord::Xyz([x, y, z])
    }

    /// Build a coordinate from a slice of 2 or 3 components.
    pub fn from_slice(values: &[f64]) -> Result<Self, FitError> {
        match *values {
            [x, y] => Ok(Coord::xy(x, y)),
            [x, y, z] => Ok(Coord::xyz(x, y, z)),
            _ => Err(FitError::ArityMismatch { found: values.len() }),
        }
    }

    pub fn dim(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_3d(&self) -> bool {
        matches!(self, Coord::Xyz(_))
    }

    pub fn x(&self) -> f64 {
        self.as_slice()[0]
    }

    pub fn y(&self) -> f64 {
        self.as_slice()[1]
    }

    pub fn z(&self) -> Option<f64> {
        match self {
            Coord::Xy(_) => None,
            Coord::Xyz(v) => Some(v[2]),
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        match self {
            Coord::Xy(v) => v,
            Coord::Xyz(v) => v,
        }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.as_slice().iter().map(|v| v.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}

/// A correspondence point: the same location in the source and target systems.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub source: Coord,
    pub target: Coord,
    pub label: String,
}

impl Point {
    pub fn new(source: &[f64], target: &[f64], label: impl Into<String>) -> Result<Self, FitError> {
        Ok(Self {
            source: Coord::from_slice(source)?,
            target: Coord::from_slice(target)?,
            label: label.into(),
        })
    }

    /// Number of residual components this point contributes.
    ///
    /// Heights only take part when both sides carry them.
    pub fn residual_arity(&self) -> usize {
        if self.source.is_3d() && self.target.is_3d() { 3 } else { 2 }
    }
}

/// One sub-value of a target projection parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Embedded verbatim in the projection string.
    Known(String),
    /// Solved for, starting from the given guess.
    Unknown(f64),
}

impl ParamValue {
    pub fn is_unknown(&self) -> bool {
        matches!(self, ParamValue::Unknown(_))
    }
}

/// Identifies one sub-value of a named parameter.
///
/// Ordering is lexicographic by name, then by sub-index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParamSlot {
    pub name: String,
    pub index: usize,
}

impl ParamSlot {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }

    /// `name` for scalar parameters, `name.index` for sub-values.
    pub fn identifier(&self) -> String {
        if self.index == 0 {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.index)
        }
    }
}

/// Affine adjustments applied after the projection transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Modifier {
    #[serde(rename = "k_0")]
    K0,
    #[serde(rename = "x_0")]
    X0,
    #[serde(rename = "y_0")]
    Y0,
    #[serde(rename = "z_0")]
    Z0,
}

impl Modifier {
    pub const ALL: [Modifier; 4] = [Modifier::K0, Modifier::X0, Modifier::Y0, Modifier::Z0];

    pub fn name(self) -> &'static str {
        match self {
            Modifier::K0 => "k_0",
            Modifier::X0 => "x_0",
            Modifier::Y0 => "y_0",
            Modifier::Z0 => "z_0",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    pub fn default_value(self) -> f64 {
        match self {
            Modifier::K0 => 1.0,
            Modifier::X0 | Modifier::Y0 | Modifier::Z0 => 0.0,
        }
    }
}

/// A modifier is either fixed or solved for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModifierValue {
    Known(f64),
    Unknown(f64),
}

/// Modifier overrides; anything absent keeps its default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifierSpec {
    values: BTreeMap<Modifier, ModifierValue>,
}

impl ModifierSpec {
    pub fn insert(&mut self, modifier: Modifier, value: ModifierValue) -> Result<(), FitError> {
        if self.values.contains_key(&modifier) {
            return Err(FitError::malformed_parameter(
                format!("--{}", modifier.name()),
                "modifier given more than once",
            ));
        }
        self.values.insert(modifier, value);
        Ok(())
    }

    pub fn get(&self, modifier: Modifier) -> Option<ModifierValue> {
        self.values.get(&modifier).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resolved modifier values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Modifiers {
    pub k_0: f64,
    pub x_0: f64,
    pub y_0: f64,
    pub z_0: f64,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            k_0: Modifier::K0.default_value(),
            x_0: Modifier::X0.default_value(),
            y_0: Modifier::Y0.default_value(),
            z_0: Modifier::Z0.default_value(),
        }
    }
}

impl Modifiers {
    pub fn set(&mut self, modifier: Modifier, value: f64) {
        match modifier {
            Modifier::K0 => self.k_0 = value,
            Modifier::X0 => self.x_0 = value,
            Modifier::Y0 => self.y_0 = value,
            Modifier::Z0 => self.z_0 = value,
        }
    }
}

/// The target projection with some parameters known and others to be solved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetSpec {
    params: BTreeMap<String, Vec<ParamValue>>,
    pub modifiers: ModifierSpec,
}

impl TargetSpec {
    /// Add a parameter. An empty `values` list is a bare flag (`+no_defs`).
    pub fn insert(&mut self, name: &str, values: Vec<ParamValue>) -> Result<(), FitError> {
        if !is_valid_param_name(name) {
            return Err(FitError::malformed_parameter(
                format!("+{name}"),
                "parameter names may only contain ASCII letters, digits and `_`",
            ));
        }
        if self.params.contains_key(name) {
            return Err(FitError::malformed_parameter(
                format!("+{name}"),
                "parameter given more than once",
            ));
        }
        self.params.insert(name.to_string(), values);
        Ok(())
    }

    /// Parameters in lexicographic name order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &[ParamValue])> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn get(&self, name: &str) -> Option<&[ParamValue]> {
        self.params.get(name).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Number of values (parameters and modifiers) to be solved for.
    pub fn unknown_count(&self) -> usize {
        let params = self
            .params
            .values()
            .flatten()
            .filter(|v| v.is_unknown())
            .count();
        let modifiers = Modifier::ALL
            .into_iter()
            .filter(|m| matches!(self.modifiers.get(*m), Some(ModifierValue::Unknown(_))))
            .count();
        params + modifiers
    }
}

pub fn is_valid_param_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A successful fit.
#[derive(Debug, Clone)]
pub struct FitSolution {
    /// Canonical projection string with solved values substituted.
    pub projstring: String,
    /// Solved values keyed by variable identifier (`x_0`, `towgs84.2`, ...).
    pub parameters: BTreeMap<String, f64>,
    pub modifiers: Modifiers,
    /// One residual tuple per input point, in input order.
    pub residuals: Vec<Coord>,
    /// `None` when nothing was solved and residuals come from a single evaluation.
    pub report: Option<SolverReport>,
}

/// Output format for the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Projection string, modifiers and residuals.
    Full,
    /// Projection string only.
    Proj,
    /// OGC WKT.
    Wkt,
    /// ESRI flavoured WKT.
    Esri,
}

/// Solver knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    /// Relative reduction of the sum of squares considered converged.
    pub ftol: f64,
    /// Relative step size considered converged.
    pub xtol: f64,
    /// Orthogonality between residuals and Jacobian columns considered converged.
    pub gtol: f64,
    /// Residual evaluation cap; `None` means `200 * (n + 1)`.
    pub max_evaluations: Option<usize>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            ftol: 1e-12,
            xtol: 1.49012e-8,
            gtol: 0.0,
            max_evaluations: None,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub source: String,
    pub target: TargetSpec,
    pub points_path: PathBuf,
    /// Point file encoding label; UTF-8 when absent.
    pub encoding: Option<String>,
    pub output: OutputFormat,
    pub pretty: bool,
    pub solver: SolverOptions,
    pub export_csv: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coord_rejects_other_arities() {
        assert!(matches!(
            Coord::from_slice(&[1.0]),
            Err(FitError::ArityMismatch { found: 1 })
        ));
        assert!(matches!(
            Coord::from_slice(&[1.0, 2.0, 3.0, 4.0]),
            Err(FitError::ArityMismatch { found: 4 })
        ));
        assert_eq!(Coord::from_slice(&[1.0, 2.0]).unwrap().dim(), 2);
    }

    #[test]
    fn residual_arity_needs_heights_on_both_sides() {
        let both = Point::new(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0], "a").unwrap();
        let source_only = Point::new(&[1.0, 2.0, 3.0], &[4.0, 5.0], "b").unwrap();
        let target_only = Point::new(&[1.0, 2.0], &[4.0, 5.0, 6.0], "c").unwrap();
        assert_eq!(both.residual_arity(), 3);
        assert_eq!(source_only.residual_arity(), 2);
        assert_eq!(target_only.residual_arity(), 2);
    }

    #[test]
    fn param_slots_order_by_name_then_index() {
        let mut slots = vec![
            ParamSlot::new("y_0", 0),
            ParamSlot::new("towgs84", 2),
            ParamSlot::new("towgs84", 0),
            ParamSlot::new("lon_0", 0),
        ];
        slots.sort();
        let ids: Vec<String> = slots.iter().map(ParamSlot::identifier).collect();
        assert_eq!(ids, ["lon_0", "towgs84", "towgs84.2", "y_0"]);
    }

    #[test]
    fn target_spec_rejects_duplicates_and_bad_names() {
        let mut spec = TargetSpec::default();
        spec.insert("proj", vec![ParamValue::Known("tmerc".into())]).unwrap();
        assert!(spec.insert("proj", vec![]).is_err());
        assert!(spec.insert("bad-name", vec![]).is_err());

        spec.modifiers.insert(Modifier::K0, ModifierValue::Unknown(1.0)).unwrap();
        assert!(spec.modifiers.insert(Modifier::K0, ModifierValue::Known(1.0)).is_err());
        assert_eq!(spec.unknown_count(), 1);
    }
}
