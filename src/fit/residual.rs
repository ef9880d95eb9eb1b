//! Residual function.
//!
//! Maps a candidate unknown vector to per-axis residuals (known target minus
//! transformed source, after modifiers). The target projection depends on the
//! candidate, so it is rebuilt on every evaluation; the source projection is
//! built once.

use crate::domain::{Coord, Point};
use crate::error::FitError;
use crate::transform::{Projection, transform};

use super::TemplateBuild;

pub struct ResidualFunction<'a> {
    source: Projection,
    build: &'a TemplateBuild,
    points: &'a [Point],
}

impl<'a> ResidualFunction<'a> {
    pub fn new(source: &str, build: &'a TemplateBuild, points: &'a [Point]) -> Result<Self, FitError> {
        Ok(Self {
            source: Projection::new(source)?,
            build,
            points,
        })
    }

    /// Total number of residual components.
    pub fn len(&self) -> usize {
        self.points.iter().map(Point::residual_arity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Residual tuples, one per point.
    pub fn evaluate_points(&self, x: &[f64]) -> Result<Vec<Coord>, FitError> {
        let definition = self.build.template.render(self.build.projection_values(x));
        let target = Projection::new(&definition)?;
        let modifiers = self.build.modifiers.resolve(x);

        self.points
            .iter()
            .map(|point| {
                let t = transform(&self.source, &target, &point.source, &point.label)?;
                let rx = point.target.x() - (t.x() * modifiers.k_0 + modifiers.x_0);
                let ry = point.target.y() - (t.y() * modifiers.k_0 + modifiers.y_0);
                Ok(match (point.target.z(), t.z()) {
                    (Some(z), Some(tz)) => Coord::xyz(rx, ry, z - (tz + modifiers.z_0)),
                    _ => Coord::xy(rx, ry),
                })
            })
            .collect()
    }

    /// Residuals flattened for the solver.
    pub fn evaluate(&self, x: &[f64]) -> Result<Vec<f64>, FitError> {
        let mut flat = Vec::with_capacity(self.len());
        for residual in self.evaluate_points(x)? {
            flat.extend_from_slice(residual.as_slice());
        }
        Ok(flat)
    }
}

/// Regroup a flat residual vector into per-point tuples.
pub fn regroup(flat: &[f64], points: &[Point]) -> Result<Vec<Coord>, FitError> {
    let mut out = Vec::with_capacity(points.len());
    let mut offset = 0;
    for point in points {
        let arity = point.residual_arity();
        let end = offset + arity;
        let chunk = flat.get(offset..end).ok_or(FitError::ArityMismatch {
            found: flat.len().saturating_sub(offset),
        })?;
        out.push(Coord::from_slice(chunk)?);
        offset = end;
    }
    Ok(out)
}
