//! Export per-point residuals to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.
//! Missing height components are left as empty cells.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::{Coord, Point};
use crate::error::FitError;

#[derive(Debug, Serialize)]
struct ResidualRow<'a> {
    label: &'a str,
    source_x: f64,
    source_y: f64,
    source_z: Option<f64>,
    target_x: f64,
    target_y: f64,
    target_z: Option<f64>,
    residual_x: f64,
    residual_y: f64,
    residual_z: Option<f64>,
}

/// Write one row per point to `writer`.
///
/// `residuals` must be in the same order as `points`.
pub fn write_residuals_csv<W: Write>(writer: W, points: &[Point], residuals: &[Coord]) -> Result<(), FitError> {
    let mut csv = csv::Writer::from_writer(writer);
    for (point, residual) in points.iter().zip(residuals) {
        let row = ResidualRow {
            label: &point.label,
            source_x: point.source.x(),
            source_y: point.source.y(),
            source_z: point.source.z(),
            target_x: point.target.x(),
            target_y: point.target.y(),
            target_z: point.target.z(),
            residual_x: residual.x(),
            residual_y: residual.y(),
            residual_z: residual.z(),
        };
        csv.serialize(row).map_err(|e| FitError::Io {
            context: "Failed to write residual CSV row".to_string(),
            source: e.into(),
        })?;
    }
    csv.flush().map_err(|source| FitError::Io {
        context: "Failed to flush residual CSV".to_string(),
        source,
    })
}

/// Write the residual CSV to a file.
pub fn export_residuals_csv(path: &Path, points: &[Point], residuals: &[Coord]) -> Result<(), FitError> {
    let file = File::create(path).map_err(|source| FitError::Io {
        context: format!("Failed to create export CSV '{}'", path.display()),
        source,
    })?;
    write_residuals_csv(file, points, residuals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_and_empty_height_cells() {
        let points = vec![
            Point::new(&[39.0, 47.0], &[300000.0, 207338.73], "a").unwrap(),
            Point::new(&[39.0, 47.0, 100.0], &[300000.0, 207338.73, 90.0], "b c").unwrap(),
        ];
        let residuals = vec![Coord::xy(0.5, -0.25), Coord::xyz(0.0, 0.0, 1.5)];

        let mut out = Vec::new();
        write_residuals_csv(&mut out, &points, &residuals).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "label,source_x,source_y,source_z,target_x,target_y,target_z,residual_x,residual_y,residual_z"
        );
        assert_eq!(lines[1], "a,39.0,47.0,,300000.0,207338.73,,0.5,-0.25,");
        assert_eq!(lines[2], "b c,39.0,47.0,100.0,300000.0,207338.73,90.0,0.0,0.0,1.5");
    }
}
