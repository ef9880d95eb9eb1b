//! Coordinate transform service.
//!
//! Thin adapter over `proj4rs`:
//!
//! - parses `+key=value` definitions into [`Projection`]s
//! - transforms single coordinates between two projections
//! - keeps geographic coordinates in decimal degrees at this boundary
//!   (`proj4rs` works in radians)
//! - maps `+k_0` to the `+k` spelling `proj4rs` reads

use proj4rs::proj::Proj;

use crate::domain::Coord;
use crate::error::FitError;

/// A parsed projection definition.
pub struct Projection {
    definition: String,
    proj: Proj,
}

impl Projection {
    /// Parse a definition; fails if the library rejects it.
    pub fn new(definition: &str) -> Result<Self, FitError> {
        let proj = Proj::from_proj_string(&library_definition(definition)).map_err(|e| FitError::MalformedProjection {
            definition: definition.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            definition: definition.to_string(),
            proj,
        })
    }

    /// Whether coordinates are longitude/latitude (in degrees at this boundary).
    pub fn is_geographic(&self) -> bool {
        self.proj.is_latlong()
    }
}

/// Rewrite `definition` into the form `proj4rs` understands.
///
/// `proj4rs` reads the scale factor from `+k` only. `+k_0` takes precedence
/// over `+k` when both are present.
fn library_definition(definition: &str) -> String {
    let has_k0 = definition.split_whitespace().any(|t| is_key(t, "k_0"));
    if !has_k0 {
        return definition.to_string();
    }
    definition
        .split_whitespace()
        .filter(|t| !is_key(t, "k"))
        .map(|t| match t.strip_prefix("+k_0") {
            Some(rest) if is_key(t, "k_0") => format!("+k{rest}"),
            _ => t.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_key(token: &str, key: &str) -> bool {
    token
        .strip_prefix('+')
        .and_then(|t| t.strip_prefix(key))
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('='))
}

impl std::fmt::Debug for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projection")
            .field("definition", &self.definition)
            .finish()
    }
}

/// Transform `coord` from `src` to `dst`, keeping its arity.
///
/// 2-D inputs are transformed at height zero and come back as 2-D.
pub fn transform(src: &Projection, dst: &Projection, coord: &Coord, label: &str) -> Result<Coord, FitError> {
    let (mut x, mut y) = (coord.x(), coord.y());
    if src.is_geographic() {
        x = x.to_radians();
        y = y.to_radians();
    }
    let mut point = (x, y, coord.z().unwrap_or(0.0));

    proj4rs::transform::transform(&src.proj, &dst.proj, &mut point).map_err(|e| FitError::Transform {
        label: label.to_string(),
        reason: e.to_string(),
    })?;

    let (mut x, mut y, z) = point;
    if dst.is_geographic() {
        x = x.to_degrees();
        y = y.to_degrees();
    }
    if !(x.is_finite() && y.is_finite() && z.is_finite()) {
        return Err(FitError::Transform {
            label: label.to_string(),
            reason: "transform produced non-finite coordinates".to_string(),
        });
    }

    Ok(match coord {
        Coord::Xy(_) => Coord::xy(x, y),
        Coord::Xyz(_) => Coord::xyz(x, y, z),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WGS84: &str = "+proj=longlat +ellps=WGS84 +datum=WGS84 +no_defs";
    const TMERC: &str = "+proj=tmerc +ellps=krass +lat_0=0 +lon_0=39 +x_0=300000 +y_0=-5000000 +no_defs";

    #[test]
    fn rejects_unknown_projection() {
        let err = Projection::new("+proj=definitely_not_a_projection").unwrap_err();
        assert!(matches!(err, FitError::MalformedProjection { .. }));
    }

    #[test]
    fn central_meridian_maps_to_false_easting() {
        let src = Projection::new(WGS84).unwrap();
        let dst = Projection::new(TMERC).unwrap();
        assert!(src.is_geographic());
        assert!(!dst.is_geographic());

        let out = transform(&src, &dst, &Coord::xy(39.0, 47.0), "pt1").unwrap();
        assert_eq!(out.dim(), 2);
        assert!((out.x() - 300_000.0).abs() < 1e-6);
        // Meridian arc to 47°N on Krassovsky is about 5.207 Mm.
        assert!((out.y() - 207_338.7).abs() < 1.0, "y = {}", out.y());
    }

    #[test]
    fn k_0_scales_projected_coordinates() {
        let src = Projection::new(WGS84).unwrap();
        let unscaled = Projection::new("+proj=tmerc +ellps=krass +lon_0=39 +no_defs").unwrap();
        let halved = Projection::new("+proj=tmerc +ellps=krass +lon_0=39 +k_0=0.5 +no_defs").unwrap();
        let spelled_k = Projection::new("+proj=tmerc +ellps=krass +lon_0=39 +k=0.5 +no_defs").unwrap();

        let p = Coord::xy(40.0, 47.0);
        let full = transform(&src, &unscaled, &p, "pt").unwrap();
        let half = transform(&src, &halved, &p, "pt").unwrap();
        let k = transform(&src, &spelled_k, &p, "pt").unwrap();

        assert!((half.x() - full.x() * 0.5).abs() < 1e-6, "{half} vs {full}");
        assert!((half.y() - full.y() * 0.5).abs() < 1e-6, "{half} vs {full}");
        assert_eq!(half, k);
    }

    #[test]
    fn k_0_wins_over_k() {
        assert_eq!(
            library_definition("+proj=tmerc +k=0.9 +k_0=0.5 +kx=1 +no_defs"),
            "+proj=tmerc +k=0.5 +kx=1 +no_defs"
        );
        assert_eq!(library_definition("+proj=tmerc +k=0.9"), "+proj=tmerc +k=0.9");
    }

    #[test]
    fn round_trip_returns_to_degrees() {
        let src = Projection::new(WGS84).unwrap();
        let dst = Projection::new(TMERC).unwrap();

        let forward = transform(&src, &dst, &Coord::xyz(40.5, 48.25, 12.0), "pt").unwrap();
        assert_eq!(forward.dim(), 3);
        let back = transform(&dst, &src, &forward, "pt").unwrap();
        assert!((back.x() - 40.5).abs() < 1e-9);
        assert!((back.y() - 48.25).abs() < 1e-9);
    }
}
