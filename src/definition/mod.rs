//! Projection definition normalization and interchange export.
//!
//! Both operations run once on the final fitted definition, never inside the
//! residual loop.

pub mod wkt;

pub use wkt::*;

use crate::error::FitError;
use crate::transform::Projection;

/// Projection parameters, in emission order (after `proj`).
const PROJECTION_KEYS: &[&str] = &[
    "zone", "south", "lat_0", "lat_1", "lat_2", "lat_ts", "lon_0", "lonc", "alpha", "gamma", "k", "k_0", "x_0", "y_0",
];

/// Datum and ellipsoid parameters.
const DATUM_KEYS: &[&str] = &["ellps", "datum", "a", "b", "rf", "f", "R", "towgs84", "nadgrids", "pm"];

const UNIT_KEYS: &[&str] = &["units", "to_meter", "axis"];

/// Flags that always close the definition.
const TRAILING_KEYS: &[&str] = &["no_defs", "wktext", "type"];

/// One `+key[=value]` token of a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionParam {
    pub key: String,
    pub value: Option<String>,
}

impl DefinitionParam {
    fn render(&self) -> String {
        match &self.value {
            Some(value) => format!("+{}={}", self.key, value),
            None => format!("+{}", self.key),
        }
    }
}

/// Split a definition into its parameters, keeping the first of any duplicates.
pub fn parse_definition(definition: &str) -> Vec<DefinitionParam> {
    let mut params: Vec<DefinitionParam> = Vec::new();
    for token in definition.split_whitespace() {
        let token = token.strip_prefix('+').unwrap_or(token);
        let (key, value) = match token.split_once('=') {
            Some((key, value)) => (key, Some(value.to_string())),
            None => (token, None),
        };
        if key.is_empty() || params.iter().any(|p| p.key == key) {
            continue;
        }
        params.push(DefinitionParam {
            key: key.to_string(),
            value,
        });
    }
    params
}

/// Look up a parameter value by key.
pub fn param_value<'a>(params: &'a [DefinitionParam], key: &str) -> Option<&'a str> {
    params.iter().find(|p| p.key == key).and_then(|p| p.value.as_deref())
}

pub fn has_param(params: &[DefinitionParam], key: &str) -> bool {
    params.iter().any(|p| p.key == key)
}

/// Normalize a projection definition.
///
/// The definition must be accepted by the transform library. The output
/// lists `+proj` first, then projection, datum, unit and remaining
/// parameters, with numeric values in shortest round-trip form.
/// `canonicalize(canonicalize(s)) == canonicalize(s)`.
pub fn canonicalize(definition: &str) -> Result<String, FitError> {
    Projection::new(definition)?;

    let params: Vec<DefinitionParam> = parse_definition(definition)
        .into_iter()
        .map(|p| DefinitionParam {
            value: p.value.as_deref().map(normalize_value),
            key: p.key,
        })
        .collect();

    let rank = |key: &str| -> usize {
        if key == "proj" {
            return 0;
        }
        let groups = [PROJECTION_KEYS, DATUM_KEYS, UNIT_KEYS];
        let mut offset = 1;
        for group in groups {
            if let Some(pos) = group.iter().position(|k| *k == key) {
                return offset + pos;
            }
            offset += group.len();
        }
        match TRAILING_KEYS.iter().position(|k| *k == key) {
            Some(pos) => offset + 1 + pos,
            // Unlisted parameters sit between units and the trailing flags.
            None => offset,
        }
    };

    let mut ordered: Vec<&DefinitionParam> = params.iter().collect();
    // Stable sort keeps input order among unlisted parameters.
    ordered.sort_by_key(|p| rank(&p.key));

    Ok(ordered.iter().map(|p| p.render()).collect::<Vec<_>>().join(" "))
}

/// Reprint every numeric comma-separated component in shortest form.
fn normalize_value(value: &str) -> String {
    value
        .split(',')
        .map(|part| match part.parse::<f64>() {
            Ok(v) if v.is_finite() => v.to_string(),
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}
