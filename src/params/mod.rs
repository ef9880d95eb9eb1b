//! Parameter token parsing.
//!
//! Target tokens:
//!
//! ```text
//! +no_defs                 bare flag
//! +lon_0=39                known value
//! +x_0~0                   unknown, initial guess 0
//! +towgs84=~30,-140,~-80   mixed sub-values (each `~` marks an unknown)
//! ```
//!
//! Modifier tokens (`--k_0~1`, `--x_0=0`, `--y_0=~-5e6`) adjust the
//! transformed coordinates and never appear in the projection string.

use crate::domain::{Modifier, ModifierValue, ParamValue, TargetSpec, is_valid_param_name};
use crate::error::FitError;

/// Used when no source parameters are given.
pub const DEFAULT_SOURCE: &str = "+proj=longlat +ellps=WGS84 +datum=WGS84 +no_defs";

/// A parsed `+name[=|~]values` token.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamToken {
    pub name: String,
    pub values: Vec<ParamValue>,
}

/// Parse a single `+name...` target token.
pub fn parse_param_token(token: &str) -> Result<ParamToken, FitError> {
    let body = token
        .strip_prefix('+')
        .ok_or_else(|| FitError::malformed_parameter(token, "expected a leading `+`"))?;

    let split = body.find(['=', '~']).unwrap_or(body.len());
    let (name, rest) = body.split_at(split);
    if !is_valid_param_name(name) {
        return Err(FitError::malformed_parameter(
            token,
            "parameter names may only contain ASCII letters, digits and `_`",
        ));
    }

    if rest.is_empty() {
        return Ok(ParamToken {
            name: name.to_string(),
            values: Vec::new(),
        });
    }

    let values = rest
        .split(',')
        .map(|sub| parse_sub_value(token, sub))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParamToken {
        name: name.to_string(),
        values,
    })
}

fn parse_sub_value(token: &str, sub: &str) -> Result<ParamValue, FitError> {
    if let Some(guess) = sub.strip_prefix("=~").or_else(|| sub.strip_prefix('~')) {
        return parse_guess(token, guess).map(ParamValue::Unknown);
    }
    let literal = sub.strip_prefix('=').unwrap_or(sub);
    Ok(ParamValue::Known(literal.to_string()))
}

fn parse_guess(token: &str, text: &str) -> Result<f64, FitError> {
    match text.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(FitError::malformed_parameter(
            token,
            format!("initial guess `{text}` is not a finite number"),
        )),
    }
}

/// Whether `token` looks like a modifier (`--k_0`, `--x_0`, `--y_0`, `--z_0`
/// followed by `=` or `~`).
pub fn is_modifier_token(token: &str) -> bool {
    split_modifier(token).is_some()
}

fn split_modifier(token: &str) -> Option<(Modifier, &str)> {
    let body = token.strip_prefix("--")?;
    let split = body.find(['=', '~'])?;
    let (name, rest) = body.split_at(split);
    Modifier::from_name(name).map(|m| (m, rest))
}

/// Parse a modifier token into its slot and value.
pub fn parse_modifier_token(token: &str) -> Result<(Modifier, ModifierValue), FitError> {
    let (modifier, rest) = split_modifier(token).ok_or_else(|| {
        FitError::malformed_parameter(token, "expected --k_0, --x_0, --y_0 or --z_0 with a value")
    })?;

    if let Some(guess) = rest.strip_prefix("=~").or_else(|| rest.strip_prefix('~')) {
        return Ok((modifier, ModifierValue::Unknown(parse_guess(token, guess)?)));
    }

    let literal = rest.strip_prefix('=').unwrap_or(rest);
    match literal.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok((modifier, ModifierValue::Known(v))),
        _ => Err(FitError::malformed_parameter(
            token,
            format!("modifier value `{literal}` is not a finite number"),
        )),
    }
}

/// Build the target specification from parameter and modifier tokens.
pub fn parse_target<S: AsRef<str>>(params: &[S], modifiers: &[S]) -> Result<TargetSpec, FitError> {
    let mut spec = TargetSpec::default();
    for token in params {
        let parsed = parse_param_token(token.as_ref())?;
        spec.insert(&parsed.name, parsed.values)?;
    }
    for token in modifiers {
        let (modifier, value) = parse_modifier_token(token.as_ref())?;
        spec.modifiers.insert(modifier, value)?;
    }
    Ok(spec)
}

/// Join source tokens into a definition, falling back to [`DEFAULT_SOURCE`].
pub fn source_definition<S: AsRef<str>>(tokens: &[S]) -> String {
    if tokens.is_empty() {
        return DEFAULT_SOURCE.to_string();
    }
    tokens.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(s: &str) -> ParamValue {
        ParamValue::Known(s.to_string())
    }

    #[test]
    fn parses_flags_known_and_unknown_values() {
        assert!(parse_param_token("+no_defs").unwrap().values.is_empty());
        assert_eq!(parse_param_token("+proj=tmerc").unwrap().values, vec![known("tmerc")]);
        assert_eq!(
            parse_param_token("+x_0~0").unwrap().values,
            vec![ParamValue::Unknown(0.0)]
        );
        assert_eq!(
            parse_param_token("+y_0=~-5e6").unwrap().values,
            vec![ParamValue::Unknown(-5e6)]
        );
    }

    #[test]
    fn parses_mixed_sub_values() {
        let token = parse_param_token("+towgs84=~30.5,-140,~-80").unwrap();
        assert_eq!(token.name, "towgs84");
        assert_eq!(
            token.values,
            vec![ParamValue::Unknown(30.5), known("-140"), ParamValue::Unknown(-80.0)]
        );
    }

    #[test]
    fn rejects_malformed_tokens() {
        for bad in ["proj=tmerc", "+", "+=1", "+bad-name=1", "+x_0~abc", "+x_0~", "+towgs84=1,~x,3"] {
            let err = parse_param_token(bad).unwrap_err();
            assert!(matches!(err, FitError::MalformedParameter { .. }), "{bad}");
        }
    }

    #[test]
    fn parses_modifiers() {
        assert!(is_modifier_token("--k_0~1"));
        assert!(is_modifier_token("--y_0=0"));
        assert!(!is_modifier_token("--k_0"));
        assert!(!is_modifier_token("--proj"));
        assert!(!is_modifier_token("--encoding=utf-8"));

        assert_eq!(
            parse_modifier_token("--k_0~1").unwrap(),
            (Modifier::K0, ModifierValue::Unknown(1.0))
        );
        assert_eq!(
            parse_modifier_token("--y_0=0").unwrap(),
            (Modifier::Y0, ModifierValue::Known(0.0))
        );
        assert_eq!(
            parse_modifier_token("--z_0=~2.5").unwrap(),
            (Modifier::Z0, ModifierValue::Unknown(2.5))
        );
        assert!(parse_modifier_token("--x_0=east").is_err());
    }

    #[test]
    fn builds_target_spec() {
        let spec = parse_target(
            &["+proj=tmerc", "+ellps=krass", "+towgs84=~30.5,-140,~-80", "+no_defs"],
            &["--k_0~1", "--y_0=0"],
        )
        .unwrap();
        assert_eq!(spec.get("no_defs").map(|v| v.len()), Some(0));
        assert_eq!(spec.unknown_count(), 3);
        assert_eq!(spec.modifiers.get(Modifier::Y0), Some(ModifierValue::Known(0.0)));

        let dup = parse_target(&["+x_0~0", "+x_0=1"], &[]);
        assert!(matches!(dup, Err(FitError::MalformedParameter { .. })));
    }

    #[test]
    fn source_defaults_to_wgs84() {
        let empty: [&str; 0] = [];
        assert_eq!(source_definition(&empty), DEFAULT_SOURCE);
        assert_eq!(
            source_definition(&["+proj=longlat", "+ellps=WGS84"]),
            "+proj=longlat +ellps=WGS84"
        );
    }
}
