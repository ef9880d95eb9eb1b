//! Point file parsing.
//!
//! One correspondence point per line:
//!
//! ```text
//! # lon      lat        x           y          label
//! 39d00'     47d00'     300000      207338.73  Base station
//! 40.5       48.25      375432.1    320815.6   pt2
//! ```
//!
//! - 4 leading coordinates give a 2-D pair, 6 give a 3-D pair (5 counts as 4)
//! - whatever follows the coordinates is the label
//! - blank lines and `#` comments are skipped
//!
//! Files are UTF-8 unless an encoding label (`cp1251`, `latin1`, ...) is given.

use std::fs;
use std::path::Path;

use encoding_rs::Encoding;

use crate::domain::Point;
use crate::error::FitError;

const BOM: char = '\u{feff}';

/// Read a point file, decoding it with `encoding` (a WHATWG label) or UTF-8.
pub fn read_points(path: &Path, encoding: Option<&str>) -> Result<Vec<Point>, FitError> {
    let bytes = fs::read(path).map_err(|source| FitError::Io {
        context: format!("Failed to read points file '{}'", path.display()),
        source,
    })?;
    let text = decode_points(&bytes, encoding)?;
    read_points_from_str(&text)
}

/// Decode raw point file contents.
pub fn decode_points(bytes: &[u8], label: Option<&str>) -> Result<String, FitError> {
    let encoding = match label {
        None => encoding_rs::UTF_8,
        Some(label) => Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| FitError::Encoding {
            encoding: label.to_string(),
            reason: "unknown encoding label".to_string(),
        })?,
    };
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(FitError::Encoding {
            encoding: encoding.name().to_string(),
            reason: "invalid byte sequence".to_string(),
        });
    }
    Ok(text.into_owned())
}

pub fn read_points_from_str(text: &str) -> Result<Vec<Point>, FitError> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let mut points = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let values: Vec<f64> = line.split_whitespace().map_while(parse_coord).take(6).collect();
        let count = match values.len() {
            5 => 4,
            n => n,
        };
        if count < 4 {
            return Err(FitError::PointFormat {
                line: idx + 1,
                message: format!("expected at least 4 coordinates, found {count}"),
            });
        }

        let half = count / 2;
        let label = skip_tokens(line, count);
        points.push(Point::new(&values[..half], &values[half..count], label)?);
    }

    Ok(points)
}

/// The rest of `line` after its first `n` whitespace-separated tokens.
fn skip_tokens(line: &str, n: usize) -> &str {
    let mut rest = line;
    for _ in 0..n {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = &rest[end..];
    }
    rest.trim_start()
}

/// Parse a coordinate in decimal or degree/minute/second form.
///
/// Accepted forms include `47.5`, `47,5`, `47d30'`, `-7'30"` and
/// `+175d07.5'`. Minutes and seconds must be below 60.
pub fn parse_coord(token: &str) -> Option<f64> {
    let s = token.replace(',', ".");
    if let Ok(v) = s.parse::<f64>() {
        return v.is_finite().then_some(v);
    }

    let (negative, mut rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(&s)),
    };

    let degrees = take_dms_part(&mut rest, 'd', 3)?;
    let minutes = take_dms_part(&mut rest, '\'', 2)?;
    let seconds = take_dms_part(&mut rest, '"', 2)?;
    if !rest.is_empty() || (degrees.is_none() && minutes.is_none() && seconds.is_none()) {
        return None;
    }

    let minutes = minutes.unwrap_or(0.0);
    let seconds = seconds.unwrap_or(0.0);
    if minutes >= 60.0 || seconds >= 60.0 {
        return None;
    }

    let value = degrees.unwrap_or(0.0) + minutes / 60.0 + seconds / 3600.0;
    Some(if negative { -value } else { value })
}

/// Consume `<number><marker>` from the front of `rest`.
///
/// Outer `None` means the text is malformed; inner `None` means the part is
/// absent or empty (`d` alone).
fn take_dms_part(rest: &mut &str, marker: char, max_int_digits: usize) -> Option<Option<f64>> {
    let Some(pos) = rest.find(marker) else {
        return Some(None);
    };
    let number = &rest[..pos];
    *rest = &rest[pos + marker.len_utf8()..];

    if number.is_empty() {
        return Some(None);
    }
    let (int, frac) = number.split_once('.').unwrap_or((number, ""));
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if int.len() > max_int_digits || !digits(int) || !digits(frac) {
        return None;
    }
    number.parse::<f64>().ok().map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-12)
    }

    #[test]
    fn parses_decimal_and_dms_coordinates() {
        assert!(close(parse_coord("47.5"), 47.5));
        assert!(close(parse_coord("-47,25"), -47.25));
        assert!(close(parse_coord("150d7'30\""), 150.125));
        assert!(close(parse_coord("-7'30\""), -0.125));
        assert!(close(parse_coord("-30\""), -1.0 / 120.0));
        assert!(close(parse_coord("-123,456d"), -123.456));
        assert!(close(parse_coord("+175d07.5'"), 175.125));
        assert!(close(parse_coord("39d"), 39.0));
    }

    #[test]
    fn rejects_malformed_coordinates() {
        for bad in ["", "1d2m3s", "-", "--2d", "6-1", "1d60'0\"", "-140d09'60.5\"", "d", ".", "1234d", "inf", "NaN"] {
            assert_eq!(parse_coord(bad), None, "{bad}");
        }
    }

    #[test]
    fn reads_2d_and_3d_points_with_labels() {
        let text = "\u{feff}# header\n\
                    \n\
                    39 47 300000 207338.73 Base  station\n\
                    40d30' 48.25 375432.1 320815.6 10 20 pt 2\n\
                    1 2 3 4 5\n";
        let points = read_points_from_str(text).unwrap();
        assert_eq!(points.len(), 3);

        assert_eq!(points[0].label, "Base  station");
        assert!(!points[0].source.is_3d());

        assert!(points[1].source.is_3d());
        assert!((points[1].source.x() - 40.5).abs() < 1e-12);
        assert_eq!(points[1].target.z(), Some(20.0));
        assert_eq!(points[1].label, "pt 2");

        // Five numbers: the fifth becomes the label.
        assert!(!points[2].target.is_3d());
        assert_eq!(points[2].label, "5");
    }

    #[test]
    fn decodes_legacy_code_page_labels() {
        // "39 47 300000 207338.7 Москва" in windows-1251
        let mut bytes = b"39 47 300000 207338.7 ".to_vec();
        bytes.extend_from_slice(&[0xCC, 0xEE, 0xF1, 0xEA, 0xE2, 0xE0]);

        let text = decode_points(&bytes, Some("cp1251")).unwrap();
        let points = read_points_from_str(&text).unwrap();
        assert_eq!(points[0].label, "Москва");

        let err = decode_points(&bytes, None).unwrap_err();
        assert!(matches!(err, FitError::Encoding { ref encoding, .. } if encoding == "UTF-8"), "{err}");
    }

    #[test]
    fn unknown_encoding_label_is_rejected() {
        let err = decode_points(b"1 2 3 4", Some("klingon")).unwrap_err();
        assert_eq!(err.to_string(), "Cannot decode points as klingon: unknown encoding label");
        assert_eq!(err.exit_code(), 2);
        assert_eq!(decode_points(b"1 2 3 4", Some("latin1")).unwrap(), "1 2 3 4");
    }

    #[test]
    fn short_lines_name_their_line_number() {
        let err = read_points_from_str("1 2 3 4\n1 2 3 label\n").unwrap_err();
        match err {
            FitError::PointFormat { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
