//! Well-known-text export.
//!
//! Two dialects are produced from a `+key=value` definition:
//!
//! - OGC WKT1 (`PROJCS[...]`, `GEOGCS[...]`, with `TOWGS84` when present)
//! - ESRI `.prj` flavour (`GCS_`/`D_` prefixed names, Esri parameter names)
//!
//! Only the projection methods listed in [`projected_method`] map cleanly; any
//! other `+proj` fails with `FitError::UnsupportedExport`.

use crate::error::FitError;
use crate::io::parse_coord;

use super::{DefinitionParam, has_param, param_value, parse_definition};

const DEGREE: f64 = 0.017_453_292_519_943_3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WktFlavor {
    Ogc,
    Esri,
}

#[derive(Debug, Clone, PartialEq)]
enum WktValue {
    Text(String),
    Number(f64),
    Node(WktNode),
}

/// A `KEYWORD[arg,...]` element.
#[derive(Debug, Clone, PartialEq)]
struct WktNode {
    keyword: &'static str,
    args: Vec<WktValue>,
}

impl WktNode {
    fn new(keyword: &'static str) -> Self {
        Self {
            keyword,
            args: Vec::new(),
        }
    }

    fn text(mut self, text: impl Into<String>) -> Self {
        self.args.push(WktValue::Text(text.into()));
        self
    }

    fn number(mut self, value: f64) -> Self {
        self.args.push(WktValue::Number(value));
        self
    }

    fn child(mut self, node: WktNode) -> Self {
        self.args.push(WktValue::Node(node));
        self
    }

    fn render(&self, flavor: WktFlavor, pretty: bool, depth: usize, out: &mut String) {
        out.push_str(self.keyword);
        out.push('[');
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            match arg {
                WktValue::Text(text) => {
                    out.push('"');
                    out.push_str(text);
                    out.push('"');
                }
                WktValue::Number(value) => out.push_str(&format_number(*value, flavor)),
                WktValue::Node(node) => {
                    if pretty {
                        out.push('\n');
                        out.push_str(&"    ".repeat(depth + 1));
                    }
                    node.render(flavor, pretty, depth + 1, out);
                }
            }
        }
        out.push(']');
    }
}

/// Esri writes integral values with a trailing `.0`.
fn format_number(value: f64, flavor: WktFlavor) -> String {
    let value = value + 0.0;
    if flavor == WktFlavor::Esri && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Reference ellipsoid: semi-major axis and inverse flattening (0 for spheres).
#[derive(Debug, Clone, PartialEq)]
struct Ellipsoid {
    ogc_name: String,
    esri_name: String,
    a: f64,
    rf: f64,
}

/// `(proj name, OGC name, Esri name, a, rf)`.
const ELLIPSOIDS: &[(&str, &str, &str, f64, f64)] = &[
    ("WGS84", "WGS 84", "WGS_1984", 6_378_137.0, 298.257_223_563),
    ("GRS80", "GRS 1980", "GRS_1980", 6_378_137.0, 298.257_222_101),
    ("WGS72", "WGS 72", "WGS_1972", 6_378_135.0, 298.26),
    ("krass", "Krassowsky 1940", "Krasovsky_1940", 6_378_245.0, 298.3),
    ("intl", "International 1924", "International_1924", 6_378_388.0, 297.0),
    ("clrk66", "Clarke 1866", "Clarke_1866", 6_378_206.4, 294.978_698_213_898),
    ("clrk80", "Clarke 1880 (RGS)", "Clarke_1880_RGS", 6_378_249.145, 293.465),
    ("bessel", "Bessel 1841", "Bessel_1841", 6_377_397.155, 299.152_812_8),
    ("airy", "Airy 1830", "Airy_1830", 6_377_563.396, 299.324_964_6),
    ("sphere", "Normal Sphere (r=6370997)", "Sphere", 6_370_997.0, 0.0),
];

/// `(proj name, ellipsoid, OGC datum name, Esri datum name, towgs84)`.
const DATUMS: &[(&str, &str, &str, &str, Option<[f64; 3]>)] = &[
    ("WGS84", "WGS84", "WGS_1984", "D_WGS_1984", Some([0.0, 0.0, 0.0])),
    ("NAD83", "GRS80", "North_American_Datum_1983", "D_North_American_1983", Some([0.0, 0.0, 0.0])),
    ("NAD27", "clrk66", "North_American_Datum_1927", "D_North_American_1927", None),
];

fn unsupported(definition: &str, reason: impl Into<String>) -> FitError {
    FitError::UnsupportedExport {
        definition: definition.to_string(),
        reason: reason.into(),
    }
}

/// Export a definition as WKT.
pub fn to_wkt(definition: &str, flavor: WktFlavor, pretty: bool) -> Result<String, FitError> {
    let params = parse_definition(definition);
    let ctx = Context {
        definition,
        params: &params,
        flavor,
    };

    let proj = param_value(&params, "proj").ok_or_else(|| unsupported(definition, "missing +proj"))?;
    let geogcs = ctx.geographic_cs()?;

    let root = match proj {
        "longlat" | "latlong" | "lonlat" | "latlon" => geogcs,
        _ => {
            let (name, method, parameters) = ctx.projected_method(proj)?;
            let mut node = WktNode::new("PROJCS")
                .text(name)
                .child(geogcs)
                .child(WktNode::new("PROJECTION").text(method));
            for (name, value) in parameters {
                node = node.child(WktNode::new("PARAMETER").text(name).number(value));
            }
            node.child(ctx.linear_unit()?)
        }
    };

    let mut out = String::new();
    root.render(flavor, pretty, 0, &mut out);
    Ok(out)
}

struct Context<'a> {
    definition: &'a str,
    params: &'a [DefinitionParam],
    flavor: WktFlavor,
}

impl Context<'_> {
    fn pick<'s>(&self, ogc: &'s str, esri: &'s str) -> &'s str {
        match self.flavor {
            WktFlavor::Ogc => ogc,
            WktFlavor::Esri => esri,
        }
    }

    fn number(&self, key: &str) -> Result<Option<f64>, FitError> {
        match param_value(self.params, key) {
            None => Ok(None),
            Some(text) => parse_coord(text)
                .map(Some)
                .ok_or_else(|| unsupported(self.definition, format!("+{key}={text} is not a number"))),
        }
    }

    fn number_or(&self, key: &str, default: f64) -> Result<f64, FitError> {
        Ok(self.number(key)?.unwrap_or(default))
    }

    fn ellipsoid(&self, datum_ellps: Option<&str>) -> Result<Ellipsoid, FitError> {
        let named = param_value(self.params, "ellps").or(datum_ellps).unwrap_or("WGS84");
        let mut ellipsoid = match ELLIPSOIDS.iter().find(|e| e.0 == named) {
            Some(&(_, ogc, esri, a, rf)) => Ellipsoid {
                ogc_name: ogc.to_string(),
                esri_name: esri.to_string(),
                a,
                rf,
            },
            None => return Err(unsupported(self.definition, format!("unknown ellipsoid `{named}`"))),
        };

        if let Some(r) = self.number("R")? {
            return Ok(Ellipsoid {
                ogc_name: "unknown".to_string(),
                esri_name: "Sphere".to_string(),
                a: r,
                rf: 0.0,
            });
        }

        if let Some(a) = self.number("a")? {
            ellipsoid.ogc_name = "unknown".to_string();
            ellipsoid.esri_name = "Unknown".to_string();
            ellipsoid.a = a;
            ellipsoid.rf = if let Some(rf) = self.number("rf")? {
                rf
            } else if let Some(f) = self.number("f")? {
                if f == 0.0 { 0.0 } else { 1.0 / f }
            } else if let Some(b) = self.number("b")? {
                if a == b { 0.0 } else { a / (a - b) }
            } else {
                0.0
            };
        }
        Ok(ellipsoid)
    }

    fn geographic_cs(&self) -> Result<WktNode, FitError> {
        let datum = match param_value(self.params, "datum") {
            Some(name) => Some(
                DATUMS
                    .iter()
                    .find(|d| d.0 == name)
                    .ok_or_else(|| unsupported(self.definition, format!("unknown datum `{name}`")))?,
            ),
            None => None,
        };
        let ellipsoid = self.ellipsoid(datum.map(|d| d.1))?;

        let (datum_name, gcs_name) = match (datum, self.flavor) {
            (Some(d), WktFlavor::Ogc) => (d.2.to_string(), ellipsoid.ogc_name.clone()),
            (Some(d), WktFlavor::Esri) => (d.3.to_string(), format!("GCS_{}", &d.3[2..])),
            (None, WktFlavor::Ogc) => ("unknown".to_string(), "unknown".to_string()),
            (None, WktFlavor::Esri) => (format!("D_{}", ellipsoid.esri_name), format!("GCS_{}", ellipsoid.esri_name)),
        };

        let spheroid_name = match self.flavor {
            WktFlavor::Ogc => ellipsoid.ogc_name,
            WktFlavor::Esri => ellipsoid.esri_name,
        };
        let mut datum_node = WktNode::new("DATUM")
            .text(datum_name)
            .child(WktNode::new("SPHEROID").text(spheroid_name).number(ellipsoid.a).number(ellipsoid.rf));

        if self.flavor == WktFlavor::Ogc {
            let towgs84 = match self.towgs84()? {
                Some(values) => Some(values),
                None => datum.and_then(|d| d.4).map(|v| v.to_vec()),
            };
            if let Some(values) = towgs84 {
                let mut node = WktNode::new("TOWGS84");
                for v in values {
                    node = node.number(v);
                }
                datum_node = datum_node.child(node);
            }
        }

        let primem = match param_value(self.params, "pm") {
            None | Some("greenwich") => WktNode::new("PRIMEM").text("Greenwich").number(0.0),
            Some(text) => match parse_coord(text) {
                Some(v) => WktNode::new("PRIMEM").text(self.pick("unknown", "Unknown")).number(v),
                None => return Err(unsupported(self.definition, format!("unknown prime meridian `{text}`"))),
            },
        };

        Ok(WktNode::new("GEOGCS")
            .text(gcs_name)
            .child(datum_node)
            .child(primem)
            .child(WktNode::new("UNIT").text(self.pick("degree", "Degree")).number(DEGREE)))
    }

    /// `+towgs84` padded to seven values when it carries more than three.
    fn towgs84(&self) -> Result<Option<Vec<f64>>, FitError> {
        let Some(text) = param_value(self.params, "towgs84") else {
            return Ok(None);
        };
        let mut values = text
            .split(',')
            .map(|part| {
                part.parse::<f64>()
                    .map_err(|_| unsupported(self.definition, format!("+towgs84 component `{part}` is not a number")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if values.len() != 3 && values.len() != 7 {
            if values.len() > 7 {
                return Err(unsupported(self.definition, "+towgs84 takes 3 or 7 values"));
            }
            values.resize(7, 0.0);
        }
        Ok(Some(values))
    }

    fn linear_unit(&self) -> Result<WktNode, FitError> {
        let (ogc, esri, factor) = if let Some(factor) = self.number("to_meter")? {
            ("unknown", "Unknown", factor)
        } else {
            match param_value(self.params, "units").unwrap_or("m") {
                "m" => ("metre", "Meter", 1.0),
                "km" => ("kilometre", "Kilometer", 1000.0),
                "ft" => ("foot", "Foot", 0.3048),
                "us-ft" => ("US survey foot", "Foot_US", 1200.0 / 3937.0),
                other => return Err(unsupported(self.definition, format!("unknown unit `{other}`"))),
            }
        };
        Ok(WktNode::new("UNIT").text(self.pick(ogc, esri)).number(factor))
    }

    /// Coordinate system name, method name and parameters for a projected system.
    fn projected_method(&self, proj: &str) -> Result<(String, &'static str, Vec<(&'static str, f64)>), FitError> {
        let esri = self.flavor == WktFlavor::Esri;
        let x_0 = self.number_or("x_0", 0.0)?;
        let y_0 = self.number_or("y_0", 0.0)?;
        let lat_0 = self.number_or("lat_0", 0.0)?;
        let lon_0 = self.number_or("lon_0", 0.0)?;
        let k = match self.number("k_0")? {
            Some(k) => k,
            None => self.number_or("k", 1.0)?,
        };
        let unknown = "unknown".to_string();

        let out = match proj {
            "tmerc" => (unknown, "Transverse_Mercator", self.tmerc(x_0, y_0, lon_0, k, lat_0)),
            "utm" => {
                let zone = self
                    .number("zone")?
                    .filter(|z| z.fract() == 0.0 && (1.0..=60.0).contains(z))
                    .ok_or_else(|| unsupported(self.definition, "+proj=utm needs +zone between 1 and 60"))?;
                let south = has_param(self.params, "south");
                let hemisphere = if south { 'S' } else { 'N' };
                let name = if esri {
                    format!("UTM_Zone_{zone}{hemisphere}")
                } else {
                    format!("UTM Zone {zone}{hemisphere}")
                };
                let false_northing = if south { 10_000_000.0 } else { 0.0 };
                let central = zone * 6.0 - 183.0;
                (name, "Transverse_Mercator", self.tmerc(500_000.0, false_northing, central, 0.9996, 0.0))
            }
            "merc" => {
                let lat_ts = self.number("lat_ts")?;
                if esri {
                    let params = vec![
                        ("False_Easting", x_0),
                        ("False_Northing", y_0),
                        ("Central_Meridian", lon_0),
                        ("Standard_Parallel_1", lat_ts.unwrap_or(0.0)),
                    ];
                    (unknown, "Mercator", params)
                } else if let Some(lat_ts) = lat_ts {
                    let params = vec![
                        ("standard_parallel_1", lat_ts),
                        ("central_meridian", lon_0),
                        ("false_easting", x_0),
                        ("false_northing", y_0),
                    ];
                    (unknown, "Mercator_2SP", params)
                } else {
                    let params = vec![
                        ("central_meridian", lon_0),
                        ("scale_factor", k),
                        ("false_easting", x_0),
                        ("false_northing", y_0),
                    ];
                    (unknown, "Mercator_1SP", params)
                }
            }
            "lcc" | "aea" => {
                let lat_1 = self
                    .number("lat_1")?
                    .ok_or_else(|| unsupported(self.definition, format!("+proj={proj} needs +lat_1")))?;
                let lat_2 = self.number_or("lat_2", lat_1)?;
                if esri {
                    let method = if proj == "lcc" { "Lambert_Conformal_Conic" } else { "Albers" };
                    let params = vec![
                        ("False_Easting", x_0),
                        ("False_Northing", y_0),
                        ("Central_Meridian", lon_0),
                        ("Standard_Parallel_1", lat_1),
                        ("Standard_Parallel_2", lat_2),
                        ("Latitude_Of_Origin", lat_0),
                    ];
                    (unknown, method, params)
                } else if proj == "lcc" {
                    let params = vec![
                        ("standard_parallel_1", lat_1),
                        ("standard_parallel_2", lat_2),
                        ("latitude_of_origin", lat_0),
                        ("central_meridian", lon_0),
                        ("false_easting", x_0),
                        ("false_northing", y_0),
                    ];
                    (unknown, "Lambert_Conformal_Conic_2SP", params)
                } else {
                    let params = vec![
                        ("standard_parallel_1", lat_1),
                        ("standard_parallel_2", lat_2),
                        ("latitude_of_center", lat_0),
                        ("longitude_of_center", lon_0),
                        ("false_easting", x_0),
                        ("false_northing", y_0),
                    ];
                    (unknown, "Albers_Conic_Equal_Area", params)
                }
            }
            "laea" => {
                let params = if esri {
                    vec![
                        ("False_Easting", x_0),
                        ("False_Northing", y_0),
                        ("Central_Meridian", lon_0),
                        ("Latitude_Of_Origin", lat_0),
                    ]
                } else {
                    vec![
                        ("latitude_of_center", lat_0),
                        ("longitude_of_center", lon_0),
                        ("false_easting", x_0),
                        ("false_northing", y_0),
                    ]
                };
                (unknown, "Lambert_Azimuthal_Equal_Area", params)
            }
            "eqc" => {
                let lat_ts = self.number_or("lat_ts", 0.0)?;
                if esri {
                    let params = vec![
                        ("False_Easting", x_0),
                        ("False_Northing", y_0),
                        ("Central_Meridian", lon_0),
                        ("Standard_Parallel_1", lat_ts),
                    ];
                    (unknown, "Equidistant_Cylindrical", params)
                } else {
                    let params = vec![
                        ("standard_parallel_1", lat_ts),
                        ("central_meridian", lon_0),
                        ("false_easting", x_0),
                        ("false_northing", y_0),
                    ];
                    (unknown, "Equirectangular", params)
                }
            }
            "sterea" => {
                let method = if esri { "Double_Stereographic" } else { "Oblique_Stereographic" };
                (unknown, method, self.tmerc(x_0, y_0, lon_0, k, lat_0))
            }
            "stere" => {
                let polar = lat_0.abs() == 90.0;
                if polar {
                    let lat_ts = self.number_or("lat_ts", lat_0)?;
                    if esri {
                        let method = if lat_0 > 0.0 {
                            "Stereographic_North_Pole"
                        } else {
                            "Stereographic_South_Pole"
                        };
                        let params = vec![
                            ("False_Easting", x_0),
                            ("False_Northing", y_0),
                            ("Central_Meridian", lon_0),
                            ("Standard_Parallel_1", lat_ts),
                        ];
                        (unknown, method, params)
                    } else {
                        let params = vec![
                            ("latitude_of_origin", lat_ts),
                            ("central_meridian", lon_0),
                            ("scale_factor", k),
                            ("false_easting", x_0),
                            ("false_northing", y_0),
                        ];
                        (unknown, "Polar_Stereographic", params)
                    }
                } else {
                    (unknown, "Stereographic", self.tmerc(x_0, y_0, lon_0, k, lat_0))
                }
            }
            other => {
                return Err(unsupported(self.definition, format!("no WKT mapping for +proj={other}")));
            }
        };
        Ok(out)
    }

    /// Parameter list shared by transverse-Mercator-like methods.
    fn tmerc(&self, x_0: f64, y_0: f64, lon_0: f64, k: f64, lat_0: f64) -> Vec<(&'static str, f64)> {
        match self.flavor {
            WktFlavor::Ogc => vec![
                ("latitude_of_origin", lat_0),
                ("central_meridian", lon_0),
                ("scale_factor", k),
                ("false_easting", x_0),
                ("false_northing", y_0),
            ],
            WktFlavor::Esri => vec![
                ("False_Easting", x_0),
                ("False_Northing", y_0),
                ("Central_Meridian", lon_0),
                ("Scale_Factor", k),
                ("Latitude_Of_Origin", lat_0),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TMERC: &str = "+proj=tmerc +lat_0=0 +lon_0=39 +x_0=300000 +y_0=-5000000 +ellps=krass \
                         +towgs84=23.57,-140.95,-79.8,0,0.35,0.79,-0.22 +no_defs";

    #[test]
    fn exports_geographic_wgs84() {
        let wkt = to_wkt("+proj=longlat +datum=WGS84 +no_defs", WktFlavor::Ogc, false).unwrap();
        assert_eq!(
            wkt,
            "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563],\
             TOWGS84[0,0,0]],PRIMEM[\"Greenwich\",0],UNIT[\"degree\",0.0174532925199433]]"
        );
    }

    #[test]
    fn exports_esri_geographic_with_decimal_points() {
        let wkt = to_wkt("+proj=longlat +datum=WGS84 +no_defs", WktFlavor::Esri, false).unwrap();
        assert_eq!(
            wkt,
            "GEOGCS[\"GCS_WGS_1984\",DATUM[\"D_WGS_1984\",SPHEROID[\"WGS_1984\",6378137.0,298.257223563]],\
             PRIMEM[\"Greenwich\",0.0],UNIT[\"Degree\",0.0174532925199433]]"
        );
    }

    #[test]
    fn exports_transverse_mercator_with_towgs84() {
        let wkt = to_wkt(TMERC, WktFlavor::Ogc, false).unwrap();
        assert!(wkt.starts_with("PROJCS[\"unknown\",GEOGCS[\"unknown\",DATUM[\"unknown\",SPHEROID[\"Krassowsky 1940\",6378245,298.3],TOWGS84[23.57,-140.95,-79.8,0,0.35,0.79,-0.22]]"));
        assert!(wkt.contains("PROJECTION[\"Transverse_Mercator\"]"));
        assert!(wkt.contains("PARAMETER[\"central_meridian\",39]"));
        assert!(wkt.contains("PARAMETER[\"false_northing\",-5000000]"));
        assert!(wkt.ends_with("UNIT[\"metre\",1]]"));

        let esri = to_wkt(TMERC, WktFlavor::Esri, false).unwrap();
        assert!(!esri.contains("TOWGS84"));
        assert!(esri.contains("DATUM[\"D_Krasovsky_1940\""));
        assert!(esri.contains("PARAMETER[\"False_Easting\",300000.0]"));
    }

    #[test]
    fn utm_expands_to_transverse_mercator() {
        let wkt = to_wkt("+proj=utm +zone=33 +south +datum=WGS84 +units=m", WktFlavor::Ogc, false).unwrap();
        assert!(wkt.starts_with("PROJCS[\"UTM Zone 33S\""));
        assert!(wkt.contains("PARAMETER[\"central_meridian\",15]"));
        assert!(wkt.contains("PARAMETER[\"scale_factor\",0.9996]"));
        assert!(wkt.contains("PARAMETER[\"false_northing\",10000000]"));
    }

    #[test]
    fn pretty_output_indents_child_nodes() {
        let wkt = to_wkt("+proj=longlat +ellps=GRS80", WktFlavor::Ogc, true).unwrap();
        let lines: Vec<&str> = wkt.lines().collect();
        assert_eq!(lines[0], "GEOGCS[\"unknown\",");
        assert_eq!(lines[1], "    DATUM[\"unknown\",");
        assert_eq!(lines[2], "        SPHEROID[\"GRS 1980\",6378137,298.257222101]],");
        assert_eq!(lines[3], "    PRIMEM[\"Greenwich\",0],");
    }

    #[test]
    fn unsupported_projection_is_an_export_error() {
        let err = to_wkt("+proj=robin +lon_0=0", WktFlavor::Ogc, false).unwrap_err();
        assert!(matches!(err, FitError::UnsupportedExport { .. }));
        assert_eq!(err.exit_code(), 4);
    }
}
