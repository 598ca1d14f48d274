use indexmap::IndexMap;
use serde::Serialize;

/// Numeric attributes are kept as the text that was read, so `"100"` is
/// written back as `"100"` and never as `"100.0"`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Geometry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative: Option<bool>,

    /// The `as` attribute; `geometry` for every cell geometry draw.io writes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_attr: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_point: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_point: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<Point>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Point {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, String>,
}

/// Role of an `mxPoint` inside an `mxGeometry`, taken from its `as` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointRole {
    Source,
    Target,
    Offset,
    Waypoint,
}

impl PointRole {
    pub fn from_as_attr(value: Option<&str>) -> Self {
        match value {
            Some("sourcePoint") => PointRole::Source,
            Some("targetPoint") => PointRole::Target,
            Some("offset") => PointRole::Offset,
            _ => PointRole::Waypoint,
        }
    }

    pub fn as_attr(self) -> Option<&'static str> {
        match self {
            PointRole::Source => Some("sourcePoint"),
            PointRole::Target => Some("targetPoint"),
            PointRole::Offset => Some("offset"),
            PointRole::Waypoint => None,
        }
    }
}

impl Geometry {
    pub const AS_GEOMETRY: &'static str = "geometry";

    /// A placed rectangle, `as="geometry"`.
    pub fn rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        Geometry {
            x: Some(format_number(x)),
            y: Some(format_number(y)),
            width: Some(format_number(width)),
            height: Some(format_number(height)),
            as_attr: Some(Self::AS_GEOMETRY.to_string()),
            ..Geometry::default()
        }
    }

    /// Geometry of an edge: relative, no position of its own.
    pub fn relative_edge() -> Self {
        Geometry {
            relative: Some(true),
            as_attr: Some(Self::AS_GEOMETRY.to_string()),
            ..Geometry::default()
        }
    }

    pub fn is_relative(&self) -> bool {
        self.relative == Some(true)
    }

    /// Place a parsed point according to its role.
    pub fn assign_point(&mut self, role: PointRole, point: Point) {
        match role {
            PointRole::Source => self.source_point = Some(point),
            PointRole::Target => self.target_point = Some(point),
            PointRole::Offset => self.offset = Some(point),
            PointRole::Waypoint => self.points.push(point),
        }
    }

    pub fn has_children(&self) -> bool {
        !self.points.is_empty()
            || self.source_point.is_some()
            || self.target_point.is_some()
            || self.offset.is_some()
    }
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point {
            x: Some(format_number(x)),
            y: Some(format_number(y)),
            extra: IndexMap::new(),
        }
    }

}

/// Shortest text for a coordinate: integers without a fraction, `-0` as `0`.
pub fn format_number(value: f64) -> String {
    let value = if value == 0.0 { 0.0 } else { value };
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    format!("{value}")
}
