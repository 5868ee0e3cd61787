//! Conversion between [`Shape`] and GeoJSON geometry.

use geo::{Coord, LineString, Point, Polygon};
use geojson::{Geometry, Value};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::models::{OnestopError, Shape};

fn ring_to_positions(ring: &LineString) -> Vec<Vec<f64>> {
    ring.0.iter().map(|c| vec![c.x, c.y]).collect()
}

fn positions_to_ring(positions: &[Vec<f64>]) -> Result<LineString, OnestopError> {
    positions
        .iter()
        .map(|p| position_to_coord(p))
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

fn position_to_coord(position: &[f64]) -> Result<Coord, OnestopError> {
    match position {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => Err(OnestopError::InvalidData(format!(
            "position needs two coordinates, got {}",
            position.len()
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

impl From<&Shape> for Geometry {
    fn from(shape: &Shape) -> Self {
        let value = match shape {
            Shape::Point(point) => Value::Point(vec![point.x(), point.y()]),
            Shape::Polygon(polygon) => {
                let mut rings = vec![ring_to_positions(polygon.exterior())];
                rings.extend(polygon.interiors().iter().map(ring_to_positions));
                Value::Polygon(rings)
            }
        };
        Geometry::new(value)
    }
}

impl TryFrom<&Geometry> for Shape {
    type Error = OnestopError;

    fn try_from(geometry: &Geometry) -> Result<Self, Self::Error> {
        match &geometry.value {
            Value::Point(position) => Ok(Shape::Point(Point::from(position_to_coord(position)?))),
            Value::Polygon(rings) => {
                let (exterior, interiors) = rings.split_first().ok_or_else(|| {
                    OnestopError::InvalidData("polygon without exterior ring".into())
                })?;
                let interiors = interiors
                    .iter()
                    .map(|ring| positions_to_ring(ring))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Shape::Polygon(Polygon::new(
                    positions_to_ring(exterior)?,
                    interiors,
                )))
            }
            other => Err(OnestopError::InvalidData(format!(
                "unsupported geometry type: {}",
                type_name(other)
            ))),
        }
    }
}

impl Serialize for Shape {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Geometry::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Shape {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let geometry = Geometry::deserialize(deserializer)?;
        Shape::try_from(&geometry).map_err(de::Error::custom)
    }
}
