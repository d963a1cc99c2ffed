//! Format d'échange GeoJSON des parcours et des zones
//!
//! Un parcours arrive sous la forme `{"type":"Polygon","coordinates":[[[lon,lat],...]]}`.
//! Seul l'anneau extérieur est retenu, et il est rendu tel que soumis (sans
//! fermeture automatique) pour que le validateur puisse mesurer l'écart.

use geo::{Coord, LineString, Polygon};
use geojson::{GeoJson, Geometry, Value};
use tracing::warn;

use crate::ConquestError;

/// Décode un parcours depuis un texte GeoJSON
///
/// Accepte une géométrie nue, une `Feature` portant un polygone, ou une
/// chaîne JSON contenant l'un des deux.
pub fn parse_route(input: &str) -> Result<LineString, ConquestError> {
    let value: serde_json::Value = serde_json::from_str(input)
        .map_err(|e| ConquestError::invalid_geometry(format!("malformed JSON: {}", e)))?;
    parse_route_value(value)
}

/// Décode un parcours depuis une valeur JSON déjà lue
pub fn parse_route_value(value: serde_json::Value) -> Result<LineString, ConquestError> {
    let value = match value {
        serde_json::Value::String(inner) => serde_json::from_str(&inner)
            .map_err(|e| ConquestError::invalid_geometry(format!("malformed JSON: {}", e)))?,
        other => other,
    };

    let geojson = GeoJson::from_json_value(value)
        .map_err(|e| ConquestError::invalid_geometry(format!("not a GeoJSON object: {}", e)))?;

    let geometry = match geojson {
        GeoJson::Geometry(g) => g,
        GeoJson::Feature(f) => f
            .geometry
            .ok_or_else(|| ConquestError::invalid_geometry("feature has no geometry"))?,
        GeoJson::FeatureCollection(_) => {
            return Err(ConquestError::invalid_geometry(
                "expected a Polygon, got a FeatureCollection",
            ))
        }
    };

    outer_ring(geometry)
}

fn outer_ring(geometry: Geometry) -> Result<LineString, ConquestError> {
    let rings = match geometry.value {
        Value::Polygon(rings) => rings,
        other => {
            return Err(ConquestError::invalid_geometry(format!(
                "expected a Polygon, got a {}",
                type_name(&other)
            )))
        }
    };

    let mut rings = rings.into_iter();
    let exterior = rings
        .next()
        .ok_or_else(|| ConquestError::invalid_geometry("polygon has no outer ring"))?;

    let holes = rings.count();
    if holes > 0 {
        warn!(holes, "Ignoring interior rings of submitted route");
    }

    let coords = exterior
        .iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(ConquestError::invalid_geometry(
                "position needs at least two numbers",
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LineString::new(coords))
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

/// Géométrie GeoJSON d'un polygone
pub fn polygon_to_geojson(polygon: &Polygon) -> Geometry {
    Geometry::new(Value::from(polygon))
}

/// Texte GeoJSON d'un polygone
pub fn polygon_to_string(polygon: &Polygon) -> String {
    polygon_to_geojson(polygon).to_string()
}
