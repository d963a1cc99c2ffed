//! Filtrage des fragments dégénérés (slivers)

use geo::{Geometry, Polygon};
use tracing::{trace, warn};

use crate::projection::MetricProjection;

/// Polygone conservé avec sa surface métrique
#[derive(Debug, Clone)]
pub struct MeasuredPolygon {
    pub polygon: Polygon,
    pub area_m2: f64,
}

/// Décompose une géométrie en polygones simples
///
/// Polygon, MultiPolygon et GeometryCollection (récursivement) ; les autres
/// types (points, lignes) sont ignorés.
pub fn extract_polygons(geometry: &Geometry) -> Vec<Polygon> {
    let mut polygons = Vec::new();
    collect_polygons(geometry, &mut polygons);
    polygons
}

fn collect_polygons(geometry: &Geometry, out: &mut Vec<Polygon>) {
    match geometry {
        Geometry::Polygon(p) => push_non_empty(p.clone(), out),
        Geometry::MultiPolygon(mp) => {
            for p in mp {
                push_non_empty(p.clone(), out);
            }
        }
        Geometry::Rect(r) => push_non_empty(r.to_polygon(), out),
        Geometry::Triangle(t) => push_non_empty(t.to_polygon(), out),
        Geometry::GeometryCollection(gc) => {
            for g in gc {
                collect_polygons(g, out);
            }
        }
        _ => {}
    }
}

fn push_non_empty(polygon: Polygon, out: &mut Vec<Polygon>) {
    if !polygon.exterior().0.is_empty() {
        out.push(polygon);
    }
}

/// Supprime les polygones dont la surface métrique est inférieure à ε
#[derive(Debug, Clone, Copy)]
pub struct SliverFilter {
    projection: MetricProjection,
    min_area_m2: f64,
}

impl SliverFilter {
    pub fn new(projection: MetricProjection, min_area_m2: f64) -> Self {
        Self {
            projection,
            min_area_m2,
        }
    }

    /// Seuil ε en m²
    pub fn min_area_m2(&self) -> f64 {
        self.min_area_m2
    }

    /// Polygones conservés, avec leur surface
    ///
    /// Ne lève jamais d'erreur : un fragment dont la surface ne peut pas être
    /// mesurée (hors domaine de projection) est écarté.
    pub fn extract_measured(&self, geometry: &Geometry) -> Vec<MeasuredPolygon> {
        extract_polygons(geometry)
            .into_iter()
            .filter_map(|polygon| {
                let area_m2 = match self.projection.area_m2(&polygon) {
                    Ok(area) => area,
                    Err(e) => {
                        warn!(error = %e, "Dropping polygon piece that cannot be measured");
                        return None;
                    }
                };
                if area_m2 < self.min_area_m2 {
                    trace!(area_m2, min_area_m2 = self.min_area_m2, "Sliver discarded");
                    return None;
                }
                Some(MeasuredPolygon { polygon, area_m2 })
            })
            .collect()
    }

    /// Polygones dont la surface est au moins ε
    pub fn extract_valid_polygons(&self, geometry: &Geometry) -> Vec<Polygon> {
        self.extract_measured(geometry)
            .into_iter()
            .map(|m| m.polygon)
            .collect()
    }

    /// Somme des surfaces des polygones non dégénérés
    pub fn valid_area_m2(&self, geometry: &Geometry) -> f64 {
        self.extract_measured(geometry).iter().map(|m| m.area_m2).sum()
    }
}
