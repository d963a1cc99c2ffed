//! Passe de fusion : le parcours rejoint le territoire du joueur

use geo::{Geometry, MultiPolygon};
use tracing::{debug, warn};

use crate::projection::MetricProjection;
use crate::repair::{repair, repair_polygon, MeasuredPolygon, SafeBooleanOps, SliverFilter};
use crate::types::TerritoryRegion;

/// Résultat de la fusion du parcours avec les zones du joueur
#[derive(Debug, Clone, Default)]
pub(crate) struct MergeOutcome {
    /// Surface des morceaux valides des zones existantes
    pub old_area_m2: f64,

    /// Surface de la géométrie fusionnée
    pub new_area_m2: f64,

    /// Gain net, ramené à 0 sous le seuil ε
    pub area_gained_m2: f64,

    /// Morceaux à persister pour le joueur
    pub pieces: Vec<MeasuredPolygon>,
}

pub(crate) fn merge_pass(
    route: &MultiPolygon,
    mine: &[&TerritoryRegion],
    filter: &SliverFilter,
    projection: &MetricProjection,
) -> MergeOutcome {
    let own: Vec<Geometry> = mine
        .iter()
        .map(|region| Geometry::MultiPolygon(repair_polygon(&region.polygon)))
        .collect();
    let old_area_m2: f64 = own.iter().map(|g| filter.valid_area_m2(g)).sum();

    if route.0.is_empty() {
        debug!(own_regions = mine.len(), "Empty route, nothing to merge");
        return MergeOutcome {
            old_area_m2,
            ..MergeOutcome::default()
        };
    }

    let mut merged = repair(route.clone());
    for piece in own.iter().flat_map(|g| filter.extract_valid_polygons(g)) {
        merged = merged.safe_union(&MultiPolygon::new(vec![piece]));
    }

    let pieces = filter.extract_measured(&Geometry::MultiPolygon(merged.clone()));

    let new_area_m2 = match projection.area_m2(&merged) {
        Ok(area) => area,
        Err(e) => {
            warn!(error = %e, "Merged territory cannot be measured as a whole, summing pieces");
            pieces.iter().map(|p| p.area_m2).sum()
        }
    };

    let mut area_gained_m2 = new_area_m2 - old_area_m2;
    if area_gained_m2 < filter.min_area_m2() {
        area_gained_m2 = 0.0;
    }

    debug!(
        own_regions = mine.len(),
        pieces = pieces.len(),
        old_area_m2,
        new_area_m2,
        area_gained_m2,
        "Route merged into own territory"
    );

    MergeOutcome {
        old_area_m2,
        new_area_m2,
        area_gained_m2,
        pieces,
    }
}
