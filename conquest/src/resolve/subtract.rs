//! Passe de soustraction : le parcours retire du terrain aux rivaux

use geo::{Geometry, MultiPolygon};
use rayon::prelude::*;
use tracing::debug;

use super::{RegionChange, ResolutionStats};
use crate::repair::{repair_polygon, MeasuredPolygon, SafeBooleanOps, SliverFilter};
use crate::types::{NewRegion, TerritoryRegion};

/// Sort d'une zone rivale après soustraction du parcours
#[derive(Debug, Clone)]
pub(crate) enum RivalOutcome {
    /// Plus rien, ou seulement des slivers
    Deleted,
    /// Un seul morceau : mise à jour en place
    Trimmed(MeasuredPolygon),
    /// Plusieurs morceaux : une zone neuve par morceau
    Split(Vec<MeasuredPolygon>),
}

/// Calcule `rival − route`
pub(crate) fn subtract_route(
    route: &MultiPolygon,
    rival: &TerritoryRegion,
    filter: &SliverFilter,
) -> RivalOutcome {
    let remainder = repair_polygon(&rival.polygon).safe_difference(route);
    if remainder.0.is_empty() {
        return RivalOutcome::Deleted;
    }

    let mut pieces = filter.extract_measured(&Geometry::MultiPolygon(remainder));
    match pieces.len() {
        0 => RivalOutcome::Deleted,
        1 => RivalOutcome::Trimmed(pieces.remove(0)),
        _ => RivalOutcome::Split(pieces),
    }
}

/// Soustrait le parcours de chaque zone rivale
///
/// Les différences sont calculées en parallèle ; les changements sont émis
/// dans l'ordre des zones reçues.
pub(crate) fn subtraction_pass(
    route: &MultiPolygon,
    rivals: &[&TerritoryRegion],
    filter: &SliverFilter,
    stats: &mut ResolutionStats,
) -> Vec<RegionChange> {
    let outcomes: Vec<RivalOutcome> = rivals
        .par_iter()
        .map(|rival| subtract_route(route, rival, filter))
        .collect();

    let mut changes = Vec::with_capacity(outcomes.len());
    for (rival, outcome) in rivals.iter().zip(outcomes) {
        stats.rivals_examined += 1;
        match outcome {
            RivalOutcome::Deleted => {
                debug!(region_id = %rival.id, owner = %rival.owner, "Rival region fully conquered");
                stats.rivals_deleted += 1;
                changes.push(RegionChange::Delete(rival.id));
            }
            RivalOutcome::Trimmed(piece) => {
                debug!(
                    region_id = %rival.id,
                    owner = %rival.owner,
                    area_before = rival.area_m2,
                    area_after = piece.area_m2,
                    "Rival region trimmed"
                );
                stats.rivals_trimmed += 1;
                changes.push(RegionChange::Update {
                    id: rival.id,
                    polygon: piece.polygon,
                    area_m2: piece.area_m2,
                });
            }
            RivalOutcome::Split(pieces) => {
                debug!(
                    region_id = %rival.id,
                    owner = %rival.owner,
                    pieces = pieces.len(),
                    "Rival region split"
                );
                stats.rivals_split += 1;
                stats.rival_pieces_created += pieces.len();
                changes.push(RegionChange::Delete(rival.id));
                changes.extend(pieces.into_iter().map(|piece| {
                    RegionChange::Create(NewRegion {
                        owner: rival.owner,
                        polygon: piece.polygon,
                        area_m2: piece.area_m2,
                    })
                }));
            }
        }
    }
    changes
}
