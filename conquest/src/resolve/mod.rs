//! Résolution de territoire
//!
//! Le moteur est pur : il reçoit le parcours validé et les zones touchées
//! (trouvées par le stockage dans l'enveloppe de recherche) et rend un plan
//! ordonné de changements à appliquer dans une seule transaction.
//!
//! 1. réparation du parcours et enveloppe de recherche ([`TerritoryEngine::prepare`])
//! 2. soustraction du parcours de chaque zone rivale
//! 3. fusion du parcours avec les zones du joueur
//! 4. distance : périmètre métrique du parcours réparé

mod merge;
mod subtract;

use geo::{LineString, MultiPolygon, Polygon};
use serde::Serialize;
use tracing::debug;

use crate::config::EngineConfig;
use crate::projection::MetricProjection;
use crate::repair::{repair_polygon, SliverFilter};
use crate::types::{NewRegion, PlayerId, RegionId, TerritoryRegion};
use crate::validate::RouteValidator;
use crate::ConquestError;

/// Changement à appliquer au stockage
#[derive(Debug, Clone)]
pub enum RegionChange {
    /// Suppression d'une zone existante
    Delete(RegionId),

    /// Remplacement en place du polygone d'une zone (date de modification rafraîchie)
    Update {
        id: RegionId,
        polygon: Polygon,
        area_m2: f64,
    },

    /// Création d'une zone avec une identité neuve
    Create(NewRegion),
}

/// Compteurs d'une résolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionStats {
    pub rivals_examined: usize,
    pub rivals_deleted: usize,
    pub rivals_trimmed: usize,
    pub rivals_split: usize,
    pub rival_pieces_created: usize,
    /// Zones du joueur absorbées par la fusion
    pub own_absorbed: usize,
    /// Zones du joueur recréées après fusion
    pub own_created: usize,
}

/// Plan produit pour un parcours
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Changements dans l'ordre d'application
    pub changes: Vec<RegionChange>,

    /// Surface gagnée (m²), jamais négative
    pub area_gained_m2: f64,

    /// Périmètre du parcours (m)
    pub distance_m: f64,

    pub stats: ResolutionStats,
}

/// Parcours fermé, réparé, avec son enveloppe de recherche
#[derive(Debug, Clone)]
pub struct PreparedRoute {
    /// Polygone exactement fermé, tel qu'il sera enregistré
    pub polygon: Polygon,

    /// Emprise réparée, éventuellement vide
    pub repaired: MultiPolygon,

    /// Emprise dilatée de la marge de recherche
    pub envelope: MultiPolygon,

    pub distance_m: f64,
}

impl PreparedRoute {
    /// Enveloppe vide : aucune zone ne peut être touchée
    pub fn is_empty(&self) -> bool {
        self.repaired.0.is_empty()
    }
}

/// Moteur de conquête
#[derive(Debug, Clone)]
pub struct TerritoryEngine {
    config: EngineConfig,
    projection: MetricProjection,
    validator: RouteValidator,
    filter: SliverFilter,
}

impl TerritoryEngine {
    pub fn new(config: EngineConfig) -> Result<Self, ConquestError> {
        config.validate()?;
        let projection = config.projection()?;
        Ok(Self {
            config,
            projection,
            validator: RouteValidator::new(projection, config.closure_tolerance_m),
            filter: SliverFilter::new(projection, config.sliver_area_m2),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn projection(&self) -> MetricProjection {
        self.projection
    }

    pub fn validator(&self) -> &RouteValidator {
        &self.validator
    }

    pub fn filter(&self) -> &SliverFilter {
        &self.filter
    }

    /// Ferme, répare et enveloppe un anneau brut
    ///
    /// Seule entrée du moteur : l'anneau doit être pris tel que soumis, avant
    /// toute fermeture automatique (un `Polygon` geo est toujours fermé).
    /// Toutes les erreurs client sont levées ici, avant toute écriture.
    pub fn prepare(&self, ring: LineString) -> Result<PreparedRoute, ConquestError> {
        let polygon = self.validator.close_ring(ring)?;
        self.prepare_closed(polygon)
    }

    fn prepare_closed(&self, polygon: Polygon) -> Result<PreparedRoute, ConquestError> {
        let repaired = repair_polygon(&polygon);

        if repaired.0.is_empty() {
            debug!("Route repaired to an empty footprint");
            return Ok(PreparedRoute {
                polygon,
                repaired,
                envelope: MultiPolygon::new(Vec::new()),
                distance_m: 0.0,
            });
        }

        let envelope = self
            .projection
            .buffer_meters(&repaired, self.config.search_margin_m)?;

        let mut distance_m = 0.0;
        for part in &repaired {
            distance_m += self.projection.ring_length_m(part.exterior())?;
        }

        Ok(PreparedRoute {
            polygon,
            repaired,
            envelope,
            distance_m,
        })
    }

    /// Calcule le plan de changements pour un parcours
    ///
    /// `touching` contient les zones intersectant l'enveloppe, quel que soit
    /// leur propriétaire. Les zones de `owner` sont toutes supprimées puis
    /// remplacées par les morceaux de la fusion.
    pub fn resolve(
        &self,
        route: &PreparedRoute,
        owner: PlayerId,
        touching: &[TerritoryRegion],
    ) -> Resolution {
        let (mine, theirs): (Vec<&TerritoryRegion>, Vec<&TerritoryRegion>) =
            touching.iter().partition(|region| region.owner == owner);

        let mut stats = ResolutionStats::default();
        let mut changes =
            subtract::subtraction_pass(&route.repaired, &theirs, &self.filter, &mut stats);

        let merged = merge::merge_pass(&route.repaired, &mine, &self.filter, &self.projection);

        changes.extend(mine.iter().map(|region| RegionChange::Delete(region.id)));
        stats.own_absorbed = mine.len();

        if route.is_empty() {
            return Resolution {
                changes,
                area_gained_m2: 0.0,
                distance_m: 0.0,
                stats,
            };
        }

        stats.own_created = merged.pieces.len();
        changes.extend(merged.pieces.into_iter().map(|piece| {
            RegionChange::Create(NewRegion {
                owner,
                polygon: piece.polygon,
                area_m2: piece.area_m2,
            })
        }));

        Resolution {
            changes,
            area_gained_m2: merged.area_gained_m2,
            distance_m: route.distance_m,
            stats,
        }
    }
}

impl Default for TerritoryEngine {
    fn default() -> Self {
        let config = EngineConfig::default();
        let projection = MetricProjection::default();
        Self {
            config,
            projection,
            validator: RouteValidator::new(projection, config.closure_tolerance_m),
            filter: SliverFilter::new(projection, config.sliver_area_m2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, Coord};
    use std::time::SystemTime;

    fn metric_square(engine: &TerritoryEngine, x: f64, y: f64, side: f64) -> Polygon {
        let square = Polygon::new(
            LineString::from(vec![
                (500_000.0 + x, 5_000_000.0 + y),
                (500_000.0 + x + side, 5_000_000.0 + y),
                (500_000.0 + x + side, 5_000_000.0 + y + side),
                (500_000.0 + x, 5_000_000.0 + y + side),
                (500_000.0 + x, 5_000_000.0 + y),
            ]),
            vec![],
        );
        engine.projection().to_geographic(&square).unwrap()
    }

    fn metric_ring(engine: &TerritoryEngine, x: f64, y: f64, side: f64) -> LineString {
        metric_square(engine, x, y, side).into_inner().0
    }

    fn region(id: i64, owner: i64, polygon: Polygon, engine: &TerritoryEngine) -> TerritoryRegion {
        let now = SystemTime::now();
        TerritoryRegion {
            id: RegionId(id),
            owner: PlayerId(owner),
            area_m2: engine.projection().area_m2(&polygon).unwrap(),
            polygon,
            created_at: now,
            last_modified: now,
        }
    }

    #[test]
    fn test_prepare_square() {
        let engine = TerritoryEngine::default();
        let route = engine
            .prepare(metric_ring(&engine, 0.0, 0.0, 100.0))
            .unwrap();
        assert!((route.distance_m - 400.0).abs() < 0.1);
        assert!(route.envelope.unsigned_area() > route.repaired.unsigned_area());
    }

    #[test]
    fn test_resolve_on_empty_map() {
        let engine = TerritoryEngine::default();
        let route = engine
            .prepare(metric_ring(&engine, 0.0, 0.0, 100.0))
            .unwrap();
        let resolution = engine.resolve(&route, PlayerId(1), &[]);

        assert_eq!(resolution.changes.len(), 1);
        assert!(matches!(resolution.changes[0], RegionChange::Create(_)));
        assert!((resolution.area_gained_m2 - 10_000.0).abs() < 1.0);
    }

    #[test]
    fn test_change_order() {
        let engine = TerritoryEngine::default();
        let touching = vec![
            region(1, 2, metric_square(&engine, 50.0, 0.0, 100.0), &engine),
            region(2, 1, metric_square(&engine, -50.0, 0.0, 100.0), &engine),
        ];
        let route = engine
            .prepare(metric_ring(&engine, 0.0, 0.0, 100.0))
            .unwrap();
        let resolution = engine.resolve(&route, PlayerId(1), &touching);

        // Rival rogné, zone propre supprimée, puis recréée fusionnée
        assert!(matches!(
            resolution.changes[0],
            RegionChange::Update { id: RegionId(1), .. }
        ));
        assert!(matches!(resolution.changes[1], RegionChange::Delete(RegionId(2))));
        assert!(matches!(resolution.changes[2], RegionChange::Create(_)));
        assert_eq!(resolution.changes.len(), 3);
        assert!((resolution.area_gained_m2 - 5_000.0).abs() < 1.0);
    }

    #[test]
    fn test_degenerate_route_gains_nothing() {
        let engine = TerritoryEngine::default();
        let a = engine
            .projection()
            .unproject(Coord {
                x: 500_000.0,
                y: 5_000_000.0,
            })
            .unwrap();
        let b = engine
            .projection()
            .unproject(Coord {
                x: 500_100.0,
                y: 5_000_000.0,
            })
            .unwrap();
        // Aller-retour sur le même segment : surface nulle
        let c = Coord {
            x: (a.x + b.x) / 2.0,
            y: (a.y + b.y) / 2.0,
        };
        let flat = LineString::new(vec![a, b, c, a]);

        let route = engine.prepare(flat).unwrap();
        assert!(route.is_empty());
        let own = vec![region(7, 1, metric_square(&engine, 0.0, 0.0, 100.0), &engine)];
        let resolution = engine.resolve(&route, PlayerId(1), &own);

        assert_eq!(resolution.area_gained_m2, 0.0);
        assert_eq!(resolution.distance_m, 0.0);
        assert_eq!(resolution.changes.len(), 1);
        assert!(matches!(resolution.changes[0], RegionChange::Delete(RegionId(7))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            closure_tolerance_m: -1.0,
            ..EngineConfig::default()
        };
        assert!(TerritoryEngine::new(config).is_err());
    }
}
