//! Réparation topologique et filtrage des slivers
//!
//! La capture GPS et les unions/différences successives introduisent
//! régulièrement des micro-invalidités (auto-intersections, épines de
//! largeur nulle). Toute opération booléenne du moteur passe donc par
//! [`SafeBooleanOps`], qui répare les opérandes et le résultat.

pub mod sliver;

use geo::{Area, BooleanOps, BoundingRect, MultiPolygon, Polygon, Validation};
use tracing::debug;

pub use sliver::{extract_polygons, MeasuredPolygon, SliverFilter};

/// Rapport surface / diagonale² en dessous duquel un polygone est plat
const FLATNESS_RATIO: f64 = 1e-6;

/// Répare une géométrie invalide, renvoie telle quelle une géométrie valide
///
/// Équivalent d'un `buffer(0)` : la géométrie est recalculée par un overlay
/// d'elle-même, ce qui résout les auto-intersections mineures en conservant
/// son emprise. Un polygone de surface nulle (anneau colinéaire) est
/// invalide et disparaît. L'opération est idempotente. Le résultat peut être
/// vide, ce n'est pas une erreur.
pub fn repair(geometry: MultiPolygon) -> MultiPolygon {
    if geometry.0.is_empty() {
        return geometry;
    }
    if !geometry.0.iter().any(is_flat) && geometry.is_valid() {
        return geometry;
    }

    let overlaid = geometry.union(&MultiPolygon::new(Vec::new()));
    let repaired = MultiPolygon::new(overlaid.0.into_iter().filter(|p| !is_flat(p)).collect());
    debug!(
        before = geometry.0.len(),
        after = repaired.0.len(),
        "Repaired invalid polygon topology"
    );
    repaired
}

/// Surface négligeable devant l'étendue de l'anneau extérieur
///
/// Un nœud papillon est aussi reconnu (surface signée nulle) ; l'overlay le
/// résout ensuite en deux triangles.
fn is_flat(polygon: &Polygon) -> bool {
    match polygon.exterior().bounding_rect() {
        Some(rect) => {
            let diagonal2 = rect.width().powi(2) + rect.height().powi(2);
            polygon.unsigned_area() <= FLATNESS_RATIO * diagonal2
        }
        None => true,
    }
}

/// Répare un polygone isolé
pub fn repair_polygon(polygon: &Polygon) -> MultiPolygon {
    repair(MultiPolygon::new(vec![polygon.clone()]))
}

/// Opérations booléennes encadrées par la réparation topologique
///
/// Seules primitives booléennes utilisées par le moteur : les deux opérandes
/// et le résultat sont systématiquement réparés.
pub trait SafeBooleanOps {
    /// Union réparée
    fn safe_union(&self, other: &MultiPolygon) -> MultiPolygon;

    /// Différence réparée (`self − other`)
    fn safe_difference(&self, other: &MultiPolygon) -> MultiPolygon;
}

impl SafeBooleanOps for MultiPolygon {
    fn safe_union(&self, other: &MultiPolygon) -> MultiPolygon {
        let left = repair(self.clone());
        let right = repair(other.clone());
        repair(left.union(&right))
    }

    fn safe_difference(&self, other: &MultiPolygon) -> MultiPolygon {
        let left = repair(self.clone());
        if left.0.is_empty() {
            return left;
        }
        let right = repair(other.clone());
        repair(left.difference(&right))
    }
}

impl SafeBooleanOps for Polygon {
    fn safe_union(&self, other: &MultiPolygon) -> MultiPolygon {
        MultiPolygon::new(vec![self.clone()]).safe_union(other)
    }

    fn safe_difference(&self, other: &MultiPolygon) -> MultiPolygon {
        MultiPolygon::new(vec![self.clone()]).safe_difference(other)
    }
}
