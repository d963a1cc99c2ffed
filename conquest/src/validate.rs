//! Validation de la fermeture d'un parcours
//!
//! Seul point d'entrée des anneaux vers le moteur : aucune opération
//! booléenne ne reçoit un anneau ouvert.

use geo::{Contains, Coord, LineString, Point, Polygon};
use tracing::warn;

use crate::projection::MetricProjection;
use crate::ConquestError;

/// Vérifie qu'un parcours revient à son point de départ et le ferme
#[derive(Debug, Clone, Copy)]
pub struct RouteValidator {
    projection: MetricProjection,
    tolerance_m: f64,
}

impl RouteValidator {
    pub fn new(projection: MetricProjection, tolerance_m: f64) -> Self {
        Self {
            projection,
            tolerance_m,
        }
    }

    /// Tolérance de fermeture en mètres
    pub fn tolerance_m(&self) -> f64 {
        self.tolerance_m
    }

    /// Ferme un anneau brut tel que soumis
    ///
    /// Le dernier point doit tomber dans un disque de `tolerance_m` autour du
    /// premier ; s'il en diffère, il est remplacé par le premier.
    pub fn close_ring(&self, ring: LineString) -> Result<Polygon, ConquestError> {
        let mut coords = ring.0;
        if coords.len() < 3 {
            return Err(ConquestError::invalid_geometry(format!(
                "route ring needs at least 3 positions, got {}",
                coords.len()
            )));
        }

        // Toute la trace doit être projetable avant d'aller plus loin
        self.projection.to_metric(&LineString::new(coords.clone()))?;

        let first = coords[0];
        let last = coords[coords.len() - 1];

        if first != last {
            let disk = self
                .projection
                .buffer_meters(&Point::from(first), self.tolerance_m)?;

            if !disk.contains(&Point::from(last)) {
                return Err(ConquestError::OpenRoute {
                    gap_meters: self.gap_m(first, last)?,
                    tolerance_meters: self.tolerance_m,
                });
            }

            warn!(
                points = coords.len(),
                gap_meters = self.gap_m(first, last)?,
                "Auto-closing route ring"
            );
            let end = coords.len() - 1;
            coords[end] = first;
        }

        if coords.len() < 4 {
            return Err(ConquestError::invalid_geometry(format!(
                "closed route ring needs at least 4 positions, got {}",
                coords.len()
            )));
        }

        Ok(Polygon::new(LineString::new(coords), vec![]))
    }

    /// Distance métrique entre deux points géographiques
    fn gap_m(&self, a: Coord, b: Coord) -> Result<f64, ConquestError> {
        let pa = self.projection.project(a)?;
        let pb = self.projection.project(b)?;
        Ok((pa.x - pb.x).hypot(pa.y - pb.y))
    }
}
