//! Types d'erreurs pour le crate conquest

use thiserror::Error;

/// Erreurs remontées à l'appelant lors de la soumission d'un parcours
///
/// Toutes ces erreurs sont des erreurs client : elles sont levées avant
/// toute écriture. La réparation topologique et le filtre anti-slivers
/// ne produisent jamais d'erreur.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConquestError {
    /// Entrée illisible ou qui n'est pas un polygone
    #[error("Invalid geometry: {reason}")]
    InvalidGeometry { reason: String },

    /// Le parcours ne revient pas assez près de son point de départ
    #[error(
        "Route does not return close enough to its start: gap {gap_meters:.1} m (tolerance {tolerance_meters} m)"
    )]
    OpenRoute {
        gap_meters: f64,
        tolerance_meters: f64,
    },

    /// Coordonnée hors du domaine de la projection métrique
    #[error("Coordinate ({lon}, {lat}) outside projection domain: {reason}")]
    Projection { lon: f64, lat: f64, reason: String },

    /// Configuration du moteur incohérente
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),
}

impl ConquestError {
    /// Crée une erreur de géométrie invalide
    pub fn invalid_geometry(reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            reason: reason.into(),
        }
    }

    /// Crée une erreur de projection avec contexte
    pub fn projection(lon: f64, lat: f64, reason: impl Into<String>) -> Self {
        Self::Projection {
            lon,
            lat,
            reason: reason.into(),
        }
    }

    /// Indique si l'erreur est imputable à la requête du client
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::InvalidConfig(_))
    }
}
