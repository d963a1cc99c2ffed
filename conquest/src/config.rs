//! Paramètres du moteur de conquête

use serde::{Deserialize, Serialize};

use crate::projection::MetricProjection;
use crate::ConquestError;

/// Tolérance de fermeture d'un parcours par défaut (mètres)
pub const DEFAULT_CLOSURE_TOLERANCE_M: f64 = 10.0;

/// Marge du buffer de recherche des zones touchées (mètres)
pub const DEFAULT_SEARCH_MARGIN_M: f64 = 10.0;

/// Surface minimale d'une zone (m²), en dessous c'est un sliver
pub const DEFAULT_SLIVER_AREA_M2: f64 = 30.0;

/// Configuration du moteur
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Distance max entre premier et dernier point d'un parcours
    pub closure_tolerance_m: f64,

    /// Marge autour du parcours pour attraper les zones adjacentes
    pub search_margin_m: f64,

    /// Surface minimale (ε) d'une zone persistée
    pub sliver_area_m2: f64,

    /// Zone UTM de la projection métrique
    pub utm_zone: u8,

    /// Hémisphère sud pour la zone UTM
    pub southern_hemisphere: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            closure_tolerance_m: DEFAULT_CLOSURE_TOLERANCE_M,
            search_margin_m: DEFAULT_SEARCH_MARGIN_M,
            sliver_area_m2: DEFAULT_SLIVER_AREA_M2,
            utm_zone: 34,
            southern_hemisphere: false,
        }
    }
}

impl EngineConfig {
    /// Vérifie la cohérence des paramètres
    pub fn validate(&self) -> Result<(), ConquestError> {
        let positive = [
            ("closure_tolerance_m", self.closure_tolerance_m),
            ("search_margin_m", self.search_margin_m),
            ("sliver_area_m2", self.sliver_area_m2),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConquestError::InvalidConfig(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        self.projection().map(|_| ())
    }

    /// Projection métrique correspondant à la configuration
    pub fn projection(&self) -> Result<MetricProjection, ConquestError> {
        MetricProjection::utm(self.utm_zone, self.southern_hemisphere)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.projection().unwrap().epsg(), 32634);
    }

    #[test]
    fn test_partial_json() {
        let config: EngineConfig = serde_json::from_str(r#"{"sliver_area_m2": 50.0}"#).unwrap();
        assert_eq!(config.sliver_area_m2, 50.0);
        assert_eq!(config.closure_tolerance_m, DEFAULT_CLOSURE_TOLERANCE_M);
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = EngineConfig {
            sliver_area_m2: 0.0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            utm_zone: 75,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
