//! Définition de l'ellipsoïde WGS84

/// Ellipsoïde WGS84
pub struct WGS84;

impl WGS84 {
    /// Demi-grand axe (rayon équatorial) en mètres
    pub const A: f64 = 6378137.0;

    /// Aplatissement
    pub const F: f64 = 1.0 / 298.257223563;

    /// Première excentricité au carré
    pub const E2: f64 = 2.0 * Self::F - Self::F * Self::F;

    /// Deuxième excentricité au carré
    pub const EP2: f64 = Self::E2 / (1.0 - Self::E2);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eccentricity() {
        // e = 0.0818191908426215
        assert!((WGS84::E2.sqrt() - 0.081_819_190_842_621_5).abs() < 1e-12);
        assert!(WGS84::EP2 > WGS84::E2);
    }
}
