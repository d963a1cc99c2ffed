//! Types de données pour le crate conquest

use std::fmt;
use std::time::SystemTime;

use geo::Polygon;
use serde::{Deserialize, Serialize};

macro_rules! identity {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

identity!(
    /// Identifiant d'un joueur
    PlayerId
);

identity!(
    /// Identifiant d'une zone de territoire
    ///
    /// Chaque création produit une identité neuve, jamais réutilisée après
    /// suppression.
    RegionId
);

identity!(
    /// Identifiant d'un parcours
    RouteId
);

/// Zone de territoire persistée, possédée par un joueur
#[derive(Debug, Clone)]
pub struct TerritoryRegion {
    pub id: RegionId,

    pub owner: PlayerId,

    /// Polygone en coordonnées géographiques (lon, lat)
    pub polygon: Polygon,

    pub created_at: SystemTime,

    pub last_modified: SystemTime,

    /// Surface métrique (m²) calculée à l'enregistrement
    pub area_m2: f64,
}

/// Zone à créer ; l'identité est attribuée par le stockage
#[derive(Debug, Clone)]
pub struct NewRegion {
    pub owner: PlayerId,

    pub polygon: Polygon,

    pub area_m2: f64,
}
