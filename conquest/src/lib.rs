//! # conquest
//!
//! Moteur géométrique de conquête de territoire : un joueur enregistre un
//! parcours fermé, le parcours devient un polygone retiré du territoire des
//! rivaux et fusionné avec celui du joueur.
//!
//! ## Features
//!
//! - Validation de fermeture des parcours avec tolérance métrique
//! - Projection UTM en Rust pur pour les surfaces et distances
//! - Réparation topologique systématique autour des opérations booléennes
//! - Suppression des fragments dégénérés (slivers)
//! - Types `geo` pour l'interopérabilité avec l'écosystème Rust géospatial
//!
//! ## Usage
//!
//! ```rust,ignore
//! use conquest::{wire, EngineConfig, PlayerId, TerritoryEngine};
//!
//! let engine = TerritoryEngine::new(EngineConfig::default())?;
//! let route = engine.prepare(wire::parse_route(&geojson)?)?;
//!
//! // zones touchées, fournies par le stockage
//! let touching = store.find_regions_intersecting(&route.envelope)?;
//! let resolution = engine.resolve(&route, PlayerId(1), &touching);
//!
//! println!("Gain: {:.0} m², distance: {:.0} m", resolution.area_gained_m2, resolution.distance_m);
//! ```

pub mod config;
pub mod error;
pub mod projection;
pub mod repair;
pub mod resolve;
pub mod types;
pub mod validate;
pub mod wire;

pub use config::EngineConfig;
pub use error::ConquestError;
pub use projection::MetricProjection;
pub use repair::{SafeBooleanOps, SliverFilter};
pub use resolve::{PreparedRoute, RegionChange, Resolution, ResolutionStats, TerritoryEngine};
pub use types::{NewRegion, PlayerId, RegionId, RouteId, TerritoryRegion};
pub use validate::RouteValidator;
