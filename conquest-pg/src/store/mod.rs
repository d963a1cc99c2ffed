//! Passerelle de persistance
//!
//! Le moteur ne connaît que [`TerritoryGateway`] : une unité de travail
//! transactionnelle. Deux implémentations :
//! - [`postgres::PgUnitOfWork`] : transaction PostGIS, zones touchées verrouillées
//!   par `SELECT … FOR UPDATE`
//! - [`memory::MemoryTransaction`] : copie de travail d'un état en mémoire,
//!   publiée seulement au commit
//!
//! Une unité de travail abandonnée sans `commit` n'a aucun effet.

pub mod memory;
pub mod pool;
pub mod postgres;

use std::time::SystemTime;

use anyhow::Result;
use geo::{MultiPolygon, Polygon};
use serde::Serialize;

use conquest::{NewRegion, PlayerId, RegionId, RouteId, TerritoryRegion};

pub use memory::{MemoryStore, MemoryTransaction};
pub use pool::{create_pool, ConnectionOverrides, DatabaseConfig, SslMode};
pub use postgres::{PgStore, PgUnitOfWork};

/// Joueur enregistré
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    /// Pseudo unique
    pub handle: String,
    /// Adresse de contact unique
    pub contact: String,
    /// Secret opaque, comparé tel quel
    pub credential: String,
    pub created_at: SystemTime,
}

/// Joueur à créer
#[derive(Debug, Clone)]
pub struct NewPlayer {
    pub handle: String,
    pub contact: String,
    pub credential: String,
}

/// Parcours enregistré
#[derive(Debug, Clone, Serialize)]
pub struct RouteRecord {
    pub id: RouteId,
    pub owner: PlayerId,
    #[serde(skip)]
    pub polygon: Polygon,
    #[serde(skip)]
    pub created_at: SystemTime,
    /// Périmètre (m), écrit une seule fois par le moteur
    pub distance_m: f64,
    /// Surface gagnée (m²), écrite une seule fois par le moteur
    pub area_gained_m2: f64,
    /// Durée de la course en secondes
    pub duration_s: Option<i64>,
}

/// Parcours à insérer, avant calcul des métriques
#[derive(Debug, Clone)]
pub struct NewRoute {
    pub owner: PlayerId,
    pub polygon: Polygon,
    pub duration_s: Option<i64>,
}

/// Unité de travail transactionnelle sur le stockage
#[allow(async_fn_in_trait)]
pub trait TerritoryGateway {
    /// Zones dont le polygone intersecte l'enveloppe, verrouillées jusqu'au commit
    async fn find_regions_intersecting(
        &mut self,
        envelope: &MultiPolygon,
    ) -> Result<Vec<TerritoryRegion>>;

    /// Crée une zone avec une identité neuve
    async fn create_region(&mut self, region: &NewRegion) -> Result<RegionId>;

    /// Remplace le polygone d'une zone et rafraîchit sa date de modification
    async fn update_region(&mut self, id: RegionId, polygon: &Polygon, area_m2: f64)
        -> Result<()>;

    async fn delete_region(&mut self, id: RegionId) -> Result<()>;

    /// Supprime un lot de zones, renvoie le nombre supprimé
    async fn delete_regions(&mut self, ids: &[RegionId]) -> Result<u64>;

    /// Insère un parcours sans métriques
    async fn insert_route(&mut self, route: &NewRoute) -> Result<RouteRecord>;

    /// Enregistre les métriques d'un parcours déjà inséré
    async fn save_route(&mut self, route: &RouteRecord) -> Result<()>;

    async fn find_route(&mut self, id: RouteId) -> Result<Option<RouteRecord>>;

    async fn routes_by_owner(&mut self, owner: PlayerId) -> Result<Vec<RouteRecord>>;

    /// Supprime un parcours ; le territoire n'est pas modifié
    async fn delete_route(&mut self, id: RouteId) -> Result<bool>;

    async fn find_player(&mut self, id: PlayerId) -> Result<Option<Player>>;

    async fn find_player_by_handle(&mut self, handle: &str) -> Result<Option<Player>>;

    async fn find_player_by_contact(&mut self, contact: &str) -> Result<Option<Player>>;

    async fn insert_player(&mut self, player: &NewPlayer) -> Result<Player>;

    async fn list_players(&mut self) -> Result<Vec<Player>>;

    async fn find_region(&mut self, id: RegionId) -> Result<Option<TerritoryRegion>>;

    async fn regions_by_owner(&mut self, owner: PlayerId) -> Result<Vec<TerritoryRegion>>;

    async fn all_regions(&mut self) -> Result<Vec<TerritoryRegion>>;

    /// Valide toutes les écritures de l'unité de travail
    async fn commit(self) -> Result<()>
    where
        Self: Sized;
}
