//! Opérations de service : soumission de parcours, joueurs, statistiques
//!
//! Chaque opération d'écriture consomme une unité de travail et la valide à
//! la fin ; une erreur à n'importe quelle étape l'abandonne, ce qui annule
//! toutes ses écritures.

use std::collections::HashMap;
use std::time::Instant;

use geo::LineString;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use conquest::{
    wire, ConquestError, EngineConfig, PlayerId, RegionChange, RegionId, Resolution, RouteId,
    TerritoryEngine, TerritoryRegion,
};

use crate::store::{NewPlayer, NewRoute, Player, RouteRecord, TerritoryGateway};

/// Erreurs des opérations de service
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Parcours refusé par le moteur (géométrie, fermeture, projection)
    #[error(transparent)]
    Rejected(#[from] ConquestError),

    #[error("Unknown player: {0}")]
    UnknownPlayer(PlayerId),

    #[error("Unknown player handle: {0}")]
    UnknownHandle(String),

    /// Pseudo ou adresse de contact déjà pris
    #[error("Player already exists: {0}")]
    DuplicatePlayer(String),

    /// Champ requis vide ou invalide
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Route not found: {0}")]
    RouteNotFound(RouteId),

    #[error("Region not found: {0}")]
    RegionNotFound(RegionId),

    /// Échec du stockage ; l'unité de travail est annulée
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ServiceError {
    /// Erreur imputable à la requête du client
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Rejected(e) => e.is_client_error(),
            Self::Storage(_) => false,
            _ => true,
        }
    }
}

/// Statistiques cumulées d'un joueur
#[derive(Debug, Clone, Serialize)]
pub struct PlayerStats {
    pub player: PlayerId,
    pub handle: String,
    pub total_area_m2: f64,
    pub total_distance_m: f64,
    pub total_duration_s: i64,
    pub route_count: usize,
    pub region_count: usize,
}

/// Ligne du classement
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub player: PlayerId,
    pub handle: String,
    pub total_area_m2: f64,
    pub region_count: usize,
}

/// Taille par défaut du classement
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

/// Service de conquête, indépendant du stockage
#[derive(Debug, Clone)]
pub struct TerritoryService {
    engine: TerritoryEngine,
}

impl TerritoryService {
    pub fn new(config: EngineConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            engine: TerritoryEngine::new(config)?,
        })
    }

    pub fn engine(&self) -> &TerritoryEngine {
        &self.engine
    }

    /// Soumet un parcours GeoJSON
    pub async fn submit_route<G: TerritoryGateway>(
        &self,
        gateway: G,
        owner: PlayerId,
        geojson: &str,
        duration_s: Option<i64>,
    ) -> Result<RouteRecord, ServiceError> {
        let ring = wire::parse_route(geojson)?;
        self.submit_ring(gateway, owner, ring, duration_s).await
    }

    /// Soumet un anneau brut
    ///
    /// Les erreurs client sont levées avant la première écriture. Les
    /// changements du plan sont appliqués dans l'ordre : zones rivales,
    /// suppression des zones du joueur, créations.
    pub async fn submit_ring<G: TerritoryGateway>(
        &self,
        mut gateway: G,
        owner: PlayerId,
        ring: LineString,
        duration_s: Option<i64>,
    ) -> Result<RouteRecord, ServiceError> {
        let started = Instant::now();
        let route = self.engine.prepare(ring)?;

        if gateway.find_player(owner).await?.is_none() {
            return Err(ServiceError::UnknownPlayer(owner));
        }

        let mut record = gateway
            .insert_route(&NewRoute {
                owner,
                polygon: route.polygon.clone(),
                duration_s,
            })
            .await?;

        let touching = gateway.find_regions_intersecting(&route.envelope).await?;
        debug!(
            route_id = %record.id,
            touching = touching.len(),
            "Regions found in search envelope"
        );

        let resolution = self.engine.resolve(&route, owner, &touching);
        apply_changes(&mut gateway, &resolution).await?;

        record.distance_m = resolution.distance_m;
        record.area_gained_m2 = resolution.area_gained_m2;
        gateway.save_route(&record).await?;
        gateway.commit().await?;

        info!(
            route_id = %record.id,
            owner = %owner,
            area_gained_m2 = record.area_gained_m2,
            distance_m = record.distance_m,
            changes = resolution.changes.len(),
            rivals_split = resolution.stats.rivals_split,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Route resolved"
        );

        Ok(record)
    }

    /// Enregistre un joueur ; pseudo et contact doivent être libres
    pub async fn register_player<G: TerritoryGateway>(
        &self,
        mut gateway: G,
        player: NewPlayer,
    ) -> Result<Player, ServiceError> {
        if player.handle.trim().is_empty() || player.contact.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "handle and contact are required".into(),
            ));
        }
        if gateway.find_player_by_handle(&player.handle).await?.is_some() {
            return Err(ServiceError::DuplicatePlayer(player.handle));
        }
        if gateway.find_player_by_contact(&player.contact).await?.is_some() {
            return Err(ServiceError::DuplicatePlayer(player.contact));
        }

        let created = gateway.insert_player(&player).await?;
        gateway.commit().await?;

        info!(player_id = %created.id, handle = %created.handle, "Player registered");
        Ok(created)
    }

    /// Vérifie un secret par comparaison directe
    pub async fn authenticate<G: TerritoryGateway>(
        &self,
        gateway: &mut G,
        handle: &str,
        credential: &str,
    ) -> Result<Player, ServiceError> {
        match gateway.find_player_by_handle(handle).await? {
            Some(player) if player.credential == credential => Ok(player),
            Some(_) => {
                warn!(handle = %handle, "Credential mismatch");
                Err(ServiceError::AuthenticationFailed)
            }
            None => Err(ServiceError::AuthenticationFailed),
        }
    }

    pub async fn player_stats<G: TerritoryGateway>(
        &self,
        gateway: &mut G,
        id: PlayerId,
    ) -> Result<PlayerStats, ServiceError> {
        let player = gateway
            .find_player(id)
            .await?
            .ok_or(ServiceError::UnknownPlayer(id))?;
        let regions = gateway.regions_by_owner(id).await?;
        let routes = gateway.routes_by_owner(id).await?;

        Ok(PlayerStats {
            player: id,
            handle: player.handle,
            total_area_m2: regions.iter().map(|r| r.area_m2).sum(),
            total_distance_m: routes.iter().map(|r| r.distance_m).sum(),
            total_duration_s: routes.iter().filter_map(|r| r.duration_s).sum(),
            route_count: routes.len(),
            region_count: regions.len(),
        })
    }

    /// Joueurs triés par surface totale décroissante
    pub async fn leaderboard<G: TerritoryGateway>(
        &self,
        gateway: &mut G,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, ServiceError> {
        let players = gateway.list_players().await?;
        let mut totals: HashMap<PlayerId, (f64, usize)> = HashMap::new();
        for region in gateway.all_regions().await? {
            let entry = totals.entry(region.owner).or_default();
            entry.0 += region.area_m2;
            entry.1 += 1;
        }

        let mut rows: Vec<(Player, f64, usize)> = players
            .into_iter()
            .map(|player| {
                let (area, count) = totals.get(&player.id).copied().unwrap_or_default();
                (player, area, count)
            })
            .collect();
        rows.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.id.cmp(&b.0.id)));

        Ok(rows
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, (player, total_area_m2, region_count))| LeaderboardEntry {
                rank: i + 1,
                player: player.id,
                handle: player.handle,
                total_area_m2,
                region_count,
            })
            .collect())
    }

    pub async fn routes_of<G: TerritoryGateway>(
        &self,
        gateway: &mut G,
        owner: PlayerId,
    ) -> Result<Vec<RouteRecord>, ServiceError> {
        if gateway.find_player(owner).await?.is_none() {
            return Err(ServiceError::UnknownPlayer(owner));
        }
        Ok(gateway.routes_by_owner(owner).await?)
    }

    /// Parcours d'un joueur désigné par son pseudo
    pub async fn routes_of_handle<G: TerritoryGateway>(
        &self,
        gateway: &mut G,
        handle: &str,
    ) -> Result<Vec<RouteRecord>, ServiceError> {
        let player = gateway
            .find_player_by_handle(handle)
            .await?
            .ok_or_else(|| ServiceError::UnknownHandle(handle.to_string()))?;
        Ok(gateway.routes_by_owner(player.id).await?)
    }

    pub async fn region<G: TerritoryGateway>(
        &self,
        gateway: &mut G,
        id: RegionId,
    ) -> Result<TerritoryRegion, ServiceError> {
        gateway
            .find_region(id)
            .await?
            .ok_or(ServiceError::RegionNotFound(id))
    }

    pub async fn route<G: TerritoryGateway>(
        &self,
        gateway: &mut G,
        id: RouteId,
    ) -> Result<RouteRecord, ServiceError> {
        gateway
            .find_route(id)
            .await?
            .ok_or(ServiceError::RouteNotFound(id))
    }

    /// Supprime un parcours ; le territoire conquis reste acquis
    pub async fn delete_route<G: TerritoryGateway>(
        &self,
        mut gateway: G,
        id: RouteId,
    ) -> Result<(), ServiceError> {
        if !gateway.delete_route(id).await? {
            return Err(ServiceError::RouteNotFound(id));
        }
        gateway.commit().await?;
        info!(route_id = %id, "Route deleted");
        Ok(())
    }
}

/// Applique un plan de résolution dans l'ordre
async fn apply_changes<G: TerritoryGateway>(
    gateway: &mut G,
    resolution: &Resolution,
) -> anyhow::Result<()> {
    // Les suppressions consécutives partent en un seul lot
    let mut pending: Vec<RegionId> = Vec::new();

    for change in &resolution.changes {
        match change {
            RegionChange::Delete(id) => {
                pending.push(*id);
                continue;
            }
            RegionChange::Update {
                id,
                polygon,
                area_m2,
            } => {
                flush_deletes(gateway, &mut pending).await?;
                gateway.update_region(*id, polygon, *area_m2).await?;
            }
            RegionChange::Create(region) => {
                flush_deletes(gateway, &mut pending).await?;
                let id = gateway.create_region(region).await?;
                debug!(region_id = %id, owner = %region.owner, area_m2 = region.area_m2, "Region created");
            }
        }
    }
    flush_deletes(gateway, &mut pending).await
}

async fn flush_deletes<G: TerritoryGateway>(
    gateway: &mut G,
    pending: &mut Vec<RegionId>,
) -> anyhow::Result<()> {
    match pending.len() {
        0 => return Ok(()),
        1 => gateway.delete_region(pending[0]).await?,
        n => {
            let deleted = gateway.delete_regions(pending).await?;
            if deleted != n as u64 {
                anyhow::bail!("Expected to delete {} regions, deleted {}", n, deleted);
            }
        }
    }
    pending.clear();
    Ok(())
}
