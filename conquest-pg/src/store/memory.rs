//! Stockage en mémoire
//!
//! Sert au rejeu de journaux de parcours sans base de données et aux tests.
//! La recherche spatiale est un balayage linéaire.

use std::collections::BTreeMap;
use std::time::SystemTime;

use anyhow::{Context, Result};
use geo::{Intersects, MultiPolygon, Polygon};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use conquest::{NewRegion, PlayerId, RegionId, RouteId, TerritoryRegion};

use super::{NewPlayer, NewRoute, Player, RouteRecord, TerritoryGateway};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    players: BTreeMap<PlayerId, Player>,
    regions: BTreeMap<RegionId, TerritoryRegion>,
    routes: BTreeMap<RouteId, RouteRecord>,
    // Compteurs jamais décrémentés : une identité n'est jamais réutilisée
    last_player: i64,
    last_region: i64,
    last_route: i64,
}

/// Stockage en mémoire sérialisé par un verrou unique
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ouvre une unité de travail
    ///
    /// Le verrou est tenu jusqu'au commit ou à l'abandon de la transaction.
    pub async fn begin(&self) -> MemoryTransaction<'_> {
        let guard = self.state.lock().await;
        let work = guard.clone();
        MemoryTransaction { guard, work }
    }

    /// Nombre de zones publiées
    pub async fn region_count(&self) -> usize {
        self.state.lock().await.regions.len()
    }
}

/// Copie de travail, publiée au commit
pub struct MemoryTransaction<'a> {
    guard: MutexGuard<'a, MemoryState>,
    work: MemoryState,
}

impl MemoryTransaction<'_> {
    fn region_mut(&mut self, id: RegionId) -> Result<&mut TerritoryRegion> {
        self.work
            .regions
            .get_mut(&id)
            .with_context(|| format!("Region {} not found", id))
    }
}

impl TerritoryGateway for MemoryTransaction<'_> {
    async fn find_regions_intersecting(
        &mut self,
        envelope: &MultiPolygon,
    ) -> Result<Vec<TerritoryRegion>> {
        Ok(self
            .work
            .regions
            .values()
            .filter(|region| envelope.intersects(&region.polygon))
            .cloned()
            .collect())
    }

    async fn create_region(&mut self, region: &NewRegion) -> Result<RegionId> {
        self.work.last_region += 1;
        let id = RegionId(self.work.last_region);
        let now = SystemTime::now();
        self.work.regions.insert(
            id,
            TerritoryRegion {
                id,
                owner: region.owner,
                polygon: region.polygon.clone(),
                created_at: now,
                last_modified: now,
                area_m2: region.area_m2,
            },
        );
        Ok(id)
    }

    async fn update_region(
        &mut self,
        id: RegionId,
        polygon: &Polygon,
        area_m2: f64,
    ) -> Result<()> {
        let region = self.region_mut(id)?;
        region.polygon = polygon.clone();
        region.area_m2 = area_m2;
        region.last_modified = SystemTime::now();
        Ok(())
    }

    async fn delete_region(&mut self, id: RegionId) -> Result<()> {
        self.work
            .regions
            .remove(&id)
            .map(|_| ())
            .with_context(|| format!("Region {} not found", id))
    }

    async fn delete_regions(&mut self, ids: &[RegionId]) -> Result<u64> {
        let mut deleted = 0;
        for id in ids {
            if self.work.regions.remove(id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn insert_route(&mut self, route: &NewRoute) -> Result<RouteRecord> {
        self.work.last_route += 1;
        let record = RouteRecord {
            id: RouteId(self.work.last_route),
            owner: route.owner,
            polygon: route.polygon.clone(),
            created_at: SystemTime::now(),
            distance_m: 0.0,
            area_gained_m2: 0.0,
            duration_s: route.duration_s,
        };
        self.work.routes.insert(record.id, record.clone());
        Ok(record)
    }

    async fn save_route(&mut self, route: &RouteRecord) -> Result<()> {
        let stored = self
            .work
            .routes
            .get_mut(&route.id)
            .with_context(|| format!("Route {} not found", route.id))?;
        stored.distance_m = route.distance_m;
        stored.area_gained_m2 = route.area_gained_m2;
        Ok(())
    }

    async fn find_route(&mut self, id: RouteId) -> Result<Option<RouteRecord>> {
        Ok(self.work.routes.get(&id).cloned())
    }

    async fn routes_by_owner(&mut self, owner: PlayerId) -> Result<Vec<RouteRecord>> {
        Ok(self
            .work
            .routes
            .values()
            .filter(|route| route.owner == owner)
            .cloned()
            .collect())
    }

    async fn delete_route(&mut self, id: RouteId) -> Result<bool> {
        Ok(self.work.routes.remove(&id).is_some())
    }

    async fn find_player(&mut self, id: PlayerId) -> Result<Option<Player>> {
        Ok(self.work.players.get(&id).cloned())
    }

    async fn find_player_by_handle(&mut self, handle: &str) -> Result<Option<Player>> {
        Ok(self
            .work
            .players
            .values()
            .find(|p| p.handle == handle)
            .cloned())
    }

    async fn find_player_by_contact(&mut self, contact: &str) -> Result<Option<Player>> {
        Ok(self
            .work
            .players
            .values()
            .find(|p| p.contact == contact)
            .cloned())
    }

    async fn insert_player(&mut self, player: &NewPlayer) -> Result<Player> {
        self.work.last_player += 1;
        let record = Player {
            id: PlayerId(self.work.last_player),
            handle: player.handle.clone(),
            contact: player.contact.clone(),
            credential: player.credential.clone(),
            created_at: SystemTime::now(),
        };
        self.work.players.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_players(&mut self) -> Result<Vec<Player>> {
        Ok(self.work.players.values().cloned().collect())
    }

    async fn find_region(&mut self, id: RegionId) -> Result<Option<TerritoryRegion>> {
        Ok(self.work.regions.get(&id).cloned())
    }

    async fn regions_by_owner(&mut self, owner: PlayerId) -> Result<Vec<TerritoryRegion>> {
        Ok(self
            .work
            .regions
            .values()
            .filter(|region| region.owner == owner)
            .cloned()
            .collect())
    }

    async fn all_regions(&mut self) -> Result<Vec<TerritoryRegion>> {
        Ok(self.work.regions.values().cloned().collect())
    }

    async fn commit(self) -> Result<()> {
        let MemoryTransaction { mut guard, work } = self;
        debug!(
            regions = work.regions.len(),
            routes = work.routes.len(),
            "Memory transaction committed"
        );
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::LineString;

    fn square() -> Polygon {
        Polygon::new(
            LineString::from(vec![(21.0, 45.0), (21.001, 45.0), (21.001, 45.001), (21.0, 45.0)]),
            vec![],
        )
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await;
        tx.create_region(&NewRegion {
            owner: PlayerId(1),
            polygon: square(),
            area_m2: 100.0,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.region_count().await, 1);
    }

    #[tokio::test]
    async fn test_drop_discards_changes() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await;
            tx.create_region(&NewRegion {
                owner: PlayerId(1),
                polygon: square(),
                area_m2: 100.0,
            })
            .await
            .unwrap();
        }
        assert_eq!(store.region_count().await, 0);
    }

    #[tokio::test]
    async fn test_region_ids_not_reused() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await;
        let region = NewRegion {
            owner: PlayerId(1),
            polygon: square(),
            area_m2: 100.0,
        };
        let first = tx.create_region(&region).await.unwrap();
        tx.delete_region(first).await.unwrap();
        let second = tx.create_region(&region).await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_update_missing_region_fails() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await;
        assert!(tx.update_region(RegionId(42), &square(), 1.0).await.is_err());
    }
}
