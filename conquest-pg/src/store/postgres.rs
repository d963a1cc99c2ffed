//! Stockage PostGIS
//!
//! Les polygones sont stockés en `geometry(Polygon, 4326)`, écrits en EWKB et
//! relus en WKB. Les identités viennent de séquences `BIGSERIAL`.

use std::time::SystemTime;

use anyhow::{Context, Result};
use deadpool_postgres::{Object, Pool, Transaction};
use geo::{Geometry, MultiPolygon, Polygon};
use tokio_postgres::Row;
use tracing::{debug, error, info, warn};
use wkb::{geom_to_wkb, wkb_to_geom};

use conquest::{NewRegion, PlayerId, RegionId, RouteId, TerritoryRegion};

use super::{NewPlayer, NewRoute, Player, RouteRecord, TerritoryGateway};

/// SRID des géométries stockées
pub const STORAGE_SRID: u32 = 4326;

/// Schéma par défaut
pub const DEFAULT_SCHEMA: &str = "conquest";

const REGION_COLUMNS: &str =
    "id, owner_id, ST_AsBinary(polygon) AS polygon, area_m2, created_at, last_modified";

const ROUTE_COLUMNS: &str =
    "id, owner_id, ST_AsBinary(polygon) AS polygon, distance_m, area_gained_m2, duration_s, created_at";

const PLAYER_COLUMNS: &str = "id, handle, contact, credential, created_at";

/// Vérifie qu'un nom de schéma peut être interpolé dans le SQL
pub fn validate_schema_name(schema: &str) -> Result<()> {
    let mut chars = schema.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        anyhow::bail!("Invalid schema name: {:?}", schema);
    }
    Ok(())
}

/// Accès PostGIS : pool et schéma cible
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
    schema: String,
}

impl PgStore {
    pub fn new(pool: Pool, schema: &str) -> Result<Self> {
        validate_schema_name(schema)?;
        Ok(Self {
            pool,
            schema: schema.to_string(),
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Connexion du pool, à garder vivante pendant l'unité de travail
    pub async fn client(&self) -> Result<Object> {
        self.pool
            .get()
            .await
            .context("Failed to get connection from pool")
    }

    /// Crée le schéma, les tables et les index
    pub async fn init_schema(&self, drop_existing: bool) -> Result<()> {
        let client = self.client().await?;
        let schema = &self.schema;

        if drop_existing {
            client
                .execute(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema), &[])
                .await
                .context("Failed to drop schema")?;
        }

        client
            .execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema), &[])
            .await
            .context("Failed to create schema")?;

        // Peut nécessiter des droits superuser ; accepté si déjà installée
        if let Err(e) = client
            .execute("CREATE EXTENSION IF NOT EXISTS postgis", &[])
            .await
        {
            warn!("CREATE EXTENSION postgis failed (will check if already installed): {e}");
            let exists = client
                .query_opt("SELECT 1 FROM pg_extension WHERE extname = 'postgis'", &[])
                .await
                .context("Failed to check pg_extension")?
                .is_some();
            if !exists {
                anyhow::bail!("PostGIS extension is not installed and could not be created: {e}");
            }
        }

        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {s}.players (
                id BIGSERIAL PRIMARY KEY,
                handle TEXT NOT NULL UNIQUE,
                contact TEXT NOT NULL UNIQUE,
                credential TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );

            CREATE TABLE IF NOT EXISTS {s}.regions (
                id BIGSERIAL PRIMARY KEY,
                owner_id BIGINT NOT NULL REFERENCES {s}.players(id),
                polygon geometry(Polygon, {srid}) NOT NULL,
                area_m2 DOUBLE PRECISION NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                last_modified TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );

            CREATE TABLE IF NOT EXISTS {s}.routes (
                id BIGSERIAL PRIMARY KEY,
                owner_id BIGINT NOT NULL REFERENCES {s}.players(id),
                polygon geometry(Polygon, {srid}) NOT NULL,
                distance_m DOUBLE PRECISION NOT NULL DEFAULT 0,
                area_gained_m2 DOUBLE PRECISION NOT NULL DEFAULT 0,
                duration_s BIGINT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );

            CREATE INDEX IF NOT EXISTS idx_{s}_regions_polygon ON {s}.regions USING GIST (polygon);
            CREATE INDEX IF NOT EXISTS idx_{s}_regions_owner ON {s}.regions (owner_id);
            CREATE INDEX IF NOT EXISTS idx_{s}_routes_owner ON {s}.routes (owner_id);
            "#,
            s = schema,
            srid = STORAGE_SRID
        );

        client
            .batch_execute(&ddl)
            .await
            .with_context(|| format!("Failed to create tables in schema {}", schema))?;

        info!(schema = %schema, "Schema ready");
        Ok(())
    }
}

/// Unité de travail PostGIS pour une soumission de parcours
///
/// Encapsule une transaction ; une unité abandonnée sans commit est annulée.
pub struct PgUnitOfWork<'a> {
    transaction: Transaction<'a>,
    schema: String,
    writes: usize,
}

impl<'a> PgUnitOfWork<'a> {
    /// Démarre une transaction sur une connexion du pool
    pub async fn begin(client: &'a mut Object, schema: &str) -> Result<Self> {
        validate_schema_name(schema)?;
        let transaction = client
            .transaction()
            .await
            .context("Failed to begin transaction")?;

        debug!(schema = %schema, "Unit of work started");

        Ok(Self {
            transaction,
            schema: schema.to_string(),
            writes: 0,
        })
    }

    /// Nombre d'écritures effectuées
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Annule explicitement la transaction
    pub async fn rollback(self, reason: &str) {
        error!(
            reason = %reason,
            writes_attempted = self.writes,
            "Rolling back unit of work"
        );

        if let Err(e) = self.transaction.rollback().await {
            error!(error = %e, "Explicit rollback failed (will rollback on drop anyway)");
        }
    }

    fn table(&self, name: &str) -> String {
        format!("{}.{}", self.schema, name)
    }
}

impl TerritoryGateway for PgUnitOfWork<'_> {
    async fn find_regions_intersecting(
        &mut self,
        envelope: &MultiPolygon,
    ) -> Result<Vec<TerritoryRegion>> {
        if envelope.0.is_empty() {
            return Ok(Vec::new());
        }
        let ewkb = geometry_to_ewkb(&Geometry::MultiPolygon(envelope.clone()), STORAGE_SRID)?;

        // FOR UPDATE : deux soumissions qui touchent les mêmes zones se sérialisent
        let query = format!(
            "SELECT {} FROM {} WHERE ST_Intersects(polygon, ST_GeomFromEWKB($1)) ORDER BY id FOR UPDATE",
            REGION_COLUMNS,
            self.table("regions")
        );
        let rows = self
            .transaction
            .query(&query, &[&ewkb])
            .await
            .context("Failed to query intersecting regions")?;

        rows.iter().map(region_from_row).collect()
    }

    async fn create_region(&mut self, region: &NewRegion) -> Result<RegionId> {
        let ewkb = polygon_to_ewkb(&region.polygon)?;
        let query = format!(
            "INSERT INTO {} (owner_id, polygon, area_m2, created_at, last_modified)
             VALUES ($1, ST_GeomFromEWKB($2), $3, NOW(), NOW()) RETURNING id",
            self.table("regions")
        );
        let row = self
            .transaction
            .query_one(&query, &[&region.owner.0, &ewkb, &region.area_m2])
            .await
            .context("Failed to insert region")?;
        self.writes += 1;
        Ok(RegionId(row.try_get("id")?))
    }

    async fn update_region(
        &mut self,
        id: RegionId,
        polygon: &Polygon,
        area_m2: f64,
    ) -> Result<()> {
        let ewkb = polygon_to_ewkb(polygon)?;
        let query = format!(
            "UPDATE {} SET polygon = ST_GeomFromEWKB($2), area_m2 = $3, last_modified = NOW() WHERE id = $1",
            self.table("regions")
        );
        let updated = self
            .transaction
            .execute(&query, &[&id.0, &ewkb, &area_m2])
            .await
            .context("Failed to update region")?;
        if updated == 0 {
            anyhow::bail!("Region {} not found", id);
        }
        self.writes += 1;
        Ok(())
    }

    async fn delete_region(&mut self, id: RegionId) -> Result<()> {
        let query = format!("DELETE FROM {} WHERE id = $1", self.table("regions"));
        let deleted = self
            .transaction
            .execute(&query, &[&id.0])
            .await
            .context("Failed to delete region")?;
        if deleted == 0 {
            anyhow::bail!("Region {} not found", id);
        }
        self.writes += 1;
        Ok(())
    }

    async fn delete_regions(&mut self, ids: &[RegionId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let query = format!("DELETE FROM {} WHERE id = ANY($1)", self.table("regions"));
        let deleted = self
            .transaction
            .execute(&query, &[&raw])
            .await
            .context("Failed to delete regions")?;
        self.writes += deleted as usize;
        Ok(deleted)
    }

    async fn insert_route(&mut self, route: &NewRoute) -> Result<RouteRecord> {
        let ewkb = polygon_to_ewkb(&route.polygon)?;
        let query = format!(
            "INSERT INTO {} (owner_id, polygon, duration_s) VALUES ($1, ST_GeomFromEWKB($2), $3)
             RETURNING id, created_at",
            self.table("routes")
        );
        let row = self
            .transaction
            .query_one(&query, &[&route.owner.0, &ewkb, &route.duration_s])
            .await
            .context("Failed to insert route")?;
        self.writes += 1;

        Ok(RouteRecord {
            id: RouteId(row.try_get("id")?),
            owner: route.owner,
            polygon: route.polygon.clone(),
            created_at: row.try_get("created_at")?,
            distance_m: 0.0,
            area_gained_m2: 0.0,
            duration_s: route.duration_s,
        })
    }

    async fn save_route(&mut self, route: &RouteRecord) -> Result<()> {
        let query = format!(
            "UPDATE {} SET distance_m = $2, area_gained_m2 = $3 WHERE id = $1",
            self.table("routes")
        );
        let updated = self
            .transaction
            .execute(&query, &[&route.id.0, &route.distance_m, &route.area_gained_m2])
            .await
            .context("Failed to save route metrics")?;
        if updated == 0 {
            anyhow::bail!("Route {} not found", route.id);
        }
        self.writes += 1;
        Ok(())
    }

    async fn find_route(&mut self, id: RouteId) -> Result<Option<RouteRecord>> {
        let query = format!("SELECT {} FROM {} WHERE id = $1", ROUTE_COLUMNS, self.table("routes"));
        let row = self
            .transaction
            .query_opt(&query, &[&id.0])
            .await
            .context("Failed to fetch route")?;
        row.as_ref().map(route_from_row).transpose()
    }

    async fn routes_by_owner(&mut self, owner: PlayerId) -> Result<Vec<RouteRecord>> {
        let query = format!(
            "SELECT {} FROM {} WHERE owner_id = $1 ORDER BY id",
            ROUTE_COLUMNS,
            self.table("routes")
        );
        let rows = self
            .transaction
            .query(&query, &[&owner.0])
            .await
            .context("Failed to list routes")?;
        rows.iter().map(route_from_row).collect()
    }

    async fn delete_route(&mut self, id: RouteId) -> Result<bool> {
        let query = format!("DELETE FROM {} WHERE id = $1", self.table("routes"));
        let deleted = self
            .transaction
            .execute(&query, &[&id.0])
            .await
            .context("Failed to delete route")?;
        self.writes += deleted as usize;
        Ok(deleted > 0)
    }

    async fn find_player(&mut self, id: PlayerId) -> Result<Option<Player>> {
        let query = format!("SELECT {} FROM {} WHERE id = $1", PLAYER_COLUMNS, self.table("players"));
        let row = self
            .transaction
            .query_opt(&query, &[&id.0])
            .await
            .context("Failed to fetch player")?;
        row.as_ref().map(player_from_row).transpose()
    }

    async fn find_player_by_handle(&mut self, handle: &str) -> Result<Option<Player>> {
        let query = format!(
            "SELECT {} FROM {} WHERE handle = $1",
            PLAYER_COLUMNS,
            self.table("players")
        );
        let row = self
            .transaction
            .query_opt(&query, &[&handle])
            .await
            .context("Failed to fetch player by handle")?;
        row.as_ref().map(player_from_row).transpose()
    }

    async fn find_player_by_contact(&mut self, contact: &str) -> Result<Option<Player>> {
        let query = format!(
            "SELECT {} FROM {} WHERE contact = $1",
            PLAYER_COLUMNS,
            self.table("players")
        );
        let row = self
            .transaction
            .query_opt(&query, &[&contact])
            .await
            .context("Failed to fetch player by contact")?;
        row.as_ref().map(player_from_row).transpose()
    }

    async fn insert_player(&mut self, player: &NewPlayer) -> Result<Player> {
        let query = format!(
            "INSERT INTO {} (handle, contact, credential) VALUES ($1, $2, $3) RETURNING {}",
            self.table("players"),
            PLAYER_COLUMNS
        );
        let row = self
            .transaction
            .query_one(&query, &[&player.handle, &player.contact, &player.credential])
            .await
            .context("Failed to insert player")?;
        self.writes += 1;
        player_from_row(&row)
    }

    async fn list_players(&mut self) -> Result<Vec<Player>> {
        let query = format!("SELECT {} FROM {} ORDER BY id", PLAYER_COLUMNS, self.table("players"));
        let rows = self
            .transaction
            .query(&query, &[])
            .await
            .context("Failed to list players")?;
        rows.iter().map(player_from_row).collect()
    }

    async fn find_region(&mut self, id: RegionId) -> Result<Option<TerritoryRegion>> {
        let query = format!(
            "SELECT {} FROM {} WHERE id = $1",
            REGION_COLUMNS,
            self.table("regions")
        );
        let row = self
            .transaction
            .query_opt(&query, &[&id.0])
            .await
            .context("Failed to fetch region")?;
        row.as_ref().map(region_from_row).transpose()
    }

    async fn regions_by_owner(&mut self, owner: PlayerId) -> Result<Vec<TerritoryRegion>> {
        let query = format!(
            "SELECT {} FROM {} WHERE owner_id = $1 ORDER BY id",
            REGION_COLUMNS,
            self.table("regions")
        );
        let rows = self
            .transaction
            .query(&query, &[&owner.0])
            .await
            .context("Failed to list regions")?;
        rows.iter().map(region_from_row).collect()
    }

    async fn all_regions(&mut self) -> Result<Vec<TerritoryRegion>> {
        let query = format!("SELECT {} FROM {} ORDER BY id", REGION_COLUMNS, self.table("regions"));
        let rows = self
            .transaction
            .query(&query, &[])
            .await
            .context("Failed to list regions")?;
        rows.iter().map(region_from_row).collect()
    }

    async fn commit(self) -> Result<()> {
        self.transaction
            .commit()
            .await
            .context("Failed to commit transaction")?;

        debug!(writes = self.writes, "Unit of work committed");
        Ok(())
    }
}

fn region_from_row(row: &Row) -> Result<TerritoryRegion> {
    let wkb: Vec<u8> = row.try_get("polygon")?;
    Ok(TerritoryRegion {
        id: RegionId(row.try_get("id")?),
        owner: PlayerId(row.try_get("owner_id")?),
        polygon: polygon_from_wkb(&wkb)?,
        area_m2: row.try_get("area_m2")?,
        created_at: row.try_get::<_, SystemTime>("created_at")?,
        last_modified: row.try_get::<_, SystemTime>("last_modified")?,
    })
}

fn route_from_row(row: &Row) -> Result<RouteRecord> {
    let wkb: Vec<u8> = row.try_get("polygon")?;
    Ok(RouteRecord {
        id: RouteId(row.try_get("id")?),
        owner: PlayerId(row.try_get("owner_id")?),
        polygon: polygon_from_wkb(&wkb)?,
        created_at: row.try_get("created_at")?,
        distance_m: row.try_get("distance_m")?,
        area_gained_m2: row.try_get("area_gained_m2")?,
        duration_s: row.try_get("duration_s")?,
    })
}

fn player_from_row(row: &Row) -> Result<Player> {
    Ok(Player {
        id: PlayerId(row.try_get("id")?),
        handle: row.try_get("handle")?,
        contact: row.try_get("contact")?,
        credential: row.try_get("credential")?,
        created_at: row.try_get("created_at")?,
    })
}

fn polygon_to_ewkb(polygon: &Polygon) -> Result<Vec<u8>> {
    geometry_to_ewkb(&Geometry::Polygon(polygon.clone()), STORAGE_SRID)
}

/// Relit un polygone WKB renvoyé par `ST_AsBinary`
pub fn polygon_from_wkb(bytes: &[u8]) -> Result<Polygon> {
    let mut reader = bytes;
    let geometry = wkb_to_geom(&mut reader)
        .map_err(|e| anyhow::anyhow!("Failed to decode WKB geometry: {:?}", e))?;
    match geometry {
        Geometry::Polygon(polygon) => Ok(polygon),
        other => anyhow::bail!("Expected a stored Polygon, got {:?}", other),
    }
}

/// Convertit une géométrie geo en EWKB PostGIS (WKB + SRID)
pub fn geometry_to_ewkb(geom: &Geometry, srid: u32) -> Result<Vec<u8>> {
    let wkb = geom_to_wkb(geom)
        .map_err(|e| anyhow::anyhow!("Failed to convert geometry to WKB: {:?}", e))?;
    if wkb.len() < 5 {
        anyhow::bail!("WKB too short: {} bytes", wkb.len());
    }

    let little_endian = wkb[0] == 1;
    let type_bytes = [wkb[1], wkb[2], wkb[3], wkb[4]];

    // Flag SRID (0x20000000) sur le type
    let mut ewkb = Vec::with_capacity(wkb.len() + 4);
    ewkb.push(wkb[0]);
    if little_endian {
        let geom_type = u32::from_le_bytes(type_bytes) | 0x2000_0000;
        ewkb.extend_from_slice(&geom_type.to_le_bytes());
        ewkb.extend_from_slice(&srid.to_le_bytes());
    } else {
        let geom_type = u32::from_be_bytes(type_bytes) | 0x2000_0000;
        ewkb.extend_from_slice(&geom_type.to_be_bytes());
        ewkb.extend_from_slice(&srid.to_be_bytes());
    }
    ewkb.extend_from_slice(&wkb[5..]);

    Ok(ewkb)
}
