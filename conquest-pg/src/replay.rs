//! Rejeu d'un journal de parcours (JSON Lines) dans le stockage en mémoire
//!
//! Une ligne par parcours :
//! `{"owner": "alice", "route": {"type":"Polygon", ...}, "duration_s": 1800}`.
//! Les joueurs inconnus sont enregistrés à la volée. Une ligne refusée est
//! consignée dans le rapport sans interrompre le rejeu.

use std::io::BufRead;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use conquest::{wire, PlayerId};

use crate::report::ReplayReport;
use crate::service::{ServiceError, TerritoryService};
use crate::store::{MemoryStore, NewPlayer, TerritoryGateway};

#[derive(Debug, Deserialize)]
struct ReplayEntry {
    owner: String,
    route: serde_json::Value,
    #[serde(default)]
    duration_s: Option<i64>,
}

/// Rejoue chaque ligne du journal dans `store`
pub async fn replay<R: BufRead>(
    service: &TerritoryService,
    store: &MemoryStore,
    reader: R,
) -> Result<ReplayReport> {
    let started = Instant::now();
    let mut report = ReplayReport::default();

    for (index, line) in reader.lines().enumerate() {
        let number = index + 1;
        let line = line.with_context(|| format!("Failed to read line {}", number))?;
        if line.trim().is_empty() {
            continue;
        }

        let entry: ReplayEntry = match serde_json::from_str(&line) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(line = number, error = %e, "Skipping unreadable replay line");
                report.record_rejected(number, None, format!("unreadable line: {}", e));
                continue;
            }
        };

        let owner = match player_for(service, store, &entry.owner, &mut report).await {
            Ok(id) => id,
            Err(e) if e.is_client_error() => {
                warn!(line = number, owner = %entry.owner, error = %e, "Cannot register replay player");
                report.record_rejected(number, Some(entry.owner), e.to_string());
                continue;
            }
            Err(e) => return Err(anyhow::Error::new(e).context(format!("Line {}", number))),
        };

        let outcome = match wire::parse_route_value(entry.route) {
            Ok(ring) => {
                service
                    .submit_ring(store.begin().await, owner, ring, entry.duration_s)
                    .await
            }
            Err(e) => Err(ServiceError::from(e)),
        };

        match outcome {
            Ok(record) => {
                debug!(line = number, route_id = %record.id, "Route replayed");
                report.record_accepted(record.area_gained_m2, record.distance_m);
            }
            Err(e) if e.is_client_error() => {
                warn!(line = number, owner = %entry.owner, error = %e, "Route rejected");
                report.record_rejected(number, Some(entry.owner), e.to_string());
            }
            Err(e) => return Err(anyhow::Error::new(e).context(format!("Line {}", number))),
        }
    }

    report.regions = store.region_count().await;
    report.set_duration(started.elapsed());
    Ok(report)
}

async fn player_for(
    service: &TerritoryService,
    store: &MemoryStore,
    handle: &str,
    report: &mut ReplayReport,
) -> Result<PlayerId, ServiceError> {
    let existing = store.begin().await.find_player_by_handle(handle).await?;
    if let Some(player) = existing {
        return Ok(player.id);
    }

    let player = service
        .register_player(
            store.begin().await,
            NewPlayer {
                handle: handle.to_string(),
                contact: format!("{}@replay.invalid", handle),
                credential: String::new(),
            },
        )
        .await?;
    report.players_registered += 1;
    Ok(player.id)
}
