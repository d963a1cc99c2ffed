//! Définition et implémentation des commandes CLI

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use conquest::{wire, PlayerId, RegionId};
use conquest_pg::export::export_regions;
use conquest_pg::replay::replay;
use conquest_pg::service::{TerritoryService, DEFAULT_LEADERBOARD_LIMIT};
use conquest_pg::store::pool::test_connection;
use conquest_pg::store::{
    create_pool, ConnectionOverrides, DatabaseConfig, MemoryStore, NewPlayer, PgStore,
    PgUnitOfWork, TerritoryGateway,
};
use conquest_pg::Config;

#[derive(Subcommand)]
pub enum Commands {
    /// Create the PostGIS schema and tables
    InitSchema {
        /// Drop the schema before creating it
        #[arg(long)]
        drop: bool,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Register a new player
    Register {
        #[arg(long)]
        handle: String,

        /// Contact address (unique)
        #[arg(long)]
        contact: String,

        /// Opaque credential
        #[arg(long)]
        credential: String,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Submit a route (GeoJSON Polygon file) for a player
    Submit {
        /// Player id
        #[arg(long)]
        owner: i64,

        /// Path to the GeoJSON route
        #[arg(long)]
        route: PathBuf,

        /// Run duration in seconds
        #[arg(long)]
        duration: Option<i64>,

        #[command(flatten)]
        db: DbArgs,
    },

    /// List territory regions
    Regions {
        /// Only regions of this player
        #[arg(long)]
        owner: Option<i64>,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Show one region
    Region {
        #[arg(long)]
        id: i64,

        #[command(flatten)]
        db: DbArgs,
    },

    /// List the routes of a player by handle
    Routes {
        #[arg(long)]
        handle: String,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Export all regions to a GeoJSON FeatureCollection
    Export {
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Players ranked by total territory area
    Leaderboard {
        #[arg(long, default_value_t = DEFAULT_LEADERBOARD_LIMIT)]
        limit: usize,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Cumulative statistics of a player
    Stats {
        #[arg(long)]
        player: i64,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Replay a JSON Lines route log in memory (no database required)
    Replay {
        #[arg(short, long)]
        input: PathBuf,

        /// GeoJSON export of the final territory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// JSON replay report
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

/// Options de connexion PostgreSQL
#[derive(Args, Debug, Clone, Default)]
pub struct DbArgs {
    /// PostgreSQL host (défaut : env PGHOST / localhost)
    #[arg(long)]
    host: Option<String>,

    /// PostgreSQL database name (défaut : env PGDATABASE / conquest)
    #[arg(long)]
    database: Option<String>,

    /// PostgreSQL user (défaut : env PGUSER / postgres)
    #[arg(long)]
    user: Option<String>,

    /// PostgreSQL password (défaut : env PGPASSWORD)
    #[arg(long)]
    password: Option<String>,

    /// PostgreSQL port (défaut : env PGPORT / 5432)
    #[arg(long)]
    port: Option<u16>,

    /// SSL mode: disable, prefer, require (défaut : env PGSSLMODE / disable)
    #[arg(long)]
    ssl: Option<String>,
}

impl DbArgs {
    fn overrides(&self) -> ConnectionOverrides {
        ConnectionOverrides {
            host: self.host.clone(),
            database: self.database.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            port: self.port,
            ssl: self.ssl.clone(),
        }
    }
}

/// Exécute une commande
pub async fn run(command: Commands, config_path: Option<&Path>) -> Result<()> {
    let config = Config::resolve(config_path)?;
    let service = TerritoryService::new(config.engine)?;

    match command {
        Commands::InitSchema { drop, db } => {
            let store = open_store(&config, &db).await?;
            store.init_schema(drop).await?;
            println!("Schema {} ready", store.schema());
        }
        Commands::Register {
            handle,
            contact,
            credential,
            db,
        } => {
            let store = open_store(&config, &db).await?;
            let mut client = store.client().await?;
            let uow = PgUnitOfWork::begin(&mut client, store.schema()).await?;
            let player = service
                .register_player(
                    uow,
                    NewPlayer {
                        handle,
                        contact,
                        credential,
                    },
                )
                .await?;
            println!("Registered player {} ({})", player.id, player.handle);
        }
        Commands::Submit {
            owner,
            route,
            duration,
            db,
        } => {
            let geojson = std::fs::read_to_string(&route)
                .context(format!("Failed to read route file: {}", route.display()))?;
            let store = open_store(&config, &db).await?;
            let mut client = store.client().await?;
            let uow = PgUnitOfWork::begin(&mut client, store.schema()).await?;
            let record = service
                .submit_route(uow, PlayerId(owner), &geojson, duration)
                .await?;
            println!(
                "Route {}: {:.0} m² gained, {:.0} m",
                record.id, record.area_gained_m2, record.distance_m
            );
        }
        Commands::Regions { owner, db } => {
            let store = open_store(&config, &db).await?;
            let mut client = store.client().await?;
            let mut uow = PgUnitOfWork::begin(&mut client, store.schema()).await?;
            let regions = match owner {
                Some(owner) => uow.regions_by_owner(PlayerId(owner)).await?,
                None => uow.all_regions().await?,
            };
            for region in &regions {
                println!(
                    "{}\towner={}\t{:.0} m²",
                    region.id, region.owner, region.area_m2
                );
            }
            println!("{} regions", regions.len());
        }
        Commands::Region { id, db } => {
            let store = open_store(&config, &db).await?;
            let mut client = store.client().await?;
            let mut uow = PgUnitOfWork::begin(&mut client, store.schema()).await?;
            let region = service.region(&mut uow, RegionId(id)).await?;
            println!(
                "{}\towner={}\t{:.0} m²\t{}",
                region.id,
                region.owner,
                region.area_m2,
                wire::polygon_to_string(&region.polygon)
            );
        }
        Commands::Routes { handle, db } => {
            let store = open_store(&config, &db).await?;
            let mut client = store.client().await?;
            let mut uow = PgUnitOfWork::begin(&mut client, store.schema()).await?;
            let routes = service.routes_of_handle(&mut uow, &handle).await?;
            println!("{}", serde_json::to_string_pretty(&routes)?);
        }
        Commands::Export { output, db } => {
            let store = open_store(&config, &db).await?;
            let mut client = store.client().await?;
            let mut uow = PgUnitOfWork::begin(&mut client, store.schema()).await?;
            let regions = uow.all_regions().await?;
            let count = export_regions(&regions, &output)?;
            println!("Exported {} regions to {}", count, output.display());
        }
        Commands::Leaderboard { limit, db } => {
            let store = open_store(&config, &db).await?;
            let mut client = store.client().await?;
            let mut uow = PgUnitOfWork::begin(&mut client, store.schema()).await?;
            let entries = service.leaderboard(&mut uow, limit).await?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Commands::Stats { player, db } => {
            let store = open_store(&config, &db).await?;
            let mut client = store.client().await?;
            let mut uow = PgUnitOfWork::begin(&mut client, store.schema()).await?;
            let stats = service.player_stats(&mut uow, PlayerId(player)).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Replay {
            input,
            output,
            report,
        } => cmd_replay(&service, &input, output.as_deref(), report.as_deref()).await?,
    }

    Ok(())
}

async fn open_store(config: &Config, db: &DbArgs) -> Result<PgStore> {
    let mut db_config = DatabaseConfig::from_env();
    db_config.apply_overrides(&db.overrides())?;

    info!(
        host = %db_config.host,
        database = %db_config.dbname,
        schema = %config.schema,
        "Connecting to PostgreSQL"
    );

    let pool = create_pool(&db_config)?;
    test_connection(&pool).await?;
    PgStore::new(pool, &config.schema)
}

async fn cmd_replay(
    service: &TerritoryService,
    input: &Path,
    output: Option<&Path>,
    report_path: Option<&Path>,
) -> Result<()> {
    let file = File::open(input).context(format!("Failed to open route log: {}", input.display()))?;
    let store = MemoryStore::new();

    let report = replay(service, &store, BufReader::new(file)).await?;
    report.display();

    if let Some(path) = report_path {
        report.save_to_file(path)?;
    }

    if let Some(path) = output {
        let regions = store.begin().await.all_regions().await?;
        let count = export_regions(&regions, path)?;
        println!("Exported {} regions to {}", count, path.display());
    }

    Ok(())
}
