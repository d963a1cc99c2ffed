//! # conquest-pg
//!
//! Persistance PostGIS et opérations de service pour le moteur `conquest`.
//!
//! ## Features
//!
//! - Soumission transactionnelle de parcours (une transaction par parcours)
//! - Stockage PostgreSQL/PostGIS avec pool de connexions, ou en mémoire
//! - Joueurs, statistiques et classement
//! - Rejeu d'un journal JSON Lines sans base de données
//! - Export GeoJSON du territoire
//!
//! ## Usage CLI
//!
//! ```bash
//! conquest-pg init-schema
//! conquest-pg register --handle alice --contact alice@example.com --credential s3cret
//! conquest-pg submit --owner 1 --route ./run.geojson --duration 1800
//! conquest-pg leaderboard --limit 10
//! conquest-pg routes --handle alice
//! conquest-pg region --id 42
//!
//! # Rejeu en mémoire (sans base de données)
//! conquest-pg replay --input ./routes.jsonl --output ./territory.geojson
//! ```

pub mod config;
pub mod export;
pub mod replay;
pub mod report;
pub mod service;
pub mod store;

pub use config::Config;
pub use report::{RejectedRoute, ReplayReport};
pub use service::{LeaderboardEntry, PlayerStats, ServiceError, TerritoryService};
pub use store::{
    create_pool, DatabaseConfig, MemoryStore, NewPlayer, PgStore, PgUnitOfWork, Player,
    RouteRecord, TerritoryGateway,
};
