//! Tests d'intégration PostgreSQL
//!
//! Ces tests nécessitent une base PostGIS disponible.
//! Configuration via variables d'environnement:
//! - PGHOST, PGPORT, PGUSER, PGPASSWORD, PGDATABASE
//!
//! Exécution:
//! ```bash
//! docker run -d --name postgres-test -e POSTGRES_PASSWORD=test -p 5432:5432 postgis/postgis
//! PGPASSWORD=test PGDATABASE=postgres cargo test --test postgres_integration -- --ignored
//! ```
//!
//! Chaque test travaille dans son propre schéma, recréé au démarrage.

use anyhow::Result;
use conquest::{wire, EngineConfig, MetricProjection, PlayerId};
use conquest_pg::store::pool::test_connection;
use conquest_pg::{
    create_pool, DatabaseConfig, NewPlayer, PgStore, PgUnitOfWork, ServiceError,
    TerritoryGateway, TerritoryService,
};
use geo::{LineString, Polygon};

async fn setup(schema: &str) -> Result<PgStore> {
    let config = DatabaseConfig::from_env();
    let pool = create_pool(&config)?;
    test_connection(&pool).await?;
    let store = PgStore::new(pool, schema)?;
    store.init_schema(true).await?;
    Ok(store)
}

fn rect_geojson(x: f64, y: f64, w: f64, h: f64) -> String {
    let (x0, y0) = (500_000.0 + x, 5_000_000.0 + y);
    let metric = Polygon::new(
        LineString::from(vec![
            (x0, y0),
            (x0 + w, y0),
            (x0 + w, y0 + h),
            (x0, y0 + h),
            (x0, y0),
        ]),
        vec![],
    );
    let geographic = MetricProjection::default().to_geographic(&metric).unwrap();
    wire::polygon_to_string(&geographic)
}

async fn register(service: &TerritoryService, store: &PgStore, handle: &str) -> PlayerId {
    let mut client = store.client().await.unwrap();
    let uow = PgUnitOfWork::begin(&mut client, store.schema()).await.unwrap();
    service
        .register_player(
            uow,
            NewPlayer {
                handle: handle.to_string(),
                contact: format!("{}@example.com", handle),
                credential: "secret".into(),
            },
        )
        .await
        .unwrap()
        .id
}

#[tokio::test]
#[ignore]
async fn test_schema_creation() {
    let store = setup("conquest_it_schema").await.expect("Failed to setup schema");
    let client = store.client().await.unwrap();

    let rows = client
        .query(
            "SELECT table_name FROM information_schema.tables WHERE table_schema = $1 ORDER BY table_name",
            &[&store.schema()],
        )
        .await
        .unwrap();
    let tables: Vec<String> = rows.iter().map(|r| r.get(0)).collect();
    assert_eq!(tables, vec!["players", "regions", "routes"]);
}

#[tokio::test]
#[ignore]
async fn test_submit_and_capture() {
    let store = setup("conquest_it_capture").await.unwrap();
    let service = TerritoryService::new(EngineConfig::default()).unwrap();
    let alice = register(&service, &store, "alice").await;
    let bob = register(&service, &store, "bob").await;

    {
        let mut client = store.client().await.unwrap();
        let uow = PgUnitOfWork::begin(&mut client, store.schema()).await.unwrap();
        service
            .submit_route(uow, bob, &rect_geojson(0.0, 0.0, 200.0, 100.0), Some(60))
            .await
            .unwrap();
    }

    let record = {
        let mut client = store.client().await.unwrap();
        let uow = PgUnitOfWork::begin(&mut client, store.schema()).await.unwrap();
        service
            .submit_route(uow, alice, &rect_geojson(100.0, 0.0, 200.0, 100.0), None)
            .await
            .unwrap()
    };
    assert!((record.area_gained_m2 - 20_000.0).abs() < 1.0);

    let mut client = store.client().await.unwrap();
    let mut uow = PgUnitOfWork::begin(&mut client, store.schema()).await.unwrap();
    let bob_regions = uow.regions_by_owner(bob).await.unwrap();
    assert_eq!(bob_regions.len(), 1);
    assert!((bob_regions[0].area_m2 - 10_000.0).abs() < 1.0);

    let fetched = uow.find_region(bob_regions[0].id).await.unwrap().unwrap();
    assert_eq!(fetched.owner, bob);
    assert!(uow.find_region(conquest::RegionId(-1)).await.unwrap().is_none());

    let saved = uow.find_route(record.id).await.unwrap().unwrap();
    assert_eq!(saved.area_gained_m2, record.area_gained_m2);
    assert!((saved.distance_m - 600.0).abs() < 0.5);
}

#[tokio::test]
#[ignore]
async fn test_transaction_rollback() {
    let store = setup("conquest_it_rollback").await.unwrap();
    let service = TerritoryService::new(EngineConfig::default()).unwrap();

    // Joueur inconnu : rien n'est écrit
    {
        let mut client = store.client().await.unwrap();
        let uow = PgUnitOfWork::begin(&mut client, store.schema()).await.unwrap();
        let err = service
            .submit_route(uow, PlayerId(1), &rect_geojson(0.0, 0.0, 100.0, 100.0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnknownPlayer(_)));
    }

    // Écritures abandonnées sans commit
    let alice = register(&service, &store, "alice").await;
    {
        let mut client = store.client().await.unwrap();
        let mut uow = PgUnitOfWork::begin(&mut client, store.schema()).await.unwrap();
        uow.insert_route(&conquest_pg::store::NewRoute {
            owner: alice,
            polygon: wire::parse_route(&rect_geojson(0.0, 0.0, 10.0, 10.0))
                .map(|ring| Polygon::new(ring, vec![]))
                .unwrap(),
            duration_s: None,
        })
        .await
        .unwrap();
        assert_eq!(uow.writes(), 1);
        uow.rollback("test").await;
    }

    let mut client = store.client().await.unwrap();
    let mut uow = PgUnitOfWork::begin(&mut client, store.schema()).await.unwrap();
    assert!(uow.routes_by_owner(alice).await.unwrap().is_empty());
    assert!(uow.all_regions().await.unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn test_leaderboard() {
    let store = setup("conquest_it_leaderboard").await.unwrap();
    let service = TerritoryService::new(EngineConfig::default()).unwrap();
    let alice = register(&service, &store, "alice").await;
    let bob = register(&service, &store, "bob").await;

    for (owner, x) in [(alice, 0.0), (bob, 1000.0), (bob, 2000.0)] {
        let mut client = store.client().await.unwrap();
        let uow = PgUnitOfWork::begin(&mut client, store.schema()).await.unwrap();
        service
            .submit_route(uow, owner, &rect_geojson(x, 0.0, 100.0, 100.0), None)
            .await
            .unwrap();
    }

    let mut client = store.client().await.unwrap();
    let mut uow = PgUnitOfWork::begin(&mut client, store.schema()).await.unwrap();
    let board = service.leaderboard(&mut uow, 10).await.unwrap();
    assert_eq!(board[0].player, bob);
    assert_eq!(board[0].region_count, 2);
    assert_eq!(board[1].player, alice);
}
