//! Schema bootstrap step definitions.

use std::sync::Arc;

use cdcflow::warehouse::{MockWarehouse, SchemaBootstrapper, TargetTable, WarehouseError};
use cucumber::{given, then, when, World};

/// Test context for bootstrap scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct BootstrapWorld {
    warehouse: Arc<MockWarehouse>,
    outcomes: Vec<Result<(), WarehouseError>>,
}

impl std::fmt::Debug for BootstrapWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapWorld")
            .field("outcomes", &self.outcomes)
            .finish()
    }
}

impl BootstrapWorld {
    fn new() -> Self {
        Self {
            warehouse: Arc::new(MockWarehouse::new()),
            outcomes: Vec::new(),
        }
    }
}

#[given("a fresh warehouse")]
async fn given_fresh_warehouse(world: &mut BootstrapWorld) {
    assert!(world.warehouse.statements().await.is_empty());
}

#[given("the warehouse rejects every statement")]
async fn given_warehouse_rejects(world: &mut BootstrapWorld) {
    world.warehouse.set_fail_all(true).await;
}

#[when(expr = "the schema bootstrapper runs {int} time(s)")]
async fn when_bootstrapper_runs(world: &mut BootstrapWorld, times: usize) {
    let bootstrapper = SchemaBootstrapper::new(
        world.warehouse.clone(),
        TargetTable::new("dev", "dynamodb_cdc", "trades"),
    );
    for _ in 0..times {
        world.outcomes.push(bootstrapper.run().await);
    }
}

#[then("every bootstrap succeeds")]
async fn then_every_bootstrap_succeeds(world: &mut BootstrapWorld) {
    assert!(!world.outcomes.is_empty());
    for outcome in &world.outcomes {
        assert!(outcome.is_ok(), "Bootstrap failed: {:?}", outcome);
    }
}

#[then("the bootstrap fails")]
async fn then_bootstrap_fails(world: &mut BootstrapWorld) {
    assert!(matches!(
        world.outcomes.last(),
        Some(Err(WarehouseError::Statement { .. }))
    ));
}

#[then(expr = "the warehouse has schema {string}")]
async fn then_has_schema(world: &mut BootstrapWorld, schema: String) {
    let expected = format!("CREATE SCHEMA \"{}\"", schema);
    assert!(world.warehouse.created_objects().await.contains(&expected));
}

#[then(expr = "the warehouse has table {string}")]
async fn then_has_table(world: &mut BootstrapWorld, qualified: String) {
    let (schema, table) = qualified.split_once('.').expect("schema.table");
    let expected = format!("CREATE TABLE \"{}\".\"{}\"", schema, table);
    assert!(world.warehouse.created_objects().await.contains(&expected));
}

#[then(expr = "the warehouse has {int} created object(s)")]
async fn then_created_objects(world: &mut BootstrapWorld, count: usize) {
    assert_eq!(world.warehouse.created_objects().await.len(), count);
}
