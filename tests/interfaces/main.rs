//! Behavior tests for the staging pipeline and schema bootstrap.
//!
//! Scenarios run against the in-memory staging store and mock warehouse:
//!
//! ```bash
//! cargo test --test interfaces
//! ```

mod steps;

use cucumber::World;
use steps::bootstrap::BootstrapWorld;
use steps::pipeline::PipelineWorld;

#[tokio::main]
async fn main() {
    // Run staging pipeline tests
    println!("\n=== Running Staging Pipeline Tests ===\n");
    PipelineWorld::cucumber()
        .fail_on_skipped()
        .run_and_exit("tests/interfaces/features/pipeline.feature")
        .await;

    // Run bootstrap tests
    println!("\n=== Running Schema Bootstrap Tests ===\n");
    BootstrapWorld::cucumber()
        .fail_on_skipped()
        .run_and_exit("tests/interfaces/features/bootstrap.feature")
        .await;
}
