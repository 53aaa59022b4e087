//! Opflow Demo Binary
//!
//! Runs a small operation graph: a group of dependent steps alongside two
//! alert-presenting operations that must not overlap, then prints the final
//! snapshot of every operation as JSON.

use std::time::Duration;

use anyhow::Context;
use tracing::info;

use opflow::conditions::MutuallyExclusive;
use opflow::config::ConfigManager;
use opflow::operation::{Operation, OperationError, TimeoutObserver};
use opflow::orchestration::{GroupOperation, OperationQueue};

fn step(name: &str, millis: u64) -> Operation {
    let label = name.to_string();
    Operation::block(name, move |_| async move {
        tokio::time::sleep(Duration::from_millis(millis)).await;
        info!(step = %label, "Step done");
        Ok(())
    })
}

fn alert(name: &str) -> Operation {
    let operation = step(name, 50);
    operation.add_condition(MutuallyExclusive::alert_presentation());
    operation
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let manager = ConfigManager::load().context("loading configuration")?;
    opflow::logging::init_with_config(&manager.config().logging);

    info!(environment = %manager.environment(), "Starting opflow demo");

    let queue = OperationQueue::with_config(
        manager.config().queue.clone(),
        opflow::ExclusivityController::shared(),
    );

    let fetch = step("fetch", 30);
    let parse = step("parse", 20);
    parse.add_dependency(&fetch);
    let store = Operation::block("store", |_| async {
        Err(OperationError::execution("storage unavailable"))
    });
    store.add_dependency(&parse);
    store.add_observer(TimeoutObserver::new(Duration::from_secs(5)));

    let pipeline = GroupOperation::new("pipeline", vec![fetch, parse, store])?;
    let first_alert = alert("first alert");
    let second_alert = alert("second alert");

    let operations = vec![
        pipeline.operation().clone(),
        first_alert.clone(),
        second_alert.clone(),
    ];
    queue.add_operations(operations.clone(), false).await?;
    // A queue configured to start suspended would never drain
    queue.set_suspended(false);
    queue.wait_until_all_operations_are_finished().await;

    let snapshots: Vec<_> = operations.iter().map(Operation::snapshot).collect();
    println!("{}", serde_json::to_string_pretty(&snapshots)?);

    let failed = snapshots.iter().filter(|s| !s.errors.is_empty()).count();
    info!(operations = snapshots.len(), failed, "Demo finished");
    Ok(())
}
