//! Queue admission and execution through the public API.

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::*;
use opflow::conditions::{NegatedCondition, NoCancelledDependencies, SilentCondition};
use opflow::config::QueueConfig;
use opflow::operation::{Operation, OperationError, TimeoutObserver, Work};
use opflow::orchestration::{ExclusivityController, OperationQueue};
use opflow::OperationState;

fn flagged(name: &str, ran: Arc<AtomicBool>) -> Operation {
    Operation::block(name, move |_| async move {
        ran.store(true, Ordering::SeqCst);
        Ok(())
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_operation_without_conditions_finishes_cleanly() {
    let (queue, _) = isolated_queue();
    let ran = Arc::new(AtomicBool::new(false));
    let op = flagged("plain", ran.clone());

    queue.add_operation(op.clone()).unwrap();
    let errors = op.wait_until_finished().await;

    assert!(errors.is_empty());
    assert!(ran.load(Ordering::SeqCst));
    assert_eq!(op.state(), OperationState::Finished);
    assert!(!op.is_cancelled());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_conditions_cancel_without_executing() {
    let (queue, _) = isolated_queue();
    let ran = Arc::new(AtomicBool::new(false));
    let op = flagged("gated", ran.clone());
    op.add_condition(FixedCondition::failing("First"));
    op.add_condition(FixedCondition::satisfied("Second"));
    op.add_condition(FixedCondition::failing("Third"));

    queue.add_operation(op.clone()).unwrap();
    let errors = op.wait_until_finished().await;

    assert!(op.is_cancelled());
    assert!(!ran.load(Ordering::SeqCst));
    let mut failed: Vec<_> = errors
        .iter()
        .filter_map(OperationError::condition_name)
        .collect();
    failed.sort_unstable();
    assert_eq!(failed, vec!["First", "Third"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_condition_is_evaluated_once() {
    let (queue, _) = isolated_queue();
    let condition = FixedCondition::satisfied("Counted");
    let evaluations = condition.evaluations.clone();
    let op = Operation::empty("counted");
    op.add_condition(condition);

    queue.add_operation(op.clone()).unwrap();
    assert!(op.wait_until_finished().await.is_empty());
    assert_eq!(evaluations.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_condition_dependency_runs_before_evaluation() {
    let (queue, _) = isolated_queue();
    let recorder = Recorder::new();

    let dependency = Operation::block("permission", |_| async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(())
    });
    recorder.attach(&dependency);

    let op = Operation::empty("needs permission");
    recorder.attach(&op);
    op.add_condition(RequiresDependency::new(dependency.clone()));

    queue.add_operation(op.clone()).unwrap();
    let errors = op.wait_until_finished().await;

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert!(dependency.is_finished());
    assert!(op.dependencies().contains(&dependency));
    assert!(recorder.finished_at("permission") <= recorder.started_at("needs permission"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_explicit_dependencies_order_execution() {
    let (queue, _) = isolated_queue();
    let recorder = Recorder::new();

    let first = Operation::block("first", |_| async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(())
    });
    let second = Operation::empty("second");
    second.add_dependency(&first);
    recorder.attach(&first);
    recorder.attach(&second);

    // Admit the dependent first to show admission order does not matter
    queue
        .add_operations(vec![second.clone(), first.clone()], true)
        .await
        .unwrap();

    let events = recorder.events();
    let first_finished = events
        .iter()
        .position(|e| *e == Event::Finished("first".into(), 0))
        .unwrap();
    let second_started = events
        .iter()
        .position(|e| *e == Event::Started("second".into()))
        .unwrap();
    assert!(first_finished < second_started);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_produced_operation_is_admitted() {
    let (queue, _) = isolated_queue();
    let recorder = Recorder::new();
    let produced_ran = Arc::new(AtomicBool::new(false));

    let child = flagged("produced", produced_ran.clone());
    let parent = Operation::block("producer", move |op| async move {
        op.produce_operation(child);
        Ok(())
    });
    recorder.attach(&parent);

    queue.add_operation(parent.clone()).unwrap();
    parent.wait_until_finished().await;
    queue.wait_until_all_operations_are_finished().await;

    assert!(produced_ran.load(Ordering::SeqCst));
    assert!(recorder
        .events()
        .contains(&Event::Produced("producer".into(), "produced".into())));
    assert_eq!(queue.operation_count(), 0);
}

struct RacingFinish;

#[async_trait]
impl Work for RacingFinish {
    async fn execute(&self, operation: &Operation) {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let operation = operation.clone();
                tokio::spawn(async move {
                    operation.finish_with_error(OperationError::execution(format!("attempt {i}")));
                })
            })
            .collect();
        for handle in handles {
            let _ = handle.await;
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_finish_notifies_once() {
    let (queue, _) = isolated_queue();
    let recorder = Recorder::new();
    let op = Operation::new("racing", RacingFinish);
    recorder.attach(&op);

    queue.add_operation(op.clone()).unwrap();
    let errors = op.wait_until_finished().await;

    assert_eq!(errors.len(), 1);
    assert_eq!(recorder.count_finished("racing"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_delegate_sees_admissions_and_finishes() {
    let (queue, _) = isolated_queue();
    let delegate = Arc::new(MockDelegate::default());
    queue.set_delegate(&delegate);

    let ok = Operation::empty("ok");
    let gated = Operation::empty("gated");
    gated.add_condition(FixedCondition::failing("Nope"));

    queue
        .add_operations(vec![ok.clone(), gated.clone()], true)
        .await
        .unwrap();
    queue.wait_until_all_operations_are_finished().await;

    assert_eq!(delegate.added_names(), vec!["ok", "gated"]);
    let mut finished = delegate.finished_names();
    finished.sort();
    assert_eq!(finished, vec!["gated", "ok"]);
    assert_eq!(delegate.errors_for("ok"), Some(vec![]));
    assert_eq!(delegate.errors_for("gated").map(|e| e.len()), Some(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dropped_delegate_is_not_called() {
    let (queue, _) = isolated_queue();
    let delegate = Arc::new(MockDelegate::default());
    queue.set_delegate(&delegate);
    drop(delegate);

    let op = Operation::empty("orphan");
    queue.add_operation(op.clone()).unwrap();
    assert!(op.wait_until_finished().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_max_concurrent_operations_is_respected() {
    let queue = OperationQueue::with_config(
        QueueConfig {
            max_concurrent_operations: Some(2),
            ..QueueConfig::named("limited")
        },
        Arc::new(ExclusivityController::new()),
    );
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let operations: Vec<_> = (0..6)
        .map(|i| {
            let running = running.clone();
            let peak = peak.clone();
            Operation::block(format!("limited-{i}"), move |_| async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(15)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .collect();

    queue.add_operations(operations, true).await.unwrap();

    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert!(peak.load(Ordering::SeqCst) >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_all_operations() {
    let (queue, _) = isolated_queue();
    queue.set_suspended(true);

    let ran = Arc::new(AtomicBool::new(false));
    let operations: Vec<_> = (0..3)
        .map(|i| flagged(&format!("doomed-{i}"), ran.clone()))
        .collect();
    for op in &operations {
        queue.add_operation(op.clone()).unwrap();
    }

    queue.cancel_all_operations();
    queue.set_suspended(false);
    queue.wait_until_all_operations_are_finished().await;

    assert!(!ran.load(Ordering::SeqCst));
    assert!(operations.iter().all(|op| op.is_cancelled() && op.is_finished()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_cancelled_dependencies_blocks_execution() {
    let (queue, _) = isolated_queue();
    let dependency = Operation::empty("upstream");
    dependency.cancel();

    let ran = Arc::new(AtomicBool::new(false));
    let op = flagged("downstream", ran.clone());
    op.add_dependency(&dependency);
    op.add_condition(NoCancelledDependencies);

    queue.add_operation(dependency.clone()).unwrap();
    queue.add_operation(op.clone()).unwrap();
    let errors = op.wait_until_finished().await;

    assert!(!ran.load(Ordering::SeqCst));
    assert!(op.is_cancelled());
    assert_eq!(
        errors,
        vec![OperationError::condition_failed(
            "NoCancelledDependencies",
            "Cancelled dependencies: upstream"
        )]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelled_dependency_still_unblocks_dependents() {
    let (queue, _) = isolated_queue();
    let dependency = Operation::empty("upstream");
    dependency.cancel();

    let ran = Arc::new(AtomicBool::new(false));
    let op = flagged("downstream", ran.clone());
    op.add_dependency(&dependency);

    queue
        .add_operations(vec![dependency, op.clone()], true)
        .await
        .unwrap();

    assert!(ran.load(Ordering::SeqCst));
    assert!(op.errors().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_negated_condition_inverts_verdict() {
    let (queue, _) = isolated_queue();
    let ran = Arc::new(AtomicBool::new(false));
    let op = flagged("inverted", ran.clone());
    op.add_condition(NegatedCondition::new(FixedCondition::failing("Blocked")));

    queue.add_operation(op.clone()).unwrap();
    assert!(op.wait_until_finished().await.is_empty());
    assert!(ran.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_silent_condition_suppresses_dependency() {
    let (queue, _) = isolated_queue();
    let dependency = Operation::empty("prompt");
    let op = Operation::empty("quiet");
    op.add_condition(SilentCondition::new(RequiresDependency::new(dependency.clone())));

    queue.add_operation(op.clone()).unwrap();
    let errors = op.wait_until_finished().await;

    // The dependency was never admitted, so the wrapped condition fails
    assert_eq!(dependency.state(), OperationState::Initialized);
    assert!(op.is_cancelled());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].is_condition_failure());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_timeout_observer_cancels_slow_operation() {
    let (queue, _) = isolated_queue();
    let op = Operation::block("slow", |op| async move {
        while !op.is_cancelled() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        Ok(())
    });
    op.add_observer(TimeoutObserver::new(Duration::from_millis(20)));

    queue.add_operation(op.clone()).unwrap();
    let errors = op.wait_until_finished().await;

    assert!(op.is_cancelled());
    assert_eq!(
        errors,
        vec![OperationError::TimedOut {
            after: Duration::from_millis(20)
        }]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelled_evaluator_cancels_target() {
    let (queue, _) = isolated_queue();
    queue.set_suspended(true);

    let condition = FixedCondition::satisfied("Unchecked");
    let evaluations = condition.evaluations.clone();
    let ran = Arc::new(AtomicBool::new(false));
    let op = flagged("guarded", ran.clone());
    op.add_condition(condition);
    queue.add_operation(op.clone()).unwrap();

    let evaluator = queue
        .operations()
        .into_iter()
        .find(|candidate| candidate.name() == "guarded.condition_evaluator")
        .unwrap();
    evaluator.cancel();
    queue.set_suspended(false);

    assert!(op.wait_until_finished().await.is_empty());
    assert!(op.is_cancelled());
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(evaluations.load(Ordering::SeqCst), 0);
}
