// SPDX-License-Identifier: MIT

use super::*;
use std::time::Duration;

#[tokio::test]
async fn completes_immediately_with_no_criticals() {
    let sup = Arc::new(TaskSupervisor::new());
    let coordinator = ShutdownCoordinator::new(sup);
    let summary = coordinator.begin(Duration::from_secs(1)).await;
    assert_eq!(summary.status, "shutdown_complete");
    assert!(summary.acked.is_empty());
    assert!(summary.outstanding.is_empty());
    assert_eq!(summary.exit_code, 0);
}

#[tokio::test]
async fn waits_for_critical_ack_then_completes() {
    let sup = Arc::new(TaskSupervisor::new());
    let coordinator = Arc::new(ShutdownCoordinator::new(sup));
    coordinator.register_critical("persistence.flush");

    let bg = coordinator.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        bg.acknowledge("persistence.flush");
    });

    let summary = coordinator.begin(Duration::from_secs(5)).await;
    assert_eq!(summary.acked, vec!["persistence.flush".to_string()]);
    assert!(summary.outstanding.is_empty());
    assert_eq!(summary.exit_code, 0);
}

#[tokio::test]
async fn outstanding_ack_past_deadline_reports_exit_code_one() {
    let sup = Arc::new(TaskSupervisor::new());
    let coordinator = ShutdownCoordinator::new(sup);
    coordinator.register_critical("persistence.flush");

    let summary = coordinator.begin(Duration::from_millis(30)).await;
    assert_eq!(summary.outstanding, vec!["persistence.flush".to_string()]);
    assert_eq!(summary.exit_code, 1);
}

#[tokio::test]
async fn begin_cancels_and_force_detaches_background_tasks() {
    let sup = Arc::new(TaskSupervisor::new());
    // a stuck task that ignores cancellation — exercises force-detach.
    sup.start_task("watcher:stuck", None, false, |_token| async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
    })
    .unwrap();

    let coordinator = ShutdownCoordinator::new(sup.clone());
    let summary = coordinator.begin(Duration::from_millis(30)).await;

    assert_eq!(summary.cancelled_tasks, vec!["watcher:stuck".to_string()]);
    assert_eq!(summary.force_detached_tasks, vec!["watcher:stuck".to_string()]);
    assert_eq!(sup.task_count(), 0);
}

#[tokio::test]
async fn is_shutting_down_flips_once_begin_starts() {
    let sup = Arc::new(TaskSupervisor::new());
    let coordinator = ShutdownCoordinator::new(sup);
    assert!(!coordinator.is_shutting_down());
    coordinator.begin(Duration::from_secs(0)).await;
    assert!(coordinator.is_shutting_down());
}

#[tokio::test]
async fn completion_state_is_unset_until_begin_finishes() {
    let sup = Arc::new(TaskSupervisor::new());
    let coordinator = ShutdownCoordinator::new(sup);
    assert!(!coordinator.is_complete());
    assert_eq!(coordinator.completion_exit_code(), None);

    coordinator.begin(Duration::from_secs(0)).await;
    assert!(coordinator.is_complete());
    assert_eq!(coordinator.completion_exit_code(), Some(0));
}

#[tokio::test]
async fn completion_exit_code_reflects_outstanding_acks() {
    let sup = Arc::new(TaskSupervisor::new());
    let coordinator = ShutdownCoordinator::new(sup);
    coordinator.register_critical("persistence.flush");

    coordinator.begin(Duration::from_millis(30)).await;
    assert_eq!(coordinator.completion_exit_code(), Some(1));
}
