// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use parfor_task_pool::{
    CountingProgress, ExecutionMode, FailurePolicy, ParforError, ProgressSink, TaskDistributor,
    WorkerHandle,
};
use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::Barrier;

fn concurrent(workers: usize) -> ExecutionMode {
    ExecutionMode::concurrent(workers).unwrap()
}

/// Sink that can be inspected after the distributor took ownership of it.
#[derive(Clone, Default)]
struct SharedProgress(Arc<Mutex<CountingProgress>>);

impl ProgressSink for SharedProgress {
    fn advance(&mut self) {
        self.0.lock().unwrap().advance();
    }

    fn finalize(&mut self) {
        self.0.lock().unwrap().finalize();
    }
}

// ============================================================
// Coverage
// ============================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_counter_reaches_item_count_with_three_workers() {
    let counter = Arc::new(Mutex::new(0usize));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let handler_counter = Arc::clone(&counter);
    let handler_seen = Arc::clone(&seen);
    TaskDistributor::new(concurrent(3))
        .run((0..100).collect(), move |_worker, item: usize| {
            let counter = Arc::clone(&handler_counter);
            let seen = Arc::clone(&handler_seen);
            async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                *counter.lock().unwrap() += 1;
                seen.lock().unwrap().push(item);
                Ok::<_, Infallible>(())
            }
        })
        .await
        .unwrap();

    assert_eq!(*counter.lock().unwrap(), 100);
    let mut seen = seen.lock().unwrap().clone();
    seen.sort_unstable();
    assert_eq!(seen, (0..100).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_workers_overlap_while_awaiting() {
    let barrier = Arc::new(Barrier::new(3));
    let workers = Arc::new(Mutex::new(HashSet::new()));

    let handler_workers = Arc::clone(&workers);
    TaskDistributor::new(concurrent(3))
        .run(vec![0u8, 1, 2], move |worker, _item| {
            let barrier = Arc::clone(&barrier);
            let workers = Arc::clone(&handler_workers);
            async move {
                barrier.wait().await;
                workers.lock().unwrap().insert(worker);
                Ok::<_, Infallible>(())
            }
        })
        .await
        .unwrap();

    assert_eq!(workers.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_sequential_mode_keeps_claim_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let handler_seen = Arc::clone(&seen);
    TaskDistributor::new(ExecutionMode::Sequential)
        .run((0..20).collect(), move |worker, item: u32| {
            let seen = Arc::clone(&handler_seen);
            async move {
                assert_eq!(worker, WorkerHandle::new(0));
                seen.lock().unwrap().push(item);
                Ok::<_, Infallible>(())
            }
        })
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), (0..20).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sequential_mode_stays_on_caller_thread() {
    let caller = thread::current().id();
    let threads = Arc::new(Mutex::new(Vec::new()));

    let handler_threads = Arc::clone(&threads);
    TaskDistributor::new(ExecutionMode::Sequential)
        .run((0..50).collect(), move |_worker, _item: u32| {
            let threads = Arc::clone(&handler_threads);
            async move {
                threads.lock().unwrap().push(thread::current().id());
                tokio::task::yield_now().await;
                threads.lock().unwrap().push(thread::current().id());
                Ok::<_, Infallible>(())
            }
        })
        .await
        .unwrap();

    let threads = threads.lock().unwrap();
    assert_eq!(threads.len(), 100);
    assert!(threads.iter().all(|id| *id == caller), "sequential handlers left the caller thread");
}

// ============================================================
// Progress and empty input
// ============================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_progress_counts_every_item_and_finalizes() {
    let progress = SharedProgress::default();

    TaskDistributor::new(concurrent(5))
        .with_progress(progress.clone())
        .run((0..77).collect::<Vec<u32>>(), |_worker, _item| async {
            Ok::<_, Infallible>(())
        })
        .await
        .unwrap();

    let progress = progress.0.lock().unwrap();
    assert_eq!(progress.advances(), 77);
    assert!(progress.is_finalized());
    assert_eq!(progress.advances_after_finalize(), 0);
}

#[tokio::test]
async fn test_empty_input_makes_no_calls() {
    let calls = Arc::new(AtomicUsize::new(0));
    let progress = SharedProgress::default();

    let handler_calls = Arc::clone(&calls);
    TaskDistributor::new(concurrent(4))
        .with_progress(progress.clone())
        .run(Vec::<String>::new(), move |_worker, _item| {
            handler_calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, Infallible>(()) }
        })
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(progress.0.lock().unwrap().advances(), 0);
}

// ============================================================
// Failures
// ============================================================

#[tokio::test]
async fn test_fail_late_reports_after_all_items() {
    let handled = Arc::new(AtomicUsize::new(0));

    let handler_handled = Arc::clone(&handled);
    let error = TaskDistributor::new(concurrent(3))
        .run((0..30).collect(), move |_worker, item: usize| {
            handler_handled.fetch_add(1, Ordering::SeqCst);
            async move {
                if item == 7 {
                    return Err(format!("item {} rejected", item));
                }
                Ok(())
            }
        })
        .await
        .unwrap_err();

    assert_eq!(handled.load(Ordering::SeqCst), 30);
    assert_eq!(error.item_index(), Some(7));
    assert_eq!(error.failed_items(), Some(1));
    assert!(error.to_string().contains("item 7 rejected"));
}

#[tokio::test]
async fn test_fail_fast_sequential_stops_at_failure() {
    let handled = Arc::new(AtomicUsize::new(0));

    let handler_handled = Arc::clone(&handled);
    let error = TaskDistributor::new(ExecutionMode::Sequential)
        .with_failure_policy(FailurePolicy::FailFast)
        .run((0..30).collect(), move |_worker, item: usize| {
            handler_handled.fetch_add(1, Ordering::SeqCst);
            async move {
                if item == 4 {
                    return Err("stop");
                }
                Ok(())
            }
        })
        .await
        .unwrap_err();

    assert_eq!(handled.load(Ordering::SeqCst), 5);
    assert!(matches!(error, ParforError::HandlerFailed { index: 4, .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handler_panic_keeps_worker_alive() {
    let handled = Arc::new(AtomicUsize::new(0));

    let handler_handled = Arc::clone(&handled);
    let error = TaskDistributor::new(concurrent(2))
        .run((0..10).collect(), move |_worker, item: usize| {
            let handled = Arc::clone(&handler_handled);
            async move {
                handled.fetch_add(1, Ordering::SeqCst);
                if item == 2 {
                    panic!("async boom");
                }
                Ok::<_, Infallible>(())
            }
        })
        .await
        .unwrap_err();

    assert_eq!(handled.load(Ordering::SeqCst), 10);
    match error {
        ParforError::HandlerPanicked { index, message, .. } => {
            assert_eq!(index, 2);
            assert_eq!(message, "async boom");
        }
        other => panic!("Expected HandlerPanicked, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fail_fast_concurrent_stops_claiming() {
    let handled = Arc::new(AtomicUsize::new(0));
    let progress = SharedProgress::default();

    let handler_handled = Arc::clone(&handled);
    let error = TaskDistributor::new(concurrent(2))
        .with_failure_policy(FailurePolicy::FailFast)
        .with_progress(progress.clone())
        .run((0..100).collect(), move |_worker, item: usize| {
            handler_handled.fetch_add(1, Ordering::SeqCst);
            async move {
                if item == 0 {
                    return Err("first item rejected");
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(())
            }
        })
        .await
        .unwrap_err();

    assert_eq!(error.item_index(), Some(0));
    let handled = handled.load(Ordering::SeqCst);
    assert!(handled < 100, "fail-fast handled {} items", handled);
    let progress = progress.0.lock().unwrap();
    assert_eq!(progress.advances(), handled as u64);
    assert!(progress.is_finalized());
}

/// Panics on the `nth` advance without poisoning the shared counter.
struct PanicsOnAdvance {
    nth: u64,
    progress: SharedProgress,
}

impl ProgressSink for PanicsOnAdvance {
    fn advance(&mut self) {
        let advances = {
            let mut progress = self.progress.0.lock().unwrap();
            progress.advance();
            progress.advances()
        };
        if advances == self.nth {
            panic!("sink broke");
        }
    }

    fn finalize(&mut self) {
        self.progress.finalize();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sink_panic_surfaces_as_lost_worker() {
    let progress = SharedProgress::default();

    let error = TaskDistributor::new(concurrent(2))
        .with_progress(PanicsOnAdvance {
            nth: 5,
            progress: progress.clone(),
        })
        .run((0..20).collect::<Vec<u32>>(), |_worker, _item| async {
            Ok::<_, Infallible>(())
        })
        .await
        .unwrap_err();

    match error {
        ParforError::WorkerLost { message, .. } => assert_eq!(message, "sink broke"),
        other => panic!("Expected WorkerLost, got {:?}", other),
    }
    assert!(progress.0.lock().unwrap().is_finalized());
}

#[tokio::test]
async fn test_sequential_sink_panic_surfaces_as_lost_worker() {
    let progress = SharedProgress::default();
    let handled = Arc::new(AtomicUsize::new(0));

    let handler_handled = Arc::clone(&handled);
    let error = TaskDistributor::new(ExecutionMode::Sequential)
        .with_progress(PanicsOnAdvance {
            nth: 3,
            progress: progress.clone(),
        })
        .run((0..10).collect::<Vec<u32>>(), move |_worker, _item| {
            handler_handled.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, Infallible>(()) }
        })
        .await
        .unwrap_err();

    match error {
        ParforError::WorkerLost { worker, message } => {
            assert_eq!(worker, WorkerHandle::new(0));
            assert_eq!(message, "sink broke");
        }
        other => panic!("Expected WorkerLost, got {:?}", other),
    }
    assert_eq!(handled.load(Ordering::SeqCst), 2);
    assert!(progress.0.lock().unwrap().is_finalized());
}
