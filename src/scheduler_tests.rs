// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the renewal scheduler.

#[cfg(test)]
mod tests {
    use crate::errors::{RenewalError, SecretStoreError};
    use crate::renewal::CycleReport;
    use crate::scheduler::{run_scheduler, CycleRunner};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct Counters {
        started: AtomicUsize,
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    struct FakeRunner {
        counters: Arc<Counters>,
        cycle_duration: Duration,
        fail_on: Option<usize>,
    }

    impl FakeRunner {
        fn new(cycle_duration: Duration) -> (Self, Arc<Counters>) {
            let counters = Arc::new(Counters::default());
            let runner = Self {
                counters: counters.clone(),
                cycle_duration,
                fail_on: None,
            };
            (runner, counters)
        }
    }

    #[async_trait]
    impl CycleRunner for FakeRunner {
        async fn run_cycle(&mut self) -> Result<CycleReport, RenewalError> {
            let n = self.counters.started.fetch_add(1, Ordering::SeqCst) + 1;
            let running = self.counters.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.max_running.fetch_max(running, Ordering::SeqCst);

            tokio::time::sleep(self.cycle_duration).await;
            self.counters.running.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on == Some(n) {
                return Err(RenewalError::SecretStore {
                    secret_name: "a-tls".to_string(),
                    source: SecretStoreError::ReadFailed {
                        namespace: "ns1".to_string(),
                        name: "a-tls".to_string(),
                        reason: "forbidden".to_string(),
                    },
                });
            }
            Ok(CycleReport::default())
        }
    }

    struct CancelledRunner;

    #[async_trait]
    impl CycleRunner for CancelledRunner {
        async fn run_cycle(&mut self) -> Result<CycleReport, RenewalError> {
            Err(RenewalError::Cancelled)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_runs_at_startup() {
        let (runner, counters) = FakeRunner::new(Duration::from_millis(10));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_scheduler(
            runner,
            Duration::from_secs(3600),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counters.started.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(counters.started.load(Ordering::SeqCst), 2);

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycles_never_overlap() {
        let (runner, counters) = FakeRunner::new(Duration::from_secs(150));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_scheduler(
            runner,
            Duration::from_secs(60),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(610)).await;
        cancel.cancel();
        handle.await.unwrap().unwrap();

        let started = counters.started.load(Ordering::SeqCst);
        assert!((4..=5).contains(&started), "started {started} cycles");
        assert_eq!(counters.max_running.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_error_stops_scheduler() {
        let (mut runner, counters) = FakeRunner::new(Duration::from_millis(10));
        runner.fail_on = Some(2);
        let cancel = CancellationToken::new();

        let err = run_scheduler(runner, Duration::from_secs(60), cancel.clone())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("renewal cycle failed"));
        assert_eq!(counters.started.load(Ordering::SeqCst), 2);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_cleanly() {
        let (runner, counters) = FakeRunner::new(Duration::from_millis(10));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_scheduler(
            runner,
            Duration::from_secs(60),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        assert!(handle.await.unwrap().is_ok());
        assert_eq!(counters.started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_cycle_is_not_an_error() {
        let cancel = CancellationToken::new();

        let result = run_scheduler(CancelledRunner, Duration::from_secs(60), cancel.clone()).await;

        assert!(result.is_ok());
        assert!(cancel.is_cancelled());
    }
}
