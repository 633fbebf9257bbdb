use std::sync::Arc;
use std::time::Duration;

use crate::config::PipelineConfig;
use crate::error::Error;
use crate::pipeline::Pipeline;
use crate::pipeline::test_helpers::{MockWorker, items, pipeline_with, pipeline_with_config};
use crate::types::{Artifact, Event, WorkItem, WorkerError};
use crate::worker::{ArtifactWorker, FnWorker};

// -----------------------------------------------------------------------
// run_tracked
// -----------------------------------------------------------------------

#[tokio::test]
async fn tracked_total_is_sum_of_successful_sizes() {
    let worker = Arc::new(
        MockWorker::new()
            .failing_on(["b.jpg"])
            .with_default_latency(Duration::from_millis(2)),
    );
    let pipeline = pipeline_with(&worker);
    let names = ["a.jpg", "b.jpg", "long-name.jpeg"];

    let total = pipeline
        .run_tracked(futures::stream::iter(items(&names)))
        .await;

    let expected = MockWorker::size_of("a.jpg") + MockWorker::size_of("long-name.jpeg");
    assert_eq!(total, expected);
    assert_eq!(pipeline.in_flight(), 0);
    let stats = pipeline.stats();
    assert_eq!(stats.total_bytes, expected);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn tracked_consumes_a_live_channel_until_the_producer_closes_it() {
    let worker = Arc::new(MockWorker::new().with_default_latency(Duration::from_millis(5)));
    let pipeline = pipeline_with(&worker);
    let (tx, rx) = pipeline.item_channel();

    let producer = tokio::spawn(async move {
        for i in 0..10 {
            tx.send(WorkItem::new(format!("{i}.png"))).await.unwrap();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    });

    let total = pipeline.run_tracked_channel(rx).await;
    producer.await.unwrap();

    let expected: u64 = (0..10)
        .map(|i| MockWorker::size_of(&format!("{i}.png")))
        .sum();
    assert_eq!(total, expected);
    assert_eq!(worker.calls(), 10);
    assert_eq!(pipeline.in_flight(), 0);
}

#[tokio::test]
async fn tracked_waits_for_a_slow_producer_between_items() {
    // The tracker must not reach zero in the gap between two items.
    let worker = Arc::new(MockWorker::new());
    let pipeline = pipeline_with(&worker);
    let (tx, rx) = pipeline.item_channel();

    let producer = tokio::spawn(async move {
        tx.send(WorkItem::from("first.jpg")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(WorkItem::from("second.jpg")).await.unwrap();
    });

    let total = pipeline.run_tracked_channel(rx).await;
    producer.await.unwrap();

    assert_eq!(
        total,
        MockWorker::size_of("first.jpg") + MockWorker::size_of("second.jpg")
    );
}

#[tokio::test]
async fn tracked_empty_stream_returns_zero_and_closes_conduit() {
    let worker = Arc::new(MockWorker::new());
    let pipeline = pipeline_with(&worker);
    let mut events = pipeline.subscribe();

    let total = tokio::time::timeout(
        Duration::from_secs(1),
        pipeline.run_tracked(futures::stream::empty()),
    )
    .await
    .unwrap();

    assert_eq!(total, 0);
    let mut closed = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, Event::ConduitClosed { .. }) {
            closed = true;
        }
    }
    assert!(closed, "closer should close the conduit of an empty run");
}

#[tokio::test]
async fn tracked_excludes_artifacts_whose_size_cannot_be_read() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().to_path_buf();
    let worker = FnWorker::new(move |item: WorkItem| {
        let out = out.clone();
        async move {
            let path = out.join(format!("{}.thumb", item.as_str()));
            if item.as_str() != "missing" {
                let len = if item.as_str() == "big" { 300 } else { 20 };
                tokio::fs::write(&path, vec![0u8; len])
                    .await
                    .map_err(|e| WorkerError::new(item.clone(), e.to_string()))?;
            }
            Ok::<_, WorkerError>(Artifact::new(item, path))
        }
    });
    let pipeline = Pipeline::with_worker(PipelineConfig::default(), worker).unwrap();

    let total = pipeline
        .run_tracked(futures::stream::iter(items(&["big", "small", "missing"])))
        .await;

    assert_eq!(total, 320);
    let stats = pipeline.stats();
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.failed, 1);
}

// -----------------------------------------------------------------------
// run_cancelling
// -----------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn cancelling_returns_first_error_with_no_units_left_running() {
    let worker = Arc::new(
        MockWorker::new()
            .failing_on(["a.jpg"])
            .with_latency("a.jpg", Duration::from_millis(1))
            .with_latency("b.jpg", Duration::from_millis(500))
            .with_latency("c.jpg", Duration::from_millis(500)),
    );
    let pipeline = pipeline_with(&worker);

    let err = pipeline
        .run_cancelling(items(&["a.jpg", "b.jpg", "c.jpg"]))
        .await
        .unwrap_err();

    assert_eq!(err.worker_error().unwrap().item, WorkItem::from("a.jpg"));
    assert_eq!(pipeline.in_flight(), 0);
    assert_eq!(pipeline.stats().orphaned, 0);
}

#[tokio::test(start_paused = true)]
async fn cancelling_skips_units_that_have_not_started() {
    let worker = Arc::new(
        MockWorker::new()
            .failing_on(["a.jpg"])
            .with_latency("a.jpg", Duration::from_millis(1))
            .with_default_latency(Duration::from_millis(100)),
    );
    let config = PipelineConfig {
        max_concurrency: Some(1),
        ..Default::default()
    };
    let pipeline = pipeline_with_config(&worker, config);

    let err = pipeline
        .run_cancelling(items(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Worker(_)));
    let invoked = worker.invoked();
    assert!(!invoked.contains(&"c.jpg".to_string()), "{invoked:?}");
    assert!(!invoked.contains(&"d.jpg".to_string()), "{invoked:?}");
    assert!(pipeline.stats().cancelled >= 2);
    assert_eq!(pipeline.in_flight(), 0);
}

#[tokio::test]
async fn cancelling_returns_all_artifacts_when_nothing_fails() {
    let worker = Arc::new(MockWorker::new().with_default_latency(Duration::from_millis(1)));
    let pipeline = pipeline_with(&worker);

    let artifacts = pipeline
        .run_cancelling(items(&["a.jpg", "b.jpg", "c.jpg"]))
        .await
        .unwrap();

    assert_eq!(artifacts.len(), 3);
    assert_eq!(pipeline.stats().cancelled, 0);
}

#[tokio::test]
async fn cancelling_with_no_items_is_ok() {
    let worker = Arc::new(MockWorker::new());
    let pipeline = pipeline_with(&worker);

    let artifacts = pipeline.run_cancelling(Vec::new()).await.unwrap();

    assert!(artifacts.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancelling_one_run_leaves_other_runs_alone() {
    let worker = Arc::new(
        MockWorker::new()
            .failing_on(["bad.jpg"])
            .with_latency("bad.jpg", Duration::from_millis(1))
            .with_default_latency(Duration::from_millis(50)),
    );
    let pipeline = pipeline_with(&worker);

    let (failing, healthy) = tokio::join!(
        pipeline.run_cancelling(items(&["bad.jpg", "x.jpg"])),
        pipeline.run_cancelling(items(&["p.jpg", "q.jpg"])),
    );

    assert!(failing.is_err());
    assert_eq!(healthy.unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancelling_treats_a_worker_panic_as_the_first_error() {
    let worker = Arc::new(
        MockWorker::new()
            .panicking_on("boom.jpg")
            .with_latency("boom.jpg", Duration::from_millis(1))
            .with_default_latency(Duration::from_millis(500)),
    );
    let config = PipelineConfig {
        max_concurrency: Some(1),
        ..Default::default()
    };
    let pipeline = pipeline_with_config(&worker, config);

    let err = pipeline
        .run_cancelling(items(&["boom.jpg", "b.jpg", "c.jpg"]))
        .await
        .unwrap_err();

    let failure = err.worker_error().expect("panic must surface as a worker error");
    assert_eq!(failure.item, WorkItem::from("boom.jpg"));
    assert!(failure.reason.starts_with("worker panicked"), "{}", failure.reason);
    assert!(!worker.invoked().contains(&"c.jpg".to_string()));
    assert!(pipeline.stats().cancelled >= 1);
    assert_eq!(pipeline.in_flight(), 0);
}

/// Reports an absurd size for every artifact
struct HugeArtifacts;

#[async_trait::async_trait]
impl ArtifactWorker for HugeArtifacts {
    async fn process(&self, item: &WorkItem) -> std::result::Result<Artifact, WorkerError> {
        Ok(Artifact::new(item.clone(), format!("{}.thumb", item.as_str())))
    }

    async fn size(&self, _artifact: &Artifact) -> std::result::Result<u64, WorkerError> {
        Ok(u64::MAX - 1)
    }
}

#[tokio::test]
async fn tracked_total_saturates_instead_of_overflowing() {
    let pipeline = Pipeline::with_worker(PipelineConfig::default(), HugeArtifacts).unwrap();

    let total = pipeline
        .run_tracked(futures::stream::iter(items(&["a.jpg", "b.jpg", "c.jpg"])))
        .await;

    assert_eq!(total, u64::MAX);
    let stats = pipeline.stats();
    assert_eq!(stats.succeeded, 3);
    assert_eq!(stats.total_bytes, u64::MAX);
}
