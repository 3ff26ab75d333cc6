use std::time::Duration;

use futures::StreamExt;
use rand::Rng;
use seqops::{Options, Step, filter, indexed_pairs, map, to_vec};
use seqops_testing::{ConcurrencyTracker, counting, random_delay, scripted};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_random_delays_preserve_order() {
    for _ in 0..20 {
        let (len, concurrency) = {
            let mut rng = rand::rng();
            (rng.random_range(0..150usize), rng.random_range(1..=8usize))
        };

        let source = scripted(0..len);
        source.injector().set_pull_jitter(2);
        let probe = source.probe();
        let tracker = ConcurrencyTracker::new();
        let in_flight = tracker.clone();
        let mapped = map(
            source,
            move |v, _| {
                let guard = in_flight.enter();
                let delay = random_delay(Duration::from_millis(5));
                async move {
                    tokio::time::sleep(delay).await;
                    drop(guard);
                    Ok(Step::Yield(v * 2))
                }
            },
            Options::new().with_concurrency(concurrency),
        )
        .unwrap();

        let out = to_vec(mapped, Options::default()).await.unwrap();
        let expected: Vec<usize> = (0..len).map(|v| v * 2).collect();
        assert_eq!(out, expected, "len={len} concurrency={concurrency}");
        assert!(tracker.peak() <= concurrency);
        assert_eq!(tracker.current(), 0);
        assert_eq!(probe.pulled(), len);
        assert!(probe.is_closed());
    }
}

#[tokio::test]
async fn test_outstanding_bounded_by_concurrency() {
    let source = counting();
    let probe = source.probe();
    let mut mapped = map(
        source,
        |v, _| async move {
            tokio::time::sleep(random_delay(Duration::from_millis(2))).await;
            Ok(Step::Yield(v))
        },
        Options::new().with_concurrency(4),
    )
    .unwrap();
    assert_eq!(mapped.concurrency(), 4);

    for expected in 0..50u64 {
        assert_eq!(mapped.next().await, Some(Ok(expected)));
        assert!(mapped.outstanding() <= 4);
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(probe.pulled() <= 50 + 4);
}

#[tokio::test]
async fn test_filter_with_jitter_keeps_order() {
    let source = scripted(0..500u32);
    let kept = filter(
        source,
        |v, _| {
            let keep = v % 7 == 0;
            let delay = random_delay(Duration::from_millis(3));
            async move {
                if keep {
                    tokio::time::sleep(delay).await;
                }
                Ok(keep)
            }
        },
        Options::new().with_concurrency(6),
    )
    .unwrap();
    let out = to_vec(kept, Options::default()).await.unwrap();
    let expected: Vec<u32> = (0..500).filter(|v| v % 7 == 0).collect();
    assert_eq!(out, expected);
}

#[tokio::test]
async fn test_indexed_pairs_after_map() {
    let mapped = map(
        scripted(vec!["x", "y", "z"]),
        |v, _| async move { Ok(Step::Yield(v.to_uppercase())) },
        Options::new().with_concurrency(2),
    )
    .unwrap();
    let pairs = to_vec(indexed_pairs(mapped, Options::default()), Options::default())
        .await
        .unwrap();
    assert_eq!(
        pairs,
        vec![
            (0, "X".to_string()),
            (1, "Y".to_string()),
            (2, "Z".to_string())
        ]
    );
}
