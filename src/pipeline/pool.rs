use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::error;

/// Run `f` over every item with at most `limit` futures in flight.
///
/// A permit is taken before each task is spawned and released when the task
/// ends, so the next pending item starts as soon as any slot frees. Returns
/// once every task has finished; slot `i` holds the output for `items[i]`,
/// or `None` if that task panicked.
pub async fn run_bounded<T, R, F, Fut>(items: Vec<T>, limit: usize, f: F) -> Vec<Option<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
{
    let total = items.len();
    let sem = Arc::new(Semaphore::new(limit.max(1)));
    let mut tasks = JoinSet::new();

    for (idx, item) in items.into_iter().enumerate() {
        // the semaphore is never closed
        let Ok(permit) = Arc::clone(&sem).acquire_owned().await else {
            break;
        };
        let fut = f(item);
        tasks.spawn(async move {
            let out = fut.await;
            drop(permit);
            (idx, out)
        });
    }

    let mut results: Vec<Option<R>> = (0..total).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, out)) => results[idx] = Some(out),
            Err(e) => error!("Worker task failed: {}", e),
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_never_exceeds_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..10).map(|_| oneshot::channel::<()>()).unzip();

        let worker = {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            let done = Arc::clone(&done);
            tokio::spawn(async move {
                run_bounded(receivers, 2, move |rx| {
                    let in_flight = Arc::clone(&in_flight);
                    let peak = Arc::clone(&peak);
                    let done = Arc::clone(&done);
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        let _ = rx.await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        done.fetch_add(1, Ordering::SeqCst);
                    }
                })
                .await
            })
        };

        let total = senders.len();
        for (released, tx) in senders.into_iter().enumerate() {
            tokio::time::sleep(Duration::from_millis(10)).await;
            // each freed slot is refilled while work remains
            let pending = total - released;
            assert_eq!(in_flight.load(Ordering::SeqCst), pending.min(2));
            tx.send(()).unwrap();
        }

        let results = worker.await.unwrap();
        assert_eq!(results.len(), 10);
        assert!(results.iter().all(Option::is_some));
        assert_eq!(done.load(Ordering::SeqCst), 10);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let results = run_bounded(vec![30u64, 0, 10], 3, |ms| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            ms * 2
        })
        .await;
        assert_eq!(results, vec![Some(60), Some(0), Some(20)]);
    }

    #[tokio::test]
    async fn test_panicking_task_yields_none() {
        let results = run_bounded(vec![1, 2, 3], 2, |n| async move {
            if n == 2 {
                panic!("boom");
            }
            n
        })
        .await;
        assert_eq!(results, vec![Some(1), None, Some(3)]);
    }

    #[tokio::test]
    async fn test_zero_limit_still_progresses() {
        let results = run_bounded(vec![1, 2], 0, |n| async move { n + 1 }).await;
        assert_eq!(results, vec![Some(2), Some(3)]);
    }
}
