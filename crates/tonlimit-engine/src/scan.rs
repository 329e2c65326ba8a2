//! Budgeted round-robin scans over a tick's orders.
//!
//! A tick launches work until its budget runs out and never cancels what it
//! already started (every external call is bounded on its own). Orders that
//! were not launched are first in line on the next tick.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future;
use futures_util::stream::{self, StreamExt};
use tokio::time::Instant;

/// Results of one scan.
#[derive(Debug)]
pub(crate) struct Scan<R> {
    pub results: Vec<R>,
    /// Items left for the next tick because the budget ran out.
    pub carried_over: usize,
}

/// Start position carried between ticks.
#[derive(Debug, Default)]
pub(crate) struct ScanCursor {
    next: AtomicUsize,
}

impl ScanCursor {
    /// Run `f` over `items` with at most `concurrency` in flight, starting
    /// where the previous scan stopped. No item is launched after `budget`
    /// has elapsed; the first one always is.
    pub(crate) async fn run<T, R, F, Fut>(
        &self,
        mut items: Vec<T>,
        budget: Duration,
        concurrency: usize,
        f: F,
    ) -> Scan<R>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = R>,
    {
        let total = items.len();
        if total == 0 {
            return Scan {
                results: Vec::new(),
                carried_over: 0,
            };
        }
        let start = self.next.load(Ordering::Relaxed) % total;
        items.rotate_left(start);

        let deadline = Instant::now() + budget;
        let mut launched = 0usize;
        let results: Vec<R> = stream::iter(items)
            .take_while(|_| {
                let launch = launched == 0 || Instant::now() < deadline;
                launched += usize::from(launch);
                future::ready(launch)
            })
            .map(f)
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        self.next
            .store((start + results.len()) % total, Ordering::Relaxed);
        Scan {
            carried_over: total - results.len(),
            results,
        }
    }
}
