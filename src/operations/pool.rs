//! Bounded per-pin fan-out
//!
//! At most `limit` futures are in flight at once, all polled on the
//! calling task. Results come back in input order.

use std::future::Future;

use futures_util::stream::{self, StreamExt};

pub(crate) async fn run_bounded<T, R, F, Fut>(items: Vec<T>, limit: usize, f: F) -> Vec<R>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(items)
        .map(f)
        .buffered(limit.max(1))
        .collect()
        .await
}
