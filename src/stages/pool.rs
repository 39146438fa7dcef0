use futures::stream::{self, StreamExt};
use std::future::Future;

use crate::common::create_count_progress_bar;

/// Run `task` over `items` with at most `width` in flight.
///
/// Results come back in input order regardless of completion order, so a
/// stage's output does not depend on scheduling. A width of 1 runs the items
/// strictly one after another.
pub async fn run_bounded<I, R, F, Fut>(items: Vec<I>, width: usize, message: &str, task: F) -> Vec<R>
where
    F: Fn(usize, I) -> Fut,
    Fut: Future<Output = R>,
{
    if items.is_empty() {
        return Vec::new();
    }

    let progress = create_count_progress_bar(items.len() as u64, message);

    let mut results: Vec<(usize, R)> = stream::iter(items.into_iter().enumerate())
        .map(|(index, item)| {
            let fut = task(index, item);
            let progress = progress.clone();
            async move {
                let result = fut.await;
                progress.inc(1);
                (index, result)
            }
        })
        .buffer_unordered(width.max(1))
        .collect()
        .await;

    progress.finish_and_clear();
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}
