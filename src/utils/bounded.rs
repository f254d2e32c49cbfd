use std::future::Future;

use futures::future;
use tokio::sync::Semaphore;

/// Run `task` for every item with at most `limit` futures in flight,
/// returning once all of them have finished.
///
/// A permit is held for the whole lifetime of each task, including any
/// delay the task applies after its work.
pub async fn for_each_bounded<T, F, Fut>(items: impl IntoIterator<Item = T>, limit: usize, task: F)
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = ()>,
{
    let semaphore = Semaphore::new(limit.max(1));
    let semaphore = &semaphore;
    let task = &task;

    let futures = items.into_iter().map(|item| async move {
        let Ok(_permit) = semaphore.acquire().await else {
            return;
        };
        task(item).await;
    });

    future::join_all(futures).await;
}
