// 有界批量执行器
//
// 以固定并发上限执行一组异步任务：
// - 任意一个任务结束（成功或失败）立即让出槽位，后续任务补位
// - 不按提交顺序等待，不做"整批 N 个等完再下一批"
// - 任务结果由任务自身记录，这里一律丢弃
//
// 所有任务在当前 task 内协作式交替执行，不会 spawn 到其他线程

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use tracing::trace;

/// 以并发上限 `limit` 执行 `items`，对每个元素调用 `process` 生成任务
///
/// 全部任务结束后返回；`limit` 为 0 时按 1 处理
pub async fn execute_in_batches<I, F, Fut>(items: I, limit: usize, mut process: F)
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future,
{
    let limit = limit.max(1);
    let mut in_flight = FuturesUnordered::new();
    let mut submitted = 0usize;

    for item in items {
        // 槽位已满：等任意一个任务结束
        if in_flight.len() >= limit {
            in_flight.next().await;
        }
        in_flight.push(process(item));
        submitted += 1;
    }

    while in_flight.next().await.is_some() {}

    trace!("批量执行完成: 共 {} 个任务, 并发上限 {}", submitted, limit);
}

/// 执行一组零参数任务
pub async fn batch_upload<T, Fut>(tasks: Vec<T>, limit: usize)
where
    T: FnOnce() -> Fut,
    Fut: Future,
{
    execute_in_batches(tasks, limit, |task| task()).await;
}
