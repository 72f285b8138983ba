//! ### English
//! The minimal task executor that actually drives a [`Sender`](super::sender::Sender)'s
//! future to completion. A `Task` polls its boxed future inline, on whatever
//! thread calls [`std::task::Wake::wake`] — there is no separate ready queue.
//! This is what makes `on(scheduler, sender)` work: when a parked op's
//! wake callback fires on a given worker thread, it calls `Waker::wake`,
//! which polls the remainder of the task synchronously on that same thread.
//!
//! ### 中文
//! 真正驱动 [`Sender`](super::sender::Sender) 的 future 直至完成的最小任务执行器。
//! `Task` 在任意调用 [`std::task::Wake::wake`] 的线程上内联地轮询其装箱 future——
//! 不存在单独的就绪队列。这正是 `on(scheduler, sender)` 得以成立的原因：当某个
//! 挂起 op 的 wake 回调在某个 worker 线程上触发时，它调用 `Waker::wake`，
//! 从而在同一线程上同步轮询任务的剩余部分。

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use crate::sync::spinlock::Spinlock;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const NOTIFIED: u8 = 2;
const COMPLETE: u8 = 3;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// ### English
/// A spawned unit of work: a boxed, type-erased top-level future plus the
/// small state machine (`IDLE`/`RUNNING`/`NOTIFIED`/`COMPLETE`) that
/// guarantees a wake arriving while a poll is already in progress is not
/// lost, without double-polling concurrently.
///
/// ### 中文
/// 一个被 spawn 的工作单元：一个装箱、类型擦除的顶层 future，外加一个小状态机
/// （`IDLE`/`RUNNING`/`NOTIFIED`/`COMPLETE`），保证在某次轮询进行中到达的 wake
/// 不会丢失，同时不会并发地重复轮询。
pub(crate) struct Task {
    state: AtomicU8,
    future: Spinlock<Option<BoxFuture>>,
}

impl Task {
    fn new(future: BoxFuture) -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(IDLE),
            future: Spinlock::new(Some(future)),
        })
    }

    fn run(self: &Arc<Self>) {
        loop {
            self.state.store(RUNNING, Ordering::AcqRel);

            let mut slot = self.future.lock();
            let Some(mut fut) = slot.take() else {
                return;
            };

            let waker = Waker::from(self.clone());
            let mut cx = Context::from_waker(&waker);
            let poll_result = fut.as_mut().poll(&mut cx);

            match poll_result {
                Poll::Ready(()) => {
                    drop(fut);
                    drop(slot);
                    self.state.store(COMPLETE, Ordering::Release);
                    return;
                }
                Poll::Pending => {
                    *slot = Some(fut);
                    drop(slot);
                }
            }

            match self
                .state
                .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(_) => continue,
            }
        }
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.state.load(Ordering::Acquire) == COMPLETE
    }
}

impl Wake for Task {
    fn wake(self: Arc<Self>) {
        Self::wake_by_ref(&self)
    }

    fn wake_by_ref(self: &Arc<Self>) {
        loop {
            match self.state.load(Ordering::Acquire) {
                IDLE => {
                    if self
                        .state
                        .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        self.run();
                        return;
                    }
                }
                RUNNING => {
                    if self
                        .state
                        .compare_exchange(RUNNING, NOTIFIED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return;
                    }
                }
                NOTIFIED | COMPLETE => return,
                other => unreachable!("task state machine corrupted: {other}"),
            }
        }
    }
}

/// ### English
/// Spawns `future` and polls it once on the calling thread; further progress
/// happens inline whenever something wakes it (a worker thread processing a
/// `schedule()` wake, for instance). Returns the `Arc<Task>` so callers can
/// poll [`Task::is_complete`] (used by [`super::async_scope::AsyncScope`]).
///
/// ### 中文
/// spawn `future` 并在调用线程上立即轮询一次；此后每当有东西唤醒它（例如某个
/// worker 线程处理一次 `schedule()` wake），进度就内联地继续推进。返回
/// `Arc<Task>`，以便调用方轮询 [`Task::is_complete`]（供
/// [`super::async_scope::AsyncScope`] 使用）。
pub(crate) fn spawn_detached(future: impl Future<Output = ()> + Send + 'static) -> Arc<Task> {
    let task = Task::new(Box::pin(future));
    task.run();
    task
}

/// ### English
/// Drives `future` to completion on the calling thread, parking it (via
/// `thread::park`) whenever the future is `Pending` and nothing else wakes it
/// synchronously. Used by tests and by the top-level entry point that kicks
/// off the frame pipeline's long-lived task.
///
/// ### 中文
/// 在调用线程上将 `future` 驱动至完成：当 future 返回 `Pending` 且没有其他
/// 东西同步唤醒它时，通过 `thread::park` 挂起调用线程。供测试以及启动
/// frame pipeline 长生命周期任务的顶层入口点使用。
pub(crate) fn block_on<F: Future>(mut future: F) -> F::Output {
    struct ThreadWaker(std::thread::Thread);

    impl Wake for ThreadWaker {
        fn wake(self: Arc<Self>) {
            self.0.unpark();
        }

        fn wake_by_ref(self: &Arc<Self>) {
            self.0.unpark();
        }
    }

    let waker = Waker::from(Arc::new(ThreadWaker(std::thread::current())));
    let mut cx = Context::from_waker(&waker);
    // SAFETY: `future` is not moved after being pinned here; it is a local
    // that outlives the pinned borrow, standard `pin!`-less stack pinning.
    let mut future = unsafe { Pin::new_unchecked(&mut future) };
    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(value) => return value,
            Poll::Pending => std::thread::park(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn block_on_ready_future_returns_immediately() {
        assert_eq!(block_on(async { 1 + 1 }), 2);
    }

    #[test]
    fn spawn_detached_runs_to_completion() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = ran.clone();
        let task = spawn_detached(async move {
            ran2.store(true, Ordering::SeqCst);
        });
        assert!(task.is_complete());
        assert!(ran.load(Ordering::SeqCst));
    }
}
