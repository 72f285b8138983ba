//! ### English
//! The K-thread FIFO blocking pool (§4.4): a single shared lot, no
//! work-stealing, used for synchronous file I/O and fence waits. Grounded on
//! `original_source/engine/include/concurrency/BlockingThreadPool.hpp`'s
//! single-mutex, single-condvar design, adapted to this crate's
//! park/unpark-based idle wait instead of a condition variable.
//!
//! ### 中文
//! K 线程 FIFO 阻塞池（§4.4）：单个共享队列，不做 work-stealing，用于同步
//! 文件 I/O 与 fence 等待。其设计依据为
//! `original_source/engine/include/concurrency/BlockingThreadPool.hpp`
//! 的单锁单条件变量方案，这里改用本库基于 park/unpark 的空闲等待而非条件变量。

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, Thread};

use super::ParkAndNotify;
use crate::park::parking_lot::{self, ParkingLot};
use crate::sync::multi_lock;
use crate::sync::spinlock::Spinlock;
use crate::task::sender::{Outcome, Scheduler, Sender};

struct Inner {
    lot: Arc<Spinlock<ParkingLot<()>>>,
    stop: AtomicBool,
    threads: Spinlock<Vec<Thread>>,
}

/// ### English
/// Single shared FIFO queue, `K` threads. Used for blocking file I/O and
/// `waitForFences`-style calls per §4.4/§4.8 step 7.
///
/// ### 中文
/// 单个共享 FIFO 队列，`K` 个线程。用于阻塞文件 I/O，以及 §4.4/§4.8 第 7 步那样的
/// `waitForFences` 式调用。
pub(crate) struct BlockingPool {
    inner: Arc<Inner>,
    threads: Vec<JoinHandle<()>>,
}

impl BlockingPool {
    pub(crate) fn new(thread_count: usize, name_prefix: &str) -> Self {
        let thread_count = thread_count.max(1);
        let inner = Arc::new(Inner {
            lot: Arc::new(Spinlock::new(ParkingLot::new())),
            stop: AtomicBool::new(false),
            threads: Spinlock::new(Vec::with_capacity(thread_count)),
        });

        let threads = (0..thread_count)
            .map(|i| {
                let inner = inner.clone();
                thread::Builder::new()
                    .name(format!("{name_prefix}-{i}"))
                    .spawn(move || blocking_loop(inner))
                    .expect("failed to spawn blocking-pool thread")
            })
            .collect();

        Self { inner, threads }
    }

    pub(crate) fn request_stop(&self) {
        self.inner.stop.store(true, Ordering::Release);
        for thread in self.inner.threads.lock().iter() {
            thread.unpark();
        }
    }
}

impl Drop for BlockingPool {
    fn drop(&mut self) {
        self.request_stop();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Scheduler for BlockingPool {
    type ScheduleSender = BlockingSchedule;

    fn schedule(&self) -> BlockingSchedule {
        BlockingSchedule {
            inner: self.inner.clone(),
        }
    }
}

fn blocking_loop(pool: Arc<Inner>) {
    pool.threads.lock().push(thread::current());
    let span = tracing::info_span!("blocking_worker");
    let _enter = span.enter();

    loop {
        if pool.stop.load(Ordering::Acquire) {
            let guard = multi_lock::lock_all([&*pool.lot]);
            parking_lot::multi_cancel_all(guard);
            return;
        }

        let woke = parking_lot::wake_one(pool.lot.lock(), ());
        if woke {
            continue;
        }

        if !pool.stop.load(Ordering::Acquire) {
            thread::park();
        }
    }
}

/// ### English
/// Sender produced by [`Scheduler::schedule`] on a [`BlockingPool`].
///
/// ### 中文
/// [`BlockingPool`] 的 [`Scheduler::schedule`] 所产生的 sender。
pub(crate) struct BlockingSchedule {
    inner: Arc<Inner>,
}

impl Sender for BlockingSchedule {
    type Value = ();
    type Error = Infallible;

    async fn run(self) -> Outcome<(), Infallible> {
        if self.inner.stop.load(Ordering::Acquire) {
            return Outcome::Done;
        }

        let lot = self.inner.lot.clone();
        let notify = self.inner.threads.lock().clone();
        if ParkAndNotify::new(lot, notify).await {
            return Outcome::Done;
        }
        Outcome::Value(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::driver::{block_on, spawn_detached};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn schedule_runs_on_a_blocking_thread() {
        let pool = BlockingPool::new(2, "test-blocking");
        let outcome = block_on(pool.schedule().run());
        assert_eq!(outcome, Outcome::Value(()));
    }

    #[test]
    fn stop_cancels_future_schedules() {
        let pool = BlockingPool::new(1, "test-blocking-stop");
        pool.request_stop();
        let outcome = block_on(pool.schedule().run());
        assert_eq!(outcome, Outcome::Done);
    }

    /// Exercises the actual `multi_cancel_all` path (§8 "clean teardown"):
    /// one sender occupies the pool's single thread for a while, a second
    /// sender is left genuinely parked in the lot behind it, and
    /// `request_stop` fires while the second is still parked — it must
    /// observe `Outcome::Done` via `cancel`, not hang forever.
    #[test]
    fn stop_cancels_a_genuinely_parked_schedule() {
        let pool = Arc::new(BlockingPool::new(1, "test-blocking-midflight"));
        let (occupied_tx, occupied_rx) = mpsc::channel();
        let (parked_tx, parked_rx) = mpsc::channel::<Outcome<(), Infallible>>();

        let occupying_pool = pool.clone();
        spawn_detached(async move {
            occupying_pool.schedule().run().await;
            // Holds the pool's only thread while the second sender parks.
            std::thread::sleep(Duration::from_millis(300));
            occupied_tx.send(()).unwrap();
        });

        let parked_pool = pool.clone();
        spawn_detached(async move {
            let outcome = parked_pool.schedule().run().await;
            parked_tx.send(outcome).unwrap();
        });

        // Give the first sender time to actually start occupying the thread
        // before cancelling, well short of its 300ms hold.
        std::thread::sleep(Duration::from_millis(50));
        pool.request_stop();

        occupied_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("occupying schedule did not complete");
        let outcome = parked_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("parked schedule leaked instead of observing cancellation");
        assert_eq!(outcome, Outcome::Done);
    }
}
