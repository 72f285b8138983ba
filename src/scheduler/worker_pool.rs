//! ### English
//! The N-thread work-stealing pool (§4.3): each worker owns a *general* lot
//! (fed by the floating scheduler's round-robin+try-lock policy) and a
//! *pinned* lot (fed only by `schedule_with_subscheduler` calls made from
//! inside that same worker's own execution). Grounded on the teacher's
//! `RefreshScheduler`/`servo_thread.rs` pattern of a named, dedicated OS
//! thread per subsystem, generalized here to a pool of interchangeable
//! workers plus one thread-affine escape hatch.
//!
//! ### 中文
//! N 线程 work-stealing 池（§4.3）：每个 worker 拥有一个 *general* 队列
//! （由浮动调度器的 round-robin + try-lock 策略供给）与一个 *pinned* 队列
//! （仅由该 worker 自身执行过程中发起的 `schedule_with_subscheduler` 调用供给）。
//! 其设计依据为教师仓库 `RefreshScheduler`/`servo_thread.rs` 中“每个子系统一个
//! 具名专属 OS 线程”的模式，在此推广为一组可互换的 worker 外加一个线程亲和的
//! 逃生通道。

use std::cell::Cell;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, Thread};

use crossbeam_utils::CachePadded;

use super::ParkAndNotify;
use crate::park::parking_lot::{self, ParkingLot};
use crate::sync::multi_lock;
use crate::sync::spinlock::Spinlock;
use crate::task::sender::{Outcome, Scheduler, Sender};

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static CURRENT_WORKER: Cell<Option<(usize, usize)>> = const { Cell::new(None) };
}

/// ### English
/// Returns `(pool_id, worker_index)` if the calling thread is currently
/// executing as a worker of some [`WorkerPool`] — used by
/// `schedule_with_subscheduler` to decide whether it can pin.
///
/// ### 中文
/// 若调用线程当前正作为某个 [`WorkerPool`] 的 worker 执行，则返回
/// `(pool_id, worker_index)`——供 `schedule_with_subscheduler` 判断是否可以 pin。
fn current_worker() -> Option<(usize, usize)> {
    CURRENT_WORKER.with(|c| c.get())
}

struct WorkerRecord {
    general: Arc<Spinlock<ParkingLot<()>>>,
    pinned: Arc<Spinlock<ParkingLot<()>>>,
    thread: Spinlock<Option<Thread>>,
}

struct Inner {
    id: usize,
    workers: Vec<CachePadded<WorkerRecord>>,
    next: AtomicUsize,
    stop: AtomicBool,
}

impl Inner {
    fn worker_thread(&self, idx: usize) -> Option<Thread> {
        self.workers[idx].thread.lock().clone()
    }
}

/// ### English
/// The work-stealing pool itself. Owns the worker threads; `Drop` requests
/// stop and joins them, so a pool going out of scope always tears down
/// cleanly.
///
/// ### 中文
/// work-stealing 池本身。持有各 worker 线程；`Drop` 时请求停止并 join 它们，
/// 因此池离开作用域时总能干净地完成清理。
pub(crate) struct WorkerPool {
    inner: Arc<Inner>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn new(worker_count: usize, name_prefix: &str) -> Self {
        let worker_count = worker_count.max(1);
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        let workers = (0..worker_count)
            .map(|_| {
                CachePadded::new(WorkerRecord {
                    general: Arc::new(Spinlock::new(ParkingLot::new())),
                    pinned: Arc::new(Spinlock::new(ParkingLot::new())),
                    thread: Spinlock::new(None),
                })
            })
            .collect();
        let inner = Arc::new(Inner {
            id,
            workers,
            next: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
        });

        let threads = (0..worker_count)
            .map(|idx| {
                let inner = inner.clone();
                thread::Builder::new()
                    .name(format!("{name_prefix}-{idx}"))
                    .spawn(move || worker_loop(inner, idx))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self { inner, threads }
    }

    /// ### English
    /// Returns a sender that resumes on the worker that created it, if
    /// called from inside one of this pool's workers; otherwise behaves like
    /// [`Scheduler::schedule`] (§4.3's "floating enqueue" fallback).
    ///
    /// ### 中文
    /// 若在本池某个 worker 内部调用，返回一个会在该 worker 上恢复的 sender；
    /// 否则表现为 [`Scheduler::schedule`]（§4.3 的“浮动入队”回退行为）。
    pub(crate) fn schedule_with_subscheduler(&self) -> SubSchedule {
        SubSchedule {
            inner: self.inner.clone(),
        }
    }

    pub(crate) fn request_stop(&self) {
        self.inner.stop.store(true, Ordering::Release);
        for worker in &self.inner.workers {
            if let Some(thread) = worker.thread.lock().as_ref() {
                thread.unpark();
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.request_stop();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Scheduler for WorkerPool {
    type ScheduleSender = Schedule;

    fn schedule(&self) -> Schedule {
        Schedule {
            inner: self.inner.clone(),
        }
    }
}

fn worker_loop(pool: Arc<Inner>, idx: usize) {
    *pool.workers[idx].thread.lock() = Some(thread::current());
    CURRENT_WORKER.with(|c| c.set(Some((pool.id, idx))));
    let span = tracing::info_span!("worker", pool = pool.id, worker_id = idx);
    let _enter = span.enter();

    loop {
        if pool.stop.load(Ordering::Acquire) {
            teardown_worker(&pool, idx);
            return;
        }

        let worker = &pool.workers[idx];
        if let Some(guard) = worker.pinned.try_lock() {
            if parking_lot::wake_one(guard, ()) {
                continue;
            }
        }

        // Rotating scan over every worker's general lot, including this
        // worker's own — the floating scheduler has no notion of ownership,
        // so a worker's own general lot is serviced the same way any other
        // worker's is (grounded on the original `ThreadPool::run_task`,
        // which starts its scan offset at 0, i.e. itself first).
        let n = pool.workers.len();
        let mut stole = false;
        for offset in 0..n {
            let other = (idx + offset) % n;
            if let Some(guard) = pool.workers[other].general.try_lock() {
                if parking_lot::wake_one(guard, ()) {
                    stole = true;
                    break;
                }
            }
        }
        if stole {
            continue;
        }

        let worker = &pool.workers[idx];
        let guard = multi_lock::lock_all([&*worker.general, &*worker.pinned]);
        let idle = guard.get(0).is_empty() && guard.get(1).is_empty();
        drop(guard);

        if idle && !pool.stop.load(Ordering::Acquire) {
            thread::park();
        }
    }
}

fn teardown_worker(pool: &Arc<Inner>, idx: usize) {
    let worker = &pool.workers[idx];
    let guard = multi_lock::lock_all([&*worker.general, &*worker.pinned]);
    parking_lot::multi_cancel_all(guard);
}

async fn floating_schedule(pool: Arc<Inner>) -> Outcome<(), Infallible> {
    if pool.stop.load(Ordering::Acquire) {
        return Outcome::Done;
    }

    let n = pool.workers.len();
    let target = pool.next.fetch_add(1, Ordering::Relaxed) % n;
    let chosen = (0..n)
        .map(|offset| (target + offset) % n)
        .find(|&candidate| pool.workers[candidate].general.try_lock().is_some())
        .unwrap_or(target);

    let lot = pool.workers[chosen].general.clone();
    let notify = pool.worker_thread(chosen).into_iter().collect();
    if ParkAndNotify::new(lot, notify).await {
        return Outcome::Done;
    }
    Outcome::Value(())
}

/// ### English
/// Sender produced by [`Scheduler::schedule`] on a [`WorkerPool`]: the
/// floating scheduler of §4.3.
///
/// ### 中文
/// [`WorkerPool`] 的 [`Scheduler::schedule`] 所产生的 sender：§4.3 所述的
/// 浮动调度器。
pub(crate) struct Schedule {
    inner: Arc<Inner>,
}

impl Sender for Schedule {
    type Value = ();
    type Error = Infallible;

    async fn run(self) -> Outcome<(), Infallible> {
        floating_schedule(self.inner).await
    }
}

/// ### English
/// Sender produced by [`WorkerPool::schedule_with_subscheduler`].
///
/// ### 中文
/// 由 [`WorkerPool::schedule_with_subscheduler`] 产生的 sender。
pub(crate) struct SubSchedule {
    inner: Arc<Inner>,
}

impl Sender for SubSchedule {
    type Value = ();
    type Error = Infallible;

    async fn run(self) -> Outcome<(), Infallible> {
        if self.inner.stop.load(Ordering::Acquire) {
            return Outcome::Done;
        }

        if let Some((pool_id, idx)) = current_worker() {
            if pool_id == self.inner.id {
                let lot = self.inner.workers[idx].pinned.clone();
                if ParkAndNotify::new(lot, Vec::new()).await {
                    return Outcome::Done;
                }
                return Outcome::Value(());
            }
        }

        floating_schedule(self.inner).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::driver::{block_on, spawn_detached};
    use std::sync::mpsc;

    #[test]
    fn schedule_resumes_on_some_worker() {
        let pool = WorkerPool::new(2, "test-worker");
        let outcome = block_on(pool.schedule().run());
        assert_eq!(outcome, Outcome::Value(()));
    }

    #[test]
    fn stop_cancels_pending_and_future_schedules() {
        let pool = WorkerPool::new(1, "test-worker-stop");
        pool.request_stop();
        let outcome = block_on(pool.schedule().run());
        assert_eq!(outcome, Outcome::Done);
    }

    /// Exercises the actual `multi_cancel_all` path (§8 "clean teardown"):
    /// one sender occupies the pool's single worker for a while, a second
    /// sender is left genuinely parked in that worker's general lot, and
    /// `request_stop` fires while the second is still parked — it must
    /// observe `Outcome::Done` via `cancel`, not hang forever.
    #[test]
    fn stop_cancels_a_genuinely_parked_schedule() {
        let pool = Arc::new(WorkerPool::new(1, "test-worker-midflight"));
        let (occupied_tx, occupied_rx) = mpsc::channel();
        let (parked_tx, parked_rx) = mpsc::channel::<Outcome<(), Infallible>>();

        let occupying_pool = pool.clone();
        spawn_detached(async move {
            occupying_pool.schedule().run().await;
            // Holds the pool's only worker while the second sender parks.
            std::thread::sleep(std::time::Duration::from_millis(300));
            occupied_tx.send(()).unwrap();
        });

        let parked_pool = pool.clone();
        spawn_detached(async move {
            let outcome = parked_pool.schedule().run().await;
            parked_tx.send(outcome).unwrap();
        });

        // Give the first sender time to actually start occupying the worker
        // before cancelling, well short of its 300ms hold.
        std::thread::sleep(std::time::Duration::from_millis(50));
        pool.request_stop();

        occupied_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("occupying schedule did not complete");
        let outcome = parked_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("parked schedule leaked instead of observing cancellation");
        assert_eq!(outcome, Outcome::Done);
    }

    #[test]
    fn subscheduler_pins_to_capturing_worker() {
        let pool = Arc::new(WorkerPool::new(4, "test-worker-pin"));
        let (tx, rx) = mpsc::channel();

        let pool_for_task = pool.clone();
        spawn_detached(async move {
            // Captured from whatever worker happens to run this continuation.
            let captured = current_worker();
            for _ in 0..100 {
                let outcome = sub_schedule_once(&pool_for_task).await;
                assert_eq!(outcome, Outcome::Value(()));
                assert_eq!(current_worker(), captured);
            }
            tx.send(()).unwrap();
        });

        rx.recv_timeout(std::time::Duration::from_secs(5))
            .expect("subscheduler pinning test did not complete");
    }

    async fn sub_schedule_once(pool: &Arc<WorkerPool>) -> Outcome<(), Infallible> {
        pool.schedule_with_subscheduler().run().await
    }
}
