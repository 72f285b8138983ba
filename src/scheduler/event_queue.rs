//! ### English
//! The next-frame event queue (§4.5): a parking lot drained exactly once per
//! frame by `execute_all()`, never by a sleeping OS thread — so unlike
//! [`super::worker_pool`]/[`super::blocking_pool`], scheduling onto it needs
//! no thread to notify, and [`crate::park::wait::ParkFuture`] (no notify
//! hook) is the right primitive rather than [`super::ParkAndNotify`].
//!
//! ### 中文
//! 按帧驱动的事件队列（§4.5）：一个每帧由 `execute_all()` 精确排空一次的
//! parking lot，从不由休眠中的 OS 线程排空——因此与
//! [`super::worker_pool`]/[`super::blocking_pool`] 不同，调度到它上面不需要
//! 唤醒任何线程，[`crate::park::wait::ParkFuture`]（不带通知钩子）才是合适的
//! 原语，而非 [`super::ParkAndNotify`]。

use std::convert::Infallible;
use std::sync::Arc;

use crate::park::parking_lot::{self, ParkingLot};
use crate::park::wait::ParkFuture;
use crate::sync::spinlock::Spinlock;
use crate::task::sender::{Outcome, Scheduler, Sender};

/// ### English
/// "Run this next frame on the main thread" queue. The frame pipeline (§4.8
/// step 1) calls [`EventQueue::execute_all`] exactly once per iteration.
///
/// ### 中文
/// “在主线程上于下一帧运行此任务”队列。frame pipeline（§4.8 第 1 步）每次
/// 迭代恰好调用一次 [`EventQueue::execute_all`]。
pub(crate) struct EventQueue {
    lot: Arc<Spinlock<ParkingLot<()>>>,
}

impl EventQueue {
    pub(crate) fn new() -> Self {
        Self {
            lot: Arc::new(Spinlock::new(ParkingLot::new())),
        }
    }

    /// ### English
    /// Wakes every continuation currently parked on this queue, in FIFO
    /// order, with the lot's lock released before any wake runs. A no-op on
    /// an empty queue. An op that re-parks into this same queue while being
    /// woken (from within its own wake callback) is *not* revisited by this
    /// call — `wake_all` splices the list out before invoking any callback,
    /// so a re-park lands in the queue for the *next* `execute_all` call.
    ///
    /// ### 中文
    /// 按 FIFO 顺序唤醒当前所有挂在本队列上的续延，并在唤醒前释放该队列的锁。
    /// 对空队列是空操作。若某个 op 在被唤醒过程中（在其自身的 wake 回调内）
    /// 重新挂入同一队列，本次调用*不会*再次访问它——`wake_all` 会在调用任何
    /// 回调之前先把整条链表摘出，因此重新挂入的 op 会落入*下一次*
    /// `execute_all` 调用的范围。
    pub(crate) fn execute_all(&self) {
        parking_lot::wake_all(self.lot.lock(), ());
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for EventQueue {
    type ScheduleSender = EventSchedule;

    fn schedule(&self) -> EventSchedule {
        EventSchedule {
            lot: self.lot.clone(),
        }
    }
}

/// ### English
/// Sender produced by [`Scheduler::schedule`] on an [`EventQueue`]; resolves
/// on the next [`EventQueue::execute_all`] call.
///
/// ### 中文
/// [`EventQueue`] 的 [`Scheduler::schedule`] 所产生的 sender；在下一次
/// [`EventQueue::execute_all`] 调用时完成。
pub(crate) struct EventSchedule {
    lot: Arc<Spinlock<ParkingLot<()>>>,
}

impl Sender for EventSchedule {
    type Value = ();
    type Error = Infallible;

    async fn run(self) -> Outcome<(), Infallible> {
        ParkFuture::new(self.lot).await;
        Outcome::Value(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::driver::spawn_detached;
    use std::sync::mpsc;

    #[test]
    fn execute_all_on_empty_queue_is_a_no_op() {
        let queue = EventQueue::new();
        queue.execute_all();
    }

    #[test]
    fn scheduled_continuation_resumes_on_execute_all() {
        let queue = Arc::new(EventQueue::new());
        let (tx, rx) = mpsc::channel();

        let queue_for_task = queue.clone();
        spawn_detached(async move {
            let outcome = queue_for_task.schedule().run().await;
            tx.send(outcome).unwrap();
        });

        assert!(rx.try_recv().is_err(), "resolved before execute_all was called");
        queue.execute_all();
        assert_eq!(rx.recv().unwrap(), Outcome::Value(()));
    }

    #[test]
    fn reparking_during_execute_all_waits_for_next_call() {
        let queue = Arc::new(EventQueue::new());
        let (tx, rx) = mpsc::channel();

        let queue_for_task = queue.clone();
        spawn_detached(async move {
            let _ = queue_for_task.schedule().run().await;
            // Re-park for a second round inside the same wake chain.
            let _ = queue_for_task.schedule().run().await;
            tx.send(()).unwrap();
        });

        queue.execute_all();
        assert!(
            rx.try_recv().is_err(),
            "second park resolved within the same execute_all call"
        );
        queue.execute_all();
        assert!(rx.recv().is_ok());
    }
}
