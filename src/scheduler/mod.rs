//! ### English
//! The three scheduler flavors of §4.3–§4.6: the work-stealing [`worker_pool`],
//! the FIFO [`blocking_pool`], the per-frame [`event_queue`], and the
//! [`os_polling`] slot. [`ParkAndNotify`] is the shared parking primitive they
//! build on: unlike [`crate::park::wait::ParkFuture`] (used where the waiter
//! is drained by an explicit call such as `executeAll()`), scheduling onto a
//! pool may need to wake an OS thread that is genuinely asleep in
//! `thread::park()`, so parking and notifying happen together.
//!
//! ### 中文
//! §4.3–§4.6 的三种调度器：work-stealing 的 [`worker_pool`]、FIFO 的
//! [`blocking_pool`]、按帧驱动的 [`event_queue`]，以及 [`os_polling`] slot。
//! [`ParkAndNotify`] 是它们共用的挂起原语：与用于“由显式调用（如
//! `executeAll()`）排空等待者”场景的 [`crate::park::wait::ParkFuture`] 不同，
//! 调度到某个 pool 上可能需要唤醒一个真正在 `thread::park()` 中休眠的 OS
//! 线程，因此挂起与通知需要一起发生。

pub(crate) mod blocking_pool;
pub(crate) mod event_queue;
pub(crate) mod os_polling;
pub(crate) mod worker_pool;

use std::future::Future;
use std::marker::PhantomPinned;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::Thread;

use crate::park::op_state::{OpState, ParkedOp};
use crate::park::parking_lot::ParkingLot;
use crate::sync::spinlock::Spinlock;

#[repr(C)]
struct SignalNode {
    state: OpState<()>,
    fired: AtomicBool,
    cancelled: AtomicBool,
    waker: Spinlock<Option<Waker>>,
}

impl SignalNode {
    fn settle(&self, cancelled: bool) {
        if cancelled {
            self.cancelled.store(true, Ordering::Release);
        }
        self.fired.store(true, Ordering::Release);
        if let Some(waker) = self.waker.lock().take() {
            waker.wake();
        }
    }
}

impl ParkedOp<()> for SignalNode {
    fn wake(&mut self, _args: ()) {
        self.settle(false);
    }

    /// ### English
    /// Invoked by `multi_cancel_all` during pool teardown (§4.3 invariant
    /// (ii): "every parked op is `cancel`-ed, not woken"). Sets `cancelled`
    /// alongside `fired` so [`ParkAndNotify::poll`] can report `Done`
    /// instead of silently resuming as if it had been scheduled.
    ///
    /// ### 中文
    /// 在池拆除期间由 `multi_cancel_all` 调用（§4.3 不变式 (ii)：“每个被挂起的
    /// op 都被 cancel，而非被 wake”）。与 `fired` 一起设置 `cancelled`，使
    /// [`ParkAndNotify::poll`] 能报告 `Done`，而不是悄悄地像已被正常调度那样恢复。
    fn cancel(&mut self) {
        self.settle(true);
    }
}

/// ### English
/// Parks into `lot` on first poll and, in the same step, unparks every
/// thread in `notify` — the thread(s) that might be asleep waiting for this
/// lot to become non-empty. Passing an empty `notify` is correct (and used by
/// the pinned-subscheduler case) when the target thread is the one currently
/// running this very poll, hence provably not asleep.
///
/// ### 中文
/// 在首次轮询时挂入 `lot`，并在同一步骤中唤醒 `notify` 中的每个线程——即可能
/// 正在休眠等待该 lot 变为非空的线程。当目标线程正是当前正在执行本次轮询的
/// 线程时（因此可证明并未休眠），传入空的 `notify`（pinned 子调度器场景正是如此）
/// 也是正确的。
pub(crate) struct ParkAndNotify {
    lot: Arc<Spinlock<ParkingLot<()>>>,
    notify: Vec<Thread>,
    node: SignalNode,
    parked: bool,
    _pin: PhantomPinned,
}

impl ParkAndNotify {
    pub(crate) fn new(lot: Arc<Spinlock<ParkingLot<()>>>, notify: Vec<Thread>) -> Self {
        Self {
            lot,
            notify,
            node: SignalNode {
                state: OpState::new::<SignalNode>(),
                fired: AtomicBool::new(false),
                cancelled: AtomicBool::new(false),
                waker: Spinlock::new(None),
            },
            parked: false,
            _pin: PhantomPinned,
        }
    }
}

impl Future for ParkAndNotify {
    /// `true` iff the park was resolved by `cancel` (pool teardown) rather
    /// than `wake` — callers translate this into `Outcome::Done`.
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        // SAFETY: `node` is never moved out of `self`; `_pin` prevents it.
        let this = unsafe { self.get_unchecked_mut() };

        {
            let mut waker = this.node.waker.lock();
            if this.node.fired.load(Ordering::Acquire) {
                return Poll::Ready(this.node.cancelled.load(Ordering::Acquire));
            }
            *waker = Some(cx.waker().clone());
        }

        if !this.parked {
            this.parked = true;
            let node_ptr = &mut this.node as *mut SignalNode as *mut OpState<()>;
            let mut guard = this.lot.lock();
            unsafe { guard.park(node_ptr) };
            drop(guard);
            for thread in &this.notify {
                thread.unpark();
            }
        }

        Poll::Pending
    }
}

impl Drop for ParkAndNotify {
    fn drop(&mut self) {
        debug_assert!(
            !self.parked || self.node.fired.load(Ordering::Acquire),
            "ParkAndNotify dropped while still linked into a parking lot"
        );
    }
}
